//! Patient commands and queries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use medsched_core::cache::{patients_list_key, PATIENTS_GROUP};
use medsched_core::domain::{Entity, Patient};
use medsched_core::pipeline::{
    AppError, CachePolicy, Capabilities, GetListResponse, Handler, Request, RequestContext,
};
use medsched_core::storage::{GetQuery, ListQuery, PageRequest, Predicate, Repository};

use super::roles;

/// Registers a patient, resurrecting a soft-deleted row with the same
/// national identity.
pub struct CreatePatient {
    pub first_name: String,
    pub last_name: String,
    pub national_identity: String,
    pub phone: String,
    pub birth_date: NaiveDate,
}

impl Request for CreatePatient {
    type Response = Patient;
    const NAME: &'static str = "CreatePatient";

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .secured([roles::ADMIN, roles::WRITE, roles::CREATE])
            .invalidates(PATIENTS_GROUP)
            .transactional()
            .loggable()
    }
}

pub struct CreatePatientHandler {
    patients: Arc<dyn Repository<Patient>>,
}

impl CreatePatientHandler {
    pub fn new(patients: Arc<dyn Repository<Patient>>) -> Self {
        Self { patients }
    }
}

#[async_trait]
impl Handler<CreatePatient> for CreatePatientHandler {
    async fn handle(
        &self,
        request: CreatePatient,
        ctx: &RequestContext,
    ) -> Result<Patient, AppError> {
        ctx.ensure_active()?;

        let identity = request.national_identity.clone();
        let active = self
            .patients
            .get(GetQuery::by(Predicate::new(move |p: &Patient| {
                p.national_identity == identity && p.deleted_at().is_none()
            })))
            .await?;
        if active.is_some() {
            return Err(AppError::Duplicate {
                entity: Patient::NAME,
                key: request.national_identity,
            });
        }

        let identity = request.national_identity.clone();
        let buried = self
            .patients
            .get(GetQuery::by(Predicate::new(move |p: &Patient| {
                p.national_identity == identity && p.deleted_at().is_some()
            })))
            .await?;
        match buried {
            Some(mut patient) => {
                patient.first_name = request.first_name;
                patient.last_name = request.last_name;
                patient.phone = request.phone;
                patient.birth_date = request.birth_date;
                patient.set_deleted_at(None);
                Ok(self.patients.update(patient).await?)
            }
            None => {
                let patient = Patient::new(
                    request.first_name,
                    request.last_name,
                    request.national_identity,
                    request.phone,
                    request.birth_date,
                );
                Ok(self.patients.add(patient).await?)
            }
        }
    }
}

/// Fetches a single active patient.
pub struct GetPatientById {
    pub id: i32,
}

impl Request for GetPatientById {
    type Response = Patient;
    const NAME: &'static str = "GetPatientById";
}

pub struct GetPatientByIdHandler {
    patients: Arc<dyn Repository<Patient>>,
}

impl GetPatientByIdHandler {
    pub fn new(patients: Arc<dyn Repository<Patient>>) -> Self {
        Self { patients }
    }
}

#[async_trait]
impl Handler<GetPatientById> for GetPatientByIdHandler {
    async fn handle(
        &self,
        request: GetPatientById,
        ctx: &RequestContext,
    ) -> Result<Patient, AppError> {
        ctx.ensure_active()?;

        let id = request.id;
        self.patients
            .get(GetQuery::by(Predicate::new(move |p: &Patient| {
                p.id == id && p.deleted_at().is_none()
            })))
            .await?
            .ok_or(AppError::NotFound {
                entity: Patient::NAME,
                id: request.id.to_string(),
            })
    }
}

/// Lists active patients, one page at a time.
pub struct ListPatients {
    pub page: PageRequest,
}

impl Request for ListPatients {
    type Response = GetListResponse<Patient>;
    const NAME: &'static str = "ListPatients";

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .secured([roles::ADMIN, roles::READ])
            .cached(CachePolicy::new(patients_list_key(self.page)).in_group(PATIENTS_GROUP))
    }
}

pub struct ListPatientsHandler {
    patients: Arc<dyn Repository<Patient>>,
}

impl ListPatientsHandler {
    pub fn new(patients: Arc<dyn Repository<Patient>>) -> Self {
        Self { patients }
    }
}

#[async_trait]
impl Handler<ListPatients> for ListPatientsHandler {
    async fn handle(
        &self,
        request: ListPatients,
        ctx: &RequestContext,
    ) -> Result<GetListResponse<Patient>, AppError> {
        ctx.ensure_active()?;

        let page = self
            .patients
            .get_list(
                ListQuery::page(request.page)
                    .filter(Predicate::new(|p: &Patient| p.deleted_at().is_none())),
            )
            .await?;
        Ok(GetListResponse::from_page(page, |patient| patient))
    }
}
