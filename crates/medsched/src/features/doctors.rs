//! Doctor commands and queries.

use std::sync::Arc;

use async_trait::async_trait;

use medsched_core::cache::{doctors_by_branch_key, DOCTORS_GROUP};
use medsched_core::domain::{Branch, Doctor, Entity};
use medsched_core::pipeline::{
    AppError, CachePolicy, Capabilities, GetListResponse, Handler, Request, RequestContext,
};
use medsched_core::storage::{
    DeleteMode, GetQuery, ListQuery, PageRequest, Predicate, Repository,
};

use super::roles;

/// Adds a doctor to an existing branch.
pub struct CreateDoctor {
    pub branch_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub title: String,
}

impl Request for CreateDoctor {
    type Response = Doctor;
    const NAME: &'static str = "CreateDoctor";

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .secured([roles::ADMIN, roles::WRITE, roles::CREATE])
            .invalidates(DOCTORS_GROUP)
            .transactional()
            .loggable()
    }
}

pub struct CreateDoctorHandler {
    doctors: Arc<dyn Repository<Doctor>>,
    branches: Arc<dyn Repository<Branch>>,
}

impl CreateDoctorHandler {
    pub fn new(doctors: Arc<dyn Repository<Doctor>>, branches: Arc<dyn Repository<Branch>>) -> Self {
        Self { doctors, branches }
    }
}

#[async_trait]
impl Handler<CreateDoctor> for CreateDoctorHandler {
    async fn handle(&self, request: CreateDoctor, ctx: &RequestContext) -> Result<Doctor, AppError> {
        ctx.ensure_active()?;

        let branch_id = request.branch_id;
        self.branches
            .get(GetQuery::by(Predicate::new(move |b: &Branch| {
                b.id == branch_id && b.deleted_at().is_none()
            })))
            .await?
            .ok_or(AppError::NotFound {
                entity: Branch::NAME,
                id: request.branch_id.to_string(),
            })?;

        let doctor = Doctor::new(
            request.branch_id,
            request.first_name,
            request.last_name,
            request.title,
        );
        Ok(self.doctors.add(doctor).await?)
    }
}

/// Fetches a single active doctor.
pub struct GetDoctorById {
    pub id: i32,
}

impl Request for GetDoctorById {
    type Response = Doctor;
    const NAME: &'static str = "GetDoctorById";
}

pub struct GetDoctorByIdHandler {
    doctors: Arc<dyn Repository<Doctor>>,
}

impl GetDoctorByIdHandler {
    pub fn new(doctors: Arc<dyn Repository<Doctor>>) -> Self {
        Self { doctors }
    }
}

#[async_trait]
impl Handler<GetDoctorById> for GetDoctorByIdHandler {
    async fn handle(&self, request: GetDoctorById, ctx: &RequestContext) -> Result<Doctor, AppError> {
        ctx.ensure_active()?;

        let id = request.id;
        self.doctors
            .get(GetQuery::by(Predicate::new(move |d: &Doctor| {
                d.id == id && d.deleted_at().is_none()
            })))
            .await?
            .ok_or(AppError::NotFound {
                entity: Doctor::NAME,
                id: request.id.to_string(),
            })
    }
}

/// Lists a branch's active doctors, one page at a time.
pub struct ListDoctorsByBranch {
    pub branch_id: i32,
    pub page: PageRequest,
}

impl Request for ListDoctorsByBranch {
    type Response = GetListResponse<Doctor>;
    const NAME: &'static str = "ListDoctorsByBranch";

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .secured([roles::ADMIN, roles::READ])
            .cached(
                CachePolicy::new(doctors_by_branch_key(self.branch_id, self.page))
                    .in_group(DOCTORS_GROUP),
            )
    }
}

pub struct ListDoctorsByBranchHandler {
    doctors: Arc<dyn Repository<Doctor>>,
}

impl ListDoctorsByBranchHandler {
    pub fn new(doctors: Arc<dyn Repository<Doctor>>) -> Self {
        Self { doctors }
    }
}

#[async_trait]
impl Handler<ListDoctorsByBranch> for ListDoctorsByBranchHandler {
    async fn handle(
        &self,
        request: ListDoctorsByBranch,
        ctx: &RequestContext,
    ) -> Result<GetListResponse<Doctor>, AppError> {
        ctx.ensure_active()?;

        let branch_id = request.branch_id;
        let page = self
            .doctors
            .get_list(
                ListQuery::page(request.page).filter(Predicate::new(move |d: &Doctor| {
                    d.branch_id == branch_id && d.deleted_at().is_none()
                })),
            )
            .await?;
        Ok(GetListResponse::from_page(page, |doctor| doctor))
    }
}

/// Soft-deletes a doctor by id.
pub struct DeleteDoctor {
    pub id: i32,
}

impl Request for DeleteDoctor {
    type Response = ();
    const NAME: &'static str = "DeleteDoctor";

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .secured([roles::ADMIN, roles::DELETE])
            .invalidates(DOCTORS_GROUP)
            .transactional()
            .loggable()
    }
}

pub struct DeleteDoctorHandler {
    doctors: Arc<dyn Repository<Doctor>>,
}

impl DeleteDoctorHandler {
    pub fn new(doctors: Arc<dyn Repository<Doctor>>) -> Self {
        Self { doctors }
    }
}

#[async_trait]
impl Handler<DeleteDoctor> for DeleteDoctorHandler {
    async fn handle(&self, request: DeleteDoctor, ctx: &RequestContext) -> Result<(), AppError> {
        ctx.ensure_active()?;

        let id = request.id;
        let doctor = self
            .doctors
            .get(GetQuery::by(Predicate::new(move |d: &Doctor| {
                d.id == id && d.deleted_at().is_none()
            })))
            .await?
            .ok_or(AppError::NotFound {
                entity: Doctor::NAME,
                id: request.id.to_string(),
            })?;

        self.doctors.delete(doctor, DeleteMode::Soft).await?;
        Ok(())
    }
}
