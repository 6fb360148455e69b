//! Doctor schedule commands and queries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use medsched_core::cache::{schedules_by_doctor_key, SCHEDULES_GROUP};
use medsched_core::domain::{Doctor, DoctorSchedule, Entity};
use medsched_core::pipeline::{
    AppError, CachePolicy, Capabilities, GetListResponse, Handler, Request, RequestContext,
};
use medsched_core::storage::{GetQuery, ListQuery, PageRequest, Predicate, Repository};

use super::roles;

/// Records a doctor's working window on a date, resurrecting a soft-deleted
/// row for the same (doctor, date).
pub struct CreateDoctorSchedule {
    pub doctor_id: i32,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl Request for CreateDoctorSchedule {
    type Response = DoctorSchedule;
    const NAME: &'static str = "CreateDoctorSchedule";

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .secured([roles::ADMIN, roles::WRITE, roles::CREATE])
            .invalidates(SCHEDULES_GROUP)
            .transactional()
            .loggable()
    }
}

pub struct CreateDoctorScheduleHandler {
    schedules: Arc<dyn Repository<DoctorSchedule>>,
    doctors: Arc<dyn Repository<Doctor>>,
}

impl CreateDoctorScheduleHandler {
    pub fn new(
        schedules: Arc<dyn Repository<DoctorSchedule>>,
        doctors: Arc<dyn Repository<Doctor>>,
    ) -> Self {
        Self { schedules, doctors }
    }
}

#[async_trait]
impl Handler<CreateDoctorSchedule> for CreateDoctorScheduleHandler {
    async fn handle(
        &self,
        request: CreateDoctorSchedule,
        ctx: &RequestContext,
    ) -> Result<DoctorSchedule, AppError> {
        ctx.ensure_active()?;

        if request.end_time <= request.start_time {
            return Err(AppError::Validation(
                "schedule end time must be after start time".to_string(),
            ));
        }

        let doctor_id = request.doctor_id;
        self.doctors
            .get(GetQuery::by(Predicate::new(move |d: &Doctor| {
                d.id == doctor_id && d.deleted_at().is_none()
            })))
            .await?
            .ok_or(AppError::NotFound {
                entity: Doctor::NAME,
                id: request.doctor_id.to_string(),
            })?;

        let (doctor_id, date) = (request.doctor_id, request.date);
        let active = self
            .schedules
            .get(GetQuery::by(Predicate::new(move |s: &DoctorSchedule| {
                s.doctor_id == doctor_id && s.date == date && s.deleted_at().is_none()
            })))
            .await?;
        if active.is_some() {
            return Err(AppError::Duplicate {
                entity: DoctorSchedule::NAME,
                key: format!("{}:{}", request.doctor_id, request.date),
            });
        }

        let (doctor_id, date) = (request.doctor_id, request.date);
        let buried = self
            .schedules
            .get(GetQuery::by(Predicate::new(move |s: &DoctorSchedule| {
                s.doctor_id == doctor_id && s.date == date && s.deleted_at().is_some()
            })))
            .await?;
        match buried {
            Some(mut schedule) => {
                schedule.start_time = request.start_time;
                schedule.end_time = request.end_time;
                schedule.set_deleted_at(None);
                Ok(self.schedules.update(schedule).await?)
            }
            None => {
                let schedule = DoctorSchedule::new(
                    request.doctor_id,
                    request.date,
                    request.start_time,
                    request.end_time,
                );
                Ok(self.schedules.add(schedule).await?)
            }
        }
    }
}

/// Lists a doctor's active schedule records, one page at a time.
pub struct ListSchedulesByDoctor {
    pub doctor_id: i32,
    pub page: PageRequest,
}

impl Request for ListSchedulesByDoctor {
    type Response = GetListResponse<DoctorSchedule>;
    const NAME: &'static str = "ListSchedulesByDoctor";

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .secured([roles::ADMIN, roles::READ])
            .cached(
                CachePolicy::new(schedules_by_doctor_key(self.doctor_id, self.page))
                    .in_group(SCHEDULES_GROUP),
            )
    }
}

pub struct ListSchedulesByDoctorHandler {
    schedules: Arc<dyn Repository<DoctorSchedule>>,
}

impl ListSchedulesByDoctorHandler {
    pub fn new(schedules: Arc<dyn Repository<DoctorSchedule>>) -> Self {
        Self { schedules }
    }
}

#[async_trait]
impl Handler<ListSchedulesByDoctor> for ListSchedulesByDoctorHandler {
    async fn handle(
        &self,
        request: ListSchedulesByDoctor,
        ctx: &RequestContext,
    ) -> Result<GetListResponse<DoctorSchedule>, AppError> {
        ctx.ensure_active()?;

        let doctor_id = request.doctor_id;
        let page = self
            .schedules
            .get_list(
                ListQuery::page(request.page).filter(Predicate::new(
                    move |s: &DoctorSchedule| s.doctor_id == doctor_id && s.deleted_at().is_none(),
                )),
            )
            .await?;
        Ok(GetListResponse::from_page(page, |schedule| schedule))
    }
}
