//! Appointment commands and queries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use medsched_core::cache::{appointments_by_doctor_key, APPOINTMENTS_GROUP};
use medsched_core::domain::{Appointment, AppointmentStatus, Doctor, Entity, Patient};
use medsched_core::pipeline::{
    AppError, CachePolicy, Capabilities, GetListResponse, Handler, Request, RequestContext,
};
use medsched_core::storage::{GetQuery, ListQuery, PageRequest, Predicate, Repository};

use super::roles;

/// Books an appointment for a doctor and patient.
pub struct CreateAppointment {
    pub doctor_id: i32,
    pub patient_id: i32,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl Request for CreateAppointment {
    type Response = Appointment;
    const NAME: &'static str = "CreateAppointment";

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .secured([roles::ADMIN, roles::WRITE, roles::CREATE])
            .invalidates(APPOINTMENTS_GROUP)
            .transactional()
            .loggable()
    }
}

pub struct CreateAppointmentHandler {
    appointments: Arc<dyn Repository<Appointment>>,
    doctors: Arc<dyn Repository<Doctor>>,
    patients: Arc<dyn Repository<Patient>>,
}

impl CreateAppointmentHandler {
    pub fn new(
        appointments: Arc<dyn Repository<Appointment>>,
        doctors: Arc<dyn Repository<Doctor>>,
        patients: Arc<dyn Repository<Patient>>,
    ) -> Self {
        Self {
            appointments,
            doctors,
            patients,
        }
    }
}

#[async_trait]
impl Handler<CreateAppointment> for CreateAppointmentHandler {
    async fn handle(
        &self,
        request: CreateAppointment,
        ctx: &RequestContext,
    ) -> Result<Appointment, AppError> {
        ctx.ensure_active()?;

        if request.end_time <= request.start_time {
            return Err(AppError::Validation(
                "appointment end time must be after start time".to_string(),
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

        let patient_id = request.patient_id;
        self.patients
            .get(GetQuery::by(Predicate::new(move |p: &Patient| {
                p.id == patient_id && p.deleted_at().is_none()
            })))
            .await?
            .ok_or(AppError::NotFound {
                entity: Patient::NAME,
                id: request.patient_id.to_string(),
            })?;

        // Cancelled slots are free again; anything else blocks the window.
        let (doctor_id, date, start, end) = (
            request.doctor_id,
            request.date,
            request.start_time,
            request.end_time,
        );
        let conflicting = self
            .appointments
            .get(GetQuery::by(Predicate::new(move |a: &Appointment| {
                a.doctor_id == doctor_id
                    && a.deleted_at().is_none()
                    && a.status != AppointmentStatus::Cancelled
                    && a.overlaps(date, start, end)
            })))
            .await?;
        if conflicting.is_some() {
            return Err(AppError::Validation(
                "doctor already has an appointment in this time window".to_string(),
            ));
        }

        let appointment = Appointment::new(
            request.doctor_id,
            request.patient_id,
            request.date,
            request.start_time,
            request.end_time,
        );
        Ok(self.appointments.add(appointment).await?)
    }
}

/// Lists a doctor's active appointments, one page at a time.
pub struct ListAppointmentsByDoctor {
    pub doctor_id: i32,
    pub page: PageRequest,
}

impl Request for ListAppointmentsByDoctor {
    type Response = GetListResponse<Appointment>;
    const NAME: &'static str = "ListAppointmentsByDoctor";

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .secured([roles::ADMIN, roles::READ])
            .cached(
                CachePolicy::new(appointments_by_doctor_key(self.doctor_id, self.page))
                    .in_group(APPOINTMENTS_GROUP),
            )
    }
}

pub struct ListAppointmentsByDoctorHandler {
    appointments: Arc<dyn Repository<Appointment>>,
}

impl ListAppointmentsByDoctorHandler {
    pub fn new(appointments: Arc<dyn Repository<Appointment>>) -> Self {
        Self { appointments }
    }
}

#[async_trait]
impl Handler<ListAppointmentsByDoctor> for ListAppointmentsByDoctorHandler {
    async fn handle(
        &self,
        request: ListAppointmentsByDoctor,
        ctx: &RequestContext,
    ) -> Result<GetListResponse<Appointment>, AppError> {
        ctx.ensure_active()?;

        let doctor_id = request.doctor_id;
        let page = self
            .appointments
            .get_list(
                ListQuery::page(request.page).filter(Predicate::new(move |a: &Appointment| {
                    a.doctor_id == doctor_id && a.deleted_at().is_none()
                })),
            )
            .await?;
        Ok(GetListResponse::from_page(page, |appointment| appointment))
    }
}

/// Cancels a scheduled appointment.
pub struct CancelAppointment {
    pub id: i32,
}

impl Request for CancelAppointment {
    type Response = Appointment;
    const NAME: &'static str = "CancelAppointment";

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .secured([roles::ADMIN, roles::WRITE])
            .invalidates(APPOINTMENTS_GROUP)
            .transactional()
            .loggable()
    }
}

pub struct CancelAppointmentHandler {
    appointments: Arc<dyn Repository<Appointment>>,
}

impl CancelAppointmentHandler {
    pub fn new(appointments: Arc<dyn Repository<Appointment>>) -> Self {
        Self { appointments }
    }
}

#[async_trait]
impl Handler<CancelAppointment> for CancelAppointmentHandler {
    async fn handle(
        &self,
        request: CancelAppointment,
        ctx: &RequestContext,
    ) -> Result<Appointment, AppError> {
        ctx.ensure_active()?;

        let id = request.id;
        let mut appointment = self
            .appointments
            .get(GetQuery::by(Predicate::new(move |a: &Appointment| {
                a.id == id && a.deleted_at().is_none()
            })))
            .await?
            .ok_or(AppError::NotFound {
                entity: Appointment::NAME,
                id: request.id.to_string(),
            })?;

        if appointment.status == AppointmentStatus::Completed {
            return Err(AppError::Validation(
                "a completed appointment cannot be cancelled".to_string(),
            ));
        }

        appointment.status = AppointmentStatus::Cancelled;
        Ok(self.appointments.update(appointment).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medsched_core::domain::Branch;
    use medsched_core::pipeline::CallerContext;

    use crate::storage::inmemory::InMemoryStore;

    fn ctx() -> RequestContext {
        RequestContext::new(CallerContext::anonymous())
    }

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn time(hour: u32, min: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, min, 0).unwrap()
    }

    async fn seeded_store() -> (InMemoryStore, i32, i32) {
        let store = InMemoryStore::new();
        store.branches.add(Branch::new("Central")).await.unwrap();
        let doctor = store
            .doctors
            .add(Doctor::new(1, "Grace", "Hopper", "Cardiology"))
            .await
            .unwrap();
        let patient = store
            .patients
            .add(Patient::new(
                "Ada",
                "Lovelace",
                "12345678901",
                "5550001",
                date(1990, 4, 12),
            ))
            .await
            .unwrap();
        (store, doctor.id, patient.id)
    }

    fn create_handler(store: &InMemoryStore) -> CreateAppointmentHandler {
        CreateAppointmentHandler::new(
            Arc::new(store.appointments.clone()),
            Arc::new(store.doctors.clone()),
            Arc::new(store.patients.clone()),
        )
    }

    fn booking(
        doctor_id: i32,
        patient_id: i32,
        start: NaiveTime,
        end: NaiveTime,
    ) -> CreateAppointment {
        CreateAppointment {
            doctor_id,
            patient_id,
            date: date(2024, 6, 15),
            start_time: start,
            end_time: end,
        }
    }

    #[tokio::test]
    async fn test_create_appointment() {
        let (store, doctor_id, patient_id) = seeded_store().await;
        let handler = create_handler(&store);

        let appointment = handler
            .handle(booking(doctor_id, patient_id, time(9, 0), time(9, 30)), &ctx())
            .await
            .unwrap();

        assert_eq!(appointment.status, AppointmentStatus::Scheduled);
        assert_eq!(appointment.doctor_id, doctor_id);
    }

    #[tokio::test]
    async fn test_end_before_start_fails() {
        let (store, doctor_id, patient_id) = seeded_store().await;
        let handler = create_handler(&store);

        let result = handler
            .handle(booking(doctor_id, patient_id, time(10, 0), time(9, 30)), &ctx())
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_overlapping_appointment_fails() {
        let (store, doctor_id, patient_id) = seeded_store().await;
        let handler = create_handler(&store);

        handler
            .handle(booking(doctor_id, patient_id, time(9, 0), time(10, 0)), &ctx())
            .await
            .unwrap();
        let result = handler
            .handle(booking(doctor_id, patient_id, time(9, 30), time(10, 30)), &ctx())
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_adjacent_appointments_are_allowed() {
        let (store, doctor_id, patient_id) = seeded_store().await;
        let handler = create_handler(&store);

        handler
            .handle(booking(doctor_id, patient_id, time(9, 0), time(9, 30)), &ctx())
            .await
            .unwrap();
        let result = handler
            .handle(booking(doctor_id, patient_id, time(9, 30), time(10, 0)), &ctx())
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_slot_can_be_rebooked() {
        let (store, doctor_id, patient_id) = seeded_store().await;
        let create = create_handler(&store);
        let cancel = CancelAppointmentHandler::new(Arc::new(store.appointments.clone()));

        let first = create
            .handle(booking(doctor_id, patient_id, time(9, 0), time(9, 30)), &ctx())
            .await
            .unwrap();
        cancel
            .handle(CancelAppointment { id: first.id }, &ctx())
            .await
            .unwrap();

        let rebooked = create
            .handle(booking(doctor_id, patient_id, time(9, 0), time(9, 30)), &ctx())
            .await;

        assert!(rebooked.is_ok());
    }

    #[tokio::test]
    async fn test_missing_doctor_fails() {
        let (store, _, patient_id) = seeded_store().await;
        let handler = create_handler(&store);

        let result = handler
            .handle(booking(99, patient_id, time(9, 0), time(9, 30)), &ctx())
            .await;

        assert_eq!(
            result,
            Err(AppError::NotFound {
                entity: "Doctor",
                id: "99".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_cancel_completed_appointment_fails() {
        let (store, doctor_id, patient_id) = seeded_store().await;
        let create = create_handler(&store);
        let cancel = CancelAppointmentHandler::new(Arc::new(store.appointments.clone()));

        let mut appointment = create
            .handle(booking(doctor_id, patient_id, time(9, 0), time(9, 30)), &ctx())
            .await
            .unwrap();
        appointment.status = AppointmentStatus::Completed;
        store.appointments.update(appointment.clone()).await.unwrap();

        let result = cancel
            .handle(CancelAppointment { id: appointment.id }, &ctx())
            .await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_appointments_by_doctor() {
        let (store, doctor_id, patient_id) = seeded_store().await;
        let create = create_handler(&store);

        create
            .handle(booking(doctor_id, patient_id, time(9, 0), time(9, 30)), &ctx())
            .await
            .unwrap();
        create
            .handle(booking(doctor_id, patient_id, time(10, 0), time(10, 30)), &ctx())
            .await
            .unwrap();

        let list = ListAppointmentsByDoctorHandler::new(Arc::new(store.appointments.clone()));
        let response = list
            .handle(
                ListAppointmentsByDoctor {
                    doctor_id,
                    page: PageRequest::new(0, 10).unwrap(),
                },
                &ctx(),
            )
            .await
            .unwrap();

        assert_eq!(response.count, 2);
    }
}
