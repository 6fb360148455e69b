//! Application state wiring.
//!
//! Builds the store, cache, and dispatcher once at startup and registers
//! every handler. The dispatcher is the only entry point callers use.

use std::sync::Arc;

use medsched_core::cache::Cache;
use medsched_core::domain::{
    Appointment, Branch, Doctor, DoctorSchedule, FieldCodec, PassthroughCodec, Patient, User,
};
use medsched_core::pipeline::{AppError, Request, RequestContext};
use medsched_core::storage::Repository;

use crate::cache::memory::MemoryCache;
use crate::config::Config;
use crate::features::appointments::{
    CancelAppointment, CancelAppointmentHandler, CreateAppointment, CreateAppointmentHandler,
    ListAppointmentsByDoctor, ListAppointmentsByDoctorHandler,
};
use crate::features::branches::{
    CreateBranch, CreateBranchHandler, DeleteBranch, DeleteBranchHandler, ListBranches,
    ListBranchesHandler,
};
use crate::features::doctors::{
    CreateDoctor, CreateDoctorHandler, DeleteDoctor, DeleteDoctorHandler, GetDoctorById,
    GetDoctorByIdHandler, ListDoctorsByBranch, ListDoctorsByBranchHandler,
};
use crate::features::patients::{
    CreatePatient, CreatePatientHandler, GetPatientById, GetPatientByIdHandler, ListPatients,
    ListPatientsHandler,
};
use crate::features::schedules::{
    CreateDoctorSchedule, CreateDoctorScheduleHandler, ListSchedulesByDoctor,
    ListSchedulesByDoctorHandler,
};
use crate::features::users::{CreateUser, CreateUserHandler, GetUserById, GetUserByIdHandler};
use crate::pipeline::{Dispatcher, DispatcherBuilder};
use crate::storage::inmemory::InMemoryStore;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub store: InMemoryStore,
    pub cache: Arc<MemoryCache>,
}

impl AppState {
    /// Builds the state with the identity codec for personal fields.
    pub fn new(config: &Config) -> Self {
        Self::with_codec(config, Arc::new(PassthroughCodec))
    }

    /// Builds the state with an explicit personal-field codec.
    pub fn with_codec(config: &Config, codec: Arc<dyn FieldCodec>) -> Self {
        let store = InMemoryStore::new();
        let cache = Arc::new(MemoryCache::new(config.cache_max_entries));

        let branches: Arc<dyn Repository<Branch>> = Arc::new(store.branches.clone());
        let doctors: Arc<dyn Repository<Doctor>> = Arc::new(store.doctors.clone());
        let patients: Arc<dyn Repository<Patient>> = Arc::new(store.patients.clone());
        let users: Arc<dyn Repository<User>> = Arc::new(store.users.clone());
        let appointments: Arc<dyn Repository<Appointment>> =
            Arc::new(store.appointments.clone());
        let schedules: Arc<dyn Repository<DoctorSchedule>> = Arc::new(store.schedules.clone());

        let dispatcher = DispatcherBuilder::new(
            cache.clone() as Arc<dyn Cache>,
            Arc::new(store.clone()),
            config.cache_ttl(),
        )
        .register::<CreateBranch, _>(CreateBranchHandler::new(branches.clone()))
        .register::<ListBranches, _>(ListBranchesHandler::new(branches.clone()))
        .register::<DeleteBranch, _>(DeleteBranchHandler::new(branches.clone()))
        .register::<CreateDoctor, _>(CreateDoctorHandler::new(doctors.clone(), branches))
        .register::<GetDoctorById, _>(GetDoctorByIdHandler::new(doctors.clone()))
        .register::<ListDoctorsByBranch, _>(ListDoctorsByBranchHandler::new(doctors.clone()))
        .register::<DeleteDoctor, _>(DeleteDoctorHandler::new(doctors.clone()))
        .register::<CreatePatient, _>(CreatePatientHandler::new(patients.clone()))
        .register::<GetPatientById, _>(GetPatientByIdHandler::new(patients.clone()))
        .register::<ListPatients, _>(ListPatientsHandler::new(patients.clone()))
        .register::<CreateUser, _>(CreateUserHandler::new(users.clone(), codec.clone()))
        .register::<GetUserById, _>(GetUserByIdHandler::new(users, codec))
        .register::<CreateAppointment, _>(CreateAppointmentHandler::new(
            appointments.clone(),
            doctors.clone(),
            patients,
        ))
        .register::<ListAppointmentsByDoctor, _>(ListAppointmentsByDoctorHandler::new(
            appointments.clone(),
        ))
        .register::<CancelAppointment, _>(CancelAppointmentHandler::new(appointments))
        .register::<CreateDoctorSchedule, _>(CreateDoctorScheduleHandler::new(
            schedules.clone(),
            doctors,
        ))
        .register::<ListSchedulesByDoctor, _>(ListSchedulesByDoctorHandler::new(schedules))
        .build();

        Self {
            dispatcher,
            store,
            cache,
        }
    }

    /// Dispatches a request through the pipeline.
    pub async fn dispatch<R: Request>(
        &self,
        request: R,
        ctx: &RequestContext,
    ) -> Result<R::Response, AppError> {
        self.dispatcher.dispatch(request, ctx).await
    }
}
