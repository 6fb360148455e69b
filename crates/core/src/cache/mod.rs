mod error;
mod keys;
mod serialization;
mod traits;

pub use error::{CacheError, Result};
pub use keys::{
    appointments_by_doctor_key, branches_list_key, doctors_by_branch_key, patients_list_key,
    schedules_by_doctor_key, APPOINTMENTS_GROUP, BRANCHES_GROUP, DOCTORS_GROUP, PATIENTS_GROUP,
    SCHEDULES_GROUP, USERS_GROUP,
};
pub use serialization::{from_cache_bytes, to_cache_bytes, SerializationError};
pub use traits::{Cache, Expiration};
