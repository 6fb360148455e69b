mod codec;
mod types;

pub use codec::{FieldCodec, PassthroughCodec};
pub use types::{
    Appointment, AppointmentStatus, Branch, Doctor, DoctorSchedule, Entity, Patient, User,
};
