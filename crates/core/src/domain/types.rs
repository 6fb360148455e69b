use std::fmt::{Debug, Display};
use std::hash::Hash;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

/// A persisted domain object with an identifier and soft-delete timestamp.
///
/// Repositories never inject an implicit soft-delete filter: predicates state
/// their `deleted_at` conditions explicitly, so callers can query active rows,
/// deleted rows, or both.
pub trait Entity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Identifier type: `i32` for clinical records, `Uuid` for users.
    type Id: Clone + Ord + Eq + Hash + Debug + Display + Send + Sync + 'static;

    /// Entity name used in error messages and logs.
    const NAME: &'static str;

    fn id(&self) -> Self::Id;

    /// Assigns a repository-generated identifier. Called by `add`.
    fn assign_id(&mut self, id: Self::Id);

    /// Soft-delete timestamp; `None` means the row is active.
    fn deleted_at(&self) -> Option<DateTime<Utc>>;

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>);
}

/// A hospital branch. Branch names are unique among active rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: i32,
    pub name: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Branch {
    /// Creates a new branch; the repository assigns the id on `add`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            deleted_at: None,
        }
    }

    /// Sets a specific ID for this branch (useful for testing).
    pub fn with_id(mut self, id: i32) -> Self {
        self.id = id;
        self
    }
}

impl Entity for Branch {
    type Id = i32;

    const NAME: &'static str = "Branch";

    fn id(&self) -> i32 {
        self.id
    }

    fn assign_id(&mut self, id: i32) {
        self.id = id;
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

/// A doctor attached to a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i32,
    pub branch_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub title: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Doctor {
    pub fn new(
        branch_id: i32,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            branch_id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            title: title.into(),
            deleted_at: None,
        }
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = id;
        self
    }
}

impl Entity for Doctor {
    type Id = i32;

    const NAME: &'static str = "Doctor";

    fn id(&self) -> i32 {
        self.id
    }

    fn assign_id(&mut self, id: i32) {
        self.id = id;
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

/// A patient record. National identity is unique among active rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub national_identity: String,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Patient {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        national_identity: impl Into<String>,
        phone: impl Into<String>,
        birth_date: NaiveDate,
    ) -> Self {
        Self {
            id: 0,
            first_name: first_name.into(),
            last_name: last_name.into(),
            national_identity: national_identity.into(),
            phone: phone.into(),
            birth_date,
            deleted_at: None,
        }
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = id;
        self
    }
}

impl Entity for Patient {
    type Id = i32;

    const NAME: &'static str = "Patient";

    fn id(&self) -> i32 {
        self.id
    }

    fn assign_id(&mut self, id: i32) {
        self.id = id;
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

/// An account holder. Email is unique among active rows.
///
/// Personal fields are stored in their encoded form; handlers pass them
/// through a [`FieldCodec`](crate::domain::FieldCodec) at the boundary between
/// stored and in-memory representations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub national_identity: String,
    pub address: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::nil(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            phone: String::new(),
            national_identity: String::new(),
            address: String::new(),
            deleted_at: None,
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    pub fn with_national_identity(mut self, national_identity: impl Into<String>) -> Self {
        self.national_identity = national_identity.into();
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }
}

impl Entity for User {
    type Id = Uuid;

    const NAME: &'static str = "User";

    fn id(&self) -> Uuid {
        self.id
    }

    fn assign_id(&mut self, id: Uuid) {
        self.id = id;
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

/// Lifecycle state of an appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

/// A booked appointment between a doctor and a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i32,
    pub doctor_id: i32,
    pub patient_id: i32,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Appointment {
    pub fn new(
        doctor_id: i32,
        patient_id: i32,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Self {
        Self {
            id: 0,
            doctor_id,
            patient_id,
            date,
            start_time,
            end_time,
            status: AppointmentStatus::Scheduled,
            deleted_at: None,
        }
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = id;
        self
    }

    /// Returns true if this appointment overlaps `[start, end)` on `date`.
    pub fn overlaps(&self, date: NaiveDate, start: NaiveTime, end: NaiveTime) -> bool {
        self.date == date && self.start_time < end && start < self.end_time
    }
}

impl Entity for Appointment {
    type Id = i32;

    const NAME: &'static str = "Appointment";

    fn id(&self) -> i32 {
        self.id
    }

    fn assign_id(&mut self, id: i32) {
        self.id = id;
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

/// A doctor's working window on a given date.
///
/// (doctor, date) is unique among active rows; this is a data record, not a
/// constraint solver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorSchedule {
    pub id: i32,
    pub doctor_id: i32,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl DoctorSchedule {
    pub fn new(doctor_id: i32, date: NaiveDate, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            id: 0,
            doctor_id,
            date,
            start_time,
            end_time,
            deleted_at: None,
        }
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = id;
        self
    }
}

impl Entity for DoctorSchedule {
    type Id = i32;

    const NAME: &'static str = "DoctorSchedule";

    fn id(&self) -> i32 {
        self.id
    }

    fn assign_id(&mut self, id: i32) {
        self.id = id;
    }

    fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    fn set_deleted_at(&mut self, at: Option<DateTime<Utc>>) {
        self.deleted_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn time(hour: u32, min: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(hour, min, 0).unwrap()
    }

    #[test]
    fn test_new_branch_is_active() {
        let branch = Branch::new("Central");
        assert_eq!(branch.id, 0);
        assert!(branch.deleted_at.is_none());
    }

    #[test]
    fn test_soft_delete_roundtrip() {
        let mut branch = Branch::new("Central").with_id(7);
        let stamp = Utc.with_ymd_and_hms(2024, 6, 15, 10, 30, 0).unwrap();

        branch.set_deleted_at(Some(stamp));
        assert_eq!(branch.deleted_at(), Some(stamp));

        branch.set_deleted_at(None);
        assert!(branch.deleted_at().is_none());
    }

    #[test]
    fn test_new_user_has_nil_id() {
        let user = User::new("Alice", "Smith", "alice@example.com");
        assert_eq!(user.id, Uuid::nil());
    }

    #[test]
    fn test_appointment_overlap_same_slot() {
        let appointment = Appointment::new(1, 2, date(2024, 6, 15), time(9, 0), time(9, 30));
        assert!(appointment.overlaps(date(2024, 6, 15), time(9, 0), time(9, 30)));
    }

    #[test]
    fn test_appointment_overlap_partial() {
        let appointment = Appointment::new(1, 2, date(2024, 6, 15), time(9, 0), time(10, 0));
        assert!(appointment.overlaps(date(2024, 6, 15), time(9, 30), time(10, 30)));
    }

    #[test]
    fn test_appointment_adjacent_slots_do_not_overlap() {
        let appointment = Appointment::new(1, 2, date(2024, 6, 15), time(9, 0), time(9, 30));
        assert!(!appointment.overlaps(date(2024, 6, 15), time(9, 30), time(10, 0)));
    }

    #[test]
    fn test_appointment_other_date_does_not_overlap() {
        let appointment = Appointment::new(1, 2, date(2024, 6, 15), time(9, 0), time(9, 30));
        assert!(!appointment.overlaps(date(2024, 6, 16), time(9, 0), time(9, 30)));
    }
}
