//! Cache key builders and group constants.
//!
//! Keys must be pure deterministic functions of the query-relevant request
//! fields, so identical requests always hit the same entry.

use crate::storage::PageRequest;

/// Group for cached branch list queries.
pub const BRANCHES_GROUP: &str = "branches";

/// Group for cached doctor list queries.
pub const DOCTORS_GROUP: &str = "doctors";

/// Group for cached patient list queries.
pub const PATIENTS_GROUP: &str = "patients";

/// Group for cached user queries.
pub const USERS_GROUP: &str = "users";

/// Group for cached appointment list queries.
pub const APPOINTMENTS_GROUP: &str = "appointments";

/// Group for cached schedule list queries.
pub const SCHEDULES_GROUP: &str = "schedules";

/// Returns the cache key for a page of the branch list.
pub fn branches_list_key(page: PageRequest) -> String {
    format!("branches:list:{}:{}", page.index, page.size)
}

/// Returns the cache key for a page of doctors in a branch.
pub fn doctors_by_branch_key(branch_id: i32, page: PageRequest) -> String {
    format!("doctors:branch:{}:{}:{}", branch_id, page.index, page.size)
}

/// Returns the cache key for a page of the patient list.
pub fn patients_list_key(page: PageRequest) -> String {
    format!("patients:list:{}:{}", page.index, page.size)
}

/// Returns the cache key for a page of a doctor's appointments.
pub fn appointments_by_doctor_key(doctor_id: i32, page: PageRequest) -> String {
    format!(
        "appointments:doctor:{}:{}:{}",
        doctor_id, page.index, page.size
    )
}

/// Returns the cache key for a page of a doctor's schedule records.
pub fn schedules_by_doctor_key(doctor_id: i32, page: PageRequest) -> String {
    format!("schedules:doctor:{}:{}:{}", doctor_id, page.index, page.size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(index: usize, size: usize) -> PageRequest {
        PageRequest::new(index, size).unwrap()
    }

    #[test]
    fn test_branches_list_key() {
        assert_eq!(branches_list_key(page(0, 10)), "branches:list:0:10");
    }

    #[test]
    fn test_doctors_by_branch_key() {
        assert_eq!(doctors_by_branch_key(3, page(0, 10)), "doctors:branch:3:0:10");
    }

    #[test]
    fn test_patients_list_key() {
        assert_eq!(patients_list_key(page(2, 25)), "patients:list:2:25");
    }

    #[test]
    fn test_appointments_by_doctor_key() {
        assert_eq!(
            appointments_by_doctor_key(7, page(1, 5)),
            "appointments:doctor:7:1:5"
        );
    }

    #[test]
    fn test_schedules_by_doctor_key() {
        assert_eq!(
            schedules_by_doctor_key(7, page(0, 31)),
            "schedules:doctor:7:0:31"
        );
    }

    #[test]
    fn test_keys_are_deterministic() {
        assert_eq!(doctors_by_branch_key(3, page(0, 10)), doctors_by_branch_key(3, page(0, 10)));
    }
}
