//! Business features, one module per entity.
//!
//! Each module defines its request types (with the pipeline capabilities they
//! declare) and the handlers that serve them. Handlers only see repositories
//! and the request context; caching, transactions, authorization, and logging
//! are composed around them by the dispatcher.

pub mod appointments;
pub mod branches;
pub mod doctors;
pub mod patients;
pub mod schedules;
pub mod users;

/// Operation claims recognized by the authorization stage.
pub mod roles {
    pub const ADMIN: &str = "Admin";
    pub const READ: &str = "Read";
    pub const WRITE: &str = "Write";
    pub const CREATE: &str = "Create";
    pub const DELETE: &str = "Delete";
}
