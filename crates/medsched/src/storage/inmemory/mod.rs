//! In-memory storage backend.

mod repository;

pub use repository::{InMemoryStore, InMemoryTable};
