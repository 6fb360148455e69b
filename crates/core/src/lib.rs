//! Core contracts for the medsched appointment backend.
//!
//! This crate defines the domain entities, the generic repository and paging
//! contracts, the cache boundary, and the request-pipeline contracts. Concrete
//! backends and the dispatcher live in the `medsched` application crate.

pub mod cache;
pub mod domain;
pub mod pipeline;
pub mod storage;
