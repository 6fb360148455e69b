//! Hospital appointment scheduling backend.
//!
//! Request types describe operations; a [`pipeline::Dispatcher`] composes
//! authorization, caching, transactions, and logging around each handler
//! based on the capabilities the request declares. Storage and cache
//! backends live behind the `medsched_core` contracts.

pub mod cache;
pub mod config;
pub mod features;
pub mod pipeline;
pub mod state;
pub mod storage;
