mod error;
mod traits;
mod types;

pub use error::{PageRequestError, RepositoryError, Result};
pub use traits::{Repository, TransactionScope, UnitOfWork};
pub use types::{
    DeleteMode, GenerateId, GetQuery, ListQuery, OrderBy, Page, PageRequest, Predicate,
};
