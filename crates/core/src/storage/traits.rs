use async_trait::async_trait;

use crate::domain::Entity;

use super::{DeleteMode, GetQuery, ListQuery, Page, Result};

/// Generic predicate-based repository over one entity type.
///
/// `get_list` applies the predicate before pagination and computes the total
/// count over the filtered set. When no ordering is given, the result order is
/// unspecified but stable within a single query execution.
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    /// Returns the first entity matching the query, if any.
    async fn get(&self, query: GetQuery<E>) -> Result<Option<E>>;

    /// Returns one page of entities matching the query.
    async fn get_list(&self, query: ListQuery<E>) -> Result<Page<E>>;

    /// Persists a new entity, assigning a generated identifier.
    async fn add(&self, entity: E) -> Result<E>;

    /// Persists changes to an existing entity.
    async fn update(&self, entity: E) -> Result<E>;

    /// Deletes an entity; soft delete by default, hard delete on request.
    async fn delete(&self, entity: E, mode: DeleteMode) -> Result<()>;
}

/// Atomic scope around one handler invocation.
///
/// The pipeline's transaction stage begins a scope, commits it when the
/// handler succeeds, and rolls it back when the handler fails. Isolation
/// between concurrent scopes is the store's responsibility.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn TransactionScope>>;
}

/// An open transaction; consumed by commit or rollback.
#[async_trait]
pub trait TransactionScope: Send {
    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
