//! In-memory repository implementation.
//!
//! One [`InMemoryTable`] per entity, aggregated by [`InMemoryStore`], which
//! also provides the unit-of-work contract through whole-store snapshots.
//! Data is not persisted and will be lost when the store is dropped.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use medsched_core::domain::{Appointment, Branch, Doctor, DoctorSchedule, Entity, Patient, User};
use medsched_core::storage::{
    DeleteMode, GenerateId, GetQuery, ListQuery, Page, Repository, RepositoryError, Result,
    TransactionScope, UnitOfWork,
};

/// In-memory table for one entity type.
///
/// Rows live in a `BTreeMap` keyed by id behind `Arc<RwLock<_>>`, so
/// unordered query results come back in id order and stay stable across
/// identical executions. Ids are assigned from an atomic sequence.
#[derive(Clone)]
pub struct InMemoryTable<E: Entity> {
    rows: Arc<RwLock<BTreeMap<E::Id, E>>>,
    seq: Arc<AtomicU64>,
}

impl<E: Entity> InMemoryTable<E> {
    /// Creates a new empty table.
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(BTreeMap::new())),
            seq: Arc::new(AtomicU64::new(1)),
        }
    }

    async fn snapshot(&self) -> BTreeMap<E::Id, E> {
        self.rows.read().await.clone()
    }

    async fn restore(&self, rows: BTreeMap<E::Id, E>) {
        *self.rows.write().await = rows;
    }
}

impl<E: Entity> Default for InMemoryTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> std::fmt::Debug for InMemoryTable<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTable")
            .field("entity", &E::NAME)
            .finish()
    }
}

#[async_trait]
impl<E> Repository<E> for InMemoryTable<E>
where
    E: Entity,
    E::Id: GenerateId,
{
    async fn get(&self, query: GetQuery<E>) -> Result<Option<E>> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .find(|entity| query.predicate.matches(entity))
            .cloned())
    }

    async fn get_list(&self, query: ListQuery<E>) -> Result<Page<E>> {
        let rows = self.rows.read().await;

        let mut matching: Vec<&E> = rows
            .values()
            .filter(|entity| {
                query
                    .predicate
                    .as_ref()
                    .is_none_or(|predicate| predicate.matches(entity))
            })
            .collect();

        let count = matching.len();

        if let Some(order_by) = &query.order_by {
            matching.sort_by(|a, b| order_by.compare(a, b));
        }

        let items: Vec<E> = matching
            .into_iter()
            .skip(query.page.index * query.page.size)
            .take(query.page.size)
            .cloned()
            .collect();

        Ok(Page::new(items, query.page.index, query.page.size, count))
    }

    async fn add(&self, mut entity: E) -> Result<E> {
        let mut rows = self.rows.write().await;

        let id = E::Id::generate(self.seq.fetch_add(1, Ordering::SeqCst));
        entity.assign_id(id);

        let id = entity.id().clone();
        if rows.contains_key(&id) {
            return Err(RepositoryError::AlreadyExists {
                entity_type: E::NAME,
                id: id.to_string(),
            });
        }
        rows.insert(id, entity.clone());
        Ok(entity)
    }

    async fn update(&self, entity: E) -> Result<E> {
        let mut rows = self.rows.write().await;

        let id = entity.id().clone();
        if !rows.contains_key(&id) {
            return Err(RepositoryError::NotFound {
                entity_type: E::NAME,
                id: id.to_string(),
            });
        }
        rows.insert(id, entity.clone());
        Ok(entity)
    }

    async fn delete(&self, entity: E, mode: DeleteMode) -> Result<()> {
        let mut rows = self.rows.write().await;
        let id = entity.id().clone();

        match mode {
            DeleteMode::Soft => {
                let Some(row) = rows.get_mut(&id) else {
                    return Err(RepositoryError::NotFound {
                        entity_type: E::NAME,
                        id: id.to_string(),
                    });
                };
                row.set_deleted_at(Some(Utc::now()));
            }
            DeleteMode::Hard => {
                if rows.remove(&id).is_none() {
                    return Err(RepositoryError::NotFound {
                        entity_type: E::NAME,
                        id: id.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// All in-memory tables, one per entity type.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    pub branches: InMemoryTable<Branch>,
    pub doctors: InMemoryTable<Doctor>,
    pub patients: InMemoryTable<Patient>,
    pub users: InMemoryTable<User>,
    pub appointments: InMemoryTable<Appointment>,
    pub schedules: InMemoryTable<DoctorSchedule>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Transaction scope backed by a whole-store snapshot.
///
/// Mutations apply in place, so commit is a no-op and rollback restores the
/// snapshot taken at `begin`. Isolation across concurrent requests is the
/// store's responsibility, not the scope's.
struct InMemoryTransaction {
    store: InMemoryStore,
    branches: BTreeMap<i32, Branch>,
    doctors: BTreeMap<i32, Doctor>,
    patients: BTreeMap<i32, Patient>,
    users: BTreeMap<uuid::Uuid, User>,
    appointments: BTreeMap<i32, Appointment>,
    schedules: BTreeMap<i32, DoctorSchedule>,
}

#[async_trait]
impl UnitOfWork for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn TransactionScope>> {
        Ok(Box::new(InMemoryTransaction {
            store: self.clone(),
            branches: self.branches.snapshot().await,
            doctors: self.doctors.snapshot().await,
            patients: self.patients.snapshot().await,
            users: self.users.snapshot().await,
            appointments: self.appointments.snapshot().await,
            schedules: self.schedules.snapshot().await,
        }))
    }
}

#[async_trait]
impl TransactionScope for InMemoryTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.store.branches.restore(self.branches).await;
        self.store.doctors.restore(self.doctors).await;
        self.store.patients.restore(self.patients).await;
        self.store.users.restore(self.users).await;
        self.store.appointments.restore(self.appointments).await;
        self.store.schedules.restore(self.schedules).await;
        Ok(())
    }
}
