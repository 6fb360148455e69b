//! Branch commands and queries.

use std::sync::Arc;

use async_trait::async_trait;

use medsched_core::cache::{branches_list_key, BRANCHES_GROUP};
use medsched_core::domain::{Branch, Entity};
use medsched_core::pipeline::{
    AppError, CachePolicy, Capabilities, GetListResponse, Handler, Request, RequestContext,
};
use medsched_core::storage::{
    DeleteMode, GetQuery, ListQuery, PageRequest, Predicate, Repository,
};

use super::roles;

/// Creates a branch, resurrecting a soft-deleted row with the same name.
pub struct CreateBranch {
    pub name: String,
}

impl Request for CreateBranch {
    type Response = Branch;
    const NAME: &'static str = "CreateBranch";

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .secured([roles::ADMIN, roles::WRITE, roles::CREATE])
            .invalidates(BRANCHES_GROUP)
            .transactional()
            .loggable()
    }
}

pub struct CreateBranchHandler {
    branches: Arc<dyn Repository<Branch>>,
}

impl CreateBranchHandler {
    pub fn new(branches: Arc<dyn Repository<Branch>>) -> Self {
        Self { branches }
    }
}

#[async_trait]
impl Handler<CreateBranch> for CreateBranchHandler {
    async fn handle(&self, request: CreateBranch, ctx: &RequestContext) -> Result<Branch, AppError> {
        ctx.ensure_active()?;

        let name = request.name.clone();
        let active = self
            .branches
            .get(GetQuery::by(Predicate::new(move |b: &Branch| {
                b.name == name && b.deleted_at().is_none()
            })))
            .await?;
        if active.is_some() {
            return Err(AppError::Duplicate {
                entity: Branch::NAME,
                key: request.name,
            });
        }

        // A soft-deleted row with the same name comes back to life with its
        // original id instead of producing a second row.
        let name = request.name.clone();
        let buried = self
            .branches
            .get(GetQuery::by(Predicate::new(move |b: &Branch| {
                b.name == name && b.deleted_at().is_some()
            })))
            .await?;
        match buried {
            Some(mut branch) => {
                branch.set_deleted_at(None);
                Ok(self.branches.update(branch).await?)
            }
            None => Ok(self.branches.add(Branch::new(request.name)).await?),
        }
    }
}

/// Lists active branches, one page at a time.
pub struct ListBranches {
    pub page: PageRequest,
}

impl Request for ListBranches {
    type Response = GetListResponse<Branch>;
    const NAME: &'static str = "ListBranches";

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .secured([roles::ADMIN, roles::READ])
            .cached(CachePolicy::new(branches_list_key(self.page)).in_group(BRANCHES_GROUP))
    }
}

pub struct ListBranchesHandler {
    branches: Arc<dyn Repository<Branch>>,
}

impl ListBranchesHandler {
    pub fn new(branches: Arc<dyn Repository<Branch>>) -> Self {
        Self { branches }
    }
}

#[async_trait]
impl Handler<ListBranches> for ListBranchesHandler {
    async fn handle(
        &self,
        request: ListBranches,
        ctx: &RequestContext,
    ) -> Result<GetListResponse<Branch>, AppError> {
        ctx.ensure_active()?;

        let page = self
            .branches
            .get_list(
                ListQuery::page(request.page)
                    .filter(Predicate::new(|b: &Branch| b.deleted_at().is_none())),
            )
            .await?;
        Ok(GetListResponse::from_page(page, |branch| branch))
    }
}

/// Soft-deletes a branch by id.
pub struct DeleteBranch {
    pub id: i32,
}

impl Request for DeleteBranch {
    type Response = ();
    const NAME: &'static str = "DeleteBranch";

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .secured([roles::ADMIN, roles::DELETE])
            .invalidates(BRANCHES_GROUP)
            .transactional()
            .loggable()
    }
}

pub struct DeleteBranchHandler {
    branches: Arc<dyn Repository<Branch>>,
}

impl DeleteBranchHandler {
    pub fn new(branches: Arc<dyn Repository<Branch>>) -> Self {
        Self { branches }
    }
}

#[async_trait]
impl Handler<DeleteBranch> for DeleteBranchHandler {
    async fn handle(&self, request: DeleteBranch, ctx: &RequestContext) -> Result<(), AppError> {
        ctx.ensure_active()?;

        let id = request.id;
        let branch = self
            .branches
            .get(GetQuery::by(Predicate::new(move |b: &Branch| {
                b.id == id && b.deleted_at().is_none()
            })))
            .await?
            .ok_or(AppError::NotFound {
                entity: Branch::NAME,
                id: request.id.to_string(),
            })?;

        self.branches.delete(branch, DeleteMode::Soft).await?;
        Ok(())
    }
}
