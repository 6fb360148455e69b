//! User account commands and queries.
//!
//! Personal fields are stored encoded; the handlers pass them through the
//! configured [`FieldCodec`] on write and on read, so nothing outside this
//! module sees stored representations. Email stays plain because it is the
//! lookup key.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use medsched_core::cache::USERS_GROUP;
use medsched_core::domain::{Entity, FieldCodec, User};
use medsched_core::pipeline::{AppError, Capabilities, Handler, Request, RequestContext};
use medsched_core::storage::{GetQuery, Predicate, Repository};

use super::roles;

/// Creates a user account, resurrecting a soft-deleted row with the same
/// email.
pub struct CreateUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub national_identity: String,
    pub address: String,
}

impl Request for CreateUser {
    type Response = User;
    const NAME: &'static str = "CreateUser";

    fn capabilities(&self) -> Capabilities {
        Capabilities::new()
            .secured([roles::ADMIN])
            .invalidates(USERS_GROUP)
            .transactional()
            .loggable()
    }
}

pub struct CreateUserHandler {
    users: Arc<dyn Repository<User>>,
    codec: Arc<dyn FieldCodec>,
}

impl CreateUserHandler {
    pub fn new(users: Arc<dyn Repository<User>>, codec: Arc<dyn FieldCodec>) -> Self {
        Self { users, codec }
    }
}

#[async_trait]
impl Handler<CreateUser> for CreateUserHandler {
    async fn handle(&self, request: CreateUser, ctx: &RequestContext) -> Result<User, AppError> {
        ctx.ensure_active()?;

        let email = request.email.clone();
        let active = self
            .users
            .get(GetQuery::by(Predicate::new(move |u: &User| {
                u.email == email && u.deleted_at().is_none()
            })))
            .await?;
        if active.is_some() {
            return Err(AppError::Duplicate {
                entity: User::NAME,
                key: request.email,
            });
        }

        let encoded = User::new(
            self.codec.encode(&request.first_name),
            self.codec.encode(&request.last_name),
            request.email.clone(),
        )
        .with_phone(self.codec.encode(&request.phone))
        .with_national_identity(self.codec.encode(&request.national_identity))
        .with_address(self.codec.encode(&request.address));

        let email = request.email.clone();
        let buried = self
            .users
            .get(GetQuery::by(Predicate::new(move |u: &User| {
                u.email == email && u.deleted_at().is_some()
            })))
            .await?;
        match buried {
            Some(existing) => {
                let mut revived = encoded.with_id(existing.id);
                revived.set_deleted_at(None);
                Ok(self.users.update(revived).await?)
            }
            None => Ok(self.users.add(encoded).await?),
        }
    }
}

/// Fetches a single active user with personal fields decoded.
pub struct GetUserById {
    pub id: Uuid,
}

impl Request for GetUserById {
    type Response = User;
    const NAME: &'static str = "GetUserById";

    fn capabilities(&self) -> Capabilities {
        Capabilities::new().secured([roles::ADMIN, roles::READ])
    }
}

pub struct GetUserByIdHandler {
    users: Arc<dyn Repository<User>>,
    codec: Arc<dyn FieldCodec>,
}

impl GetUserByIdHandler {
    pub fn new(users: Arc<dyn Repository<User>>, codec: Arc<dyn FieldCodec>) -> Self {
        Self { users, codec }
    }
}

#[async_trait]
impl Handler<GetUserById> for GetUserByIdHandler {
    async fn handle(&self, request: GetUserById, ctx: &RequestContext) -> Result<User, AppError> {
        ctx.ensure_active()?;

        let id = request.id;
        let mut user = self
            .users
            .get(GetQuery::by(Predicate::new(move |u: &User| {
                u.id == id && u.deleted_at().is_none()
            })))
            .await?
            .ok_or(AppError::NotFound {
                entity: User::NAME,
                id: request.id.to_string(),
            })?;

        user.first_name = self.codec.decode(&user.first_name);
        user.last_name = self.codec.decode(&user.last_name);
        user.phone = self.codec.decode(&user.phone);
        user.national_identity = self.codec.decode(&user.national_identity);
        user.address = self.codec.decode(&user.address);
        Ok(user)
    }
}
