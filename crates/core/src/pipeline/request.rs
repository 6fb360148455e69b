//! Request contracts and per-request capability declarations.
//!
//! Every operation the system exposes is a request type. A request declares,
//! through [`Capabilities`], which pipeline stages apply to it: authorization,
//! caching, cache invalidation, transaction wrapping, and logging. The
//! dispatcher reads the declaration and composes the stages around the
//! handler; handlers themselves stay free of cross-cutting code.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;

use super::AppError;

/// Caching behavior for a cacheable request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// Deterministic cache key for this request instance.
    pub key: String,
    /// Group keys tagging the cached entry.
    pub groups: Vec<String>,
    /// When set, skip the cache read and overwrite the entry.
    pub bypass: bool,
    /// Sliding time-to-live; falls back to the configured default when unset.
    pub sliding_expiration: Option<Duration>,
}

impl CachePolicy {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            groups: Vec::new(),
            bypass: false,
            sliding_expiration: None,
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.groups.push(group.into());
        self
    }

    pub fn bypass(mut self) -> Self {
        self.bypass = true;
        self
    }

    pub fn sliding(mut self, expiration: Duration) -> Self {
        self.sliding_expiration = Some(expiration);
        self
    }
}

/// Pipeline stages a request opts into.
///
/// Default is everything off: unsecured, uncached, non-transactional,
/// unlogged. Requests enable stages through the builder methods.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Roles of which the caller must hold at least one. Empty means public.
    pub required_roles: Vec<String>,
    /// Cache read/write policy for the response.
    pub cache: Option<CachePolicy>,
    /// Cache groups evicted after the handler succeeds.
    pub invalidates_groups: Vec<String>,
    /// Wrap the handler in a transaction scope.
    pub transactional: bool,
    /// Emit structured log records around the handler.
    pub loggable: bool,
}

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the caller to hold at least one of the given roles.
    pub fn secured<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn cached(mut self, policy: CachePolicy) -> Self {
        self.cache = Some(policy);
        self
    }

    /// Evicts the given group after a successful mutation.
    pub fn invalidates(mut self, group: impl Into<String>) -> Self {
        self.invalidates_groups.push(group.into());
        self
    }

    pub fn transactional(mut self) -> Self {
        self.transactional = true;
        self
    }

    pub fn loggable(mut self) -> Self {
        self.loggable = true;
        self
    }
}

/// A dispatchable request.
pub trait Request: Send + Sync + 'static {
    /// The response produced by the request's handler.
    type Response: Clone + Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Stable request name used in logs and errors.
    const NAME: &'static str;

    /// Pipeline stages this request opts into.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }
}

/// Identity and roles of the caller issuing a request.
#[derive(Debug, Clone, Default)]
pub struct CallerContext {
    roles: HashSet<String>,
}

impl CallerContext {
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// A caller holding no roles at all.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Returns true when the caller holds at least one of the given roles.
    pub fn holds_any(&self, roles: &[String]) -> bool {
        roles.iter().any(|role| self.roles.contains(role))
    }
}

/// Per-request context threaded through the pipeline into handlers.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub caller: CallerContext,
    pub cancellation: CancellationToken,
}

impl RequestContext {
    pub fn new(caller: CallerContext) -> Self {
        Self {
            caller,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Fails with [`AppError::Cancelled`] if the request has been cancelled.
    pub fn ensure_active(&self) -> Result<(), AppError> {
        if self.cancellation.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        Ok(())
    }
}

/// Handles one request type.
#[async_trait]
pub trait Handler<R: Request>: Send + Sync {
    async fn handle(&self, request: R, ctx: &RequestContext) -> Result<R::Response, AppError>;
}
