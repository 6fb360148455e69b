//! Request dispatcher.
//!
//! Routes each request to its registered handler and composes the pipeline
//! stages the request's capabilities declare, in fixed order: authorization,
//! caching, transaction, logging, handler. A request that declares nothing
//! goes straight to its handler.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, trace, warn};

use medsched_core::cache::{from_cache_bytes, to_cache_bytes, Cache, Expiration};
use medsched_core::pipeline::{AppError, Capabilities, Handler, Request, RequestContext};
use medsched_core::storage::UnitOfWork;

/// Routes requests to handlers and runs the capability-driven stages.
///
/// Built once at startup via [`DispatcherBuilder`]; cheap to clone and share.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: Arc<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    cache: Arc<dyn Cache>,
    unit_of_work: Arc<dyn UnitOfWork>,
    default_ttl: Duration,
}

impl Dispatcher {
    /// Dispatches a request through the pipeline.
    ///
    /// Authorization runs before anything else; the cancellation token is
    /// checked before the remaining stages start and races the handler while
    /// it runs, so a pre-cancelled token never reaches the handler. The race
    /// sits inside the transaction stage so that a cancellation mid-handler
    /// still rolls an open transaction back.
    pub async fn dispatch<R: Request>(
        &self,
        request: R,
        ctx: &RequestContext,
    ) -> Result<R::Response, AppError> {
        let handler = self
            .handlers
            .get(&TypeId::of::<R>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn Handler<R>>>())
            .cloned()
            .ok_or(AppError::HandlerNotFound { request: R::NAME })?;

        let capabilities = request.capabilities();

        if !capabilities.required_roles.is_empty()
            && !ctx.caller.holds_any(&capabilities.required_roles)
        {
            return Err(AppError::Unauthorized { request: R::NAME });
        }

        ctx.ensure_active()?;
        self.run_cached(handler, request, capabilities, ctx).await
    }

    async fn run_cached<R: Request>(
        &self,
        handler: Arc<dyn Handler<R>>,
        request: R,
        capabilities: Capabilities,
        ctx: &RequestContext,
    ) -> Result<R::Response, AppError> {
        let policy = capabilities.cache.clone();

        if let Some(policy) = policy.as_ref().filter(|p| !p.bypass) {
            match self.cache.get(&policy.key).await {
                Ok(Some(bytes)) => match from_cache_bytes::<R::Response>(&bytes) {
                    Ok(response) => {
                        trace!(key = %policy.key, request = R::NAME, "cache hit");
                        return Ok(response);
                    }
                    Err(error) => {
                        warn!(key = %policy.key, %error, "cached response is unreadable");
                    }
                },
                Ok(None) => trace!(key = %policy.key, request = R::NAME, "cache miss"),
                Err(error) => warn!(key = %policy.key, %error, "cache read failed"),
            }
        }

        let response = self
            .run_transactional(handler, request, &capabilities, ctx)
            .await?;

        if let Some(policy) = policy.as_ref().filter(|p| !p.bypass) {
            let expiration =
                Expiration::Sliding(policy.sliding_expiration.unwrap_or(self.default_ttl));
            match to_cache_bytes(&response) {
                Ok(bytes) => {
                    if let Err(error) = self
                        .cache
                        .set(&policy.key, &bytes, &policy.groups, expiration)
                        .await
                    {
                        warn!(key = %policy.key, %error, "cache write failed");
                    }
                }
                Err(error) => warn!(key = %policy.key, %error, "response serialization failed"),
            }
        }

        for group in &capabilities.invalidates_groups {
            if let Err(error) = self.cache.evict_group(group).await {
                warn!(%group, %error, "cache group eviction failed");
            }
        }

        Ok(response)
    }

    async fn run_transactional<R: Request>(
        &self,
        handler: Arc<dyn Handler<R>>,
        request: R,
        capabilities: &Capabilities,
        ctx: &RequestContext,
    ) -> Result<R::Response, AppError> {
        if !capabilities.transactional {
            return self
                .run_until_cancelled(handler, request, capabilities, ctx)
                .await;
        }

        let scope = self.unit_of_work.begin().await?;
        match self
            .run_until_cancelled(handler, request, capabilities, ctx)
            .await
        {
            Ok(response) => {
                scope.commit().await?;
                Ok(response)
            }
            Err(error) => {
                if let Err(rollback_error) = scope.rollback().await {
                    warn!(request = R::NAME, %rollback_error, "rollback failed");
                }
                Err(error)
            }
        }
    }

    /// Races the logging stage against the request's cancellation token.
    ///
    /// Returning `Err` on cancellation lets the transaction stage above take
    /// its normal rollback path before the error surfaces.
    async fn run_until_cancelled<R: Request>(
        &self,
        handler: Arc<dyn Handler<R>>,
        request: R,
        capabilities: &Capabilities,
        ctx: &RequestContext,
    ) -> Result<R::Response, AppError> {
        tokio::select! {
            biased;
            _ = ctx.cancellation.cancelled() => Err(AppError::Cancelled),
            result = self.run_logged(handler, request, capabilities, ctx) => result,
        }
    }

    async fn run_logged<R: Request>(
        &self,
        handler: Arc<dyn Handler<R>>,
        request: R,
        capabilities: &Capabilities,
        ctx: &RequestContext,
    ) -> Result<R::Response, AppError> {
        if !capabilities.loggable {
            return handler.handle(request, ctx).await;
        }

        let started = Instant::now();
        let result = handler.handle(request, ctx).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(_) => info!(request = R::NAME, ?elapsed, "request handled"),
            Err(error) => warn!(request = R::NAME, ?elapsed, %error, "request failed"),
        }

        result
    }
}

/// Builder registering one handler per request type.
///
/// Registering the same request type twice replaces the earlier handler.
pub struct DispatcherBuilder {
    handlers: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    cache: Arc<dyn Cache>,
    unit_of_work: Arc<dyn UnitOfWork>,
    default_ttl: Duration,
}

impl DispatcherBuilder {
    pub fn new(
        cache: Arc<dyn Cache>,
        unit_of_work: Arc<dyn UnitOfWork>,
        default_ttl: Duration,
    ) -> Self {
        Self {
            handlers: HashMap::new(),
            cache,
            unit_of_work,
            default_ttl,
        }
    }

    /// Registers the handler for request type `R`.
    ///
    /// Called with the request type spelled out: `register::<CreateBranch, _>(handler)`.
    pub fn register<R: Request, H: Handler<R> + 'static>(mut self, handler: H) -> Self {
        let handler: Arc<dyn Handler<R>> = Arc::new(handler);
        self.handlers.insert(TypeId::of::<R>(), Box::new(handler));
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            handlers: Arc::new(self.handlers),
            cache: self.cache,
            unit_of_work: self.unit_of_work,
            default_ttl: self.default_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use medsched_core::cache::CacheError;
    use medsched_core::domain::Branch;
    use medsched_core::pipeline::{CachePolicy, CallerContext};
    use medsched_core::storage::{ListQuery, PageRequest, Repository};

    use crate::cache::memory::MemoryCache;
    use crate::storage::inmemory::InMemoryStore;

    const TTL: Duration = Duration::from_secs(300);

    fn dispatcher_with<R: Request, H: Handler<R> + 'static>(handler: H) -> Dispatcher {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new(100));
        let store: Arc<dyn UnitOfWork> = Arc::new(InMemoryStore::new());
        DispatcherBuilder::new(cache, store, TTL)
            .register::<R, _>(handler)
            .build()
    }

    /// Counts invocations and echoes a fixed payload.
    struct CountingHandler {
        calls: Arc<AtomicUsize>,
        payload: String,
    }

    impl CountingHandler {
        fn new(calls: Arc<AtomicUsize>, payload: &str) -> Self {
            Self {
                calls,
                payload: payload.to_string(),
            }
        }
    }

    struct PlainQuery;

    impl Request for PlainQuery {
        type Response = String;
        const NAME: &'static str = "PlainQuery";
    }

    struct CachedQuery;

    impl Request for CachedQuery {
        type Response = String;
        const NAME: &'static str = "CachedQuery";

        fn capabilities(&self) -> Capabilities {
            Capabilities::new().cached(CachePolicy::new("cached-query").in_group("queries"))
        }
    }

    struct SecuredCommand;

    impl Request for SecuredCommand {
        type Response = String;
        const NAME: &'static str = "SecuredCommand";

        fn capabilities(&self) -> Capabilities {
            Capabilities::new().secured(["Admin", "Write"])
        }
    }

    struct InvalidatingCommand;

    impl Request for InvalidatingCommand {
        type Response = String;
        const NAME: &'static str = "InvalidatingCommand";

        fn capabilities(&self) -> Capabilities {
            Capabilities::new().invalidates("queries")
        }
    }

    struct BypassQuery;

    impl Request for BypassQuery {
        type Response = String;
        const NAME: &'static str = "BypassQuery";

        fn capabilities(&self) -> Capabilities {
            Capabilities::new()
                .cached(CachePolicy::new("bypass-query").in_group("queries").bypass())
        }
    }

    macro_rules! impl_counting_handler {
        ($request:ty) => {
            #[async_trait]
            impl Handler<$request> for CountingHandler {
                async fn handle(
                    &self,
                    _request: $request,
                    _ctx: &RequestContext,
                ) -> Result<String, AppError> {
                    self.calls.fetch_add(1, Ordering::SeqCst);
                    Ok(self.payload.clone())
                }
            }
        };
    }

    impl_counting_handler!(PlainQuery);
    impl_counting_handler!(CachedQuery);
    impl_counting_handler!(SecuredCommand);
    impl_counting_handler!(InvalidatingCommand);
    impl_counting_handler!(BypassQuery);

    /// Fails every operation, standing in for an unreachable backend.
    struct FailingCache;

    #[async_trait]
    impl Cache for FailingCache {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::ConnectionFailed("cache offline".to_string()))
        }

        async fn set(
            &self,
            _key: &str,
            _value: &[u8],
            _groups: &[String],
            _expiration: Expiration,
        ) -> Result<(), CacheError> {
            Err(CacheError::ConnectionFailed("cache offline".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::ConnectionFailed("cache offline".to_string()))
        }

        async fn evict_group(&self, _group: &str) -> Result<(), CacheError> {
            Err(CacheError::ConnectionFailed("cache offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_unregistered_request_fails() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = dispatcher_with::<PlainQuery, _>(CountingHandler::new(calls, "pong"));
        let ctx = RequestContext::new(CallerContext::anonymous());

        let result = dispatcher.dispatch(CachedQuery, &ctx).await;

        assert_eq!(
            result,
            Err(AppError::HandlerNotFound {
                request: "CachedQuery"
            })
        );
    }

    #[tokio::test]
    async fn test_plain_request_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher =
            dispatcher_with::<PlainQuery, _>(CountingHandler::new(calls.clone(), "pong"));
        let ctx = RequestContext::new(CallerContext::anonymous());

        let response = dispatcher.dispatch(PlainQuery, &ctx).await.unwrap();

        assert_eq!(response, "pong");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_query_runs_handler_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher =
            dispatcher_with::<CachedQuery, _>(CountingHandler::new(calls.clone(), "pong"));
        let ctx = RequestContext::new(CallerContext::anonymous());

        let first = dispatcher.dispatch(CachedQuery, &ctx).await.unwrap();
        let second = dispatcher.dispatch(CachedQuery, &ctx).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidating_command_evicts_group() {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new(100));
        let store: Arc<dyn UnitOfWork> = Arc::new(InMemoryStore::new());
        let query_calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = DispatcherBuilder::new(cache, store, TTL)
            .register::<CachedQuery, _>(CountingHandler::new(query_calls.clone(), "pong"))
            .register::<InvalidatingCommand, _>(CountingHandler::new(
                Arc::new(AtomicUsize::new(0)),
                "done",
            ))
            .build();
        let ctx = RequestContext::new(CallerContext::anonymous());

        dispatcher.dispatch(CachedQuery, &ctx).await.unwrap();
        dispatcher.dispatch(InvalidatingCommand, &ctx).await.unwrap();
        dispatcher.dispatch(CachedQuery, &ctx).await.unwrap();

        // The eviction forced the second query back through the handler
        assert_eq!(query_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unauthorized_caller_never_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher =
            dispatcher_with::<SecuredCommand, _>(CountingHandler::new(calls.clone(), "done"));
        let ctx = RequestContext::new(CallerContext::new(["Read"]));

        let result = dispatcher.dispatch(SecuredCommand, &ctx).await;

        assert_eq!(
            result,
            Err(AppError::Unauthorized {
                request: "SecuredCommand"
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_one_matching_role_is_enough() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher =
            dispatcher_with::<SecuredCommand, _>(CountingHandler::new(calls.clone(), "done"));
        let ctx = RequestContext::new(CallerContext::new(["Write"]));

        let response = dispatcher.dispatch(SecuredCommand, &ctx).await.unwrap();

        assert_eq!(response, "done");
    }

    #[tokio::test]
    async fn test_pre_cancelled_token_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher =
            dispatcher_with::<PlainQuery, _>(CountingHandler::new(calls.clone(), "pong"));

        let token = CancellationToken::new();
        token.cancel();
        let ctx = RequestContext::new(CallerContext::anonymous()).with_cancellation(token);

        let result = dispatcher.dispatch(PlainQuery, &ctx).await;

        assert_eq!(result, Err(AppError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bypassing_query_runs_handler_every_time() {
        let cache = Arc::new(MemoryCache::new(100));
        let store: Arc<dyn UnitOfWork> = Arc::new(InMemoryStore::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = DispatcherBuilder::new(cache.clone() as Arc<dyn Cache>, store, TTL)
            .register::<BypassQuery, _>(CountingHandler::new(calls.clone(), "pong"))
            .build();
        let ctx = RequestContext::new(CallerContext::anonymous());

        dispatcher.dispatch(BypassQuery, &ctx).await.unwrap();
        dispatcher.dispatch(BypassQuery, &ctx).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // Nothing was written under the request's key either.
        assert_eq!(cache.get("bypass-query").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cache_failures_fall_through_to_handler() {
        let cache: Arc<dyn Cache> = Arc::new(FailingCache);
        let store: Arc<dyn UnitOfWork> = Arc::new(InMemoryStore::new());
        let query_calls = Arc::new(AtomicUsize::new(0));
        let command_calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = DispatcherBuilder::new(cache, store, TTL)
            .register::<CachedQuery, _>(CountingHandler::new(query_calls.clone(), "pong"))
            .register::<InvalidatingCommand, _>(CountingHandler::new(
                command_calls.clone(),
                "done",
            ))
            .build();
        let ctx = RequestContext::new(CallerContext::anonymous());

        // Reads and writes both fail, so every dispatch reaches the handler
        // and still succeeds.
        assert_eq!(dispatcher.dispatch(CachedQuery, &ctx).await.unwrap(), "pong");
        assert_eq!(dispatcher.dispatch(CachedQuery, &ctx).await.unwrap(), "pong");
        assert_eq!(query_calls.load(Ordering::SeqCst), 2);

        // A failing group eviction does not fail the mutation either.
        assert_eq!(
            dispatcher.dispatch(InvalidatingCommand, &ctx).await.unwrap(),
            "done"
        );
        assert_eq!(command_calls.load(Ordering::SeqCst), 1);
    }

    /// Writes a branch and then stalls until the caller gives up.
    struct StalledWrite;

    impl Request for StalledWrite {
        type Response = ();
        const NAME: &'static str = "StalledWrite";

        fn capabilities(&self) -> Capabilities {
            Capabilities::new().transactional()
        }
    }

    struct StalledWriteHandler {
        branches: Arc<dyn Repository<Branch>>,
    }

    #[async_trait]
    impl Handler<StalledWrite> for StalledWriteHandler {
        async fn handle(
            &self,
            _request: StalledWrite,
            _ctx: &RequestContext,
        ) -> Result<(), AppError> {
            self.branches.add(Branch::new("Stalled")).await?;
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cancellation_mid_transaction_rolls_back() {
        let store = InMemoryStore::new();
        let branches: Arc<dyn Repository<Branch>> = Arc::new(store.branches.clone());
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new(100));
        let dispatcher = DispatcherBuilder::new(cache, Arc::new(store), TTL)
            .register::<StalledWrite, _>(StalledWriteHandler {
                branches: branches.clone(),
            })
            .build();

        let token = CancellationToken::new();
        let ctx =
            RequestContext::new(CallerContext::anonymous()).with_cancellation(token.clone());

        let cancel = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        };
        let (result, ()) = tokio::join!(dispatcher.dispatch(StalledWrite, &ctx), cancel);

        assert_eq!(result, Err(AppError::Cancelled));

        // The write that happened before the cancellation was rolled back.
        let page = branches
            .get_list(ListQuery::page(PageRequest::new(0, 10).unwrap()))
            .await
            .unwrap();
        assert_eq!(page.count, 0);
    }
}
