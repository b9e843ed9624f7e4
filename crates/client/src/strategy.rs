//! Network-first and cache-first.
//!
//! Both strategies fall back exactly one level at a time and never retry.
//! Successful network responses are written to the bucket in the background;
//! the caller gets the live response without waiting for the write.

use shellcache_core::{BucketKind, CacheManager, Error, Request, Response, Route, Strategy};

use crate::fetch::{Network, resolve};
use crate::lifetime::Lifetime;

/// Everything a strategy touches.
#[derive(Clone, Copy)]
pub struct StrategyContext<'a> {
    pub caches: &'a CacheManager,
    pub network: &'a dyn Network,
    pub lifetime: &'a Lifetime,
}

impl StrategyContext<'_> {
    /// Answer a request according to its route.
    pub async fn respond(&self, request: &Request, route: &Route) -> Result<Response, Error> {
        match &route.strategy {
            Strategy::NetworkFirst { fallback } => network_first(self, request, route.bucket, fallback.as_deref()).await,
            Strategy::CacheFirst => cache_first(self, request, route.bucket).await,
        }
    }

    /// Schedule a cache write without blocking the response.
    ///
    /// Non-ok and opaque responses are never stored.
    fn store_behind(&self, bucket: BucketKind, request: &Request, response: &Response) {
        if !response.is_cacheable() {
            tracing::debug!(url = %request.url, status = response.status, "not caching response");
            return;
        }
        let caches = self.caches.clone();
        let request = request.clone();
        let response = response.clone();
        self.lifetime.wait_until(async move {
            match caches.store(bucket, &request, &response).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(url = %request.url, bucket = bucket.as_str(), "bucket gone, write dropped");
                }
                Err(e) => {
                    tracing::warn!(url = %request.url, bucket = bucket.as_str(), error = %e, "cache write failed");
                }
            }
        });
    }

    async fn lookup(&self, bucket: BucketKind, request: &Request) -> Option<Response> {
        match self.caches.match_in(bucket, request).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(url = %request.url, bucket = bucket.as_str(), error = %e, "cache read failed");
                None
            }
        }
    }

    async fn lookup_fallback(&self, request: &Request, path: &str) -> Option<Response> {
        let url = match resolve(&request.url, path) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(fallback = path, error = %e, "bad fallback path");
                return None;
            }
        };
        match self.caches.match_any(&Request::get(url)).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(fallback = path, error = %e, "cache read failed");
                None
            }
        }
    }
}

/// Try the network; on failure serve the cached copy, then the fallback page
/// (navigations only), then give up.
pub async fn network_first(
    ctx: &StrategyContext<'_>, request: &Request, bucket: BucketKind, fallback: Option<&str>,
) -> Result<Response, Error> {
    let err = match ctx.network.fetch(request).await {
        Ok(response) => {
            ctx.store_behind(bucket, request, &response);
            return Ok(response);
        }
        Err(err) => err,
    };

    tracing::debug!(url = %request.url, error = %err, "network failed, trying cache");

    if let Some(cached) = ctx.lookup(bucket, request).await {
        tracing::debug!(url = %request.url, bucket = bucket.as_str(), "served from cache");
        return Ok(cached);
    }

    if request.is_navigation()
        && let Some(path) = fallback
        && let Some(page) = ctx.lookup_fallback(request, path).await
    {
        tracing::debug!(url = %request.url, fallback = path, "served fallback page");
        return Ok(page);
    }

    Err(err)
}

/// Serve from the bucket when possible; otherwise fetch and store.
pub async fn cache_first(ctx: &StrategyContext<'_>, request: &Request, bucket: BucketKind) -> Result<Response, Error> {
    if let Some(cached) = ctx.lookup(bucket, request).await {
        tracing::debug!(url = %request.url, bucket = bucket.as_str(), "cache hit");
        return Ok(cached);
    }

    let response = ctx.network.fetch(request).await?;
    ctx.store_behind(bucket, request, &response);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shellcache_core::{BucketNames, CacheDb};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use url::Url;

    #[derive(Default)]
    struct ScriptedNetwork {
        routes: Mutex<HashMap<String, Response>>,
        offline: AtomicBool,
        calls: AtomicUsize,
    }

    impl ScriptedNetwork {
        fn serve(&self, url: &str, response: Response) {
            self.routes.lock().unwrap().insert(url.to_string(), response);
        }
    }

    #[async_trait]
    impl Network for ScriptedNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.offline.load(Ordering::SeqCst) {
                return Err(Error::Network("offline".into()));
            }
            Ok(self
                .routes
                .lock()
                .unwrap()
                .get(request.url.as_str())
                .cloned()
                .unwrap_or_else(|| Response::new(404, "not found")))
        }
    }

    async fn caches() -> CacheManager {
        let db = CacheDb::open_in_memory().await.unwrap();
        let caches = CacheManager::new(db, BucketNames::new("app", "v1"));
        caches.open_all().await.unwrap();
        caches
    }

    fn get(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    /// Open generation buckets in a file store, then sabotage the store
    /// through a second connection.
    async fn broken_caches(name: &str, sql: &'static str) -> (CacheManager, std::path::PathBuf) {
        let dir = std::env::temp_dir().join(format!("shellcache-strategy-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("buckets.sqlite");
        let _ = std::fs::remove_file(&path);

        let db = CacheDb::open(&path).await.unwrap();
        let caches = CacheManager::new(db, BucketNames::new("app", "v1"));
        caches.open_all().await.unwrap();

        let saboteur = tokio_rusqlite::Connection::open(&path).await.unwrap();
        saboteur.call(move |conn| conn.execute_batch(sql)).await.unwrap();
        (caches, dir)
    }

    #[tokio::test]
    async fn test_network_first_caches_success() {
        let caches = caches().await;
        let network = ScriptedNetwork::default();
        let lifetime = Lifetime::new();
        let ctx = StrategyContext { caches: &caches, network: &network, lifetime: &lifetime };
        let request = get("https://app.test/api/skills");
        network.serve(request.url.as_str(), Response::new(200, "fresh"));

        let response = network_first(&ctx, &request, BucketKind::Api, None).await.unwrap();
        assert_eq!(response.body, "fresh");

        lifetime.settle().await;
        let cached = caches.match_in(BucketKind::Api, &request).await.unwrap().unwrap();
        assert_eq!(cached.body, "fresh");
    }

    #[tokio::test]
    async fn test_network_first_does_not_cache_errors() {
        let caches = caches().await;
        let network = ScriptedNetwork::default();
        let lifetime = Lifetime::new();
        let ctx = StrategyContext { caches: &caches, network: &network, lifetime: &lifetime };

        for status in [404, 500] {
            let request = get(&format!("https://app.test/api/status/{status}"));
            network.serve(request.url.as_str(), Response::new(status, "error page"));
            let response = network_first(&ctx, &request, BucketKind::Api, None).await.unwrap();
            assert_eq!(response.status, status);
            lifetime.settle().await;
            assert!(caches.match_in(BucketKind::Api, &request).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn test_network_first_offline_serves_cache() {
        let caches = caches().await;
        let network = ScriptedNetwork::default();
        let lifetime = Lifetime::new();
        let ctx = StrategyContext { caches: &caches, network: &network, lifetime: &lifetime };
        let request = get("https://app.test/skills/7");
        caches.put(BucketKind::Dynamic, &request, &Response::new(200, "stale but fine")).await.unwrap();
        network.offline.store(true, Ordering::SeqCst);

        let response = network_first(&ctx, &request, BucketKind::Dynamic, None).await.unwrap();
        assert_eq!(response.body, "stale but fine");
    }

    #[tokio::test]
    async fn test_network_first_fallback_only_for_navigation() {
        let caches = caches().await;
        let network = ScriptedNetwork::default();
        let lifetime = Lifetime::new();
        let ctx = StrategyContext { caches: &caches, network: &network, lifetime: &lifetime };
        caches.put(BucketKind::Static, &get("https://app.test/offline"), &Response::new(200, "offline page")).await.unwrap();
        network.offline.store(true, Ordering::SeqCst);

        let navigation = Request::navigate(Url::parse("https://app.test/bookings").unwrap());
        let response = network_first(&ctx, &navigation, BucketKind::Dynamic, Some("/offline")).await.unwrap();
        assert_eq!(response.body, "offline page");

        let fetch = get("https://app.test/bookings");
        let result = network_first(&ctx, &fetch, BucketKind::Dynamic, Some("/offline")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_network_first_propagates_when_nothing_cached() {
        let caches = caches().await;
        let network = ScriptedNetwork::default();
        let lifetime = Lifetime::new();
        let ctx = StrategyContext { caches: &caches, network: &network, lifetime: &lifetime };
        network.offline.store(true, Ordering::SeqCst);

        let navigation = Request::navigate(Url::parse("https://app.test/profile").unwrap());
        let result = network_first(&ctx, &navigation, BucketKind::Dynamic, Some("/offline")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_cache_first_hit_skips_network() {
        let caches = caches().await;
        let network = ScriptedNetwork::default();
        let lifetime = Lifetime::new();
        let ctx = StrategyContext { caches: &caches, network: &network, lifetime: &lifetime };
        let request = get("https://app.test/assets/app.js");
        caches.put(BucketKind::Static, &request, &Response::new(200, "console.log(1)")).await.unwrap();

        let response = cache_first(&ctx, &request, BucketKind::Static).await.unwrap();
        assert_eq!(response.body, "console.log(1)");
        assert_eq!(network.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cache_first_miss_fetches_and_stores() {
        let caches = caches().await;
        let network = ScriptedNetwork::default();
        let lifetime = Lifetime::new();
        let ctx = StrategyContext { caches: &caches, network: &network, lifetime: &lifetime };
        let request = get("https://app.test/assets/app.css");
        network.serve(request.url.as_str(), Response::new(200, "body{}"));

        cache_first(&ctx, &request, BucketKind::Static).await.unwrap();
        lifetime.settle().await;
        cache_first(&ctx, &request, BucketKind::Static).await.unwrap();

        assert_eq!(network.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_first_miss_offline_errors() {
        let caches = caches().await;
        let network = ScriptedNetwork::default();
        let lifetime = Lifetime::new();
        let ctx = StrategyContext { caches: &caches, network: &network, lifetime: &lifetime };
        network.offline.store(true, Ordering::SeqCst);

        let result = cache_first(&ctx, &get("https://app.test/fonts/inter.woff2"), BucketKind::Static).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_network_first_write_failure_still_returns_live_response() {
        let (caches, dir) = broken_caches(
            "write",
            "CREATE TRIGGER reject_writes BEFORE INSERT ON entries BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .await;
        let network = ScriptedNetwork::default();
        let lifetime = Lifetime::new();
        let ctx = StrategyContext { caches: &caches, network: &network, lifetime: &lifetime };
        let request = get("https://app.test/api/skills");
        network.serve(request.url.as_str(), Response::new(200, "live"));

        let response = network_first(&ctx, &request, BucketKind::Api, None).await.unwrap();
        assert_eq!(response.body, "live");
        lifetime.settle().await;
        assert!(caches.match_in(BucketKind::Api, &request).await.unwrap().is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_cache_first_read_failure_falls_through_to_network() {
        let (caches, dir) = broken_caches("read", "DROP TABLE entries;").await;
        let network = ScriptedNetwork::default();
        let lifetime = Lifetime::new();
        let ctx = StrategyContext { caches: &caches, network: &network, lifetime: &lifetime };
        let request = get("https://app.test/assets/app.js");
        network.serve(request.url.as_str(), Response::new(200, "console.log(2)"));

        let response = cache_first(&ctx, &request, BucketKind::Static).await.unwrap();
        assert_eq!(response.body, "console.log(2)");
        assert_eq!(network.calls.load(Ordering::SeqCst), 1);
        lifetime.settle().await;
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_respond_dispatches_on_strategy() {
        let caches = caches().await;
        let network = ScriptedNetwork::default();
        let lifetime = Lifetime::new();
        let ctx = StrategyContext { caches: &caches, network: &network, lifetime: &lifetime };
        let request = get("https://app.test/icons/a.png");
        caches.put(BucketKind::Dynamic, &request, &Response::new(200, "png")).await.unwrap();
        let route = Route {
            class: shellcache_core::ResourceClass::Image,
            strategy: Strategy::CacheFirst,
            bucket: BucketKind::Dynamic,
        };

        let response = ctx.respond(&request, &route).await.unwrap();
        assert_eq!(response.body, "png");
        assert_eq!(network.calls.load(Ordering::SeqCst), 0);
    }
}
