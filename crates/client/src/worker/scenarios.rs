//! End-to-end behavior through the registration, one upstream and one store.

use std::sync::atomic::Ordering;

use shellcache_core::{BucketKind, Destination, Request, RequestMode, Response};

use super::testing::{Harness, url};
use super::WorkerEvent;
use crate::registration::Registration;

async fn online(harness: &Harness, tag: &str, precache: &[&str]) -> Registration {
    let registration = Registration::new(harness.db.clone(), harness.platform());
    registration.register(harness.settings(tag, precache), false).await.unwrap();
    registration
}

fn script(path: &str) -> Request {
    Request::new("GET", url(path), RequestMode::NoCors, Destination::Script)
}

#[tokio::test]
async fn test_static_asset_hit_makes_no_network_call() {
    let harness = Harness::new().await;
    harness.network.serve("/assets/index-4f1c.js", Response::new(200, "export {}"));
    let registration = online(&harness, "v1", &[]).await;

    registration.fetch(script("/assets/index-4f1c.js")).await.unwrap();
    registration.settle().await;
    let calls = harness.network.calls.load(Ordering::SeqCst);

    for _ in 0..3 {
        let served = registration.fetch(script("/assets/index-4f1c.js")).await.unwrap();
        assert_eq!(served.response.body, "export {}");
    }
    assert_eq!(harness.network.calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_api_success_is_returned_and_cached_under_same_key() {
    let harness = Harness::new().await;
    harness.network.serve("/api/skills?category=music", Response::new(200, r#"{"skills":[1]}"#));
    let registration = online(&harness, "v1", &[]).await;
    let request = Request::get(url("/api/skills?category=music"));

    let served = registration.fetch(request.clone()).await.unwrap();
    assert_eq!(served.response.body, r#"{"skills":[1]}"#);
    registration.settle().await;

    let worker = registration.active().await.unwrap();
    let cached = worker.caches().match_in(BucketKind::Api, &request).await.unwrap().unwrap();
    assert_eq!(cached.body, served.response.body);
}

#[tokio::test]
async fn test_api_skills_offline_returns_cached_json_unchanged() {
    let harness = Harness::new().await;
    let body = r#"{"skills":[{"id":1,"title":"Guitar"},{"id":2,"title":"Pottery"}]}"#;
    harness
        .network
        .serve("/api/skills", Response::new(200, body).with_header("content-type", "application/json"));
    let registration = online(&harness, "v1", &[]).await;

    registration.fetch(Request::get(url("/api/skills"))).await.unwrap();
    registration.settle().await;
    harness.network.set_offline(true);

    let served = registration.fetch(Request::get(url("/api/skills"))).await.unwrap();
    assert_eq!(served.response.status, 200);
    assert_eq!(served.response.body, body);
    assert_eq!(served.response.content_type(), Some("application/json"));
}

#[tokio::test]
async fn test_offline_navigation_without_entry_gets_exact_offline_page() {
    let harness = Harness::new().await;
    let page = "<html><body>You are offline</body></html>";
    harness.network.serve("/", Response::new(200, "shell"));
    harness.network.serve("/offline", Response::new(200, page));
    let registration = online(&harness, "v1", &["/", "/offline"]).await;
    harness.network.set_offline(true);

    let served = registration.fetch(Request::navigate(url("/bookings/42"))).await.unwrap();
    assert_eq!(served.response.body, page);
}

#[tokio::test]
async fn test_error_statuses_are_returned_but_never_cached() {
    let harness = Harness::new().await;
    harness.network.serve("/api/bookings", Response::new(500, "boom"));
    let registration = online(&harness, "v1", &[]).await;

    let served = registration.fetch(Request::get(url("/api/bookings"))).await.unwrap();
    assert_eq!(served.response.status, 500);
    let served = registration.fetch(Request::get(url("/api/unknown"))).await.unwrap();
    assert_eq!(served.response.status, 404);
    registration.settle().await;

    let worker = registration.active().await.unwrap();
    assert!(worker.caches().db().bucket_entries(&worker.settings().names.name(BucketKind::Api)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_new_version_activation_leaves_exactly_three_buckets() {
    let harness = Harness::new().await;
    harness.network.serve("/", Response::new(200, "shell"));
    let registration = online(&harness, "v1", &["/"]).await;
    harness.db.open_bucket("legacy-images").await.unwrap();

    let report = registration.register(harness.settings("v2", &["/"]), true).await.unwrap();
    assert!(report.activation.is_some());

    let mut buckets = harness.db.bucket_names().await.unwrap();
    buckets.sort();
    assert_eq!(buckets, ["app-api-v2", "app-dynamic-v2", "app-static-v2"]);
}

#[tokio::test]
async fn test_late_write_from_superseded_worker_does_not_revive_its_bucket() {
    let harness = Harness::new().await;
    harness.network.serve("/", Response::new(200, "shell"));
    harness.network.serve("/skills/1", Response::new(200, "<html>skill</html>"));
    let registration = online(&harness, "v1", &["/"]).await;
    let old = registration.active().await.unwrap();

    registration.register(harness.settings("v2", &["/"]), true).await.unwrap();
    old.dispatch(WorkerEvent::Fetch(Request::navigate(url("/skills/1")))).await.unwrap();
    old.settle().await;

    let mut buckets = harness.db.bucket_names().await.unwrap();
    buckets.sort();
    assert_eq!(buckets, ["app-api-v2", "app-dynamic-v2", "app-static-v2"]);
}

#[tokio::test]
async fn test_failed_install_rejects_and_leaves_caches_untouched() {
    let harness = Harness::new().await;
    harness.network.serve("/", Response::new(200, "shell v1"));
    harness.network.serve("/offline", Response::new(200, "offline v1"));
    let registration = online(&harness, "v1", &["/", "/offline"]).await;
    let before = harness.db.bucket_infos().await.unwrap();

    harness.network.serve("/offline", Response::new(503, "maintenance"));
    let result = registration.register(harness.settings("v2", &["/", "/offline"]), true).await;
    assert!(matches!(result, Err(shellcache_core::Error::InstallFailed(_))));

    let status = registration.status().await;
    assert_eq!(status.active.unwrap().version, "v1");
    let after = harness.db.bucket_infos().await.unwrap();
    let names = |infos: &[shellcache_core::cache::BucketInfo]| {
        infos.iter().map(|i| (i.name.clone(), i.entry_count)).collect::<Vec<_>>()
    };
    assert_eq!(names(&before), names(&after));
}
