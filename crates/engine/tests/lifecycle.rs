mod common;

use common::{Reply, harness, harness_with, script_assets};
use tsync_client::Response;
use tsync_core::{AppConfig, CacheDb, Error, LazyStore, StoreLocation};
use tsync_engine::{Collaborators, Engine, LifecycleState};

#[tokio::test]
async fn test_install_twice_yields_same_keys() {
    let h = harness().await;
    let config = h.engine.config().clone();
    script_assets(&h.transport, &config);

    let first = h.engine.install().await.unwrap();
    let shell = h.engine.caches().open_cache(&config.shell_cache_name()).await.unwrap();
    let keys_once = shell.keys().await.unwrap();

    let second = h.engine.install().await.unwrap();
    let keys_twice = shell.keys().await.unwrap();

    assert_eq!(first.cached.len(), config.precache.len());
    assert_eq!(second.cached, first.cached);
    assert_eq!(keys_once, keys_twice);
    assert_eq!(keys_once.len(), config.precache.len());
    assert!(first.skip_waiting);
    assert_eq!(h.engine.state(), LifecycleState::Installed);
}

#[tokio::test]
async fn test_install_uses_cache_busting_requests() {
    let h = harness().await;
    script_assets(&h.transport, h.engine.config());

    h.engine.install().await.unwrap();

    let calls = h.transport.calls_to("GET", "/static/index.html");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].cache_mode, tsync_client::CacheMode::Reload);
    assert_eq!(calls[0].credentials, tsync_client::Credentials::SameOrigin);
}

#[tokio::test]
async fn test_install_swallows_asset_failures() {
    let h = harness().await;
    for path in &h.engine.config().precache {
        match path.as_str() {
            "/logo.png" => h.transport.reply("GET", path, Reply::Throw("connection reset".into())),
            "/manifest.json" => h.transport.respond("GET", path, Response::new(404, "")),
            _ => h.transport.respond("GET", path, Response::new(200, "ok")),
        }
    }

    let report = h.engine.install().await.unwrap();

    assert_eq!(report.cached.len(), h.engine.config().precache.len() - 2);
    let failed: Vec<&str> = report.failed.iter().map(|(path, _)| path.as_str()).collect();
    assert_eq!(failed, vec!["/manifest.json", "/logo.png"]);
    assert_eq!(h.engine.state(), LifecycleState::Installed);
}

#[tokio::test]
async fn test_activate_deletes_previous_version_caches() {
    let caches = CacheDb::open_in_memory().await.unwrap();

    let old = harness_with(AppConfig::default(), caches.clone()).await;
    script_assets(&old.transport, old.engine.config());
    old.engine.install().await.unwrap();
    old.engine.activate().await.unwrap();
    caches.open_cache("api-cache-v5").await.unwrap();

    let config = AppConfig { cache_version: "v6".into(), ..Default::default() };
    let new = harness_with(config, caches.clone()).await;
    script_assets(&new.transport, new.engine.config());
    new.engine.install().await.unwrap();
    let report = new.engine.activate().await.unwrap();

    assert_eq!(report.deleted_caches, vec!["auth-cache-v5".to_string(), "api-cache-v5".to_string()]);
    let names = caches.cache_names().await.unwrap();
    assert!(names.iter().all(|name| name.ends_with("-v6")));
    assert!(names.contains(&"auth-cache-v6".to_string()));
}

#[tokio::test]
async fn test_activate_claims_pages_and_opens_store() {
    let h = harness().await;
    h.pages.open_page("/static/").await;
    h.pages.open_page("/quiz/42").await;
    script_assets(&h.transport, h.engine.config());

    h.engine.install().await.unwrap();
    let report = h.engine.activate().await.unwrap();

    assert_eq!(report.claimed, 2);
    assert!(report.store_ready);
    assert!(h.engine.store().is_open());
    assert!(h.pages.pages().await.iter().all(|p| p.controlled));
    assert_eq!(h.engine.state(), LifecycleState::Activated);
}

#[tokio::test]
async fn test_activate_before_install_fails() {
    let h = harness().await;
    assert!(matches!(h.engine.activate().await, Err(Error::InvalidInput(_))));
    assert_eq!(h.engine.state(), LifecycleState::Parsed);
}

#[tokio::test]
async fn test_activate_survives_store_failure() {
    let h = harness().await;
    let engine = Engine::new(
        AppConfig::default(),
        CacheDb::open_in_memory().await.unwrap(),
        LazyStore::new(StoreLocation::File("/dev/null/tsync/offline.sqlite".into())),
        Collaborators { transport: h.transport.clone(), connectivity: h.connectivity.clone(), clients: h.pages.clone() },
    )
    .unwrap();
    script_assets(&h.transport, engine.config());

    engine.install().await.unwrap();
    let report = engine.activate().await.unwrap();

    assert!(!report.store_ready);
    assert_eq!(engine.state(), LifecycleState::Activated);
}

#[tokio::test]
async fn test_resume_after_restart() {
    let caches = CacheDb::open_in_memory().await.unwrap();

    let first = harness_with(AppConfig::default(), caches.clone()).await;
    assert!(!first.engine.resume().await.unwrap());
    script_assets(&first.transport, first.engine.config());
    first.engine.install().await.unwrap();
    first.engine.activate().await.unwrap();

    let restarted = harness_with(AppConfig::default(), caches).await;
    assert!(restarted.engine.resume().await.unwrap());
    assert_eq!(restarted.engine.state(), LifecycleState::Activated);

    restarted.go_offline();
    let response = restarted.engine.handle(restarted.request("/static/js/main.js")).await;
    assert_eq!(response.text(), "asset /static/js/main.js");
}

#[tokio::test]
async fn test_unregister_survives_restart() {
    let caches = CacheDb::open_in_memory().await.unwrap();

    let first = harness_with(AppConfig::default(), caches.clone()).await;
    script_assets(&first.transport, first.engine.config());
    first.engine.install().await.unwrap();
    first.engine.activate().await.unwrap();
    first.engine.unregister_and_reload().await.unwrap();

    assert!(!caches.has_cache(&first.engine.config().shell_cache_name()).await.unwrap());

    let restarted = harness_with(AppConfig::default(), caches).await;
    assert!(!restarted.engine.resume().await.unwrap());
    assert_ne!(restarted.engine.state(), LifecycleState::Activated);

    restarted.go_offline();
    let response = restarted.engine.handle(restarted.request("/static/js/main.js")).await;
    assert!(response.is_network_error());
}
