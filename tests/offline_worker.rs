//! Offline save through the service worker, end to end.
//!
//! Drives the full protocol over in-memory seams: the offline controller
//! issues cache-busted fetches, the worker intercepts them, classifies the
//! responses into partitions, and a later deployment's activation reclaims
//! the stale partitions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use movielog::assets::{cache_types, AssetGroups, DEFAULT_CACHE_NAME};
use movielog::offline::{without_cache_bust, OfflineController, SaveError};
use movielog::worker::{
    CacheStorage, FetchError, FetchMode, FetchRequest, FetchedResponse, MemoryCacheStorage,
    NetworkFetcher, ServiceWorker,
};

/// The origin server: canned responses keyed by plain URL, with a switch
/// to simulate going offline.
struct Site {
    responses: HashMap<String, FetchedResponse>,
    online: AtomicBool,
}

impl Site {
    fn new(groups: &AssetGroups) -> Self {
        let mut responses = HashMap::new();
        for url in groups.all() {
            responses.insert(url, FetchedResponse::ok("text/plain", "content"));
        }
        Self {
            responses,
            online: AtomicBool::new(true),
        }
    }

    fn go_offline(&self) {
        self.online.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl NetworkFetcher for Site {
    async fn fetch(
        &self,
        request: &FetchRequest,
        _mode: FetchMode,
    ) -> Result<FetchedResponse, FetchError> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(FetchError::Network("offline".to_string()));
        }
        self.responses
            .get(&without_cache_bust(&request.url))
            .cloned()
            .ok_or_else(|| FetchError::Network("not found".to_string()))
    }
}

/// The page's view of the network: every fetch goes through the worker,
/// as browser fetch interception would route it.
struct InterceptedNetwork {
    worker: Arc<ServiceWorker<MemoryCacheStorage, Site>>,
}

#[async_trait]
impl NetworkFetcher for InterceptedNetwork {
    async fn fetch(
        &self,
        request: &FetchRequest,
        _mode: FetchMode,
    ) -> Result<FetchedResponse, FetchError> {
        self.worker
            .handle_fetch(request)
            .await
            .ok_or_else(|| FetchError::Network("unhandled request".to_string()))
    }
}

fn groups() -> AssetGroups {
    AssetGroups {
        base: vec![
            "/".to_string(),
            "/index.html".to_string(),
            "/stats/".to_string(),
            "/stats/index.html".to_string(),
        ],
        app: vec![
            "/movies.4f2a.js".to_string(),
            "/stats.19bc.js".to_string(),
            "/manifest.90af.json".to_string(),
        ],
        movies: vec![
            "/movies/aa01.json".to_string(),
            "/movies/bb02.json".to_string(),
        ],
    }
}

struct Page {
    worker: Arc<ServiceWorker<MemoryCacheStorage, Site>>,
    storage: Arc<MemoryCacheStorage>,
    site: Arc<Site>,
    groups: AssetGroups,
}

async fn activated_page() -> Page {
    let groups = groups();
    let types = cache_types(&groups, "htmlhash", "image.tmdb.org");
    let storage = Arc::new(MemoryCacheStorage::new());
    let site = Arc::new(Site::new(&groups));
    let mut worker = ServiceWorker::new(
        "http://localhost:5000",
        types,
        Arc::clone(&storage),
        Arc::clone(&site),
    );
    worker.install();
    worker.activate().await.unwrap();
    Page {
        worker: Arc::new(worker),
        storage,
        site,
        groups,
    }
}

#[tokio::test]
async fn offline_save_populates_every_partition() {
    let page = activated_page().await;
    let network = InterceptedNetwork {
        worker: Arc::clone(&page.worker),
    };

    let controller = OfflineController::new();
    let mut reported = Vec::new();
    controller
        .save(&page.groups.all(), &network, |p| reported.push(p))
        .await
        .unwrap();

    assert_eq!(*reported.last().unwrap(), 100.0);
    // Every asset landed in its cache-type partition, keyed plain.
    let partitions = page.storage.partitions().await;
    assert_eq!(partitions.len(), 3);
    assert!(partitions.iter().any(|name| name.starts_with("base-htmlhash-")));
    assert!(partitions.iter().any(|name| name.starts_with("app-")));
    assert!(partitions.iter().any(|name| name.starts_with("movies-")));
    for url in page.groups.all() {
        assert!(page.storage.lookup(&url).await.is_some(), "missing {url}");
    }
}

#[tokio::test]
async fn saved_site_survives_going_offline() {
    let page = activated_page().await;
    let network = InterceptedNetwork {
        worker: Arc::clone(&page.worker),
    };
    let controller = OfflineController::new();
    controller
        .save(&page.groups.all(), &network, |_| {})
        .await
        .unwrap();

    page.site.go_offline();

    let response = page
        .worker
        .handle_fetch(&FetchRequest::get("/index.html"))
        .await
        .unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"content".to_vec());

    // An asset that was never saved has no cached copy to fall back on.
    let missing = page
        .worker
        .handle_fetch(&FetchRequest::get("/never-saved.css"))
        .await
        .unwrap();
    assert_eq!(missing.status, 503);
}

#[tokio::test]
async fn save_against_a_dead_network_fails_and_releases_the_controller() {
    let page = activated_page().await;
    page.site.go_offline();
    let network = InterceptedNetwork {
        worker: Arc::clone(&page.worker),
    };

    let controller = OfflineController::new();
    let error = controller
        .save(&page.groups.all(), &network, |_| {})
        .await
        .unwrap_err();
    // The worker synthesizes a 503; the controller reports it as a failure.
    assert!(matches!(error, SaveError::Fetch(_)));
    assert!(error.to_string().contains("503"));
    assert!(!controller.is_saving());
}

#[tokio::test]
async fn next_deployment_reclaims_the_saved_partitions() {
    let page = activated_page().await;
    let network = InterceptedNetwork {
        worker: Arc::clone(&page.worker),
    };
    let controller = OfflineController::new();
    controller
        .save(&page.groups.all(), &network, |_| {})
        .await
        .unwrap();
    page.storage
        .seed(DEFAULT_CACHE_NAME, "/misc", FetchedResponse::ok("text/plain", "x"))
        .await;

    // A new build with a changed app bundle: app and base hashes move,
    // the movies hash stays.
    let mut next_groups = groups();
    next_groups.app[0] = "/movies.9e1d.js".to_string();
    let next_types = cache_types(&next_groups, "otherhtml", "image.tmdb.org");
    let mut next_worker = ServiceWorker::new(
        "http://localhost:5000",
        next_types,
        Arc::clone(&page.storage),
        Arc::clone(&page.site),
    );
    next_worker.install();
    let deleted = next_worker.activate().await.unwrap();

    assert_eq!(deleted.len(), 2);
    assert!(deleted.iter().any(|name| name.starts_with("base-")));
    assert!(deleted.iter().any(|name| name.starts_with("app-")));

    let remaining = page.storage.partitions().await;
    // The movies partition and the default bucket survive.
    assert!(remaining.iter().any(|name| name.starts_with("movies-")));
    assert!(remaining.contains(&DEFAULT_CACHE_NAME.to_string()));
    assert!(page.storage.lookup("/movies/aa01.json").await.is_some());
    assert!(page.storage.lookup("/index.html").await.is_none());
}
