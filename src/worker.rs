//! Service-worker cache protocol.
//!
//! Models the worker lifecycle (install, activate, fetch interception) over
//! two seams: [`CacheStorage`] for the browser's partitioned cache and
//! [`NetworkFetcher`] for the network, so the whole protocol runs headless.
//! The worker serves cache-first with network fallback, stores classified
//! responses in named partitions, and evicts partitions orphaned by a
//! previous deployment on activation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::assets::{classify, DEFAULT_CACHE_NAME};
use crate::models::CacheType;
use crate::offline::{is_cache_busted, without_cache_bust};

/// How the network request is issued.
///
/// Cross-origin requests use no-cors so opaque responses can still be
/// cached; same-origin requests use normal mode so error statuses are
/// observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Normal,
    NoCors,
}

/// An intercepted page request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
        }
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    /// Whether the request carries the offline-save cache-busting marker.
    pub fn is_cache_busted(&self) -> bool {
        is_cache_busted(&self.url)
    }
}

/// A response as seen (and replayed) by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResponse {
    pub status: u16,
    /// Cross-origin no-cors result: status and body are not inspectable,
    /// but the response can be cached and replayed.
    pub opaque: bool,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl FetchedResponse {
    pub fn ok(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            opaque: false,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    pub fn opaque() -> Self {
        Self {
            status: 0,
            opaque: true,
            content_type: String::new(),
            body: Vec::new(),
        }
    }

    /// Usable for offline storage: a 2xx status or an opaque response.
    pub fn is_usable(&self) -> bool {
        self.opaque || (200..300).contains(&self.status)
    }

    /// The synthesized response returned when both cache and network fail.
    /// Browsers require a concrete response object, never a rejection.
    pub fn service_unavailable() -> Self {
        Self {
            status: 503,
            opaque: false,
            content_type: "text/html; charset=utf-8".to_string(),
            body: b"<h1>Service unavailable</h1>".to_vec(),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache storage error: {0}")]
    Storage(String),
}

/// The network seam shared by the worker and the offline controller.
#[async_trait]
pub trait NetworkFetcher: Send + Sync {
    async fn fetch(
        &self,
        request: &FetchRequest,
        mode: FetchMode,
    ) -> Result<FetchedResponse, FetchError>;
}

/// The browser's partitioned cache storage.
///
/// Lookups are URL-keyed and partition-agnostic; writes target one named
/// partition; partitions are deleted as a unit.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    async fn partitions(&self) -> Vec<String>;
    async fn delete_partition(&self, name: &str) -> Result<(), CacheError>;
    async fn lookup(&self, url: &str) -> Option<FetchedResponse>;
    async fn store(
        &self,
        partition: &str,
        url: &str,
        response: &FetchedResponse,
    ) -> Result<(), CacheError>;
}

/// In-memory cache storage, used in tests and headless runs.
#[derive(Debug, Default)]
pub struct MemoryCacheStorage {
    partitions: RwLock<HashMap<String, HashMap<String, FetchedResponse>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a partition, as a previous deployment would have left it.
    pub async fn seed(&self, partition: &str, url: &str, response: FetchedResponse) {
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(partition.to_string())
            .or_default()
            .insert(url.to_string(), response);
    }

    pub async fn entry_count(&self, partition: &str) -> usize {
        let partitions = self.partitions.read().await;
        partitions.get(partition).map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn partitions(&self) -> Vec<String> {
        let partitions = self.partitions.read().await;
        let mut names: Vec<String> = partitions.keys().cloned().collect();
        names.sort();
        names
    }

    async fn delete_partition(&self, name: &str) -> Result<(), CacheError> {
        let mut partitions = self.partitions.write().await;
        partitions.remove(name);
        Ok(())
    }

    async fn lookup(&self, url: &str) -> Option<FetchedResponse> {
        let partitions = self.partitions.read().await;
        partitions.values().find_map(|entries| entries.get(url).cloned())
    }

    async fn store(
        &self,
        partition: &str,
        url: &str,
        response: &FetchedResponse,
    ) -> Result<(), CacheError> {
        let mut partitions = self.partitions.write().await;
        partitions
            .entry(partition.to_string())
            .or_default()
            .insert(url.to_string(), response.clone());
        Ok(())
    }
}

/// Worker lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Installing,
    Installed,
    Activating,
    Activated,
}

/// The service worker: lifecycle plus fetch interception.
///
/// The cache-type table is passed in at construction, sourced from the
/// build's cache manifest; it is a constant for the worker's lifetime.
pub struct ServiceWorker<C, N> {
    state: WorkerState,
    origin: String,
    cache_types: Arc<Vec<CacheType>>,
    storage: Arc<C>,
    network: Arc<N>,
}

impl<C, N> ServiceWorker<C, N>
where
    C: CacheStorage + 'static,
    N: NetworkFetcher + 'static,
{
    pub fn new(
        origin: impl Into<String>,
        cache_types: Vec<CacheType>,
        storage: Arc<C>,
        network: Arc<N>,
    ) -> Self {
        Self {
            state: WorkerState::Installing,
            origin: origin.into(),
            cache_types: Arc::new(cache_types),
            storage,
            network,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Install is a readiness signal only; assets are cached lazily on
    /// first fetch rather than pre-cached from a fixed list.
    pub fn install(&mut self) {
        debug!("worker installing");
        self.state = WorkerState::Installed;
    }

    /// Delete every partition whose name is not in the current build's
    /// cache-type list. Returns the deleted names.
    pub async fn activate(&mut self) -> Result<Vec<String>, CacheError> {
        debug!("worker activating");
        self.state = WorkerState::Activating;
        let current: Vec<&str> = self
            .cache_types
            .iter()
            .map(|cache_type| cache_type.name.as_str())
            .collect();
        let mut deleted = Vec::new();
        for name in self.storage.partitions().await {
            if name != DEFAULT_CACHE_NAME && !current.contains(&name.as_str()) {
                debug!(partition = %name, "deleting stale cache partition");
                self.storage.delete_partition(&name).await?;
                deleted.push(name);
            }
        }
        self.state = WorkerState::Activated;
        Ok(deleted)
    }

    /// Intercept one request. Returns `None` for non-GET requests, which
    /// pass through to the browser unhandled.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Option<FetchedResponse> {
        if !request.is_get() {
            debug!(url = %request.url, method = %request.method, "passing through");
            return None;
        }

        // A cache-busted request must observe the network path even on
        // failure, so the offline progress accounting stays accurate.
        if request.is_cache_busted() {
            return Some(self.fetch_and_cache(request).await);
        }

        if let Some(cached) = self.storage.lookup(&request.url).await {
            debug!(url = %request.url, "serving from cache");
            // Refresh from the network in the background; the page never
            // waits on it.
            let worker = self.fetch_context();
            let request = request.clone();
            tokio::spawn(async move {
                worker.fetch_and_store(&request).await;
            });
            return Some(cached);
        }

        debug!(url = %request.url, "serving from network");
        Some(self.fetch_and_cache(request).await)
    }

    /// Fetch from the network, store a usable response in its classified
    /// partition, and synthesize a 503 when the network fails.
    async fn fetch_and_cache(&self, request: &FetchRequest) -> FetchedResponse {
        match self.fetch_context().fetch_and_store(request).await {
            Some(response) => response,
            None => FetchedResponse::service_unavailable(),
        }
    }

    fn fetch_context(&self) -> FetchContext<C, N> {
        FetchContext {
            origin: self.origin.clone(),
            cache_types: Arc::clone(&self.cache_types),
            storage: Arc::clone(&self.storage),
            network: Arc::clone(&self.network),
        }
    }
}

/// The state a background fetch needs to outlive the intercept call.
struct FetchContext<C, N> {
    origin: String,
    cache_types: Arc<Vec<CacheType>>,
    storage: Arc<C>,
    network: Arc<N>,
}

impl<C, N> FetchContext<C, N>
where
    C: CacheStorage,
    N: NetworkFetcher,
{
    async fn fetch_and_store(&self, request: &FetchRequest) -> Option<FetchedResponse> {
        let mode = if is_same_origin(&self.origin, &request.url) {
            FetchMode::Normal
        } else {
            FetchMode::NoCors
        };
        match self.network.fetch(request, mode).await {
            Ok(response) => {
                // Only usable responses populate the cache; a failed fetch
                // never displaces an existing entry. Entries are keyed by
                // the marker-stripped URL so an offline save's busted
                // requests serve later plain lookups.
                if response.is_usable() {
                    let cache_url = without_cache_bust(&request.url);
                    let partition = classify(&cache_url, &self.cache_types);
                    if let Err(error) = self
                        .storage
                        .store(partition, &cache_url, &response)
                        .await
                    {
                        // A failed cache write must never turn a good
                        // network response into a failed page load.
                        warn!(url = %request.url, %error, "could not store response");
                    }
                }
                Some(response)
            }
            Err(error) => {
                debug!(url = %request.url, %error, "network fetch failed");
                None
            }
        }
    }
}

/// Relative URLs are same-origin by construction; absolute ones compare
/// scheme, host and port against the worker's origin.
fn is_same_origin(origin: &str, url: &str) -> bool {
    let Ok(absolute) = Url::parse(url) else {
        return true;
    };
    match Url::parse(origin) {
        Ok(origin) => {
            origin.scheme() == absolute.scheme()
                && origin.host_str() == absolute.host_str()
                && origin.port_or_known_default() == absolute.port_or_known_default()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Matcher;
    use crate::offline::cache_busted_url;
    use std::sync::Mutex;

    /// Scripted network: canned responses per URL, records issued requests.
    #[derive(Default)]
    struct ScriptedNetwork {
        responses: HashMap<String, FetchedResponse>,
        requests: Mutex<Vec<(String, FetchMode)>>,
    }

    impl ScriptedNetwork {
        fn with(mut self, url: &str, response: FetchedResponse) -> Self {
            self.responses.insert(url.to_string(), response);
            self
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl NetworkFetcher for ScriptedNetwork {
        async fn fetch(
            &self,
            request: &FetchRequest,
            mode: FetchMode,
        ) -> Result<FetchedResponse, FetchError> {
            self.requests
                .lock()
                .unwrap()
                .push((request.url.clone(), mode));
            self.responses
                .get(&request.url)
                .cloned()
                .ok_or_else(|| FetchError::Network("connection refused".to_string()))
        }
    }

    fn cache_types() -> Vec<CacheType> {
        vec![
            CacheType {
                name: "app-abc".to_string(),
                matches: vec![Matcher::path("/movies.js")],
            },
            CacheType {
                name: "movies-def".to_string(),
                matches: vec![
                    Matcher::path_starts_with("/movies/"),
                    Matcher::domain("image.tmdb.org"),
                ],
            },
        ]
    }

    fn worker(
        network: ScriptedNetwork,
    ) -> (
        ServiceWorker<MemoryCacheStorage, ScriptedNetwork>,
        Arc<MemoryCacheStorage>,
        Arc<ScriptedNetwork>,
    ) {
        let storage = Arc::new(MemoryCacheStorage::new());
        let network = Arc::new(network);
        let worker = ServiceWorker::new(
            "http://localhost:5000",
            cache_types(),
            Arc::clone(&storage),
            Arc::clone(&network),
        );
        (worker, storage, network)
    }

    #[tokio::test]
    async fn lifecycle_reaches_activated() {
        let (mut worker, _storage, _network) = worker(ScriptedNetwork::default());
        assert_eq!(worker.state(), WorkerState::Installing);
        worker.install();
        assert_eq!(worker.state(), WorkerState::Installed);
        worker.activate().await.unwrap();
        assert_eq!(worker.state(), WorkerState::Activated);
    }

    #[tokio::test]
    async fn activation_evicts_only_stale_partitions() {
        let (mut worker, storage, _network) = worker(ScriptedNetwork::default());
        storage
            .seed("app-abc123", "/old.js", FetchedResponse::ok("text/javascript", "x"))
            .await;
        storage
            .seed("app-abc", "/movies.js", FetchedResponse::ok("text/javascript", "y"))
            .await;
        storage
            .seed(DEFAULT_CACHE_NAME, "/misc", FetchedResponse::ok("text/plain", "z"))
            .await;

        let deleted = worker.activate().await.unwrap();
        assert_eq!(deleted, vec!["app-abc123".to_string()]);
        assert_eq!(
            storage.partitions().await,
            vec!["app-abc".to_string(), DEFAULT_CACHE_NAME.to_string()]
        );
    }

    #[tokio::test]
    async fn non_get_requests_pass_through() {
        let (worker, _storage, network) = worker(ScriptedNetwork::default());
        let request = FetchRequest {
            url: "/movies.js".to_string(),
            method: "POST".to_string(),
        };
        assert!(worker.handle_fetch(&request).await.is_none());
        assert_eq!(network.request_count(), 0);
    }

    #[tokio::test]
    async fn network_response_is_stored_in_its_partition() {
        let network = ScriptedNetwork::default()
            .with("/movies.js", FetchedResponse::ok("text/javascript", "app"));
        let (worker, storage, _network) = worker(network);

        let response = worker
            .handle_fetch(&FetchRequest::get("/movies.js"))
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(storage.entry_count("app-abc").await, 1);
    }

    #[tokio::test]
    async fn unmatched_url_is_stored_in_default() {
        let network =
            ScriptedNetwork::default().with("/random.css", FetchedResponse::ok("text/css", "c"));
        let (worker, storage, _network) = worker(network);
        worker
            .handle_fetch(&FetchRequest::get("/random.css"))
            .await
            .unwrap();
        assert_eq!(storage.entry_count(DEFAULT_CACHE_NAME).await, 1);
    }

    #[tokio::test]
    async fn cache_hit_is_served_immediately() {
        let (worker, storage, _network) = worker(ScriptedNetwork::default());
        storage
            .seed("app-abc", "/movies.js", FetchedResponse::ok("text/javascript", "cached"))
            .await;

        let response = worker
            .handle_fetch(&FetchRequest::get("/movies.js"))
            .await
            .unwrap();
        // The scripted network has no response for this URL; the cached
        // copy is returned anyway and the background refresh just fails.
        assert_eq!(response.body, b"cached".to_vec());
    }

    #[tokio::test]
    async fn network_failure_without_cache_synthesizes_503() {
        let (worker, _storage, _network) = worker(ScriptedNetwork::default());
        let response = worker
            .handle_fetch(&FetchRequest::get("/missing.js"))
            .await
            .unwrap();
        assert_eq!(response.status, 503);
        assert!(String::from_utf8_lossy(&response.body).contains("Service unavailable"));
    }

    #[tokio::test]
    async fn cache_busted_request_bypasses_cache() {
        let busted = cache_busted_url("/movies.js");
        let (worker, storage, network) = worker(ScriptedNetwork::default());
        storage
            .seed("app-abc", busted.as_str(), FetchedResponse::ok("text/javascript", "stale"))
            .await;

        let response = worker.handle_fetch(&FetchRequest::get(&busted)).await.unwrap();
        // The cached copy exists under the exact URL, but the network path
        // must be observed: the failed fetch surfaces as a 503.
        assert_eq!(response.status, 503);
        assert_eq!(network.request_count(), 1);
    }

    #[tokio::test]
    async fn cache_busted_success_is_stored_under_the_plain_url() {
        let busted = cache_busted_url("/movies.js");
        let network = ScriptedNetwork::default()
            .with(&busted, FetchedResponse::ok("text/javascript", "fresh"));
        let (worker, storage, _network) = worker(network);

        worker.handle_fetch(&FetchRequest::get(&busted)).await.unwrap();
        let cached = storage.lookup("/movies.js").await.unwrap();
        assert_eq!(cached.body, b"fresh".to_vec());
        assert_eq!(storage.entry_count("app-abc").await, 1);
    }

    #[tokio::test]
    async fn failed_responses_are_not_cached() {
        let network = ScriptedNetwork::default().with(
            "/movies.js",
            FetchedResponse {
                status: 404,
                opaque: false,
                content_type: "text/plain".to_string(),
                body: Vec::new(),
            },
        );
        let (worker, storage, _network) = worker(network);
        let response = worker
            .handle_fetch(&FetchRequest::get("/movies.js"))
            .await
            .unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(storage.entry_count("app-abc").await, 0);
    }

    #[tokio::test]
    async fn cross_origin_requests_use_no_cors() {
        let url = "https://image.tmdb.org/t/p/w342/abc.jpg";
        let network = ScriptedNetwork::default().with(url, FetchedResponse::opaque());
        let (worker, storage, network) = worker(network);

        let response = worker.handle_fetch(&FetchRequest::get(url)).await.unwrap();
        assert!(response.opaque);
        let requests = network.requests.lock().unwrap();
        assert_eq!(requests[0].1, FetchMode::NoCors);
        drop(requests);
        // Opaque responses are cacheable.
        assert_eq!(storage.entry_count("movies-def").await, 1);
    }

    #[tokio::test]
    async fn same_origin_requests_use_normal_mode() {
        let url = "http://localhost:5000/movies.js";
        let network = ScriptedNetwork::default().with(url, FetchedResponse::ok("text/javascript", "x"));
        let (worker, _storage, network) = worker(network);
        worker.handle_fetch(&FetchRequest::get(url)).await.unwrap();
        let requests = network.requests.lock().unwrap();
        assert_eq!(requests[0].1, FetchMode::Normal);
    }
}
