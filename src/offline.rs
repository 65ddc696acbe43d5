//! Offline save controller.
//!
//! Bulk-fetches the build's asset list so the service worker caches every
//! response, reporting progress after each batch. Batches are strictly
//! sequential, fetches within a batch run in parallel, and cancellation is
//! a cooperative flag checked at batch boundaries: an in-flight batch
//! always completes before cancellation takes effect.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::worker::{FetchMode, FetchRequest, NetworkFetcher};

/// Parallel fetches per batch, bounding in-flight requests.
pub const SAVE_BATCH_SIZE: usize = 20;

/// Query marker appended to every offline-save request so it is never
/// satisfied by a stale cache entry; the progress bar is only honest if
/// every request reaches the network.
pub const CACHE_BUST_MARKER: &str = "offline-save=1";

/// Append the cache-busting marker to a URL.
pub fn cache_busted_url(url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{CACHE_BUST_MARKER}")
}

/// The URL with the cache-busting marker removed. Cached entries are keyed
/// by this form so a later plain request finds what an offline save stored.
pub fn without_cache_bust(url: &str) -> String {
    match url.split_once('?') {
        Some((path, query)) => {
            let rest: Vec<&str> = query
                .split('&')
                .filter(|pair| *pair != CACHE_BUST_MARKER)
                .collect();
            if rest.is_empty() {
                path.to_string()
            } else {
                format!("{path}?{}", rest.join("&"))
            }
        }
        None => url.to_string(),
    }
}

/// Whether a URL carries the cache-busting marker.
pub fn is_cache_busted(url: &str) -> bool {
    url.split_once('?')
        .map(|(_, query)| query.split('&').any(|pair| pair == CACHE_BUST_MARKER))
        .unwrap_or(false)
}

/// Why an offline save run terminated early.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The user cancelled; surfaced silently by callers.
    #[error("offline save cancelled")]
    Cancelled,
    /// Another save is still running; cancel it first.
    #[error("an offline save is already in progress")]
    Busy,
    /// A fetch failed; remaining batches were abandoned.
    #[error("offline save failed: {0}")]
    Fetch(String),
}

/// Runs at most one offline save at a time.
#[derive(Debug, Clone, Default)]
pub struct OfflineController {
    in_progress: Arc<AtomicBool>,
}

impl OfflineController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_saving(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Request cancellation of the current save. Idempotent; a no-op when
    /// no save is running.
    pub fn cancel(&self) {
        self.in_progress.store(false, Ordering::SeqCst);
    }

    /// Fetch every asset through the network in sequential batches.
    ///
    /// `on_progress` receives a monotonically non-decreasing percentage
    /// after each completed batch, reaching exactly 100 iff the run
    /// completes without cancellation or error.
    pub async fn save<N, F>(
        &self,
        assets: &[String],
        network: &N,
        mut on_progress: F,
    ) -> Result<(), SaveError>
    where
        N: NetworkFetcher,
        F: FnMut(f64),
    {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SaveError::Busy);
        }

        let result = self.run(assets, network, &mut on_progress).await;
        self.in_progress.store(false, Ordering::SeqCst);
        result
    }

    async fn run<N, F>(
        &self,
        assets: &[String],
        network: &N,
        on_progress: &mut F,
    ) -> Result<(), SaveError>
    where
        N: NetworkFetcher,
        F: FnMut(f64),
    {
        let total = assets.len();
        if total == 0 {
            on_progress(100.0);
            return Ok(());
        }

        let mut remaining = total;
        for batch in assets.chunks(SAVE_BATCH_SIZE) {
            // Cancellation is only observed here; the previous batch has
            // fully resolved by now.
            if !self.in_progress.load(Ordering::SeqCst) {
                debug!("offline save cancelled after {} assets", total - remaining);
                return Err(SaveError::Cancelled);
            }

            let fetches = batch.iter().map(|url| {
                let request = FetchRequest::get(cache_busted_url(url));
                async move {
                    let response = network
                        .fetch(&request, FetchMode::Normal)
                        .await
                        .map_err(|error| SaveError::Fetch(error.to_string()))?;
                    if !response.is_usable() {
                        return Err(SaveError::Fetch(format!(
                            "{} responded with status {}",
                            request.url, response.status
                        )));
                    }
                    Ok(())
                }
            });
            let results = futures::future::join_all(fetches).await;
            for result in results {
                result?;
            }

            remaining -= batch.len();
            on_progress((total - remaining) as f64 / total as f64 * 100.0);
        }

        Ok(())
    }
}
