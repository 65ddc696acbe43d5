//! Asset classification for the offline cache.
//!
//! The build partitions its generated URLs into named cache groups; the
//! service worker uses the same table to route fetched responses into
//! partitions. Partition names embed a content hash of the matched asset
//! set, so any change to the set renames the partition and the old one is
//! reclaimed on worker activation.

use sha2::{Digest, Sha256};
use url::Url;

use crate::models::{CacheType, Matcher, MatcherKind};

/// Bucket for requests no matcher claims. Never evicted on activation.
pub const DEFAULT_CACHE_NAME: &str = "default";

/// Hex digest truncated for filenames and partition names.
pub fn short_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..6])
}

/// The build's generated URLs, grouped by invalidation behavior.
#[derive(Debug, Default, Clone)]
pub struct AssetGroups {
    /// HTML entry points, refreshed on any app update.
    pub base: Vec<String>,
    /// Hashed app assets (scripts, fonts, manifest, icons).
    pub app: Vec<String>,
    /// Movie data shards and posters.
    pub movies: Vec<String>,
}

impl AssetGroups {
    /// Every URL, in offline-download order.
    pub fn all(&self) -> Vec<String> {
        let mut all = self.base.clone();
        all.extend(self.app.iter().cloned());
        all.extend(self.movies.iter().cloned());
        all
    }
}

/// Build the ordered cache-type table for one build.
///
/// `html_hash` covers the rendered page content, which is not derivable
/// from the base URL list alone; `poster_domain` is the external image CDN
/// whose opaque responses land in the movies partition.
pub fn cache_types(groups: &AssetGroups, html_hash: &str, poster_domain: &str) -> Vec<CacheType> {
    let app_hash = group_hash(&groups.app);
    let movies_hash = group_hash(&groups.movies);

    let mut movie_matches: Vec<Matcher> =
        groups.movies.iter().map(|url| Matcher::path(url)).collect();
    movie_matches.push(Matcher::path_starts_with("/posters/"));
    movie_matches.push(Matcher::domain(poster_domain));

    vec![
        // The base pages can't be matched from the base list alone: "/"
        // would swallow everything, so they are enumerated explicitly.
        CacheType {
            name: format!("base-{html_hash}-{app_hash}-{movies_hash}"),
            matches: groups.base.iter().map(Matcher::path).collect(),
        },
        CacheType {
            name: format!("app-{app_hash}"),
            matches: groups.app.iter().map(Matcher::path).collect(),
        },
        CacheType {
            name: format!("movies-{movies_hash}"),
            matches: movie_matches,
        },
    ]
}

fn group_hash(urls: &[String]) -> String {
    let json = serde_json::to_vec(urls).unwrap_or_default();
    short_hash(&json)
}

/// Classify a request URL against the ordered table.
///
/// First match wins; an unmatched request falls into [`DEFAULT_CACHE_NAME`],
/// so every URL gets exactly one bucket.
pub fn classify<'a>(url: &str, types: &'a [CacheType]) -> &'a str {
    let (host, path) = split_url(url);
    for cache_type in types {
        for matcher in &cache_type.matches {
            let hit = match matcher.kind {
                MatcherKind::Domain => host.as_deref() == Some(matcher.value.as_str()),
                MatcherKind::Path => path == matcher.value,
                MatcherKind::PathStartsWith => path.starts_with(&matcher.value),
            };
            if hit {
                return &cache_type.name;
            }
        }
    }
    DEFAULT_CACHE_NAME
}

/// Host and path of a URL; a relative URL is all path.
fn split_url(url: &str) -> (Option<String>, String) {
    match Url::parse(url) {
        Ok(parsed) => (
            parsed.host_str().map(|h| h.to_string()),
            parsed.path().to_string(),
        ),
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            (None, path.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
                "/manifest.90af.json".to_string(),
            ],
            movies: vec!["/movies/ab12.json".to_string()],
        }
    }

    #[test]
    fn first_match_wins() {
        let types = cache_types(&groups(), "h1", "image.tmdb.org");
        assert!(classify("/index.html", &types).starts_with("base-"));
        assert!(classify("/movies.4f2a.js", &types).starts_with("app-"));
        assert!(classify("/movies/ab12.json", &types).starts_with("movies-"));
    }

    #[test]
    fn unmatched_url_falls_into_default() {
        let types = cache_types(&groups(), "h1", "image.tmdb.org");
        assert_eq!(classify("/unknown.png", &types), DEFAULT_CACHE_NAME);
    }

    #[test]
    fn domain_matcher_catches_cross_origin_posters() {
        let types = cache_types(&groups(), "h1", "image.tmdb.org");
        let name = classify("https://image.tmdb.org/t/p/w342/abc.jpg", &types);
        assert!(name.starts_with("movies-"));
        assert_eq!(
            classify("https://example.com/t/p/w342/abc.jpg", &types),
            DEFAULT_CACHE_NAME
        );
    }

    #[test]
    fn path_prefix_matcher_catches_posters() {
        let types = cache_types(&groups(), "h1", "image.tmdb.org");
        assert!(classify("/posters/329865.jpg", &types).starts_with("movies-"));
    }

    #[test]
    fn absolute_same_origin_urls_classify_by_path() {
        let types = cache_types(&groups(), "h1", "image.tmdb.org");
        let name = classify("http://localhost:5000/movies.4f2a.js", &types);
        assert!(name.starts_with("app-"));
    }

    #[test]
    fn names_change_with_the_asset_set() {
        let before = cache_types(&groups(), "h1", "image.tmdb.org");
        let mut changed = groups();
        changed.app.push("/stats.77aa.js".to_string());
        let after = cache_types(&changed, "h1", "image.tmdb.org");
        assert_ne!(before[1].name, after[1].name);
        // The base partition depends on the app hash too.
        assert_ne!(before[0].name, after[0].name);
        // The movies partition is untouched.
        assert_eq!(before[2].name, after[2].name);
    }

    #[test]
    fn classification_is_total() {
        let types = cache_types(&groups(), "h1", "image.tmdb.org");
        for url in ["", "/", "???", "ftp://weird/host", "/a/b/c"] {
            // Never panics, always lands somewhere.
            let _ = classify(url, &types);
        }
    }
}
