//! Core data model: curated movie records, their published form, stat
//! entries and the cache-classification table shared by the build pipeline
//! and the service-worker protocol.

use serde::{Deserialize, Serialize};

/// Identifies a movie by its position in the loaded list.
///
/// Records are immutable after load, so the index is stable for the whole
/// page session and cheap to use as a map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MovieId(pub usize);

/// A curated movie record as stored in `movies/<year>.json`.
///
/// This is the hand-maintained source of truth, one file per watch year
/// (plus `_unsorted.json` for entries without a watch date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMovie {
    pub title: String,
    pub original_title: String,
    #[serde(default)]
    pub watch_date: Option<String>,
    pub rating: i64,
    pub release_date: String,
    pub director: String,
    pub tmdb_id: i64,
    #[serde(default)]
    pub runtime: i64,
    #[serde(default = "default_language")]
    pub language: String,
    pub poster: String,
    pub cast: Vec<String>,
    pub genres: Vec<String>,
}

fn default_language() -> String {
    "en".to_string()
}

impl SourceMovie {
    /// Year part of the release date.
    pub fn release_year(&self) -> &str {
        year_of(&self.release_date)
    }

    /// Year part of the watch date, empty for unwatched entries.
    pub fn watch_year(&self) -> &str {
        self.watch_date.as_deref().map(year_of).unwrap_or("")
    }

    /// `YYYY-MM` part of the watch date, if any.
    pub fn watch_month(&self) -> Option<&str> {
        self.watch_date.as_deref().map(|date| {
            let end = date.len().min(7);
            &date[..end]
        })
    }

    /// Derive the published record served to the frontend.
    pub fn to_movie(&self) -> Movie {
        Movie {
            title: self.title.clone(),
            full_title: format!("{} {}", self.title, self.original_title),
            director: self.director.clone(),
            cast: self.cast.clone(),
            released: self.release_year().to_string(),
            watched: self.watch_year().to_string(),
            genres: self.genres.clone(),
            rating: self.rating.to_string(),
            runtime: crate::stats::readable_runtime(self.runtime),
            lang: self.language.clone(),
            poster: self.poster.clone(),
            url: format!("https://www.themoviedb.org/movie/{}", self.tmdb_id),
        }
    }
}

fn year_of(date: &str) -> &str {
    let end = date.len().min(4);
    &date[..end]
}

/// A published movie record, immutable after load.
///
/// `released` is always present; `watched` is empty for unwatched entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub title: String,
    pub full_title: String,
    pub director: String,
    pub cast: Vec<String>,
    pub released: String,
    pub watched: String,
    pub genres: Vec<String>,
    pub rating: String,
    pub runtime: String,
    pub lang: String,
    pub poster: String,
    pub url: String,
}

/// One label/count pair in a frequency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatEntry {
    pub label: String,
    pub count: u64,
}

impl StatEntry {
    pub fn new(label: impl Into<String>, count: u64) -> Self {
        Self {
            label: label.into(),
            count,
        }
    }
}

/// How a single cache matcher compares against a request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatcherKind {
    Domain,
    Path,
    PathStartsWith,
}

/// One ordered rule inside a cache type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Matcher {
    pub kind: MatcherKind,
    pub value: String,
}

impl Matcher {
    pub fn domain(value: impl Into<String>) -> Self {
        Self {
            kind: MatcherKind::Domain,
            value: value.into(),
        }
    }

    pub fn path(value: impl Into<String>) -> Self {
        Self {
            kind: MatcherKind::Path,
            value: value.into(),
        }
    }

    pub fn path_starts_with(value: impl Into<String>) -> Self {
        Self {
            kind: MatcherKind::PathStartsWith,
            value: value.into(),
        }
    }
}

/// A named cache partition and the rules that route requests into it.
///
/// The name embeds a content hash of the matched asset set, so any change
/// to that set renames the partition and orphans the old one for cleanup
/// on service-worker activation. Matchers are evaluated in list order and
/// the first match wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheType {
    pub name: String,
    pub matches: Vec<Matcher>,
}
