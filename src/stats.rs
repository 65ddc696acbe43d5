//! Aggregate statistics over the movie library.
//!
//! A single pass over the curated records accumulates independent frequency
//! tables. Sort orders are fixed here so the presentation layer never
//! re-sorts: ordinal axes (rating, year, month, runtime bucket) ascend by
//! label, nominal axes (actor, director, genre, language) descend by count.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{SourceMovie, StatEntry};

/// All frequency tables extracted from the library.
#[derive(Debug, Default, Serialize)]
pub struct Stats {
    pub ratings: Vec<StatEntry>,
    pub months: Vec<StatEntry>,
    pub release_years: Vec<StatEntry>,
    pub runtimes: Vec<StatEntry>,
    pub actors: Vec<StatEntry>,
    pub directors: Vec<StatEntry>,
    pub genres: Vec<StatEntry>,
    pub languages: Vec<StatEntry>,
    pub movies_count: usize,
    pub actors_count: usize,
    pub directors_count: usize,
}

/// Format a runtime in minutes as `HHhMM`.
pub fn readable_runtime(minutes: i64) -> String {
    let minutes = minutes.max(0);
    format!("{:02}h{:02}", minutes / 60, minutes % 60)
}

/// Reduce the movie list into its frequency tables.
///
/// Multi-valued fields (cast, genres) contribute one increment per element.
pub fn extract_stats(movies: &[SourceMovie]) -> Stats {
    let mut ratings: HashMap<String, u64> = HashMap::new();
    let mut months: HashMap<String, u64> = HashMap::new();
    let mut release_years: HashMap<String, u64> = HashMap::new();
    let mut runtimes: HashMap<String, u64> = HashMap::new();
    let mut actors: HashMap<String, u64> = HashMap::new();
    let mut directors: HashMap<String, u64> = HashMap::new();
    let mut genres: HashMap<String, u64> = HashMap::new();
    let mut languages: HashMap<String, u64> = HashMap::new();

    for movie in movies {
        *ratings.entry(movie.rating.to_string()).or_default() += 1;
        if let Some(month) = movie.watch_month() {
            *months.entry(month.to_string()).or_default() += 1;
        }
        *release_years
            .entry(movie.release_year().to_string())
            .or_default() += 1;
        *runtimes
            .entry(readable_runtime(movie.runtime))
            .or_default() += 1;
        for actor in &movie.cast {
            *actors.entry(actor.clone()).or_default() += 1;
        }
        *directors.entry(movie.director.clone()).or_default() += 1;
        for genre in &movie.genres {
            *genres.entry(genre.clone()).or_default() += 1;
        }
        *languages.entry(movie.language.clone()).or_default() += 1;
    }

    let actors = by_count_desc(actors);
    let directors = by_count_desc(directors);
    Stats {
        ratings: by_label_asc(ratings),
        months: by_label_asc(months),
        release_years: by_label_asc(release_years),
        runtimes: by_label_asc(runtimes),
        genres: by_count_desc(genres),
        languages: by_count_desc(languages),
        movies_count: movies.len(),
        actors_count: actors.len(),
        directors_count: directors.len(),
        actors,
        directors,
    }
}

fn by_label_asc(table: HashMap<String, u64>) -> Vec<StatEntry> {
    let mut entries: Vec<StatEntry> = table
        .into_iter()
        .map(|(label, count)| StatEntry { label, count })
        .collect();
    entries.sort_by(|a, b| a.label.cmp(&b.label));
    entries
}

fn by_count_desc(table: HashMap<String, u64>) -> Vec<StatEntry> {
    let mut entries: Vec<StatEntry> = table
        .into_iter()
        .map(|(label, count)| StatEntry { label, count })
        .collect();
    // Ties break on label so shard content (and its hash) is deterministic.
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.label.cmp(&b.label)));
    entries
}
