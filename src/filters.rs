//! Search filter engine.
//!
//! Parses a free-text, `;`-delimited query into typed filters and evaluates
//! them against movie records. A movie matches when every filter passes:
//! multiple terms narrow the result set, never widen it.

use regex::{Regex, RegexBuilder};

use crate::models::Movie;

/// The filterable movie attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Rating,
    Actor,
    Director,
    Title,
    Released,
    Watched,
    Genre,
    Runtime,
    Language,
}

impl FilterKind {
    /// Recognize a `type:` prefix in a search term.
    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "rating" => Some(Self::Rating),
            "actor" => Some(Self::Actor),
            "director" => Some(Self::Director),
            "title" => Some(Self::Title),
            "released" => Some(Self::Released),
            "watched" => Some(Self::Watched),
            "genre" => Some(Self::Genre),
            "runtime" => Some(Self::Runtime),
            "language" => Some(Self::Language),
            _ => None,
        }
    }

    /// Exact-match kinds compare string equality instead of pattern search.
    fn is_exact(self) -> bool {
        matches!(self, Self::Rating | Self::Language)
    }
}

/// One parsed search term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub kind: FilterKind,
    pub value: String,
}

/// Parse a raw query into an ordered filter list.
///
/// Terms are split on `;`, trimmed and lowercased. A term with a recognized
/// `type:` prefix and a non-empty value becomes a typed filter; anything
/// else (including unrecognized prefixes) falls into the default title
/// bucket so plain search text keeps working.
pub fn parse_filters(raw_query: &str) -> Vec<Filter> {
    let mut filters = Vec::new();
    for term in raw_query.split(';') {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            continue;
        }
        let typed = term.split_once(':').and_then(|(prefix, value)| {
            let kind = FilterKind::from_prefix(prefix)?;
            if value.is_empty() {
                return None;
            }
            Some(Filter {
                kind,
                value: value.to_string(),
            })
        });
        filters.push(typed.unwrap_or(Filter {
            kind: FilterKind::Title,
            value: term,
        }));
    }
    filters
}

/// Decode the initial query carried by a shareable URL fragment.
pub fn initial_query(fragment: &str) -> String {
    let raw = fragment.strip_prefix('#').unwrap_or(fragment);
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

/// A user-supplied pattern, compiled once per filter.
///
/// Malformed regex syntax falls back to a literal substring test for that
/// term only; evaluation never fails.
#[derive(Debug)]
enum Pattern {
    Regex(Regex),
    Literal(String),
}

impl Pattern {
    fn compile(value: &str) -> Self {
        match RegexBuilder::new(value).case_insensitive(true).build() {
            Ok(regex) => Self::Regex(regex),
            Err(_) => Self::Literal(value.to_string()),
        }
    }

    fn is_match(&self, haystack: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(haystack),
            Self::Literal(needle) => haystack.to_lowercase().contains(needle),
        }
    }
}

#[derive(Debug)]
struct CompiledFilter {
    kind: FilterKind,
    value: String,
    pattern: Option<Pattern>,
}

/// A compiled filter list, ready for repeated evaluation.
#[derive(Debug)]
pub struct FilterSet {
    filters: Vec<CompiledFilter>,
}

impl FilterSet {
    pub fn new(filters: Vec<Filter>) -> Self {
        let filters = filters
            .into_iter()
            .map(|filter| CompiledFilter {
                pattern: (!filter.kind.is_exact()).then(|| Pattern::compile(&filter.value)),
                kind: filter.kind,
                value: filter.value,
            })
            .collect();
        Self { filters }
    }

    /// Parse and compile in one step.
    pub fn from_query(raw_query: &str) -> Self {
        Self::new(parse_filters(raw_query))
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// A movie matches iff all filters pass. An empty set matches everything.
    pub fn matches(&self, movie: &Movie) -> bool {
        self.filters.iter().all(|filter| filter.matches(movie))
    }
}

impl CompiledFilter {
    fn matches(&self, movie: &Movie) -> bool {
        match self.kind {
            FilterKind::Rating => movie.rating == self.value,
            FilterKind::Language => movie.lang.to_lowercase() == self.value,
            FilterKind::Title => self.search(&movie.full_title),
            FilterKind::Director => self.search(&movie.director),
            FilterKind::Released => self.search(&movie.released),
            FilterKind::Watched => self.search(&movie.watched),
            FilterKind::Runtime => self.search(&movie.runtime),
            FilterKind::Actor => movie.cast.iter().any(|actor| self.search(actor)),
            FilterKind::Genre => movie.genres.iter().any(|genre| self.search(genre)),
        }
    }

    fn search(&self, haystack: &str) -> bool {
        match &self.pattern {
            Some(pattern) => pattern.is_match(haystack),
            None => false,
        }
    }
}
