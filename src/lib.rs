//! Movielog: a personal movie-log static-site generator.
//!
//! Reads hand-curated JSON records of watched movies, computes aggregate
//! statistics, and emits a static site with content-hashed assets, paginated
//! JSON shards and an offline cache manifest. The client-side runtime
//! behaviors (search filters, virtualized grid, offline saving and the
//! service-worker cache protocol) are modeled as headless engines so they
//! can be exercised without a browser.

pub mod assets;
pub mod config;
pub mod filters;
pub mod grid;
pub mod import;
pub mod models;
pub mod offline;
pub mod server;
pub mod site;
pub mod stats;
pub mod worker;

pub use config::Settings;
pub use models::{CacheType, Matcher, MatcherKind, Movie, MovieId, SourceMovie, StatEntry};
