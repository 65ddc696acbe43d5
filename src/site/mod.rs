//! Static site build pipeline.
//!
//! Reads the curated library, computes stats, and writes the whole site:
//! content-hashed assets, the web-app manifest, paginated JSON shards, the
//! two HTML pages and the offline cache manifest consumed by the service
//! worker.

pub mod templates;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use indicatif::ProgressBar;
use tracing::info;

use crate::assets::{cache_types, short_hash, AssetGroups};
use crate::config::Settings;
use crate::models::{CacheType, SourceMovie, StatEntry};
use crate::stats::{extract_stats, Stats};

/// First movie shard is small to front-load the initial paint.
pub const FIRST_MOVIE_SHARD_SIZE: usize = 50;
pub const MOVIE_SHARD_SIZE: usize = 200;
pub const ACTOR_SHARD_SIZE: usize = 1000;
pub const DIRECTOR_SHARD_SIZE: usize = 500;

/// Name of the cache-classification manifest consumed by the worker.
pub const CACHE_MANIFEST: &str = "cache-manifest.json";

/// Everything a build produced, for callers and tests.
#[derive(Debug)]
pub struct BuildOutput {
    pub dist_dir: PathBuf,
    pub movies_count: usize,
    pub movie_shards: Vec<String>,
    pub actor_shards: Vec<String>,
    pub director_shards: Vec<String>,
    /// Source-relative name to hashed URL.
    pub assets: BTreeMap<String, String>,
    pub offline_assets: Vec<String>,
    pub cache_types: Vec<CacheType>,
}

/// Run the whole build. Any failure aborts the generation.
pub fn build(settings: &Settings) -> anyhow::Result<BuildOutput> {
    let started = Instant::now();
    let dist = settings.dist_dir.clone();

    info!("Cleaning {}", dist.display());
    clean_dist(&dist)?;

    info!("Writing static assets");
    let mut assets = copy_hashed_assets(&settings.frontend_dir, &dist)?;

    info!("Writing manifest");
    let manifest_url = write_manifest(settings, &assets, &dist)?;
    assets.insert("manifest".to_string(), manifest_url);

    info!("Reading movies list");
    let movies = read_movies(&settings.movies_dir)?;
    let stats = extract_stats(&movies);

    info!("Writing movies data");
    let movie_shards = write_movie_shards(&movies, &dist)?;

    info!("Writing actors and directors");
    let actor_shards = write_stat_shards(&stats.actors, "actors", ACTOR_SHARD_SIZE, &dist)?;
    let director_shards =
        write_stat_shards(&stats.directors, "directors", DIRECTOR_SHARD_SIZE, &dist)?;

    info!("Copying posters");
    copy_posters(&settings.posters_dir(), &dist)?;

    info!("Rendering pages");
    let groups = asset_groups(&assets, &movie_shards, &actor_shards, &director_shards);
    let offline_assets = groups.all();
    let html_hash = render_pages(settings, &assets, &stats, &movie_shards, &groups, &dist)?;

    info!("Writing cache manifest");
    let cache_types = cache_types(&groups, &html_hash, &settings.poster_domain);
    let json = serde_json::to_vec_pretty(&cache_types)?;
    fs::write(dist.join(CACHE_MANIFEST), json)?;

    info!("Built in {:.2?}", started.elapsed());
    Ok(BuildOutput {
        dist_dir: dist,
        movies_count: movies.len(),
        movie_shards,
        actor_shards,
        director_shards,
        assets,
        offline_assets,
        cache_types,
    })
}

/// Read the cache-classification table back from a build directory.
pub fn load_cache_manifest(dist_dir: &Path) -> anyhow::Result<Vec<CacheType>> {
    let path = dist_dir.join(CACHE_MANIFEST);
    let contents = fs::read(&path)
        .with_context(|| format!("could not read {}", path.display()))?;
    let types = serde_json::from_slice(&contents)?;
    Ok(types)
}

fn clean_dist(dist: &Path) -> anyhow::Result<()> {
    if dist.exists() {
        fs::remove_dir_all(dist)?;
    }
    fs::create_dir_all(dist)?;
    Ok(())
}

/// Copy every frontend file into the build root with a content hash in its
/// name, and return the source-relative name to URL map.
fn copy_hashed_assets(
    frontend_dir: &Path,
    dist: &Path,
) -> anyhow::Result<BTreeMap<String, String>> {
    let mut assets = BTreeMap::new();
    if !frontend_dir.exists() {
        return Ok(assets);
    }
    let mut files = Vec::new();
    collect_files(frontend_dir, &mut files)?;
    files.sort();
    for file in files {
        let contents = fs::read(&file)?;
        let hash = short_hash(&contents);
        let stem = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let ext = file
            .extension()
            .and_then(|s| s.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let hashed_name = format!("{stem}.{hash}{ext}");
        fs::write(dist.join(&hashed_name), &contents)?;
        let key = file
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        assets.insert(key, format!("/{hashed_name}"));
    }
    Ok(assets)
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, files)?;
        } else {
            files.push(path);
        }
    }
    Ok(())
}

/// Write the web-app manifest and return its hashed URL.
fn write_manifest(
    settings: &Settings,
    assets: &BTreeMap<String, String>,
    dist: &Path,
) -> anyhow::Result<String> {
    let icons: Vec<serde_json::Value> = ["256", "512"]
        .iter()
        .filter_map(|size| {
            assets.get(&format!("logo-{size}.png")).map(|url| {
                serde_json::json!({
                    "src": url,
                    "sizes": format!("{size}x{size}"),
                    "type": "image/png",
                })
            })
        })
        .collect();
    let manifest = serde_json::json!({
        "name": settings.site_name,
        "short_name": settings.site_name,
        "display": "standalone",
        "background_color": settings.background_color,
        "description": settings.site_description,
        "start_url": "/",
        "icons": icons,
        "orientation": "any",
        "theme_color": settings.theme_color,
    });
    let json = serde_json::to_vec(&manifest)?;
    let name = format!("manifest.{}.json", short_hash(&json));
    fs::write(dist.join(&name), &json)?;
    Ok(format!("/{name}"))
}

/// Read and concatenate the year files, most recent watches first.
pub fn read_movies(movies_dir: &Path) -> anyhow::Result<Vec<SourceMovie>> {
    let mut files: Vec<PathBuf> = fs::read_dir(movies_dir)
        .with_context(|| format!("could not read {}", movies_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    let mut movies = Vec::new();
    for file in files {
        let contents = fs::read_to_string(&file)?;
        let mut parsed: Vec<SourceMovie> = serde_json::from_str(&contents)
            .with_context(|| format!("malformed movie file {}", file.display()))?;
        movies.append(&mut parsed);
    }
    // Year files ascend and each file ascends by watch date; reversing
    // puts the most recently watched movies first.
    movies.reverse();
    Ok(movies)
}

fn write_movie_shards(movies: &[SourceMovie], dist: &Path) -> anyhow::Result<Vec<String>> {
    let published: Vec<_> = movies.iter().map(SourceMovie::to_movie).collect();
    let mut shards = Vec::new();
    let mut chunks = Vec::new();
    if published.len() > FIRST_MOVIE_SHARD_SIZE {
        let (first, rest) = published.split_at(FIRST_MOVIE_SHARD_SIZE);
        chunks.push(first);
        chunks.extend(rest.chunks(MOVIE_SHARD_SIZE));
    } else {
        chunks.push(&published[..]);
    }

    let progress = ProgressBar::new(chunks.len() as u64);
    fs::create_dir_all(dist.join("movies"))?;
    for chunk in chunks {
        let json = serde_json::to_vec(chunk)?;
        let url = format!("/movies/{}.json", short_hash(&json));
        fs::write(dist.join(&url[1..]), &json)?;
        shards.push(url);
        progress.inc(1);
    }
    progress.finish_and_clear();
    Ok(shards)
}

fn write_stat_shards(
    entries: &[StatEntry],
    kind: &str,
    shard_size: usize,
    dist: &Path,
) -> anyhow::Result<Vec<String>> {
    let mut shards = Vec::new();
    fs::create_dir_all(dist.join(kind))?;
    for chunk in entries.chunks(shard_size.max(1)) {
        let json = serde_json::to_vec(chunk)?;
        let url = format!("/{kind}/{}.json", short_hash(&json));
        fs::write(dist.join(&url[1..]), &json)?;
        shards.push(url);
    }
    Ok(shards)
}

fn copy_posters(posters_dir: &Path, dist: &Path) -> anyhow::Result<()> {
    if !posters_dir.exists() {
        return Ok(());
    }
    let mut files = Vec::new();
    collect_files(posters_dir, &mut files)?;
    let dest = dist.join("posters");
    fs::create_dir_all(&dest)?;
    let progress = ProgressBar::new(files.len() as u64);
    for file in files {
        if let Some(name) = file.file_name() {
            fs::copy(&file, dest.join(name))?;
        }
        progress.inc(1);
    }
    progress.finish_and_clear();
    Ok(())
}

fn asset_groups(
    assets: &BTreeMap<String, String>,
    movie_shards: &[String],
    actor_shards: &[String],
    director_shards: &[String],
) -> AssetGroups {
    let mut app: Vec<String> = assets.values().cloned().collect();
    app.sort();
    let mut movies = movie_shards.to_vec();
    movies.extend(actor_shards.iter().cloned());
    movies.extend(director_shards.iter().cloned());
    AssetGroups {
        base: vec![
            "/".to_string(),
            "/index.html".to_string(),
            "/stats/".to_string(),
            "/stats/index.html".to_string(),
        ],
        app,
        movies,
    }
}

/// Render both pages and return the hash covering their content.
fn render_pages(
    settings: &Settings,
    assets: &BTreeMap<String, String>,
    stats: &Stats,
    movie_shards: &[String],
    groups: &AssetGroups,
    dist: &Path,
) -> anyhow::Result<String> {
    let manifest_url = assets.get("manifest").cloned().unwrap_or_default();
    let favicon_url = assets.get("favicon.png").map(|s| s.as_str());
    let offline_assets = groups.all();

    let movies_html = templates::movies_page(&templates::MoviesPage {
        site_name: &settings.site_name,
        site_description: &settings.site_description,
        theme_color: &settings.theme_color,
        manifest_url: &manifest_url,
        favicon_url,
        movies_count: stats.movies_count,
        movie_files: movie_shards,
        offline_assets: &offline_assets,
        script_url: assets.get("movies.js").map(|s| s.as_str()),
    });
    fs::write(dist.join("index.html"), &movies_html)?;

    let actor_shards: Vec<String> = groups
        .movies
        .iter()
        .filter(|url| url.starts_with("/actors/"))
        .cloned()
        .collect();
    let director_shards: Vec<String> = groups
        .movies
        .iter()
        .filter(|url| url.starts_with("/directors/"))
        .cloned()
        .collect();
    let stats_html = templates::stats_page(&templates::StatsPage {
        site_name: &settings.site_name,
        theme_color: &settings.theme_color,
        manifest_url: &manifest_url,
        favicon_url,
        movies_count: stats.movies_count,
        ratings: &stats.ratings,
        release_years: &stats.release_years,
        months: &stats.months,
        actor_files: &actor_shards,
        actors_count: stats.actors_count,
        director_files: &director_shards,
        directors_count: stats.directors_count,
        script_url: assets.get("stats.js").map(|s| s.as_str()),
    });
    fs::create_dir_all(dist.join("stats"))?;
    fs::write(dist.join("stats").join("index.html"), &stats_html)?;

    let mut combined = movies_html.into_bytes();
    combined.extend_from_slice(stats_html.as_bytes());
    Ok(short_hash(&combined))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(title: &str, watch_date: &str) -> SourceMovie {
        SourceMovie {
            title: title.to_string(),
            original_title: title.to_string(),
            watch_date: Some(watch_date.to_string()),
            rating: 7,
            release_date: "2000-01-01".to_string(),
            director: "Someone".to_string(),
            tmdb_id: 1,
            runtime: 100,
            language: "en".to_string(),
            poster: String::new(),
            cast: vec!["An Actor".to_string()],
            genres: vec!["Drama".to_string()],
        }
    }

    #[test]
    fn movies_are_read_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let a = vec![movie("Old", "2011-02-01"), movie("Older", "2011-06-01")];
        let b = vec![movie("New", "2012-03-01")];
        fs::write(dir.path().join("2011.json"), serde_json::to_vec(&a).unwrap()).unwrap();
        fs::write(dir.path().join("2012.json"), serde_json::to_vec(&b).unwrap()).unwrap();

        let movies = read_movies(dir.path()).unwrap();
        let titles: Vec<&str> = movies.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Older", "Old"]);
    }

    #[test]
    fn malformed_movie_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2011.json"), b"not json").unwrap();
        assert!(read_movies(dir.path()).is_err());
    }

    #[test]
    fn movie_shards_split_first_small_then_large() {
        let dist = tempfile::tempdir().unwrap();
        let movies: Vec<SourceMovie> = (0..260)
            .map(|i| movie(&format!("M{i}"), "2015-01-01"))
            .collect();
        let shards = write_movie_shards(&movies, dist.path()).unwrap();
        // 260 movies = 50 + 200 + 10.
        assert_eq!(shards.len(), 3);
        let first: Vec<serde_json::Value> =
            serde_json::from_slice(&fs::read(dist.path().join(&shards[0][1..])).unwrap()).unwrap();
        assert_eq!(first.len(), 50);
        let second: Vec<serde_json::Value> =
            serde_json::from_slice(&fs::read(dist.path().join(&shards[1][1..])).unwrap()).unwrap();
        assert_eq!(second.len(), 200);
    }

    #[test]
    fn small_library_fits_one_shard() {
        let dist = tempfile::tempdir().unwrap();
        let movies: Vec<SourceMovie> = (0..3).map(|i| movie(&format!("M{i}"), "2015-01-01")).collect();
        let shards = write_movie_shards(&movies, dist.path()).unwrap();
        assert_eq!(shards.len(), 1);
    }
}
