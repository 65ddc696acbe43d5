//! HTML templates for the generated pages.

use crate::models::StatEntry;

/// Context for the movie gallery page.
pub struct MoviesPage<'a> {
    pub site_name: &'a str,
    pub site_description: &'a str,
    pub theme_color: &'a str,
    pub manifest_url: &'a str,
    pub favicon_url: Option<&'a str>,
    pub movies_count: usize,
    /// Movie shard URLs, first one front-loading the initial paint.
    pub movie_files: &'a [String],
    /// Every URL the offline save downloads.
    pub offline_assets: &'a [String],
    pub script_url: Option<&'a str>,
}

/// Context for the stats dashboard page.
pub struct StatsPage<'a> {
    pub site_name: &'a str,
    pub theme_color: &'a str,
    pub manifest_url: &'a str,
    pub favicon_url: Option<&'a str>,
    pub movies_count: usize,
    pub ratings: &'a [StatEntry],
    pub release_years: &'a [StatEntry],
    pub months: &'a [StatEntry],
    pub actor_files: &'a [String],
    pub actors_count: usize,
    pub director_files: &'a [String],
    pub directors_count: usize,
    pub script_url: Option<&'a str>,
}

fn page_head(title: &str, theme_color: &str, manifest_url: &str, favicon_url: Option<&str>) -> String {
    let favicon = favicon_url
        .map(|url| format!(r#"<link rel="icon" type="image/png" href="{url}">"#))
        .unwrap_or_default();
    format!(
        r#"<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="theme-color" content="{theme_color}">
<title>{title}</title>
<link rel="manifest" href="{manifest_url}">
{favicon}"#
    )
}

/// Render the movie gallery page.
pub fn movies_page(page: &MoviesPage) -> String {
    let head = page_head(
        page.site_name,
        page.theme_color,
        page.manifest_url,
        page.favicon_url,
    );
    let config = serde_json::json!({
        "moviesCount": page.movies_count,
        "moviesFiles": page.movie_files,
        "offlineAssets": page.offline_assets,
    });
    let script = page.script_url
        .map(|url| format!(r#"<script src="{url}"></script>"#))
        .unwrap_or_default();
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
{head}
<meta name="description" content="{description}">
</head>
<body>
<header data-js-header>
  <h1>{site_name}</h1>
  <input type="search" placeholder="Search (title, actor:, director:, rating:...)" data-js-search>
  <p><span data-js-movies-count>{movies_count}</span> movies</p>
  <button type="button" data-js-save-offline>Save for offline</button>
</header>
<main>
  <div data-js-movies-grid></div>
  <p hidden data-js-no-results>No movies found</p>
</main>
<script>window.MOVIELOG = {config}</script>
{script}
</body>
</html>
"#,
        description = page.site_description,
        site_name = page.site_name,
        movies_count = page.movies_count,
    )
}

/// Render the stats dashboard page.
pub fn stats_page(page: &StatsPage) -> String {
    let head = page_head(
        &format!("{} - Stats", page.site_name),
        page.theme_color,
        page.manifest_url,
        page.favicon_url,
    );
    let config = serde_json::json!({
        "moviesByRating": page.ratings,
        "moviesByReleaseYears": page.release_years,
        "moviesByMonth": page.months,
        "actorsFiles": page.actor_files,
        "actorsCount": page.actors_count,
        "directorsFiles": page.director_files,
        "directorsCount": page.directors_count,
    });
    let script = page.script_url
        .map(|url| format!(r#"<script src="{url}"></script>"#))
        .unwrap_or_default();
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
{head}
</head>
<body>
<header>
  <h1>{site_name} stats</h1>
  <p>{movies_count} movies</p>
  <nav><a href="../">Back to the list</a></nav>
</header>
<main>
  <canvas data-js-stats-movies-by-rating></canvas>
  <canvas data-js-stats-movies-by-release-years></canvas>
  <canvas data-js-stats-movies-by-month></canvas>
  <section>
    <h2>Actors</h2>
    <table data-js-stats-actors-list></table>
    <button type="button" data-js-stats-more-actors>more...</button>
  </section>
  <section>
    <h2>Directors</h2>
    <table data-js-stats-directors-list></table>
    <button type="button" data-js-stats-more-directors>more...</button>
  </section>
</main>
<script>window.MOVIELOG_STATS = {config}</script>
{script}
</body>
</html>
"#,
        site_name = page.site_name,
        movies_count = page.movies_count,
    )
}
