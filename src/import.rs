//! Interactive TMDB import.
//!
//! Searches the movie-metadata API, lets the user pick a result and enter
//! their rating and watch date, downloads the poster, and appends the
//! normalized record to the matching year file. Thin I/O wrapper: the rest
//! of the toolchain only consumes its JSON output.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use console::style;
use serde::Deserialize;

use crate::config::Settings;
use crate::models::SourceMovie;

const TMDB_API: &str = "https://api.themoviedb.org/3";
const POSTER_SIZE: &str = "w342";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct SearchResult {
    pub id: i64,
    pub title: String,
    pub original_title: String,
    #[serde(default)]
    pub release_date: String,
}

#[derive(Debug, Deserialize)]
pub struct MovieDetails {
    id: i64,
    title: String,
    original_title: String,
    #[serde(default)]
    release_date: String,
    #[serde(default)]
    runtime: Option<i64>,
    #[serde(default)]
    original_language: String,
    #[serde(default)]
    genres: Vec<Genre>,
    #[serde(default)]
    poster_path: Option<String>,
    credits: Credits,
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct Credits {
    #[serde(default)]
    cast: Vec<CastMember>,
    #[serde(default)]
    crew: Vec<CrewMember>,
}

#[derive(Debug, Deserialize)]
struct CastMember {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CrewMember {
    name: String,
    job: String,
}

/// TMDB API client.
pub struct TmdbClient {
    client: reqwest::Client,
    api_key: String,
}

impl TmdbClient {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("movielog/0.3")
            .build()?;
        Ok(Self { client, api_key })
    }

    pub async fn search(&self, query: &str) -> anyhow::Result<Vec<SearchResult>> {
        let url = format!("{TMDB_API}/search/movie");
        let response: SearchResponse = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("query", query)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.results)
    }

    pub async fn details(&self, movie_id: i64) -> anyhow::Result<MovieDetails> {
        let url = format!("{TMDB_API}/movie/{movie_id}");
        let details = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("append_to_response", "credits"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(details)
    }

    pub async fn download_poster(&self, poster_path: &str, dest: &Path) -> anyhow::Result<()> {
        let url = format!("https://image.tmdb.org/t/p/{POSTER_SIZE}{poster_path}");
        let bytes = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        fs::write(dest, &bytes)?;
        Ok(())
    }
}

/// Run the interactive import flow.
pub async fn run(settings: &Settings, api_key: String) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let client = TmdbClient::new(api_key)?;

    let query = prompt("Movie to import: ")?;
    let results = client.search(&query).await?;
    if results.is_empty() {
        bail!("No matching movies found");
    }
    for (index, result) in results.iter().enumerate() {
        let original = if result.original_title != result.title {
            format!(" ({})", result.original_title)
        } else {
            String::new()
        };
        let year = result.release_date.get(..4).unwrap_or("????");
        println!(
            "{} {} ({year}){original} - https://www.themoviedb.org/movie/{}",
            style(format!("{index}.")).bold(),
            result.title,
            result.id
        );
    }

    let selection: usize = prompt("Select a movie: ")?.parse()?;
    let selected = results
        .get(selection)
        .context("selection out of range")?;
    let rating: i64 = prompt("Rating (0-10): ")?.parse()?;
    let watch_date = prompt("Watch date (YYYY-MM-DD or empty if unknown): ")?;
    let watch_date = if watch_date.is_empty() {
        None
    } else {
        NaiveDate::parse_from_str(&watch_date, "%Y-%m-%d")
            .context("watch date must be YYYY-MM-DD")?;
        Some(watch_date)
    };

    let details = client.details(selected.id).await?;
    let director = details
        .credits
        .crew
        .iter()
        .find(|member| member.job == "Director")
        .map(|member| member.name.clone())
        .context("no director in credits")?;
    let mut genres: Vec<String> = details.genres.into_iter().map(|g| g.name).collect();
    genres.sort();

    let poster = format!("posters/{}.jpg", details.id);
    if let Some(ref poster_path) = details.poster_path {
        client
            .download_poster(poster_path, &settings.movies_dir.join(&poster))
            .await?;
    }

    let movie = SourceMovie {
        title: details.title,
        original_title: details.original_title,
        watch_date,
        rating,
        release_date: details.release_date,
        director,
        tmdb_id: details.id,
        runtime: details.runtime.unwrap_or_default(),
        language: details.original_language,
        poster,
        cast: details.credits.cast.into_iter().map(|c| c.name).collect(),
        genres,
    };
    append_movie(settings, movie)?;
    println!("{}", style("Movie saved").green());
    Ok(())
}

/// Append a record to its year file, keeping the file sorted.
pub fn append_movie(settings: &Settings, movie: SourceMovie) -> anyhow::Result<()> {
    let filename = movie
        .watch_date
        .as_deref()
        .map(|date| format!("{}.json", &date[..date.len().min(4)]))
        .unwrap_or_else(|| "_unsorted.json".to_string());
    let path = settings.movies_dir.join(filename);

    let mut movies: Vec<SourceMovie> = if path.exists() {
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("could not read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("malformed movie file {}", path.display()))?
    } else {
        Vec::new()
    };
    movies.push(movie);
    movies.sort_by(|a, b| {
        a.watch_date
            .cmp(&b.watch_date)
            .then_with(|| a.title.cmp(&b.title))
    });
    let json = serde_json::to_string_pretty(&movies)?;
    fs::write(&path, json)?;
    Ok(())
}

fn prompt(message: &str) -> anyhow::Result<String> {
    print!("{message}");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(title: &str, watch_date: Option<&str>) -> SourceMovie {
        SourceMovie {
            title: title.to_string(),
            original_title: title.to_string(),
            watch_date: watch_date.map(|s| s.to_string()),
            rating: 7,
            release_date: "2000-01-01".to_string(),
            director: "Someone".to_string(),
            tmdb_id: 1,
            runtime: 100,
            language: "en".to_string(),
            poster: String::new(),
            cast: vec![],
            genres: vec![],
        }
    }

    fn settings(dir: &std::path::Path) -> Settings {
        Settings {
            movies_dir: dir.to_path_buf(),
            ..Settings::default()
        }
    }

    #[test]
    fn appends_into_the_watch_year_file() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        append_movie(&settings, movie("B", Some("2015-06-01"))).unwrap();
        append_movie(&settings, movie("A", Some("2015-02-01"))).unwrap();

        let contents = fs::read_to_string(dir.path().join("2015.json")).unwrap();
        let movies: Vec<SourceMovie> = serde_json::from_str(&contents).unwrap();
        let titles: Vec<&str> = movies.iter().map(|m| m.title.as_str()).collect();
        // Sorted by watch date.
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[test]
    fn unwatched_movies_land_in_unsorted() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());
        append_movie(&settings, movie("X", None)).unwrap();
        assert!(dir.path().join("_unsorted.json").exists());
    }
}
