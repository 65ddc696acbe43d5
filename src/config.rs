//! Configuration for the movielog toolchain.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Poster CDN whose cross-origin images join the movies cache partition.
pub const DEFAULT_POSTER_DOMAIN: &str = "image.tmdb.org";

/// Resolved settings used by every command.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root of the curated library (one JSON file per watch year).
    pub movies_dir: PathBuf,
    /// Static frontend files copied into the build with hashed names.
    pub frontend_dir: PathBuf,
    /// Build output directory.
    pub dist_dir: PathBuf,
    /// Site title used in pages and the web-app manifest.
    pub site_name: String,
    pub site_description: String,
    pub theme_color: String,
    pub background_color: String,
    /// External poster CDN domain, matched by the movies cache partition.
    pub poster_domain: String,
    /// Dev server bind address.
    pub host: String,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            movies_dir: PathBuf::from("movies"),
            frontend_dir: PathBuf::from("frontend"),
            dist_dir: PathBuf::from(".dist"),
            site_name: "Movies".to_string(),
            site_description: "A big movies list with stats".to_string(),
            theme_color: "#ffcf20".to_string(),
            background_color: "#000000".to_string(),
            poster_domain: DEFAULT_POSTER_DOMAIN.to_string(),
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl Settings {
    /// Posters live alongside the curated records.
    pub fn posters_dir(&self) -> PathBuf {
        self.movies_dir.join("posters")
    }

    /// Ensure the library directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.movies_dir)?;
        fs::create_dir_all(self.posters_dir())?;
        Ok(())
    }
}

/// Optional `movielog.toml` configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub movies_dir: Option<String>,
    #[serde(default)]
    pub frontend_dir: Option<String>,
    #[serde(default)]
    pub dist_dir: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default)]
    pub site_description: Option<String>,
    #[serde(default)]
    pub theme_color: Option<String>,
    #[serde(default)]
    pub background_color: Option<String>,
    #[serde(default)]
    pub poster_domain: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Config {
    /// Load the config file, or defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply configuration to settings, expanding `~` in paths.
    pub fn apply_to_settings(&self, settings: &mut Settings) {
        if let Some(ref dir) = self.movies_dir {
            settings.movies_dir = expand(dir);
        }
        if let Some(ref dir) = self.frontend_dir {
            settings.frontend_dir = expand(dir);
        }
        if let Some(ref dir) = self.dist_dir {
            settings.dist_dir = expand(dir);
        }
        if let Some(ref name) = self.site_name {
            settings.site_name = name.clone();
        }
        if let Some(ref description) = self.site_description {
            settings.site_description = description.clone();
        }
        if let Some(ref color) = self.theme_color {
            settings.theme_color = color.clone();
        }
        if let Some(ref color) = self.background_color {
            settings.background_color = color.clone();
        }
        if let Some(ref domain) = self.poster_domain {
            settings.poster_domain = domain.clone();
        }
        if let Some(ref host) = self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Load settings, optionally from an explicit config file path.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("movielog.toml"));
    let config = Config::load(&path)?;
    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings);
    Ok(settings)
}
