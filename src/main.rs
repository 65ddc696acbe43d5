//! Movielog command line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use movielog::{config, import, server, site, stats};

#[derive(Parser)]
#[command(name = "movielog", version, about = "Personal movie log toolchain")]
struct Cli {
    /// Path to the configuration file (defaults to ./movielog.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate the static site.
    Build,
    /// Serve the generated site locally.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Import a movie from TMDB into the library.
    Import {
        #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
        api_key: String,
    },
    /// Print library statistics.
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("movielog=info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = config::load_settings(cli.config.as_deref())?;

    match cli.command {
        Command::Build => {
            let output = site::build(&settings)?;
            tracing::info!(
                "{} movies in {} shards",
                output.movies_count,
                output.movie_shards.len()
            );
        }
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| settings.host.clone());
            let port = port.unwrap_or(settings.port);
            server::serve(&settings.dist_dir, &host, port).await?;
        }
        Command::Import { api_key } => {
            import::run(&settings, api_key).await?;
        }
        Command::Stats => {
            let movies = site::read_movies(&settings.movies_dir)?;
            let stats = stats::extract_stats(&movies);
            println!("{} {}", style(stats.movies_count).bold(), "movies");
            println!("{} {}", style(stats.actors_count).bold(), "actors");
            println!("{} {}", style(stats.directors_count).bold(), "directors");
            print_table("By rating", &stats.ratings);
            print_table("By release year", &stats.release_years);
            print_table("Top genres", &stats.genres[..stats.genres.len().min(10)]);
            print_table("Top languages", &stats.languages[..stats.languages.len().min(10)]);
        }
    }
    Ok(())
}

fn print_table(title: &str, entries: &[movielog::StatEntry]) {
    println!("\n{}", style(title).underlined());
    for entry in entries {
        println!("{:>8}  {}", entry.count, entry.label);
    }
}
