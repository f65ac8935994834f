use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use apod::config::AppConfig;
use apod::fetch::{FetchError, FetcherConfig, PageFetcher};
use apod::site::{DatedResource, DayId, SiteError, SiteNavigator};
use apod::store::{self, LocalStore, StoreError};
use apod::{picture, wallpaper};

#[derive(Parser)]
#[command(name = "apod")]
#[command(about = "Download the Astronomy Picture of the Day")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Date of the picture as YYMMDD (default: most recent)
    #[arg(short, long)]
    date: Option<String>,

    /// Directory for the picture store (overrides config)
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Number of pictures retained in the store (overrides config)
    #[arg(short, long)]
    backlog: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the day's picture and save it to a file
    Save {
        /// Destination file (default: apod-YYMMDD.png)
        name: Option<PathBuf>,
    },

    /// Print date, URL and navigation state of the day's page
    Info,

    /// Print the day's title and explanation
    Explain,

    /// Print the archive listing, one "date title" line per day
    Archive,

    /// List pictures currently in the store, most recent first
    Cache,

    /// Apply the given files (or the store's pictures) as wallpaper
    Wallpaper {
        /// Picture files, most preferred first
        files: Vec<PathBuf>,
    },

    /// Fetch the newest picture, store it, trim the store, set wallpaper
    Update,
}

fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".apod.toml")
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = AppConfig::load(&cli.config)?;
    if let Some(dir) = cli.store_dir {
        config.store_dir = dir;
    }
    if let Some(backlog) = cli.backlog {
        config.backlog = backlog;
    }

    let date = cli.date.as_deref().map(DayId::new).transpose()?;

    let fetcher = PageFetcher::new(FetcherConfig {
        timeout: Duration::from_secs(config.timeout_seconds),
        user_agent: config.user_agent.clone(),
    })?;
    let navigator = SiteNavigator::new(fetcher, &config.base_url, &config.archive_url)?;

    match cli.command {
        Commands::Save { name } => {
            let resource = navigator.fetch(date.as_ref()).await?;
            let Some(image_url) = resource.image_url.clone() else {
                println!("No picture for {}", date_label(&resource));
                return Ok(());
            };

            println!("Fetching {image_url}");
            let bytes = navigator.fetch_image_bytes(&resource).await?;

            let dest = name
                .unwrap_or_else(|| PathBuf::from(store::managed_name(&date_label(&resource), "png")));
            println!("Saving {}", dest.display());
            picture::normalize_and_save(&bytes, &dest)?;
        }

        Commands::Info => {
            let resource = navigator.fetch(date.as_ref()).await?;
            println!("{resource}");
        }

        Commands::Explain => {
            let resource = navigator.fetch(date.as_ref()).await?;
            println!("{} {}", date_label(&resource), resource.title);
            println!();
            println!("{}", resource.caption);
        }

        Commands::Archive => {
            let index = navigator.fetch_archive_index().await?;
            for (day, title) in &index {
                println!("{day} {title}");
            }
        }

        Commands::Cache => {
            let cache = LocalStore::open(&config.store_dir)?;
            for entry in cache.list()? {
                let modified: chrono::DateTime<chrono::Local> = entry.modified.into();
                println!(
                    "{}  {}",
                    modified.format("%Y-%m-%d %H:%M"),
                    cache.path(&entry.file_name).display()
                );
            }
        }

        Commands::Wallpaper { files } => {
            let paths = if files.is_empty() {
                LocalStore::open(&config.store_dir)?.files()?
            } else {
                files
            };
            report_wallpaper(wallpaper::apply(&paths));
        }

        Commands::Update => {
            let cache = LocalStore::open(&config.store_dir)?;
            let resource = navigator.rewind_to_picture(date.as_ref()).await?;

            let name = store::managed_name(&date_label(&resource), "png");
            if !cache.path(&name).exists() {
                let bytes = navigator.fetch_image_bytes(&resource).await?;
                let png = picture::normalize_to_png(&bytes)?;
                let saved = cache.write(&name, &png, None)?;
                println!("Saved {}", saved.display());
            }

            cache.trim(config.backlog)?;
            report_wallpaper(wallpaper::apply(&cache.files()?));
        }
    }

    Ok(())
}

/// Date of a resource for file names and messages, or "latest" when the
/// page's own date could not be determined.
fn date_label(resource: &DatedResource) -> String {
    resource
        .date
        .as_ref()
        .map(|d| d.to_string())
        .unwrap_or_else(|| "latest".to_string())
}

fn report_wallpaper(outcome: wallpaper::Outcome) {
    match outcome {
        wallpaper::Outcome::Applied { path } => {
            println!("Wallpaper set to {}", path.display());
        }
        wallpaper::Outcome::Unavailable { reason } => {
            eprintln!("Wallpaper not changed: {reason}");
        }
    }
}

/// One non-zero exit status per error kind, so scripts can tell "no such
/// day" from "page shape changed" from store misuse.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    if let Some(site) = err.downcast_ref::<SiteError>() {
        return match site {
            SiteError::Fetch(f) if f.is_not_found() => 2,
            SiteError::Fetch(_) => 1,
            SiteError::Parse { .. } => 3,
            SiteError::NoImage { .. } => 4,
            SiteError::NoSuchNeighbor { .. } | SiteError::NavigationLoop { .. } => 5,
            SiteError::InvalidDate(_) | SiteError::InvalidUrl(_) => 8,
        };
    }
    if let Some(store_err) = err.downcast_ref::<StoreError>() {
        return match store_err {
            StoreError::InvalidStore(_) => 6,
            StoreError::NotManaged(_) => 7,
            StoreError::Io(_) => 1,
        };
    }
    if let Some(fetch) = err.downcast_ref::<FetchError>() {
        return if fetch.is_not_found() { 2 } else { 1 };
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_per_kind() {
        let not_found: anyhow::Error = SiteError::Fetch(FetchError::NotFound {
            url: url::Url::parse("https://apod.nasa.gov/apod/ap990101.html").unwrap(),
        })
        .into();
        let parse: anyhow::Error = SiteError::Parse {
            url: url::Url::parse("https://apod.nasa.gov/apod").unwrap(),
            what: "title heading",
        }
        .into();
        let no_image: anyhow::Error = SiteError::NoImage { date: None }.into();
        let not_managed: anyhow::Error = StoreError::NotManaged("readme.txt".to_string()).into();

        let codes = [
            exit_code_for(&not_found),
            exit_code_for(&parse),
            exit_code_for(&no_image),
            exit_code_for(&not_managed),
        ];

        assert_eq!(codes, [2, 3, 4, 7]);
    }

    #[test]
    fn test_unknown_errors_map_to_one() {
        let err = anyhow::anyhow!("something else entirely");
        assert_eq!(exit_code_for(&err), 1);
    }
}
