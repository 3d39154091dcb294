use clap::{Parser, Subcommand};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use call_archive::config::ArchiveConfig;
use call_archive::query::parse_date_param;
use call_archive::serve::serve_archive;
use call_archive::services::ArchiveServices;

type DynError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Index, transcode and serve call recordings from object storage")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the recordings API
    Serve {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Sync the metadata index with the object store and exit
    Sync {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,

        /// First day to sync (M_D_YYYY or YYYY-MM-DD)
        #[arg(long, requires = "end", conflicts_with = "all")]
        start: Option<String>,

        /// Last day to sync (M_D_YYYY or YYYY-MM-DD)
        #[arg(long, requires = "start", conflicts_with = "all")]
        end: Option<String>,

        /// Sync the entire recordings root instead of today
        #[arg(long)]
        all: bool,
    },
    /// Print index statistics
    Stats {
        /// Path to config file (TOML format)
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<(), DynError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        match args.command {
            Command::Serve { config, port } => serve(config, port).await,
            Command::Sync {
                config,
                start,
                end,
                all,
            } => sync(config, start, end, all).await,
            Command::Stats { config } => stats(config).await,
        }
    })
}

fn load_config(path: &Path) -> Result<ArchiveConfig, DynError> {
    let config = ArchiveConfig::load(path)?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

async fn serve(config_path: PathBuf, port: Option<u16>) -> Result<(), DynError> {
    let mut config = load_config(&config_path)?;
    if let Some(port) = port {
        config.api_port = port;
    }
    let services = Arc::new(ArchiveServices::open(&config).await?);
    serve_archive(&config, services).await
}

async fn sync(
    config_path: PathBuf,
    start: Option<String>,
    end: Option<String>,
    all: bool,
) -> Result<(), DynError> {
    let config = load_config(&config_path)?;
    let services = ArchiveServices::open(&config).await?;

    let result = match (start, end) {
        (Some(start), Some(end)) => {
            let start_date =
                parse_date_param(&start).ok_or_else(|| format!("Invalid start date: {}", start))?;
            let end_date = parse_date_param(&end).ok_or_else(|| format!("Invalid end date: {}", end))?;
            services.sync.sync_date_range(start_date, end_date).await
        }
        _ if all => services.sync.sync_all().await,
        _ => services.sync.sync_current_day().await,
    };
    services.close().await;

    let report = result?;
    println!(
        "Indexed {} files in {:.1}s",
        report.indexed_count, report.duration_seconds
    );
    if !report.failed_days.is_empty() {
        return Err(format!("Sync failed for: {}", report.failed_days.join(", ")).into());
    }
    Ok(())
}

async fn stats(config_path: PathBuf) -> Result<(), DynError> {
    let config = load_config(&config_path)?;
    let services = ArchiveServices::open(&config).await?;
    let stats = services.index.stats().await;
    services.close().await;

    let stats = stats?;
    println!("Database: {}", stats.database_path);
    println!("Total files: {}", stats.total_files);
    println!("Database size: {} bytes", stats.database_size);
    Ok(())
}
