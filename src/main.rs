mod catalog;
mod config;
mod entities;
mod logging;
mod ports;
mod services;
mod spotify_rs;
#[cfg(test)]
mod test_utils;
mod yt_dlp;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};

use crate::{
    catalog::Catalog,
    config::Config,
    logging::init_tracing,
    services::acquisition::{AcquireOptions, AcquisitionPipeline},
    services::playlist::{HttpArtworkFetcher, PlaylistExporter},
    services::spotify::sync::{CollectOptions, CollectProgress, SpotifySyncService},
    spotify_rs::client::SpotifyWebClient,
    yt_dlp::YtDlp,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "MUSIC_MIRROR_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `music_mirror=debug`
    #[arg(long, default_value = "info", global = true, env = "LOG_LEVEL")]
    log_level: String,

    /// Also write logs to this file
    #[arg(long, env = "MUSIC_MIRROR_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    /// OTLP collector to export traces to
    #[arg(long, env = "OTLP_ENDPOINT", global = true)]
    otlp_endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Collect the Spotify library, download what is missing and export playlists
    Sync,
    /// Collect the Spotify library into the snapshot without downloading
    Collect,
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let tracer_provider = init_tracing(
        env!("CARGO_PKG_NAME"),
        &args.log_level,
        args.log_file.as_deref(),
        args.otlp_endpoint.as_deref(),
    )?;

    let result = run(args).await;

    if let Some(tracer_provider) = tracer_provider
        && let Err(e) = tracer_provider.shutdown()
    {
        eprintln!("Failed to shut down tracer provider: {:?}", e);
    }

    result
}

async fn run(args: Args) -> Result<()> {
    let config_file = args.config;
    let load_config = || {
        if let Some(config) = &config_file {
            Config::from_file(config)
        } else {
            Config::load()
        }
        .with_context(|| "Failed to load music-mirror config")
    };

    match args.command {
        Commands::Sync => {
            let config = load_config()?;
            sync(&config).await?;
            tracing::info!("Sync command completed successfully");
        }
        Commands::Collect => {
            let config = load_config()?;
            let catalog = collect(&config).await?;
            catalog.persist(&config.snapshot_path())?;
            tracing::info!("Collect command completed successfully");
        }
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                tracing::debug!("Creating default config");
                let path = Config::create_default()?;
                tracing::info!("Default config at {}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
    }

    Ok(())
}

fn log_progress(progress: CollectProgress) {
    tracing::info!(
        "{:?}: {}/{}",
        progress.stage,
        progress.completed,
        progress.total
    );
}

/// Load the snapshot and merge the remote library into it.
async fn collect(config: &Config) -> Result<Catalog> {
    let mut catalog = Catalog::load(&config.snapshot_path())?;

    let client = SpotifyWebClient::connect(&config.spotify_credentials()).await?;
    let service = SpotifySyncService::new(client, CollectOptions::from(config));
    service
        .sync_library(&mut catalog, &mut log_progress)
        .await
        .wrap_err("Failed to collect spotify library")?;

    Ok(catalog)
}

async fn sync(config: &Config) -> Result<()> {
    let mut catalog = collect(config).await?;

    let yt_dlp = YtDlp::locate(config)?;
    let pipeline = AcquisitionPipeline::new(yt_dlp.clone(), yt_dlp, AcquireOptions::from(config));
    let summary = pipeline
        .run(
            &mut catalog,
            &config.snapshot_path(),
            &config.failure_report_path(),
        )
        .await?;

    if summary.failed > 0 {
        tracing::warn!(
            "{} songs could not be acquired, see {}",
            summary.failed,
            config.failure_report_path().display()
        );
    }

    let exporter = PlaylistExporter::new(config.playlist_dir(), HttpArtworkFetcher::default());
    exporter.export_all(&catalog).await;

    Ok(())
}
