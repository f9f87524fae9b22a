//! rom-collector CLI
//!
//! Downloads ROMs for the games most recently claimed on RetroAchievements.

mod app;
mod ui;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use rom_collector::api::ApiClient;
use rom_collector::application::download_coordinator::destination_for;
use rom_collector::application::{
    filter_catalog, CancelFlag, DownloadCoordinator, DownloadOutcome, Matcher, Pipeline,
    PipelineEvent, RunRequest, SearchOptions, SourceAggregator,
};
use rom_collector::config::{settings_path, Settings};
use rom_collector::domain::{AppError, DownloadProgress, MatchResult};

use crate::app::TerminalApp;

#[derive(Parser)]
#[command(name = "rom-collector")]
#[command(about = "Fetch ROMs for recently claimed RetroAchievements sets", long_about = None)]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Download root; overrides the settings file and DIRECTORY_PATH
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve and download the most recently claimed games
    Collect {
        /// Number of recent claims to process
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Only process these consoles (repeatable)
        #[arg(short, long = "console")]
        consoles: Vec<String>,
    },

    /// Browse every mirror of a console, optionally downloading one entry
    Search {
        #[arg(short, long)]
        console: String,

        /// Regular expression matched against names and extensions
        pattern: Option<String>,

        #[arg(long)]
        case_sensitive: bool,

        #[arg(long)]
        whole_word: bool,

        /// Download the result at this index
        #[arg(short, long)]
        download: Option<usize>,

        /// Resolve an achievement title against the catalog and download the match
        #[arg(short, long, conflicts_with = "download")]
        title: Option<String>,
    },

    /// List consoles that have mirrors configured
    Consoles,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut settings = match &cli.config {
        Some(path) => {
            let mut settings = Settings::load_from(path)?;
            settings.apply_overrides(|name| std::env::var(name).ok());
            settings
        }
        None => Settings::load()?,
    };
    if let Some(root) = cli.root {
        settings.download_root = root;
    }
    log::debug!("Settings file: {}", settings_path().display());

    match cli.command {
        Commands::Collect { count, consoles } => run_collect(&settings, count, consoles).await,
        Commands::Search {
            console,
            pattern,
            case_sensitive,
            whole_word,
            download,
            title,
        } => {
            let options = SearchOptions {
                case_sensitive,
                whole_word,
            };
            let pick = match title {
                Some(title) => Pick::Title(title),
                None => download.map_or(Pick::Nothing, Pick::Index),
            };
            run_search(&settings, &console, pattern.as_deref().unwrap_or(""), options, pick).await
        }
        Commands::Consoles => {
            run_consoles(&settings);
            Ok(())
        }
    }
}

/// What `search` downloads once the catalog is listed.
enum Pick {
    Nothing,
    Index(usize),
    Title(String),
}

fn build_client(settings: &Settings) -> Result<ApiClient, AppError> {
    ApiClient::new(settings.api_config()).map_err(|e| AppError::Config(e.to_string()))
}

fn build_aggregator(settings: &Settings, client: &ApiClient) -> SourceAggregator {
    SourceAggregator::new(
        client.clone(),
        Arc::new(settings.source_set()),
        settings.retry_policy(),
    )
}

async fn run_collect(settings: &Settings, count: Option<usize>, consoles: Vec<String>) -> Result<(), AppError> {
    settings.validate()?;

    let client = build_client(settings)?;
    let pipeline = Pipeline::new(
        client.clone(),
        Matcher::new(build_aggregator(settings, &client), settings.mirror_delay()),
        DownloadCoordinator::new(client, settings.chunk_size),
        settings.download_root.clone(),
        settings.request_delay(),
        settings.max_rom_count,
    );

    let cancel = CancelFlag::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, stopping after the current step");
                cancel.cancel();
            }
        })
    };

    let request = RunRequest {
        count: count.unwrap_or(settings.default_rom_count),
        consoles,
    };
    let (mut events, handle) = pipeline.spawn(request, cancel);
    let mut app = TerminalApp::stdout();
    while let Some(event) = events.recv().await {
        app::update(&mut app, event)?;
    }
    watcher.abort();

    let summary = handle.await.map_err(|e| AppError::Io(e.to_string()))??;
    for (task, outcome) in &summary.outcomes {
        log::debug!("{} ({}): {:?}", task.game_id, task.console_name, outcome);
    }
    if summary.cancelled {
        return Err(AppError::Cancelled);
    }
    Ok(())
}

async fn run_search(
    settings: &Settings,
    console: &str,
    pattern: &str,
    options: SearchOptions,
    pick: Pick,
) -> Result<(), AppError> {
    let client = build_client(settings)?;
    let aggregator = build_aggregator(settings, &client);
    let matcher = Matcher::new(aggregator.clone(), settings.mirror_delay());
    if !aggregator.sources().is_supported(console) {
        return Err(AppError::ConsoleUnsupported(console.to_string()));
    }

    let catalog = aggregator.aggregate(console).await;
    for (mirror, count) in &catalog.loaded {
        println!("Loaded {count} ROMs from {mirror}");
    }
    for failure in &catalog.failures {
        println!("Failed to load from {}: {}", failure.mirror, failure.error);
    }

    let found = filter_catalog(&catalog.entries, pattern, options);
    println!("Showing {} of {} ROMs", found.len(), catalog.len());
    for (index, entry) in found.iter().enumerate() {
        println!(
            "{index:>5}  {}  [{} source(s)]",
            entry.file_name(),
            entry.source_urls.len()
        );
    }

    if matches!(pick, Pick::Nothing) {
        return Ok(());
    }
    if settings.download_root.as_os_str().is_empty() {
        return Err(AppError::Config("download directory is not set".to_string()));
    }

    let downloader = DownloadCoordinator::new(client, settings.chunk_size);
    let mut app = TerminalApp::stdout();
    let mut render = |progress: &DownloadProgress| {
        if let Err(e) = app::update(&mut app, PipelineEvent::DownloadTick(progress.clone())) {
            log::warn!("Could not render progress: {e}");
        }
    };
    let outcome = match pick {
        Pick::Nothing => return Ok(()),
        Pick::Index(index) => {
            let entry = found
                .get(index)
                .ok_or_else(|| AppError::InvalidInput(format!("no result at index {index}")))?;
            downloader
                .download_entry(entry, console, &settings.download_root, &mut render)
                .await?
        }
        Pick::Title(title) => match matcher.resolve_in_catalog(&title, &catalog) {
            MatchResult::Matched { url, filename } => {
                let path = destination_for(&settings.download_root, console, &filename);
                downloader.download(&url, &path, &mut render).await?
            }
            MatchResult::NoSourceForConsole => return Err(AppError::ConsoleUnsupported(console.to_string())),
            MatchResult::NoMatch => return Err(AppError::NoMatch(title)),
        },
    };

    let message = match outcome {
        DownloadOutcome::Downloaded(path) => format!("Downloaded: {}", path.display()),
        DownloadOutcome::Skipped(path) => format!("Skipped (already exists): {}", path.display()),
    };
    app::update(&mut app, PipelineEvent::Log(message))?;
    Ok(())
}

fn run_consoles(settings: &Settings) {
    let sources = settings.source_set();
    for console in sources.supported_consoles() {
        println!("{console} ({} mirror(s))", sources.sources(console).len());
    }
}
