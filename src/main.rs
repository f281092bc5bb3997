mod cli;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::panic;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use archive_browser::app::{self, App};
use archive_browser::browser::Browser;
use archive_browser::config::{self, AppConfig, LOG_FILE};
use archive_browser::downloader::{DownloadRequest, Downloader, Progress};
use archive_browser::fetch::ListingFetcher;
use archive_browser::http::HttpClient;
use archive_browser::input::{self, ButtonMap, InputState};
use archive_browser::models::{CollectionSpec, FileEntry};
use archive_browser::sanitize::{basename, display_name, format_size};
use archive_browser::screen::{self, Screen};
use archive_browser::{logging, ListingCache};

use cli::{Args, Command};

const CALIBRATION_SETTLE: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config = build_config(&args);
    let command = args.command.clone().unwrap_or(Command::Browse);

    let _guard = match command {
        Command::Browse | Command::Calibrate => {
            match logging::init_file(&config.home, LOG_FILE, args.log_level()) {
                Ok(guard) => Some(guard),
                Err(e) => {
                    eprintln!("Logging disabled: {e:#}");
                    None
                }
            }
        }
        _ => {
            if let Err(e) = logging::init_stderr(args.log_level()) {
                eprintln!("Logging disabled: {e:#}");
            }
            None
        }
    };

    install_crash_hook(config.crash_file());
    info!(home = %config.home.display(), storage = %config.storage_root.display(), "Starting");

    match run(command, &config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            write_crash_record(&config.crash_file(), &format!("{e:?}"));
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn build_config(args: &Args) -> AppConfig {
    let mut config = AppConfig::new(args.home.clone().unwrap_or_else(config::default_home));
    if let Some(root) = &args.storage_root {
        config.storage_root = root.clone();
    }
    config.archive_url = args.archive_url.trim_end_matches('/').to_string();
    config.device = args.device.clone();
    config.insecure_tls = args.insecure;
    config.stall_timeout = Duration::from_secs(args.stall_timeout);
    config
}

fn install_crash_hook(crash_file: PathBuf) {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        write_crash_record(&crash_file, &panic_info.to_string());
        default_hook(panic_info);
    }));
}

fn write_crash_record(path: &Path, detail: &str) {
    if let Err(e) = fs::write(path, format!("{detail}\n")) {
        eprintln!("Failed to write {}: {e}", path.display());
    }
}

async fn run(command: Command, config: &AppConfig) -> Result<ExitCode> {
    match command {
        Command::Browse => browse(config).await,
        Command::Calibrate => {
            recalibrate(config).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::List {
            collection,
            refresh,
            search,
        } => {
            list(config, &collection, refresh, search.as_deref()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Download { collection, name } => {
            download(config, &collection, &name).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn build_services(config: &AppConfig) -> Result<(ListingFetcher, Downloader)> {
    let authorization = config::load_credentials(&config.keys_file());
    if authorization.is_some() {
        info!("Using registry credentials");
    }
    let client = HttpClient::from_config(config, authorization.as_deref())?;
    let cache = ListingCache::new(config.cache_dir())?;
    let downloader = Downloader::new(client.clone(), config.stall_timeout);
    Ok((ListingFetcher::new(client, cache), downloader))
}

/// Where the button map for an interactive session comes from.
#[derive(Debug, PartialEq, Eq)]
enum Controls {
    Saved(ButtonMap),
    Calibrate,
    /// Enough to dismiss a notice, or nothing to read when there is no device.
    Provisional,
}

/// Calibration is only worth the user's time once the collections are known to load.
fn startup_controls(saved: Option<ButtonMap>, collections_ok: bool, device_present: bool) -> Controls {
    match saved {
        Some(map) => Controls::Saved(map),
        None if collections_ok && device_present => Controls::Calibrate,
        None => Controls::Provisional,
    }
}

async fn browse(config: &AppConfig) -> Result<ExitCode> {
    let collections = config::load_collections(&config.collections_file());
    let device_present = config.device.exists();

    let map = match startup_controls(
        ButtonMap::load(&config.controls_file()),
        collections.is_ok(),
        device_present,
    ) {
        Controls::Saved(map) => map,
        Controls::Calibrate => calibrate_device(config).await?,
        Controls::Provisional => {
            if !device_present {
                warn!(device = %config.device.display(), "No joystick and no saved controls");
            }
            ButtonMap::uncalibrated()
        }
    };

    let input = Arc::new(InputState::new());
    let reader = input::spawn_reader(config.device.clone(), map, Arc::clone(&input))?;
    let mut screen = Screen::stdout();

    let collections = match collections {
        Ok(collections) => collections,
        Err(e) => {
            error!(error = %e, "Cannot load collections");
            app::show_config_notice(&mut screen, &input, || !reader.is_finished()).await?;
            return Ok(ExitCode::FAILURE);
        }
    };

    if reader.is_finished() {
        bail!("No joystick available at {}", config.device.display());
    }

    let (fetcher, downloader) = build_services(config)?;
    let mut app = App::new(
        config.clone(),
        Browser::new(collections),
        fetcher,
        downloader,
        input,
        screen,
    );
    app.run().await?;
    Ok(ExitCode::SUCCESS)
}

async fn recalibrate(config: &AppConfig) -> Result<()> {
    calibrate_device(config).await?;
    println!("Saved controls to {}", config.controls_file().display());
    Ok(())
}

/// Maps the buttons interactively and saves the result.
async fn calibrate_device(config: &AppConfig) -> Result<ButtonMap> {
    let device = config.device.clone();
    let controls_file = config.controls_file();

    tokio::task::spawn_blocking(move || -> Result<ButtonMap> {
        let mut events = File::open(&device)
            .with_context(|| format!("Failed to open joystick {}", device.display()))?;
        let mut screen = Screen::stdout();
        let map = input::calibrate(
            &mut events,
            |label| {
                let frame = screen::notice_frame(&["--- CALIBRATION ---", "", label]);
                if let Err(e) = screen.present(&frame) {
                    warn!(error = %e, "Failed to draw calibration prompt");
                }
            },
            CALIBRATION_SETTLE,
        )
        .context("Joystick calibration failed")?;
        map.save(&controls_file)?;
        info!(path = %controls_file.display(), "Saved controls");
        Ok(map)
    })
    .await
    .context("Calibration task failed")?
}

fn find_collection(config: &AppConfig, name: &str) -> Result<CollectionSpec> {
    let collections = config::load_collections(&config.collections_file())?;
    collections
        .into_iter()
        .find(|c| c.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| anyhow!("No collection named {name:?}"))
}

async fn list(config: &AppConfig, name: &str, refresh: bool, search: Option<&str>) -> Result<()> {
    let collection = find_collection(config, name)?;
    let (fetcher, _) = build_services(config)?;
    let entries = fetcher.fetch(&collection, refresh).await?;

    let mut browser = Browser::new(vec![collection]);
    browser.open_listing(entries);
    if let Some(term) = search {
        browser.apply_search(term);
    }

    for entry in browser.files() {
        println!("{:>8}  {}", format_size(entry.size), display_name(&entry.name));
    }
    info!(count = browser.files().len(), "Listed entries");
    Ok(())
}

fn find_entry<'a>(entries: &'a [FileEntry], name: &str) -> Option<&'a FileEntry> {
    entries
        .iter()
        .find(|e| e.name == name)
        .or_else(|| entries.iter().find(|e| basename(&e.name) == name))
}

async fn download(config: &AppConfig, collection_name: &str, name: &str) -> Result<()> {
    let collection = find_collection(config, collection_name)?;
    let (fetcher, mut downloader) = build_services(config)?;
    let entries = fetcher.fetch(&collection, false).await?;
    let entry = find_entry(&entries, name)
        .ok_or_else(|| anyhow!("{name:?} is not listed in {}", collection.name))?;

    let request = DownloadRequest::for_entry(&collection, entry, config.destination_dir(&collection));

    let cancelled = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&cancelled);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling download");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let pb = ProgressBar::new(entry.size.unwrap_or(0));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg:30} {bar:40} {bytes}/{total_bytes} ({bytes_per_sec})")
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );
    pb.set_message(display_name(&entry.name));

    let mut on_progress = |progress: &Progress| {
        if let Some(total) = progress.total {
            pb.set_length(total);
        }
        pb.set_position(progress.transferred);
    };

    match downloader.download(&request, &cancelled, &mut on_progress).await {
        Ok(path) => {
            pb.finish_with_message("done");
            println!("Saved {}", path.display());
            Ok(())
        }
        Err(e) => {
            pb.abandon_with_message(e.kind().label());
            Err(e.into())
        }
    }
}
