//! bt-page-turner daemon
//!
//! Entry point for the daemon binary. Host calls are written to stdout, one
//! line each; logs go to stderr (and optionally a file).

use std::fs::{DirBuilder, OpenOptions};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

use bt_page_turner::config::Config;
use bt_page_turner::device::DeviceRegistry;
use bt_page_turner::dispatch::DispatchLoop;
use bt_page_turner::host::LineHost;
use bt_page_turner::watcher::{InputDirWatcher, RescanSignal};

/// Command-line arguments for bt-page-turner
#[derive(Parser, Debug)]
#[command(name = "bt-page-turner")]
#[command(version, about = "Turn pages with Bluetooth input devices", long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long, env = "BTPT_CONFIG", default_value = "/etc/bt-page-turner/config.toml")]
    pub config: PathBuf,

    /// Directory holding per-device rule files
    #[arg(long, env = "BTPT_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Input device directory to watch
    #[arg(long, env = "BTPT_DEVICE_DIR")]
    pub device_dir: Option<PathBuf>,

    /// Verbose logging (can be specified multiple times)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log format (json|pretty|compact)
    #[arg(long, default_value = "compact")]
    pub log_format: String,

    /// Write logs to file (in addition to stderr)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("{}", bt_page_turner::utils::format_user_error(&e));
        return Err(e);
    }

    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let (config, missing) = load_config(&args.config)?;
    let config = config.with_overrides(args.config_dir.clone(), args.device_dir.clone());

    let _log_guard = init_logging(args, &config)?;

    info!("bt-page-turner v{} starting", env!("CARGO_PKG_VERSION"));
    if missing {
        warn!("Config file {} not found, using defaults", args.config.display());
    }
    tracing::debug!("Config: {:?}", config);

    if config.uninstall_marker().exists() {
        info!(
            "Uninstall marker {} present, not starting",
            config.uninstall_marker().display()
        );
        return Ok(());
    }

    create_config_dir(&config.paths.config_dir)?;
    bt_page_turner::utils::log_startup_diagnostics(&config);

    let signal = RescanSignal::new();
    let _watcher = InputDirWatcher::spawn(&config.paths.device_dir, signal.clone())?;

    // pick up devices connected before startup
    signal.notify();

    let host = LineHost::stdout().context("Failed to start host writer")?;
    let registry = DeviceRegistry::new(config.device_paths());
    let mut dispatch = DispatchLoop::new(registry, signal, host, config.dispatch_settings());

    dispatch.run()
}

/// Load the config file; a missing file yields defaults
fn load_config(path: &Path) -> Result<(Config, bool)> {
    if !path.exists() {
        return Ok((Config::default(), true));
    }
    Ok((Config::load(path)?, false))
}

fn create_config_dir(dir: &Path) -> Result<()> {
    DirBuilder::new()
        .recursive(true)
        .mode(0o755)
        .create(dir)
        .with_context(|| format!("Failed to create config directory {}", dir.display()))
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn fmt_layer<W>(format: &str, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi);

    match format {
        "json" => layer.json().boxed(),
        "pretty" => layer.pretty().boxed(),
        _ => layer.compact().boxed(),
    }
}

fn init_logging(args: &Args, config: &Config) -> Result<Option<WorkerGuard>> {
    let log_level = match args.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "bt_page_turner={level},warn",
            level = log_level
        ))
    });

    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(&args.log_format, std::io::stderr, true)];

    // If log file is specified, write to both stderr and file
    let mut guard = None;
    if let Some(log_file_path) = args.log_file.as_ref().or(config.logging.log_file.as_ref()) {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file_path)
            .with_context(|| format!("Failed to open log file {}", log_file_path.display()))?;
        let (writer, file_guard) = tracing_appender::non_blocking(file);
        layers.push(fmt_layer(&args.log_format, writer, false));
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .init();

    if let Some(path) = args.log_file.as_ref().or(config.logging.log_file.as_ref()) {
        info!("Logging to file: {}", path.display());
    }

    Ok(guard)
}
