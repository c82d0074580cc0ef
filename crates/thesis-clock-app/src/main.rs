//! Console front end for the thesis management virtual clock.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (first CLI argument, `THESIS_CLOCK_CONFIG`, or
//!    `thesis-clock.yaml`; defaults when the file is missing)
//! 2. Initialize structured logging (tracing) on stderr
//! 3. Open local storage and the remote time authority
//! 4. Restore the clock and start the service task
//! 5. Read commands from stdin until `quit` or end of input
//! 6. Shut the service down

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thesis_clock_app::command::{self, ConsoleCommand, Outcome};
use thesis_clock_app::{AppError, ClockHandle, ClockService, ServiceError};
use thesis_clock_core::config::{LogFormat, LoggingConfig};
use thesis_clock_core::{ClockConfig, SystemClock};
use thesis_clock_store::{DurableStorage, FileStorage, PersistenceBridge, TimeAuthority};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Config file used when no path is given.
const DEFAULT_CONFIG_PATH: &str = "thesis-clock.yaml";

/// Environment variable naming the config file.
const ENV_CONFIG_PATH: &str = "THESIS_CLOCK_CONFIG";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Load configuration.
    let config_path = config_path();
    let (config, from_file) = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    if from_file {
        info!(path = %config_path.display(), "configuration loaded");
    } else {
        info!(path = %config_path.display(), "config file not found, using defaults");
    }

    // 3. Storage and authority.
    let storage: Arc<dyn DurableStorage> = Arc::new(FileStorage::new(&config.storage.path));
    let authority = Arc::new(TimeAuthority::from_config(&config.authority)?);
    info!(
        storage = %config.storage.path.display(),
        key = %config.storage.key,
        authority = authority.name(),
        "persistence ready"
    );
    let bridge = PersistenceBridge::from_config(storage, authority, &config.storage);

    // 4. Clock service. Subscribe to notices before it starts so the
    //    restore notice is not missed.
    let (service, handle) = ClockService::new(bridge, Arc::new(SystemClock), &config.clock);
    spawn_notice_printer(&handle);
    let service_task = tokio::spawn(service.run());

    // 5. Console.
    let result = run_console(&handle).await;

    // 6. Shutdown.
    handle.shutdown().await;
    if let Err(e) = service_task.await {
        warn!(error = %e, "clock service task failed");
    }
    info!("thesis-clock stopped");
    result
}

/// Config path from the first argument, then the environment, then the
/// default.
fn config_path() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os(ENV_CONFIG_PATH))
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
}

/// Load the config file, or defaults plus environment overrides when it
/// does not exist. The flag reports whether the file was read.
fn load_config(path: &Path) -> Result<(ClockConfig, bool), AppError> {
    if path.exists() {
        return Ok((ClockConfig::from_file(path)?, true));
    }
    let mut config = ClockConfig::default();
    config.apply_env_overrides();
    config.validate()?;
    Ok((config, false))
}

/// Install the global subscriber. `RUST_LOG` wins over the configured
/// level. Logs go to stderr so they do not mix with console output.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn spawn_notice_printer(handle: &ClockHandle) {
    let mut notices = handle.notices();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => println!("{notice}"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "notice printer fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn run_console(handle: &ClockHandle) -> Result<(), AppError> {
    println!("{}", handle.snapshot());
    println!("type `help` for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(e) => {
                println!("error: {e}");
                continue;
            }
        };
        match command::execute(handle, command).await {
            Ok(Outcome::Print(text)) => println!("{text}"),
            Ok(Outcome::Quit) => break,
            Err(ServiceError::Closed) => return Err(ServiceError::Closed.into()),
            Err(e) => println!("error: {e}"),
        }
    }
    Ok(())
}
