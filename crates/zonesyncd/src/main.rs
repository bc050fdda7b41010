// # zonesyncd - Zone Convergence Daemon
//
// Thin integration layer over zonesync-core. This binary only:
//
// 1. Reads configuration from environment variables
// 2. Initializes the runtime and tracing
// 3. Registers backend adapter factories
// 4. Wires storage, tracker, engine, and scanners together
//
// All convergence logic lives in zonesync-core; no retry, threshold, or
// DNS logic belongs here.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Pool targets
// - `ZONESYNC_TARGETS`: Comma-separated `id:kind` pairs
//   (e.g. "ns-east:memory,ns-west:memory")
// - `ZONESYNC_MASTERS`: Comma-separated master addresses advertised to
//   every target (default "192.0.2.1:53")
//
// ### Convergence
// - `ZONESYNC_THRESHOLD_PERCENTAGE`: Confirmation threshold (0-100)
// - `ZONESYNC_POLL_TIMEOUT_SECS`: Per-call timeout budget
// - `ZONESYNC_POLL_RETRY_INTERVAL_SECS`: Delay between confirmation polls
// - `ZONESYNC_POLL_MAX_RETRIES`: Confirmation poll attempts per target
// - `ZONESYNC_POLL_DELAY_SECS`: Delay before the first poll
//
// ### Scanners
// - `ZONESYNC_ENABLE_RECOVERY_TIMER`: Run the recovery scanner (true/false)
// - `ZONESYNC_RECOVERY_INTERVAL_SECS`: Interval between recovery scans
// - `ZONESYNC_ENABLE_SYNC_TIMER`: Run the periodic resync scanner
// - `ZONESYNC_SYNC_INTERVAL_SECS`: Interval between resync scans
// - `ZONESYNC_SYNC_WINDOW_SECS`: Trailing resync window; 0 = unbounded
//
// ### Tracker
// - `ZONESYNC_TRACKER_TYPE`: Tracker store type (memory, file)
// - `ZONESYNC_TRACKER_PATH`: Path to tracker state file (for file type)
// - `ZONESYNC_TRACKER_TTL_SECS`: Entry TTL for the memory tracker
//
// ### Logging
// - `ZONESYNC_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export ZONESYNC_TARGETS=ns-east:memory,ns-west:memory
// export ZONESYNC_THRESHOLD_PERCENTAGE=100
// export ZONESYNC_TRACKER_TYPE=file
// export ZONESYNC_TRACKER_PATH=/var/lib/zonesync/tracker.json
//
// zonesyncd
// ```

use anyhow::Result;
use std::env;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use zonesync_core::{
    BackendRegistry, ConvergenceConfig, ConvergenceEngine, EngineEvent, MemoryStorage,
    PeriodicResyncScanner, PoolTarget, RecoveryScanner, Storage, TrackerConfig, create_tracker,
};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    targets: Vec<(String, String)>,
    masters: Vec<String>,
    tracker_type: String,
    tracker_path: Option<String>,
    tracker_ttl_secs: Option<u64>,
    convergence: ConvergenceConfig,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let mut convergence = ConvergenceConfig::default();

        if let Some(v) = parse_env("ZONESYNC_THRESHOLD_PERCENTAGE")? {
            convergence.threshold_percentage = v;
        }
        if let Some(v) = parse_env("ZONESYNC_POLL_TIMEOUT_SECS")? {
            convergence.poll_timeout_secs = v;
        }
        if let Some(v) = parse_env("ZONESYNC_POLL_RETRY_INTERVAL_SECS")? {
            convergence.poll_retry_interval_secs = v;
        }
        if let Some(v) = parse_env("ZONESYNC_POLL_MAX_RETRIES")? {
            convergence.poll_max_retries = v;
        }
        if let Some(v) = parse_env("ZONESYNC_POLL_DELAY_SECS")? {
            convergence.poll_delay_secs = v;
        }
        if let Some(v) = parse_env("ZONESYNC_RECOVERY_INTERVAL_SECS")? {
            convergence.periodic_recovery_interval_secs = v;
        }
        if let Some(v) = parse_env("ZONESYNC_SYNC_INTERVAL_SECS")? {
            convergence.periodic_sync_interval_secs = v;
        }
        if let Some(v) = parse_env::<u64>("ZONESYNC_SYNC_WINDOW_SECS")? {
            convergence.periodic_sync_seconds = if v == 0 { None } else { Some(v) };
        }
        if let Some(v) = parse_bool_env("ZONESYNC_ENABLE_RECOVERY_TIMER")? {
            convergence.enable_recovery_timer = v;
        }
        if let Some(v) = parse_bool_env("ZONESYNC_ENABLE_SYNC_TIMER")? {
            convergence.enable_sync_timer = v;
        }

        let targets = env::var("ZONESYNC_TARGETS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|pair| match pair.split_once(':') {
                Some((id, kind)) => Ok((id.trim().to_string(), kind.trim().to_string())),
                None => anyhow::bail!(
                    "ZONESYNC_TARGETS entry '{}' is not an id:kind pair. \
                    Example: ZONESYNC_TARGETS=ns-east:memory,ns-west:memory",
                    pair
                ),
            })
            .collect::<Result<Vec<_>>>()?;

        let masters = env::var("ZONESYNC_MASTERS")
            .unwrap_or_else(|_| "192.0.2.1:53".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            targets,
            masters,
            tracker_type: env::var("ZONESYNC_TRACKER_TYPE").unwrap_or_else(|_| "memory".to_string()),
            tracker_path: env::var("ZONESYNC_TRACKER_PATH").ok(),
            tracker_ttl_secs: parse_env("ZONESYNC_TRACKER_TTL_SECS")?,
            convergence,
            log_level: env::var("ZONESYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            anyhow::bail!(
                "ZONESYNC_TARGETS must contain at least one target. \
                Set it via: export ZONESYNC_TARGETS=ns-east:memory"
            );
        }

        let mut seen = std::collections::HashSet::new();
        for (id, kind) in &self.targets {
            if id.is_empty() || kind.is_empty() {
                anyhow::bail!("ZONESYNC_TARGETS entries need both an id and a kind");
            }
            if !seen.insert(id) {
                anyhow::bail!("ZONESYNC_TARGETS contains duplicate target id '{}'", id);
            }
        }

        match self.tracker_type.as_str() {
            "memory" => {}
            "file" => {
                let path = self.tracker_path.as_deref().unwrap_or_default();
                if path.is_empty() {
                    anyhow::bail!(
                        "ZONESYNC_TRACKER_PATH is required when ZONESYNC_TRACKER_TYPE=file. \
                        Set it via: export ZONESYNC_TRACKER_PATH=/var/lib/zonesync/tracker.json"
                    );
                }
            }
            other => anyhow::bail!(
                "ZONESYNC_TRACKER_TYPE '{}' is not supported. Supported types: memory, file",
                other
            ),
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!(
                "ZONESYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                other
            ),
        }

        self.convergence
            .validate()
            .map_err(|e| anyhow::anyhow!("convergence configuration invalid: {}", e))?;

        Ok(())
    }

    fn tracker_config(&self) -> TrackerConfig {
        match self.tracker_type.as_str() {
            "file" => TrackerConfig::File {
                path: self.tracker_path.clone().unwrap_or_default(),
            },
            _ => match self.tracker_ttl_secs {
                Some(ttl_secs) => TrackerConfig::MemoryWithTtl { ttl_secs },
                None => TrackerConfig::Memory,
            },
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has invalid value '{}': {}", key, raw, e)),
        Err(_) => Ok(None),
    }
}

fn parse_bool_env(key: &str) -> Result<Option<bool>> {
    match env::var(key) {
        Ok(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            other => anyhow::bail!("{} must be true or false, got '{}'", key, other),
        },
        Err(_) => Ok(None),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting zonesyncd daemon");
    info!("Configuration loaded: {} target(s)", config.targets.len());

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {}", e);
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    // Register built-in backend adapters
    let registry = BackendRegistry::new();
    info!("Registering memory backend");
    zonesync_backend_memory::register(&registry);

    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    let tracker = create_tracker(&config.tracker_config()).await?;
    info!("Tracker store type: {}", config.tracker_type);

    // Instantiate one adapter per configured pool target
    let mut targets = Vec::new();
    for (id, kind) in &config.targets {
        let target = PoolTarget::new(id, kind).with_masters(config.masters.clone());
        let adapter = registry.create(&target, &storage)?;
        info!("Target {}: backend '{}'", id, adapter.backend_name());
        targets.push((target, adapter));
    }

    let (engine, events) = ConvergenceEngine::new(
        Arc::clone(&storage),
        tracker,
        targets,
        config.convergence.clone(),
    )?;
    let engine = Arc::new(engine);

    // Forward engine events to the operator log
    let event_task = tokio::spawn(async move {
        let mut stream = ReceiverStream::new(events);
        while let Some(event) = stream.next().await {
            log_event(&event);
        }
    });

    let mut scanner_tasks = Vec::new();
    let mut shutdown_txs = Vec::new();

    if config.convergence.enable_recovery_timer {
        info!(
            "Starting recovery scanner (every {}s)",
            config.convergence.periodic_recovery_interval_secs
        );
        let scanner = RecoveryScanner::new(
            Arc::clone(&storage),
            Arc::clone(&engine),
            &config.convergence,
        );
        let (tx, rx) = tokio::sync::oneshot::channel();
        shutdown_txs.push(tx);
        scanner_tasks.push(tokio::spawn(async move {
            if let Err(e) = scanner.run_with_shutdown(Some(rx)).await {
                error!("Recovery scanner failed: {}", e);
            }
        }));
    }

    if config.convergence.enable_sync_timer {
        info!(
            "Starting periodic resync scanner (every {}s)",
            config.convergence.periodic_sync_interval_secs
        );
        let scanner = PeriodicResyncScanner::new(
            Arc::clone(&storage),
            Arc::clone(&engine),
            config.convergence.clone(),
        );
        let (tx, rx) = tokio::sync::oneshot::channel();
        shutdown_txs.push(tx);
        scanner_tasks.push(tokio::spawn(async move {
            if let Err(e) = scanner.run_with_shutdown(Some(rx)).await {
                error!("Resync scanner failed: {}", e);
            }
        }));
    }

    info!("Daemon initialized successfully");

    let signal_name = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal_name);

    for tx in shutdown_txs {
        let _ = tx.send(());
    }
    for task in scanner_tasks {
        let _ = task.await;
    }
    drop(engine);
    event_task.abort();

    info!("Shutting down daemon");
    Ok(())
}

/// Map an engine event to an operator log line
fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::ConvergenceStarted {
            zone_name, action, ..
        } => info!(zone = %zone_name, %action, "convergence started"),
        EngineEvent::ConvergenceSkipped { zone_id, reason } => {
            info!(zone_id, reason, "convergence skipped")
        }
        EngineEvent::TargetExcluded { zone_id, target_id } => {
            info!(zone_id, target_id, "target excluded")
        }
        EngineEvent::TargetConfirmed { zone_id, target_id } => {
            info!(zone_id, target_id, "target confirmed")
        }
        EngineEvent::TargetFailed {
            zone_id,
            target_id,
            error,
        } => warn!(zone_id, target_id, error, "target failed"),
        EngineEvent::TargetTimedOut {
            zone_id,
            target_id,
            attempts,
        } => warn!(zone_id, target_id, attempts, "target timed out"),
        EngineEvent::ZoneStatusChanged { zone_id, status } => {
            info!(zone_id, %status, "zone status changed")
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let name = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(name)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
