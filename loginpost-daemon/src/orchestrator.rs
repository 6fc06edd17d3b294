//! Module orchestration -- assembly, channel wiring, and lifecycle management.
//!
//! The [`Orchestrator`] builds the login reader from configuration,
//! writes the PID file, starts the reader, logs every `LoginRecord`
//! it produces, and shuts everything down on SIGTERM/SIGINT.
//!
//! # Shutdown Order
//!
//! 1. Login reader (finishes its running cycle and flushes state)
//! 2. Record logger (drains records already queued)
//! 3. PID file removal

use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc};

use loginpost_core::config::LoginpostConfig;
use loginpost_core::event::LoginRecord;

use crate::health::{DaemonHealth, ModuleHealth, aggregate_status};
use crate::metrics_server;
use crate::modules::{ModuleHandle, login_reader};

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: LoginpostConfig,
    /// The login reader, absent when disabled in configuration.
    module: Option<ModuleHandle>,
    /// Shutdown broadcast sender (signals all background tasks).
    shutdown_tx: broadcast::Sender<()>,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
    /// Record receiver, handed to the record logger on `run`.
    record_rx: Option<mpsc::Receiver<LoginRecord>>,
}

impl Orchestrator {
    /// Load configuration from disk and build the orchestrator.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = LoginpostConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    ///
    /// Restores the login reader's persisted state, so a corrupt or
    /// unreadable state directory surfaces here.
    pub async fn build_from_config(config: LoginpostConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
        }

        let (record_tx, record_rx) = mpsc::channel::<LoginRecord>(config.login.channel_capacity);
        let (shutdown_tx, _) = broadcast::channel(16);

        let module = login_reader::init(&config, record_tx)?;
        let record_rx = module.is_some().then_some(record_rx);
        let module_count = usize::from(module.is_some());

        tracing::info!(
            modules = module_count,
            login_reader = module.is_some(),
            "orchestrator initialized"
        );

        if config.metrics.enabled {
            record_daemon_metrics(module_count);
        }

        Ok(Self {
            config,
            module,
            shutdown_tx,
            start_time: Instant::now(),
            record_rx,
        })
    }

    /// Start the login reader and wait for a shutdown signal.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        let pid_file = self.pid_file();
        if let Some(path) = pid_file.as_deref() {
            write_pid_file(path)?;
        }

        if let Some(module) = self.module.as_mut() {
            if let Err(e) = module.start().await {
                if let Some(path) = pid_file.as_deref() {
                    remove_pid_file(path);
                }
                return Err(e);
            }
        }

        let record_logger = self
            .record_rx
            .take()
            .map(|rx| spawn_record_logger(rx, self.shutdown_tx.subscribe()));

        let uptime_updater = self
            .config
            .metrics
            .enabled
            .then(|| spawn_uptime_updater(self.start_time, self.shutdown_tx.subscribe()));

        tracing::info!("loginpost-daemon running");
        let signal = wait_for_shutdown_signal().await;

        let result = match signal {
            Ok(signal) => {
                tracing::info!(signal = signal, "shutdown signal received");
                Ok(())
            }
            Err(e) => Err(e),
        };

        let stop_result = self.shutdown().await;

        tracing::debug!("broadcasting shutdown signal to background tasks");
        let _ = self.shutdown_tx.send(());
        if let Some(task) = record_logger {
            let _ = task.await;
        }
        if let Some(task) = uptime_updater {
            let _ = task.await;
        }

        if let Some(path) = pid_file.as_deref() {
            remove_pid_file(path);
        }

        result.and(stop_result)
    }

    async fn shutdown(&mut self) -> Result<()> {
        match self.module.as_mut() {
            Some(module) => module.stop().await,
            None => Ok(()),
        }
    }

    /// Current aggregated health status.
    pub async fn health(&self) -> DaemonHealth {
        let mut modules: Vec<ModuleHealth> = Vec::new();
        if let Some(module) = &self.module {
            modules.push(module.health().await);
        }

        DaemonHealth {
            status: aggregate_status(&modules),
            uptime_secs: self.start_time.elapsed().as_secs(),
            modules,
        }
    }

    /// The loaded configuration.
    pub fn config(&self) -> &LoginpostConfig {
        &self.config
    }

    fn pid_file(&self) -> Option<std::path::PathBuf> {
        let pid_file = &self.config.general.pid_file;
        (!pid_file.is_empty()).then(|| std::path::PathBuf::from(pid_file))
    }
}

/// Wait for SIGTERM or SIGINT and return the signal name.
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Write the current process PID to `path`.
///
/// The file is created with `create_new` and mode 0600; the parent
/// directory is created with mode 0700. An existing file is an error.
pub fn write_pid_file(path: &Path) -> Result<()> {
    use std::fs::{self, OpenOptions};
    use std::io::{ErrorKind, Write};

    if let Some(parent) = path.parent() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            fs::DirBuilder::new()
                .mode(0o700)
                .recursive(true)
                .create(parent)?;
        }
        #[cfg(not(unix))]
        fs::create_dir_all(parent)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = match options.open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let existing = fs::read_to_string(path).unwrap_or_else(|_| "unknown".to_owned());
            return Err(anyhow::anyhow!(
                "PID file {} already exists with PID: {}. Is another instance running?",
                path.display(),
                existing.trim()
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let pid = std::process::id();
    writeln!(file, "{}", pid)?;

    tracing::info!(pid = pid, path = %path.display(), "PID file written");
    Ok(())
}

/// Remove the PID file, logging instead of failing.
pub fn remove_pid_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "PID file removed"),
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove PID file"),
    }
}

/// Log one record as a structured event.
fn log_record(record: &LoginRecord) {
    tracing::info!(
        record_id = %record.id,
        trace_id = %record.metadata.trace_id,
        source_module = %record.metadata.source_module,
        kind = %record.kind,
        terminal = %record.terminal,
        username = %record.username,
        user_id = ?record.user_id,
        hostname = %record.hostname,
        source_ip = ?record.source_ip,
        pid = record.pid,
        timestamp = %record.timestamp.to_rfc3339(),
        logout_timestamp = ?record.logout_timestamp.map(|t| t.to_rfc3339()),
        session_secs = ?record.session_duration().map(|d| d.num_seconds()),
        origin = %record.origin,
        "login record"
    );
}

/// Spawn the task that writes every `LoginRecord` to the log.
///
/// On shutdown it drains records already queued before exiting.
pub fn spawn_record_logger(
    mut record_rx: mpsc::Receiver<LoginRecord>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<u64> {
    tokio::spawn(async move {
        let mut logged = 0u64;
        loop {
            tokio::select! {
                record = record_rx.recv() => match record {
                    Some(record) => {
                        log_record(&record);
                        logged += 1;
                    }
                    None => {
                        tracing::debug!("record channel closed, exiting logger");
                        break;
                    }
                },
                _ = shutdown_rx.recv() => {
                    while let Ok(record) = record_rx.try_recv() {
                        log_record(&record);
                        logged += 1;
                    }
                    tracing::debug!(logged, "record logger shutting down");
                    break;
                }
            }
        }
        logged
    })
}

/// Record daemon-level metrics (build info, modules registered).
fn record_daemon_metrics(module_count: usize) {
    use loginpost_core::metrics as m;

    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    metrics::gauge!(m::DAEMON_MODULES_REGISTERED).set(module_count as f64);
}

/// Spawn a task that refreshes the uptime gauge every 10 seconds.
fn spawn_uptime_updater(
    start_time: Instant,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    use loginpost_core::metrics as m;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(10));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    metrics::gauge!(m::DAEMON_UPTIME_SECONDS)
                        .set(start_time.elapsed().as_secs() as f64);
                }
                _ = shutdown_rx.recv() => break,
            }
        }
    })
}
