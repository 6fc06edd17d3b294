//! `loginpost read` command handler
//!
//! Runs exactly one read cycle in the foreground and prints what it produced.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use loginpost_core::config::LoginpostConfig;
use loginpost_core::event::LoginRecord;
use loginpost_core::pipeline::StateStore;
use loginpost_login_reader::{
    FILE_RECORDS_KEY, FileStateStore, LOGIN_SESSIONS_KEY, LoginReader, LoginReaderError,
    MemoryStateStore, PasswdLookup, ReaderConfig, UserLookup,
};

use crate::cli::ReadArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `read` command.
///
/// # Errors
///
/// Returns `CliError::CycleAborted` (exit code 1) after printing the report
/// if the cycle stopped on a fatal error.
pub async fn execute(
    args: ReadArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = LoginpostConfig::load(config_path).await?;

    let mut reader_config = ReaderConfig::from_core(&config.login);
    if let Some(dir) = args.state_dir {
        reader_config.state_dir = dir.display().to_string();
    }

    let no_persist = args.no_persist;
    let report = tokio::task::spawn_blocking(move || read_once(reader_config, no_persist))
        .await
        .map_err(|e| CliError::Command(format!("read task failed: {e}")))??;

    writer.render(&report)?;

    if report.aborted {
        let reason = report.diagnostics.last().cloned().unwrap_or_default();
        return Err(CliError::CycleAborted(reason));
    }
    Ok(())
}

/// Build a reader and run one cycle.
pub fn read_once(config: ReaderConfig, no_persist: bool) -> Result<ReadReport, CliError> {
    let store: Arc<dyn StateStore> = if no_persist {
        Arc::new(snapshot_store(Path::new(&config.state_dir))?)
    } else {
        Arc::new(FileStateStore::open(&config.state_dir).map_err(LoginReaderError::from)?)
    };

    let users = load_user_lookup(&config);
    let state_dir = config.state_dir.clone();
    let mut reader = LoginReader::new(config, store, users)?;

    info!(state_dir = %state_dir, no_persist, "running one read cycle");
    let output = reader.read();

    Ok(ReadReport {
        state_dir,
        persisted: !no_persist,
        aborted: output.is_aborted(),
        tracked_files: reader.tracked_files().len(),
        open_sessions: reader.open_sessions().len(),
        diagnostics: output.errors.iter().map(ToString::to_string).collect(),
        records: output.records,
    })
}

/// Copy the persisted blobs into memory so the cycle resumes from them
/// without writing anything back.
fn snapshot_store(dir: &Path) -> Result<MemoryStateStore, CliError> {
    let snapshot = MemoryStateStore::new();
    if !dir.is_dir() {
        return Ok(snapshot);
    }

    let disk = FileStateStore::open(dir).map_err(LoginReaderError::from)?;
    for key in [FILE_RECORDS_KEY, LOGIN_SESSIONS_KEY] {
        if let Some(blob) = disk.load(key).map_err(LoginReaderError::from)? {
            snapshot.store(key, &blob).map_err(LoginReaderError::from)?;
        }
    }
    Ok(snapshot)
}

fn load_user_lookup(config: &ReaderConfig) -> Option<Arc<dyn UserLookup>> {
    if !config.resolve_uids {
        return None;
    }
    match PasswdLookup::load(&config.passwd_path) {
        Ok(lookup) => Some(Arc::new(lookup)),
        Err(e) => {
            warn!(path = %config.passwd_path, error = %e, "passwd unreadable, uids not resolved");
            None
        }
    }
}

/// Result of one `read` invocation.
#[derive(Serialize)]
pub struct ReadReport {
    /// State directory the cycle resumed from
    pub state_dir: String,
    /// Whether offsets were written back
    pub persisted: bool,
    /// Whether the cycle stopped on a fatal error
    pub aborted: bool,
    /// Files tracked after the cycle
    pub tracked_files: usize,
    /// Sessions still open after the cycle
    pub open_sessions: usize,
    /// Records in emission order
    pub records: Vec<LoginRecord>,
    /// Non-fatal diagnostics, followed by the fatal error if any
    pub diagnostics: Vec<String>,
}

impl Render for ReadReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{:<20} {:<18} {:<12} {:<10} {:<20} {:<20}",
            "TIME", "KIND", "USER", "TERMINAL", "HOST", "LOGOUT"
        )?;
        writeln!(w, "{}", "-".repeat(104))?;

        for r in &self.records {
            let logout = r
                .logout_timestamp
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_owned());
            writeln!(
                w,
                "{:<20} {:<18} {:<12} {:<10} {:<20} {:<20}",
                r.timestamp.format("%Y-%m-%d %H:%M:%S"),
                r.kind.to_string(),
                display_or_dash(&r.username),
                display_or_dash(&r.terminal),
                display_or_dash(&r.hostname),
                logout
            )?;
        }

        writeln!(w)?;
        writeln!(
            w,
            "{} records, {} tracked files, {} open sessions{}",
            self.records.len(),
            self.tracked_files,
            self.open_sessions,
            if self.persisted { "" } else { " (state not saved)" }
        )?;

        for d in &self.diagnostics {
            writeln!(w, "  {}: {}", "warning".yellow(), d)?;
        }
        if self.aborted {
            writeln!(w, "{}", "cycle aborted".red().bold())?;
        }
        Ok(())
    }
}

fn display_or_dash(s: &str) -> &str {
    if s.is_empty() { "-" } else { s }
}
