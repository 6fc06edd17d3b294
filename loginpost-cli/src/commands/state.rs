//! `loginpost state` command handler

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use loginpost_core::config::LoginpostConfig;
use loginpost_login_reader::{
    FileStateStore, LoginEvent, LoginReaderError, PersistedState, TrackedFile,
};

use crate::cli::{StateAction, StateArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `state` command.
pub async fn execute(
    args: StateArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        StateAction::Show { state_dir } => {
            let dir = match state_dir {
                Some(dir) => dir,
                None => {
                    let config = LoginpostConfig::load(config_path).await?;
                    PathBuf::from(config.login.state_dir)
                }
            };
            let report = load_state_report(&dir)?;
            writer.render(&report)
        }
    }
}

/// Read the persisted tables without creating the directory.
pub fn load_state_report(dir: &Path) -> Result<StateReport, CliError> {
    info!(state_dir = %dir.display(), "loading persisted state");

    let mut report = StateReport {
        state_dir: dir.display().to_string(),
        files: Vec::new(),
        sessions: Vec::new(),
        diagnostics: Vec::new(),
    };
    if !dir.is_dir() {
        return Ok(report);
    }

    let store = FileStateStore::open(dir).map_err(LoginReaderError::from)?;
    let state = PersistedState::load(&store)?;
    report.files = state.files.into_values().collect();
    report.sessions = state.sessions.into_values().collect();
    report.diagnostics = state.diagnostics.iter().map(ToString::to_string).collect();
    Ok(report)
}

/// Persisted reader state.
#[derive(Serialize)]
pub struct StateReport {
    pub state_dir: String,
    /// Tracked files ordered by inode
    pub files: Vec<TrackedFile>,
    /// Open sessions ordered by terminal
    pub sessions: Vec<LoginEvent>,
    /// Tables discarded as corrupt
    pub diagnostics: Vec<String>,
}

impl Render for StateReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "State: {}", self.state_dir.bold())?;
        writeln!(w)?;

        writeln!(w, "Tracked files ({}):", self.files.len())?;
        writeln!(
            w,
            "  {:<12} {:<6} {:>12} {:>12}  {}",
            "INODE", "KIND", "OFFSET", "SIZE", "PATH"
        )?;
        for f in &self.files {
            writeln!(
                w,
                "  {:<12} {:<6} {:>12} {:>12}  {}",
                f.inode,
                f.kind.to_string(),
                f.offset,
                f.size,
                f.path.display()
            )?;
        }

        writeln!(w)?;
        writeln!(w, "Open sessions ({}):", self.sessions.len())?;
        for s in &self.sessions {
            writeln!(
                w,
                "  {:<10} {:<12} {:<20} since {}",
                s.terminal,
                s.username,
                if s.hostname.is_empty() { "-" } else { &s.hostname },
                s.timestamp.format("%Y-%m-%d %H:%M:%S")
            )?;
        }

        for d in &self.diagnostics {
            writeln!(w, "  {}: {}", "corrupt".red(), d)?;
        }
        Ok(())
    }
}
