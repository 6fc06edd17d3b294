//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Loginpost -- wtmp/btmp login accounting reader.
///
/// Use `loginpost <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "loginpost", version, about, long_about = None)]
pub struct Cli {
    /// Path to the loginpost.toml configuration file.
    #[arg(short, long, default_value = "loginpost.toml")]
    pub config: PathBuf,

    /// Log level for diagnostics on stderr (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one read cycle over the configured wtmp/btmp files.
    Read(ReadArgs),

    /// Inspect persisted reader state.
    State(StateArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- read ----

/// Run a single read cycle and print the records it produced.
#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Override the state directory from the configuration.
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Start from the persisted offsets but do not write them back.
    #[arg(long)]
    pub no_persist: bool,
}

// ---- state ----

/// Inspect persisted reader state.
#[derive(Args, Debug)]
pub struct StateArgs {
    #[command(subcommand)]
    pub action: StateAction,
}

#[derive(Subcommand, Debug)]
pub enum StateAction {
    /// Show tracked files and open sessions.
    Show {
        /// Override the state directory from the configuration.
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },
}

// ---- config ----

/// Manage loginpost configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, login, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_read_defaults() {
        let cli = Cli::try_parse_from(["loginpost", "read"]).expect("should parse 'read'");
        assert_eq!(cli.config, PathBuf::from("loginpost.toml"));
        assert_eq!(cli.output, OutputFormat::Text);
        match cli.command {
            Commands::Read(args) => {
                assert!(args.state_dir.is_none());
                assert!(!args.no_persist);
            }
            _ => panic!("expected Read command"),
        }
    }

    #[test]
    fn test_cli_parse_read_with_flags() {
        let cli = Cli::try_parse_from([
            "loginpost",
            "read",
            "--state-dir",
            "/tmp/state",
            "--no-persist",
        ])
        .expect("should parse read flags");
        match cli.command {
            Commands::Read(args) => {
                assert_eq!(args.state_dir, Some(PathBuf::from("/tmp/state")));
                assert!(args.no_persist);
            }
            _ => panic!("expected Read command"),
        }
    }

    #[test]
    fn test_cli_parse_state_show() {
        let cli = Cli::try_parse_from(["loginpost", "state", "show", "--state-dir", "/var/x"])
            .expect("should parse 'state show'");
        match cli.command {
            Commands::State(StateArgs {
                action: StateAction::Show { state_dir },
            }) => assert_eq!(state_dir, Some(PathBuf::from("/var/x"))),
            _ => panic!("expected State Show command"),
        }
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let cli = Cli::try_parse_from(["loginpost", "config", "show", "--section", "login"])
            .expect("should parse config show");
        match cli.command {
            Commands::Config(ConfigArgs {
                action: ConfigAction::Show { section },
            }) => assert_eq!(section.as_deref(), Some("login")),
            _ => panic!("expected Config Show command"),
        }
    }

    #[test]
    fn test_cli_global_output_after_subcommand() {
        let cli = Cli::try_parse_from(["loginpost", "config", "validate", "--output", "json"])
            .expect("global flag should be accepted after the subcommand");
        assert_eq!(cli.output, OutputFormat::Json);
    }

    #[test]
    fn test_cli_rejects_unknown_output_format() {
        let result = Cli::try_parse_from(["loginpost", "--output", "yaml", "read"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["loginpost"]).is_err());
    }

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }
}
