//! CLI-specific error types and exit code mapping

use loginpost_core::error::LoginpostError;
use loginpost_login_reader::LoginReaderError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The read cycle stopped before finishing every file.
    #[error("read cycle aborted: {0}")]
    CycleAborted(String),

    /// Reader construction or state store failure.
    #[error("{0}")]
    Reader(#[from] LoginReaderError),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from loginpost-core.
    #[error("{0}")]
    Core(#[from] LoginpostError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                              |
    /// |------|--------------------------------------|
    /// | 0    | Success                              |
    /// | 1    | Command error or aborted read cycle  |
    /// | 2    | Configuration error                  |
    /// | 10   | IO error                             |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Core(LoginpostError::Config(_)) => 2,
            Self::Io(_) => 10,
            Self::Command(_)
            | Self::CycleAborted(_)
            | Self::Reader(_)
            | Self::JsonSerialize(_)
            | Self::Core(_) => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_core_config_error() {
        use loginpost_core::error::ConfigError;
        let err: CliError = LoginpostError::Config(ConfigError::FileNotFound {
            path: "loginpost.toml".to_owned(),
        })
        .into();
        assert_eq!(err.exit_code(), 2, "core config errors are config errors");
    }

    #[test]
    fn test_exit_code_cycle_aborted() {
        let err = CliError::CycleAborted("state store error".to_owned());
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().starts_with("read cycle aborted"));
    }

    #[test]
    fn test_exit_code_reader_error() {
        let err: CliError = LoginReaderError::Channel("closed".to_owned()).into();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        assert_eq!(CliError::Io(io_err).exit_code(), 10);
    }

    #[test]
    fn test_error_display_command() {
        let err = CliError::Command("unknown section: foo".to_owned());
        assert_eq!(err.to_string(), "unknown section: foo");
    }
}
