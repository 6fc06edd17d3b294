//! Integration tests for `loginpost config`.

use std::fs;

use loginpost_cli::cli::{Cli, OutputFormat};
use loginpost_core::config::LoginpostConfig;
use tempfile::TempDir;

#[tokio::test]
async fn test_config_validate_valid_toml() {
    // Given: A valid config file
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config_path = temp_dir.path().join("loginpost.toml");
    fs::write(
        &config_path,
        r#"
[general]
log_level = "info"
log_format = "json"

[login]
enabled = true
wtmp_file_pattern = "/var/log/wtmp*"
"#,
    )
    .expect("should write config");

    // When: Loading the config
    let result = LoginpostConfig::load(&config_path).await;

    // Then: Should succeed
    assert!(result.is_ok(), "valid config should load: {:?}", result.err());
}

#[tokio::test]
async fn test_config_validate_command_rejects_bad_pattern() {
    // Given: A config with an unparsable glob
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("loginpost.toml");
    fs::write(&config_path, "[login]\nbtmp_file_pattern = \"[\"\n").unwrap();

    let cli = Cli {
        config: config_path,
        log_level: None,
        output: OutputFormat::Json,
        command: loginpost_cli::cli::Commands::Config(loginpost_cli::cli::ConfigArgs {
            action: loginpost_cli::cli::ConfigAction::Validate,
        }),
    };

    // When: Running `config validate`
    let err = loginpost_cli::run(cli).await.unwrap_err();

    // Then: Exits with the configuration error code
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_config_show_missing_file_is_config_error() {
    let cli = Cli {
        config: "/nonexistent/loginpost.toml".into(),
        log_level: None,
        output: OutputFormat::Text,
        command: loginpost_cli::cli::Commands::Config(loginpost_cli::cli::ConfigArgs {
            action: loginpost_cli::cli::ConfigAction::Show { section: None },
        }),
    };

    let err = loginpost_cli::run(cli).await.unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_config_validate_malformed_toml() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("bad.toml");
    fs::write(&config_path, "[general\nlog_level = \"info\"\n").unwrap();

    assert!(LoginpostConfig::load(&config_path).await.is_err());
}
