//! loginpost.toml 통합 설정 테스트
//!
//! - loginpost.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use loginpost_core::config::LoginpostConfig;
use loginpost_core::error::{ConfigError, LoginpostError};

// =============================================================================
// loginpost.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../loginpost.toml.example");
    let config = LoginpostConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "info");
    assert_eq!(config.general.log_format, "json");
    assert_eq!(config.general.data_dir, "/var/lib/loginpost");
    assert_eq!(config.general.pid_file, "/var/run/loginpost/loginpost.pid");
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../loginpost.toml.example");
    let config = LoginpostConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_has_correct_login_defaults() {
    let content = include_str!("../../../loginpost.toml.example");
    let config = LoginpostConfig::parse(content).expect("should parse");

    assert!(config.login.enabled);
    assert_eq!(config.login.wtmp_file_pattern, "/var/log/wtmp*");
    assert_eq!(config.login.btmp_file_pattern, "/var/log/btmp*");
    assert_eq!(config.login.poll_interval_secs, 10);
    assert_eq!(config.login.state_dir, "/var/lib/loginpost/state");
    assert_eq!(config.login.channel_capacity, 1024);
    assert!(!config.login.resolve_uids, "uid lookup is opt-in");
}

#[test]
fn example_config_matches_code_defaults() {
    let content = include_str!("../../../loginpost.toml.example");
    let parsed = LoginpostConfig::parse(content).expect("should parse");
    let defaults = LoginpostConfig::default();

    // pid_file은 예시에서 하위 디렉토리를 사용하므로 비교에서 제외
    assert_eq!(parsed.general.log_level, defaults.general.log_level);
    assert_eq!(parsed.general.log_format, defaults.general.log_format);
    assert_eq!(
        parsed.login.wtmp_file_pattern,
        defaults.login.wtmp_file_pattern
    );
    assert_eq!(
        parsed.login.btmp_file_pattern,
        defaults.login.btmp_file_pattern
    );
    assert_eq!(
        parsed.login.poll_interval_secs,
        defaults.login.poll_interval_secs
    );
    assert_eq!(parsed.metrics.enabled, defaults.metrics.enabled);
    assert_eq!(parsed.metrics.port, defaults.metrics.port);
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_general_only() {
    let toml = r#"
[general]
log_level = "debug"
log_format = "pretty"
"#;
    let config = LoginpostConfig::parse(toml).expect("should parse");
    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "pretty");
    // 나머지 섹션은 기본값
    assert!(config.login.enabled);
    assert!(!config.metrics.enabled);
}

#[test]
fn partial_config_login_only() {
    let toml = r#"
[login]
btmp_file_pattern = "/srv/log/btmp*"
poll_interval_secs = 60
"#;
    let config = LoginpostConfig::parse(toml).expect("should parse");
    assert_eq!(config.login.btmp_file_pattern, "/srv/log/btmp*");
    assert_eq!(config.login.poll_interval_secs, 60);
    assert_eq!(config.login.wtmp_file_pattern, "/var/log/wtmp*");
    assert_eq!(config.general.log_level, "info");
}

#[test]
fn partial_config_metrics_only() {
    let toml = r#"
[metrics]
enabled = true
port = 9300
"#;
    let config = LoginpostConfig::parse(toml).expect("should parse");
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.port, 9300);
    assert_eq!(config.metrics.endpoint, "/metrics");
    config.validate().expect("should validate");
}

// =============================================================================
// 에러 케이스 테스트
// =============================================================================

#[test]
fn empty_string_uses_all_defaults() {
    let config = LoginpostConfig::parse("").expect("empty config should parse");
    config.validate().expect("defaults should validate");
}

#[test]
fn wrong_type_returns_parse_error() {
    let toml = r#"
[login]
poll_interval_secs = "ten"
"#;
    let err = LoginpostConfig::parse(toml).unwrap_err();
    assert!(matches!(
        err,
        LoginpostError::Config(ConfigError::ParseFailed { .. })
    ));
}

#[test]
fn invalid_value_reports_field_name() {
    let toml = r#"
[login]
channel_capacity = 0
"#;
    let config = LoginpostConfig::parse(toml).expect("should parse");
    let err = config.validate().unwrap_err();
    match err {
        LoginpostError::Config(ConfigError::InvalidValue { field, .. }) => {
            assert_eq!(field, "login.channel_capacity");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn load_from_file_applies_validation() {
    let dir = std::env::temp_dir().join(format!("loginpost_cfg_{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("should create temp dir");
    let path = dir.join("loginpost.toml");
    std::fs::write(&path, "[login]\npoll_interval_secs = 0\n").expect("should write config");

    let result = LoginpostConfig::load(&path).await;
    let _ = std::fs::remove_dir_all(&dir);

    assert!(result.is_err(), "zero poll interval must be rejected");
}

// =============================================================================
// 환경변수 우선순위 테스트
// =============================================================================

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let toml = r#"
[general]
log_level = "info"
"#;

    let original = std::env::var("LOGINPOST_GENERAL_LOG_LEVEL").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("LOGINPOST_GENERAL_LOG_LEVEL", "error");
    }

    let mut config = LoginpostConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.general.log_level.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGINPOST_GENERAL_LOG_LEVEL", val),
            None => std::env::remove_var("LOGINPOST_GENERAL_LOG_LEVEL"),
        }
    }

    assert_eq!(result, "error");
}

#[test]
#[serial_test::serial]
fn env_override_pattern_field() {
    let original = std::env::var("LOGINPOST_LOGIN_WTMP_FILE_PATTERN").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("LOGINPOST_LOGIN_WTMP_FILE_PATTERN", "/tmp/acct/wtmp*");
    }

    let mut config = LoginpostConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.login.wtmp_file_pattern.clone();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGINPOST_LOGIN_WTMP_FILE_PATTERN", val),
            None => std::env::remove_var("LOGINPOST_LOGIN_WTMP_FILE_PATTERN"),
        }
    }

    assert_eq!(result, "/tmp/acct/wtmp*");
}

#[test]
#[serial_test::serial]
fn env_override_bool_field() {
    let original = std::env::var("LOGINPOST_LOGIN_RESOLVE_UIDS").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("LOGINPOST_LOGIN_RESOLVE_UIDS", "true");
    }

    let mut config = LoginpostConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.login.resolve_uids;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGINPOST_LOGIN_RESOLVE_UIDS", val),
            None => std::env::remove_var("LOGINPOST_LOGIN_RESOLVE_UIDS"),
        }
    }

    assert!(result);
}

#[test]
#[serial_test::serial]
fn env_override_numeric_field() {
    let original = std::env::var("LOGINPOST_METRICS_PORT").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("LOGINPOST_METRICS_PORT", "9999");
    }

    let mut config = LoginpostConfig::parse("").expect("should parse");
    config.apply_env_overrides();
    let result = config.metrics.port;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGINPOST_METRICS_PORT", val),
            None => std::env::remove_var("LOGINPOST_METRICS_PORT"),
        }
    }

    assert_eq!(result, 9999);
}

#[test]
#[serial_test::serial]
fn env_override_invalid_numeric_keeps_toml_value() {
    let toml = r#"
[login]
poll_interval_secs = 25
"#;
    let original = std::env::var("LOGINPOST_LOGIN_POLL_INTERVAL_SECS").ok();
    // SAFETY: serial_test로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("LOGINPOST_LOGIN_POLL_INTERVAL_SECS", "soon");
    }

    let mut config = LoginpostConfig::parse(toml).expect("should parse");
    config.apply_env_overrides();
    let result = config.login.poll_interval_secs;

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("LOGINPOST_LOGIN_POLL_INTERVAL_SECS", val),
            None => std::env::remove_var("LOGINPOST_LOGIN_POLL_INTERVAL_SECS"),
        }
    }

    assert_eq!(result, 25);
}
