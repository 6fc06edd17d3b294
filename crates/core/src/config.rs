//! 설정 관리 -- loginpost.toml 파싱 및 런타임 설정
//!
//! [`LoginpostConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`LOGINPOST_LOGIN_POLL_INTERVAL_SECS=30` 형식)
//! 3. 설정 파일 (`loginpost.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), loginpost_core::error::LoginpostError> {
//! use loginpost_core::config::LoginpostConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = LoginpostConfig::load("loginpost.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = LoginpostConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, LoginpostError};

/// 패턴 길이 상한 (바이트)
const MAX_PATTERN_LEN: usize = 4096;

/// 폴링 주기 상한 (초)
const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

/// Loginpost 통합 설정
///
/// `loginpost.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 모듈은 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginpostConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 로그인 기록 수집 설정
    #[serde(default)]
    pub login: LoginConfig,
    /// 메트릭 설정
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl LoginpostConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱
    /// 2. 환경변수 오버라이드 적용
    /// 3. 유효성 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LoginpostError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, LoginpostError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LoginpostError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                LoginpostError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, LoginpostError> {
        toml::from_str(toml_str).map_err(|e| {
            LoginpostError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `LOGINPOST_{SECTION}_{FIELD}`
    /// 예: `LOGINPOST_LOGIN_WTMP_FILE_PATTERN=/var/log/wtmp*`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "LOGINPOST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "LOGINPOST_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "LOGINPOST_GENERAL_DATA_DIR");
        override_string(&mut self.general.pid_file, "LOGINPOST_GENERAL_PID_FILE");

        // Login
        override_bool(&mut self.login.enabled, "LOGINPOST_LOGIN_ENABLED");
        override_string(
            &mut self.login.wtmp_file_pattern,
            "LOGINPOST_LOGIN_WTMP_FILE_PATTERN",
        );
        override_string(
            &mut self.login.btmp_file_pattern,
            "LOGINPOST_LOGIN_BTMP_FILE_PATTERN",
        );
        override_u64(
            &mut self.login.poll_interval_secs,
            "LOGINPOST_LOGIN_POLL_INTERVAL_SECS",
        );
        override_string(&mut self.login.state_dir, "LOGINPOST_LOGIN_STATE_DIR");
        override_usize(
            &mut self.login.channel_capacity,
            "LOGINPOST_LOGIN_CHANNEL_CAPACITY",
        );
        override_bool(&mut self.login.resolve_uids, "LOGINPOST_LOGIN_RESOLVE_UIDS");
        override_string(&mut self.login.passwd_path, "LOGINPOST_LOGIN_PASSWD_PATH");

        // Metrics
        override_bool(&mut self.metrics.enabled, "LOGINPOST_METRICS_ENABLED");
        override_string(&mut self.metrics.listen_addr, "LOGINPOST_METRICS_LISTEN_ADDR");
        override_u16(&mut self.metrics.port, "LOGINPOST_METRICS_PORT");
        override_string(&mut self.metrics.endpoint, "LOGINPOST_METRICS_ENDPOINT");
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), LoginpostError> {
        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.login.enabled {
            validate_pattern("login.wtmp_file_pattern", &self.login.wtmp_file_pattern)?;
            validate_pattern("login.btmp_file_pattern", &self.login.btmp_file_pattern)?;

            if self.login.poll_interval_secs == 0
                || self.login.poll_interval_secs > MAX_POLL_INTERVAL_SECS
            {
                return Err(ConfigError::InvalidValue {
                    field: "login.poll_interval_secs".to_owned(),
                    reason: format!("must be between 1 and {MAX_POLL_INTERVAL_SECS}"),
                }
                .into());
            }

            if self.login.channel_capacity == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "login.channel_capacity".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                }
                .into());
            }

            if self.login.state_dir.is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "login.state_dir".to_owned(),
                    reason: "state directory must not be empty".to_owned(),
                }
                .into());
            }
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "metrics.port".to_owned(),
                    reason: "must be greater than 0".to_owned(),
                }
                .into());
            }
            if !self.metrics.endpoint.starts_with('/') {
                return Err(ConfigError::InvalidValue {
                    field: "metrics.endpoint".to_owned(),
                    reason: "must start with '/'".to_owned(),
                }
                .into());
            }
        }

        Ok(())
    }
}

fn validate_pattern(field: &str, pattern: &str) -> Result<(), LoginpostError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.to_owned(),
            reason: "pattern must not be empty".to_owned(),
        }
        .into());
    }
    if pattern.len() > MAX_PATTERN_LEN {
        return Err(ConfigError::InvalidValue {
            field: field.to_owned(),
            reason: format!("pattern exceeds {MAX_PATTERN_LEN} bytes"),
        }
        .into());
    }
    if pattern.contains('\0') {
        return Err(ConfigError::InvalidValue {
            field: field.to_owned(),
            reason: "pattern must not contain NUL bytes".to_owned(),
        }
        .into());
    }
    if let Err(e) = glob::Pattern::new(pattern) {
        return Err(ConfigError::InvalidValue {
            field: field.to_owned(),
            reason: format!("invalid glob: {e}"),
        }
        .into());
    }
    Ok(())
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
    /// PID 파일 경로 (빈 문자열이면 생성하지 않음)
    pub pid_file: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            data_dir: "/var/lib/loginpost".to_owned(),
            pid_file: "/var/run/loginpost.pid".to_owned(),
        }
    }
}

/// 로그인 기록 수집 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 정상 로그인 기록(wtmp) 파일 glob 패턴
    pub wtmp_file_pattern: String,
    /// 로그인 실패 기록(btmp) 파일 glob 패턴
    pub btmp_file_pattern: String,
    /// 읽기 주기 (초)
    pub poll_interval_secs: u64,
    /// 읽기 위치/세션 상태 저장 디렉토리
    pub state_dir: String,
    /// 레코드 채널 용량
    pub channel_capacity: usize,
    /// 사용자명으로 UID 조회 여부
    pub resolve_uids: bool,
    /// UID 조회에 사용할 passwd 파일
    pub passwd_path: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            wtmp_file_pattern: "/var/log/wtmp*".to_owned(),
            btmp_file_pattern: "/var/log/btmp*".to_owned(),
            poll_interval_secs: 10,
            state_dir: "/var/lib/loginpost/state".to_owned(),
            channel_capacity: 1024,
            resolve_uids: false,
            passwd_path: "/etc/passwd".to_owned(),
        }
    }
}

/// Prometheus 메트릭 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// 수신 주소
    pub listen_addr: String,
    /// 수신 포트
    pub port: u16,
    /// 노출 경로
    pub endpoint: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: "127.0.0.1".to_owned(),
            port: 9100,
            endpoint: "/metrics".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}

fn override_u16(target: &mut u16, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u16 from env var, ignoring"
            ),
        }
    }
}

fn override_u64(target: &mut u64, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u64>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse u64 from env var, ignoring"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = LoginpostConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "json");
        assert!(config.login.enabled);
        assert_eq!(config.login.wtmp_file_pattern, "/var/log/wtmp*");
        assert_eq!(config.login.btmp_file_pattern, "/var/log/btmp*");
        assert!(!config.login.resolve_uids);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn default_config_passes_validation() {
        let config = LoginpostConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn from_str_empty_toml_uses_defaults() {
        let config = LoginpostConfig::parse("").unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.login.poll_interval_secs, 10);
    }

    #[test]
    fn from_str_partial_toml_merges_with_defaults() {
        let toml = r#"
[general]
log_level = "debug"

[login]
wtmp_file_pattern = "/srv/acct/wtmp*"
"#;
        let config = LoginpostConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "debug");
        // log_format은 기본값 유지
        assert_eq!(config.general.log_format, "json");
        assert_eq!(config.login.wtmp_file_pattern, "/srv/acct/wtmp*");
        assert_eq!(config.login.btmp_file_pattern, "/var/log/btmp*");
    }

    #[test]
    fn from_str_full_toml() {
        let toml = r#"
[general]
log_level = "warn"
log_format = "pretty"
data_dir = "/opt/loginpost/data"
pid_file = "/opt/loginpost/loginpost.pid"

[login]
enabled = true
wtmp_file_pattern = "/data/wtmp*"
btmp_file_pattern = "/data/btmp*"
poll_interval_secs = 30
state_dir = "/opt/loginpost/state"
channel_capacity = 64
resolve_uids = true
passwd_path = "/data/passwd"

[metrics]
enabled = true
listen_addr = "0.0.0.0"
port = 9200
endpoint = "/prom"
"#;
        let config = LoginpostConfig::parse(toml).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.login.poll_interval_secs, 30);
        assert_eq!(config.login.channel_capacity, 64);
        assert!(config.login.resolve_uids);
        assert_eq!(config.metrics.port, 9200);
        config.validate().unwrap();
    }

    #[test]
    fn from_str_invalid_toml_returns_error() {
        let result = LoginpostConfig::parse("invalid = [[[toml");
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            LoginpostError::Config(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn validate_rejects_invalid_log_level() {
        let mut config = LoginpostConfig::default();
        config.general.log_level = "verbose".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_level"));
    }

    #[test]
    fn validate_rejects_invalid_log_format() {
        let mut config = LoginpostConfig::default();
        config.general.log_format = "xml".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log_format"));
    }

    #[test]
    fn validate_rejects_empty_pattern_when_enabled() {
        let mut config = LoginpostConfig::default();
        config.login.btmp_file_pattern = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("btmp_file_pattern"));
    }

    #[test]
    fn validate_skips_login_checks_when_disabled() {
        let mut config = LoginpostConfig::default();
        config.login.enabled = false;
        config.login.poll_interval_secs = 0;
        config.login.wtmp_file_pattern = String::new();
        // 수집기가 비활성화 상태면 login 섹션 검증을 건너뜀
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_malformed_glob() {
        let mut config = LoginpostConfig::default();
        config.login.btmp_file_pattern = "/var/log/[btmp".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("login.btmp_file_pattern"));
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        let mut config = LoginpostConfig::default();
        config.login.poll_interval_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn validate_rejects_zero_channel_capacity() {
        let mut config = LoginpostConfig::default();
        config.login.channel_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("channel_capacity"));
    }

    #[test]
    fn validate_rejects_metrics_endpoint_without_slash() {
        let mut config = LoginpostConfig::default();
        config.metrics.enabled = true;
        config.metrics.endpoint = "metrics".to_owned();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("metrics.endpoint"));
    }

    #[test]
    fn env_override_string() {
        let mut val = "original".to_owned();
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_LOGINPOST_STR", "overridden") };
        override_string(&mut val, "TEST_LOGINPOST_STR");
        assert_eq!(val, "overridden");
        unsafe { std::env::remove_var("TEST_LOGINPOST_STR") };
    }

    #[test]
    fn env_override_bool_invalid_keeps_original() {
        let mut val = false;
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_LOGINPOST_BOOL_BAD", "not-a-bool") };
        override_bool(&mut val, "TEST_LOGINPOST_BOOL_BAD");
        assert!(!val); // 원래 값 유지
        unsafe { std::env::remove_var("TEST_LOGINPOST_BOOL_BAD") };
    }

    #[test]
    fn env_override_u64_valid() {
        let mut val = 10u64;
        // SAFETY: 테스트는 단일 스레드에서 실행되므로 환경변수 조작이 안전합니다.
        unsafe { std::env::set_var("TEST_LOGINPOST_U64", "45") };
        override_u64(&mut val, "TEST_LOGINPOST_U64");
        assert_eq!(val, 45);
        unsafe { std::env::remove_var("TEST_LOGINPOST_U64") };
    }

    #[test]
    fn env_override_missing_var_keeps_original() {
        let mut val = "original".to_owned();
        override_string(&mut val, "TEST_LOGINPOST_NONEXISTENT_12345");
        assert_eq!(val, "original");
    }

    #[test]
    fn config_serialize_roundtrip() {
        let config = LoginpostConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = LoginpostConfig::parse(&toml_str).unwrap();
        assert_eq!(config.general.log_level, parsed.general.log_level);
        assert_eq!(
            config.login.wtmp_file_pattern,
            parsed.login.wtmp_file_pattern
        );
        assert_eq!(config.metrics.port, parsed.metrics.port);
    }

    #[tokio::test]
    async fn from_file_not_found() {
        let result = LoginpostConfig::from_file("/nonexistent/path/loginpost.toml").await;
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            LoginpostError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
