//! 로그인 기록 수집기 설정
//!
//! [`ReaderConfig`]는 core의 [`LoginConfig`](loginpost_core::config::LoginConfig)에서
//! 파생되며, 빌더를 통해 테스트나 CLI에서 직접 구성할 수도 있습니다.
//!
//! # 사용 예시
//!
//! ```
//! use loginpost_login_reader::ReaderConfigBuilder;
//!
//! let config = ReaderConfigBuilder::new()
//!     .wtmp_file_pattern("/tmp/fixtures/wtmp*")
//!     .btmp_file_pattern("/tmp/fixtures/btmp*")
//!     .poll_interval_secs(5)
//!     .build()
//!     .unwrap();
//! assert_eq!(config.poll_interval_secs, 5);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::LoginReaderError;
use crate::locator::validate_pattern;

/// 읽기 주기 상한 (1일)
const MAX_POLL_INTERVAL_SECS: u64 = 86_400;

/// 채널 용량 상한
const MAX_CHANNEL_CAPACITY: usize = 1_000_000;

/// 로그인 기록 수집기 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// 활성화 여부
    pub enabled: bool,
    /// wtmp 파일 glob 패턴
    pub wtmp_file_pattern: String,
    /// btmp 파일 glob 패턴
    pub btmp_file_pattern: String,
    /// 읽기 주기 (초)
    pub poll_interval_secs: u64,
    /// 상태 저장 디렉토리
    pub state_dir: String,
    /// 레코드/에러 채널 용량
    pub channel_capacity: usize,
    /// passwd 파일로 UID를 채울지 여부
    pub resolve_uids: bool,
    /// passwd 파일 경로
    pub passwd_path: String,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self::from_core(&loginpost_core::config::LoginConfig::default())
    }
}

impl ReaderConfig {
    /// core의 `LoginConfig`에서 수집기 설정을 생성합니다.
    pub fn from_core(core: &loginpost_core::config::LoginConfig) -> Self {
        Self {
            enabled: core.enabled,
            wtmp_file_pattern: core.wtmp_file_pattern.clone(),
            btmp_file_pattern: core.btmp_file_pattern.clone(),
            poll_interval_secs: core.poll_interval_secs,
            state_dir: core.state_dir.clone(),
            channel_capacity: core.channel_capacity,
            resolve_uids: core.resolve_uids,
            passwd_path: core.passwd_path.clone(),
        }
    }

    /// 설정 값의 유효성을 검증합니다.
    ///
    /// # 검증 규칙
    ///
    /// - 두 패턴 모두 유효한 glob 문법
    /// - `poll_interval_secs`: 1-86400
    /// - `channel_capacity`: 1-1000000
    /// - `resolve_uids`가 켜져 있으면 `passwd_path`가 비어있으면 안 됨
    pub fn validate(&self) -> Result<(), LoginReaderError> {
        for (field, pattern) in [
            ("wtmp_file_pattern", &self.wtmp_file_pattern),
            ("btmp_file_pattern", &self.btmp_file_pattern),
        ] {
            if pattern.is_empty() {
                return Err(LoginReaderError::Config {
                    field: field.to_owned(),
                    reason: "pattern must not be empty".to_owned(),
                });
            }
            validate_pattern(pattern).map_err(|e| LoginReaderError::Config {
                field: field.to_owned(),
                reason: e.to_string(),
            })?;
        }

        if self.poll_interval_secs == 0 || self.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(LoginReaderError::Config {
                field: "poll_interval_secs".to_owned(),
                reason: format!("must be 1-{MAX_POLL_INTERVAL_SECS}"),
            });
        }

        if self.channel_capacity == 0 || self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(LoginReaderError::Config {
                field: "channel_capacity".to_owned(),
                reason: format!("must be 1-{MAX_CHANNEL_CAPACITY}"),
            });
        }

        if self.resolve_uids && self.passwd_path.is_empty() {
            return Err(LoginReaderError::Config {
                field: "passwd_path".to_owned(),
                reason: "passwd_path must not be empty when resolve_uids is set".to_owned(),
            });
        }

        Ok(())
    }
}

/// [`ReaderConfig`] 빌더
#[derive(Default)]
pub struct ReaderConfigBuilder {
    config: ReaderConfig,
}

impl ReaderConfigBuilder {
    /// 기본값을 가진 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 활성화 여부를 설정합니다.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// wtmp 패턴을 설정합니다.
    pub fn wtmp_file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.wtmp_file_pattern = pattern.into();
        self
    }

    /// btmp 패턴을 설정합니다.
    pub fn btmp_file_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.config.btmp_file_pattern = pattern.into();
        self
    }

    /// 읽기 주기(초)를 설정합니다.
    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.poll_interval_secs = secs;
        self
    }

    /// 상태 저장 디렉토리를 설정합니다.
    pub fn state_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.state_dir = dir.into();
        self
    }

    /// 채널 용량을 설정합니다.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.config.channel_capacity = capacity;
        self
    }

    /// UID 조회 여부를 설정합니다.
    pub fn resolve_uids(mut self, resolve: bool) -> Self {
        self.config.resolve_uids = resolve;
        self
    }

    /// passwd 파일 경로를 설정합니다.
    pub fn passwd_path(mut self, path: impl Into<String>) -> Self {
        self.config.passwd_path = path.into();
        self
    }

    /// 설정을 검증하고 빌드합니다.
    ///
    /// # Errors
    ///
    /// 유효성 검증 실패 시 `LoginReaderError::Config` 반환
    pub fn build(self) -> Result<ReaderConfig, LoginReaderError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
