//! 로그인 기록 수집기 에러 타입
//!
//! [`LoginReaderError`]는 수집기 내부에서 발생하는 모든 에러를 표현합니다.
//! `From<LoginReaderError> for LoginpostError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! # 복구 범위
//! - `Pattern`: 해당 패턴의 파일 탐색만 실패, 다른 패턴은 계속 진행
//! - `MalformedRecord`: 해당 레코드만 건너뜀
//! - `FileIo`: 해당 파일만 이번 주기에서 건너뜀, 다음 주기에 재시도
//! - `CorruptState`: 해당 키의 테이블을 빈 상태로 시작
//! - `StoreIo`, `Panic`: 읽기 주기 전체 중단

use loginpost_core::error::{ConfigError, LoginpostError, StorageError};

use crate::record::CodecError;

/// 로그인 기록 수집기 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum LoginReaderError {
    /// glob 패턴 문법 오류
    #[error("invalid file pattern '{pattern}': {reason}")]
    Pattern {
        /// 문제가 된 패턴
        pattern: String,
        /// 오류 사유
        reason: String,
    },

    /// 레코드 해석 실패
    #[error("malformed record in {path} at offset {offset}: {source}")]
    MalformedRecord {
        /// 파일 경로
        path: String,
        /// 레코드 시작 오프셋
        offset: u64,
        /// 해석 실패 사유
        #[source]
        source: CodecError,
    },

    /// 파일 stat/open/read 실패
    #[error("file error: {path}: {reason}")]
    FileIo {
        /// 파일 경로
        path: String,
        /// 에러 사유
        reason: String,
    },

    /// 상태 저장소 읽기/쓰기 실패
    #[error("state store error: {0}")]
    StoreIo(#[from] StorageError),

    /// 저장된 상태를 해석할 수 없음
    #[error("corrupt state under key '{key}': {reason}")]
    CorruptState {
        /// 저장소 키
        key: String,
        /// 해석 실패 사유
        reason: String,
    },

    /// 출력 채널 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 읽기 주기 도중 panic 발생
    #[error("read cycle panicked: {0}")]
    Panic(String),

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },
}

impl LoginReaderError {
    /// 읽기 주기 전체를 중단시키는 에러인지 확인합니다.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StoreIo(_) | Self::Panic(_))
    }
}

impl From<LoginReaderError> for LoginpostError {
    fn from(err: LoginReaderError) -> Self {
        match err {
            LoginReaderError::StoreIo(e) => LoginpostError::Storage(e),
            LoginReaderError::Config { field, reason } => {
                LoginpostError::Config(ConfigError::InvalidValue { field, reason })
            }
            other => LoginpostError::Reader(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_record_display() {
        let err = LoginReaderError::MalformedRecord {
            path: "/var/log/wtmp".to_owned(),
            offset: 768,
            source: CodecError::UnknownType(42),
        };
        let msg = err.to_string();
        assert!(msg.contains("/var/log/wtmp"));
        assert!(msg.contains("768"));
        assert!(msg.contains("42"));
    }

    #[test]
    fn corrupt_state_display() {
        let err = LoginReaderError::CorruptState {
            key: "login_sessions".to_owned(),
            reason: "truncated length prefix".to_owned(),
        };
        assert!(err.to_string().contains("login_sessions"));
    }

    #[test]
    fn store_io_converts_to_storage_error() {
        let err = LoginReaderError::StoreIo(StorageError::Write {
            key: "file_records".to_owned(),
            reason: "read-only file system".to_owned(),
        });
        let top: LoginpostError = err.into();
        assert!(matches!(top, LoginpostError::Storage(_)));
    }

    #[test]
    fn config_converts_to_config_error() {
        let err = LoginReaderError::Config {
            field: "wtmp_file_pattern".to_owned(),
            reason: "unclosed bracket".to_owned(),
        };
        let top: LoginpostError = err.into();
        assert!(matches!(top, LoginpostError::Config(_)));
    }

    #[test]
    fn only_store_and_panic_are_fatal() {
        assert!(LoginReaderError::Panic("boom".to_owned()).is_fatal());
        assert!(
            !LoginReaderError::FileIo {
                path: "/var/log/btmp".to_owned(),
                reason: "permission denied".to_owned(),
            }
            .is_fatal()
        );
        assert!(!LoginReaderError::Channel("closed".to_owned()).is_fatal());
    }
}
