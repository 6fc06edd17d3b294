//! 에러 타입 -- 도메인별 에러 정의

/// Loginpost 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum LoginpostError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// 스토리지 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 로그인 기록 수집 에러
    #[error("login reader error: {0}")]
    Reader(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 채널 전송 실패
    #[error("channel send failed: {0}")]
    ChannelSend(String),

    /// 채널 수신 실패
    #[error("channel receive failed: {0}")]
    ChannelRecv(String),

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 파이프라인 정지 중 실패 (작업 join 실패 등)
    #[error("pipeline stop failed: {0}")]
    StopFailed(String),

    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,
}

/// 스토리지 에러
///
/// [`StateStore`](crate::pipeline::StateStore) 구현체가 반환합니다.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 키 형식이 허용되지 않음
    #[error("invalid storage key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// 읽기 실패
    #[error("failed to read '{key}': {reason}")]
    Read { key: String, reason: String },

    /// 쓰기 실패
    #[error("failed to write '{key}': {reason}")]
    Write { key: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_top_level() {
        let err: LoginpostError = ConfigError::InvalidValue {
            field: "login.poll_interval_secs".to_owned(),
            reason: "must be greater than 0".to_owned(),
        }
        .into();
        assert!(matches!(err, LoginpostError::Config(_)));
        assert!(err.to_string().contains("login.poll_interval_secs"));
    }

    #[test]
    fn storage_error_display_includes_key() {
        let err = StorageError::Write {
            key: "file_records".to_owned(),
            reason: "disk full".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("file_records"));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn pipeline_state_errors_display() {
        assert_eq!(
            PipelineError::AlreadyRunning.to_string(),
            "pipeline already running"
        );
        assert_eq!(PipelineError::NotRunning.to_string(), "pipeline not running");
        assert_eq!(
            PipelineError::StopFailed("task aborted".to_owned()).to_string(),
            "pipeline stop failed: task aborted"
        );
    }
}
