//! 이벤트 시스템 -- 모듈 간 통신의 기본 단위
//!
//! 로그인 기록 수집기는 해석이 끝난 결과를 [`LoginRecord`]로 만들어
//! `tokio::mpsc` 채널로 내보냅니다.
//! [`EventMetadata`]는 레코드마다 붙는 추적 정보입니다.

use std::fmt;
use std::net::IpAddr;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::LoginRecordKind;

// --- 모듈명 상수 ---

/// 로그인 기록 수집기 모듈명
pub const MODULE_LOGIN_READER: &str = "login-reader";

/// 이벤트 메타데이터 -- 모든 이벤트에 공통으로 포함되는 추적 정보
///
/// 각 이벤트의 생성 시각, 생성 모듈, 추적 ID를 담고 있어
/// 이벤트 흐름을 추적하고 디버깅할 수 있습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 이벤트 생성 시각 (레코드의 발생 시각과는 별개)
    pub timestamp: SystemTime,
    /// 이벤트를 생성한 모듈명 (예: "login-reader")
    pub source_module: String,
    /// 추적 ID -- 같은 흐름의 이벤트를 연결합니다
    pub trace_id: String,
}

impl EventMetadata {
    /// 새로운 UUID v4 trace_id를 생성하여 메타데이터를 만듭니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// 로그인 기록 수집기가 내보내는 최종 레코드
///
/// 부팅/종료는 원본 레코드 하나에서, 세션은 로그인과 로그아웃 한 쌍에서,
/// 로그인 실패는 btmp 레코드 하나에서 만들어집니다.
/// 세션 레코드의 `timestamp`는 로그인 시각이고 `logout_timestamp`는 로그아웃 시각입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRecord {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
    /// 레코드 종류
    pub kind: LoginRecordKind,
    /// 프로세스 ID
    pub pid: i32,
    /// 터미널 (예: "pts/0", "tty1")
    pub terminal: String,
    /// 사용자 UID (조회된 경우에만)
    pub user_id: Option<u32>,
    /// 사용자명
    pub username: String,
    /// 원격 호스트명
    pub hostname: String,
    /// 원격 IP 주소
    pub source_ip: Option<IpAddr>,
    /// 발생 시각 (세션은 로그인 시각)
    pub timestamp: DateTime<Utc>,
    /// 로그아웃 시각 (세션만)
    pub logout_timestamp: Option<DateTime<Utc>>,
    /// 레코드를 읽은 파일 경로
    pub origin: String,
}

impl LoginRecord {
    /// 새로운 trace를 시작하는 레코드를 생성합니다.
    ///
    /// 사용자/호스트 정보는 비어 있으며 호출자가 필드를 채웁니다.
    pub fn new(kind: LoginRecordKind, timestamp: DateTime<Utc>, origin: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_LOGIN_READER),
            kind,
            pid: 0,
            terminal: String::new(),
            user_id: None,
            username: String::new(),
            hostname: String::new(),
            source_ip: None,
            timestamp,
            logout_timestamp: None,
            origin: origin.into(),
        }
    }

    /// 세션 지속 시간을 반환합니다 (세션 레코드가 아니면 `None`).
    pub fn session_duration(&self) -> Option<chrono::Duration> {
        self.logout_timestamp
            .map(|logout| logout.signed_duration_since(self.timestamp))
    }
}

impl fmt::Display for LoginRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LoginRecord[{}] {} at {}",
            &self.id[..8.min(self.id.len())],
            self.kind,
            self.timestamp.to_rfc3339(),
        )?;
        if !self.username.is_empty() {
            write!(f, " user={}", self.username)?;
        }
        if !self.terminal.is_empty() {
            write!(f, " tty={}", self.terminal)?;
        }
        if let Some(ip) = self.source_ip {
            write!(f, " from={ip}")?;
        }
        Ok(())
    }
}
