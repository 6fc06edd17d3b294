//! 도메인 타입 -- 시스템 전역에서 사용되는 공통 타입
//!
//! 로그인 기록 수집기가 생성하고 daemon/CLI가 소비하는 레코드 분류를 정의합니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 출력 레코드 종류
///
/// 하나의 [`LoginRecord`](crate::event::LoginRecord)가 무엇을 나타내는지 구분합니다.
/// 직렬화 시 snake_case 이름(`user_login_session` 등)을 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginRecordKind {
    /// 시스템 부팅
    Boot,
    /// 시스템 종료 (runlevel 0/6 또는 `shutdown` 사용자)
    Shutdown,
    /// 로그인부터 로그아웃까지 닫힌 세션
    UserLoginSession,
    /// 로그인 실패 (btmp)
    UserLoginFailed,
}

impl LoginRecordKind {
    /// 직렬화 이름과 동일한 문자열을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::Shutdown => "shutdown",
            Self::UserLoginSession => "user_login_session",
            Self::UserLoginFailed => "user_login_failed",
        }
    }
}

impl fmt::Display for LoginRecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
