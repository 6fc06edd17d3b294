//! 세션 상관기 -- 터미널별 로그인/로그아웃 짝 맞추기
//!
//! # 상태 전이 (터미널 단위)
//! ```text
//! closed --login-->  open            (로그인 이벤트 보관)
//! open   --logout--> closed          (user_login_session 방출)
//! open   --login-->  open            (이전 세션은 방출 없이 폐기)
//! *      --boot/shutdown--> closed   (모든 세션 폐기, 이벤트 즉시 방출)
//! ```
//! 로그인 실패는 세션을 열지 않고 즉시 방출됩니다.
//! 같은 시각의 이벤트는 입력 순서(파일 순서, 오프셋 순서)대로 처리합니다.

use loginpost_core::event::LoginRecord;
use loginpost_core::types::LoginRecordKind;

use crate::record::{LoginEvent, LoginEventKind};
use crate::state::SessionTable;

/// 열린 세션을 추적하는 상태 기계
///
/// `Clone`은 파일 하나를 처리하는 동안 사용하는 임시 사본을 만들 때 씁니다.
#[derive(Debug, Clone, Default)]
pub struct SessionCorrelator {
    sessions: SessionTable,
}

impl SessionCorrelator {
    /// 열린 세션 없이 시작합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 복원된 세션 테이블로 시작합니다.
    pub fn from_sessions(sessions: SessionTable) -> Self {
        Self { sessions }
    }

    /// 현재 열린 세션
    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// 열린 세션 수
    pub fn open_count(&self) -> usize {
        self.sessions.len()
    }

    /// 이벤트 하나를 처리하고, 완성된 레코드가 있으면 반환합니다.
    pub fn process(&mut self, event: LoginEvent) -> Option<LoginRecord> {
        match event.kind {
            LoginEventKind::Boot => {
                self.clear_sessions("boot");
                Some(event.to_record(LoginRecordKind::Boot))
            }
            LoginEventKind::Shutdown => {
                self.clear_sessions("shutdown");
                Some(event.to_record(LoginRecordKind::Shutdown))
            }
            LoginEventKind::LoginFailed => Some(event.to_record(LoginRecordKind::UserLoginFailed)),
            LoginEventKind::Login => {
                let terminal = event.terminal.clone();
                if let Some(stale) = self.sessions.insert(terminal, event) {
                    tracing::debug!(
                        terminal = %stale.terminal,
                        user = %stale.username,
                        "discarding stale session superseded by new login"
                    );
                }
                None
            }
            LoginEventKind::Logout => match self.sessions.remove(&event.terminal) {
                Some(login) => {
                    let mut record = login.to_record(LoginRecordKind::UserLoginSession);
                    record.logout_timestamp = Some(event.timestamp);
                    record.origin = event.origin;
                    Some(record)
                }
                None => {
                    tracing::debug!(
                        terminal = %event.terminal,
                        "logout without open session, dropping"
                    );
                    None
                }
            },
        }
    }

    fn clear_sessions(&mut self, reason: &str) {
        if !self.sessions.is_empty() {
            tracing::debug!(
                count = self.sessions.len(),
                reason,
                "discarding open sessions"
            );
            self.sessions.clear();
        }
    }
}
