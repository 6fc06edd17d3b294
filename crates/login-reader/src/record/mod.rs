//! 레코드 코덱 -- 고정 크기 로그인 기록을 타입이 있는 이벤트로 변환
//!
//! [`decode_record`]는 순수 함수이며 I/O를 수행하지 않습니다.
//! 파일 종류([`UtmpKind`])에 따라 같은 `ut_type`도 다르게 해석됩니다.
//!
//! | 파일 | `ut_type` | 결과 |
//! |------|-----------|------|
//! | 공통 | `EMPTY` | [`DecodedRecord::EmptySlot`] |
//! | wtmp | `BOOT_TIME` | boot |
//! | wtmp | `RUN_LVL` (사용자 `shutdown` 또는 런레벨 0/6) | shutdown |
//! | wtmp | `USER_PROCESS` | login |
//! | wtmp | `DEAD_PROCESS` | logout |
//! | btmp | `USER_PROCESS`, `LOGIN_PROCESS` | login-failed |
//! | 그 외 알려진 값 | | [`DecodedRecord::Unhandled`] |

pub mod utmp;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use loginpost_core::event::LoginRecord;
use loginpost_core::types::LoginRecordKind;

pub use utmp::{UTMP_RECORD_SIZE, UtmpEntry, ut_type};

/// 로그인 기록 파일 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UtmpKind {
    /// 정상 로그인/로그아웃/부팅 기록
    Wtmp,
    /// 로그인 실패 기록
    Btmp,
}

impl UtmpKind {
    /// 소문자 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wtmp => "wtmp",
            Self::Btmp => "btmp",
        }
    }
}

impl fmt::Display for UtmpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 레코드 해석 실패 사유
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// 버퍼 크기가 레코드 크기와 다름
    #[error("expected 384 bytes, got {actual}")]
    InvalidLength {
        /// 실제 버퍼 크기
        actual: usize,
    },

    /// 문자열 필드에 NUL 종료 문자가 없음
    #[error("field '{field}' is not NUL-terminated")]
    Unterminated {
        /// 필드명 (ut_line, ut_user, ut_host)
        field: &'static str,
    },

    /// 알 수 없는 `ut_type`
    #[error("unknown record type {0}")]
    UnknownType(i16),

    /// 표현할 수 없는 타임스탬프
    #[error("timestamp out of range: sec={sec} usec={usec}")]
    InvalidTimestamp {
        /// tv_sec
        sec: i32,
        /// tv_usec
        usec: i32,
    },
}

/// 해석된 이벤트 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginEventKind {
    /// 시스템 부팅
    Boot,
    /// 시스템 종료
    Shutdown,
    /// 사용자 로그인
    Login,
    /// 사용자 로그아웃
    Logout,
    /// 로그인 실패
    LoginFailed,
}

/// 원본 레코드 하나를 해석한 이벤트
///
/// 세션 테이블에 저장되므로 serde로 직렬화할 수 있습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginEvent {
    /// 이벤트 종류
    pub kind: LoginEventKind,
    /// 프로세스 ID
    pub pid: i32,
    /// 터미널 (세션 상관 키)
    pub terminal: String,
    /// 사용자 UID
    pub user_id: Option<u32>,
    /// 사용자명
    pub username: String,
    /// 원격 호스트명
    pub hostname: String,
    /// 원격 IP 주소
    pub source_ip: Option<IpAddr>,
    /// 발생 시각
    pub timestamp: DateTime<Utc>,
    /// 레코드를 읽은 파일 경로
    pub origin: String,
}

impl LoginEvent {
    /// UID를 설정한 이벤트를 반환합니다.
    pub fn with_user_id(mut self, uid: Option<u32>) -> Self {
        self.user_id = uid;
        self
    }

    /// 이벤트 정보로 출력 레코드를 만듭니다.
    pub fn to_record(&self, kind: LoginRecordKind) -> LoginRecord {
        let mut record = LoginRecord::new(kind, self.timestamp, self.origin.clone());
        record.pid = self.pid;
        record.terminal = self.terminal.clone();
        record.user_id = self.user_id;
        record.username = self.username.clone();
        record.hostname = self.hostname.clone();
        record.source_ip = self.source_ip;
        record
    }
}

/// [`decode_record`]의 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedRecord {
    /// 빈 슬롯 (`ut_type == EMPTY`), 호출자가 건너뜁니다.
    EmptySlot,
    /// 알려졌지만 로그인 이벤트가 아닌 레코드
    Unhandled(i16),
    /// 로그인 이벤트
    Event(LoginEvent),
}

/// 384바이트 레코드 하나를 해석합니다.
///
/// `origin`은 이벤트에 그대로 기록되는 파일 경로입니다.
pub fn decode_record(
    buf: &[u8],
    kind: UtmpKind,
    origin: &str,
) -> Result<DecodedRecord, CodecError> {
    let entry = UtmpEntry::parse(buf)?;

    if entry.ut_type == ut_type::EMPTY {
        return Ok(DecodedRecord::EmptySlot);
    }
    if !(ut_type::RUN_LVL..=ut_type::ACCOUNTING).contains(&entry.ut_type) {
        return Err(CodecError::UnknownType(entry.ut_type));
    }

    let event_kind = match (kind, entry.ut_type) {
        (UtmpKind::Wtmp, ut_type::BOOT_TIME) => LoginEventKind::Boot,
        (UtmpKind::Wtmp, ut_type::RUN_LVL) => {
            if is_shutdown(&entry)? {
                LoginEventKind::Shutdown
            } else {
                return Ok(DecodedRecord::Unhandled(entry.ut_type));
            }
        }
        (UtmpKind::Wtmp, ut_type::USER_PROCESS) => LoginEventKind::Login,
        (UtmpKind::Wtmp, ut_type::DEAD_PROCESS) => LoginEventKind::Logout,
        (UtmpKind::Btmp, ut_type::USER_PROCESS | ut_type::LOGIN_PROCESS) => {
            LoginEventKind::LoginFailed
        }
        (_, other) => return Ok(DecodedRecord::Unhandled(other)),
    };

    Ok(DecodedRecord::Event(LoginEvent {
        kind: event_kind,
        pid: entry.pid,
        terminal: c_string("ut_line", &entry.line)?,
        user_id: None,
        username: c_string("ut_user", &entry.user)?,
        hostname: c_string("ut_host", &entry.host)?,
        source_ip: source_ip(&entry.addr_v6),
        timestamp: timestamp(entry.tv_sec, entry.tv_usec)?,
        origin: origin.to_owned(),
    }))
}

/// 런레벨 레코드가 시스템 종료를 뜻하는지 판단합니다.
///
/// `ut_pid`의 하위 바이트가 새 런레벨 문자입니다.
fn is_shutdown(entry: &UtmpEntry) -> Result<bool, CodecError> {
    if c_string("ut_user", &entry.user)? == "shutdown" {
        return Ok(true);
    }
    let runlevel = (entry.pid % 256) as u8;
    Ok(matches!(runlevel, b'0' | b'6'))
}

fn c_string(field: &'static str, raw: &[u8]) -> Result<String, CodecError> {
    let end = raw
        .iter()
        .position(|b| *b == 0)
        .ok_or(CodecError::Unterminated { field })?;
    Ok(String::from_utf8_lossy(&raw[..end]).into_owned())
}

fn source_ip(addr: &[u8; 16]) -> Option<IpAddr> {
    if addr.iter().all(|b| *b == 0) {
        return None;
    }
    if addr[4..].iter().all(|b| *b == 0) {
        return Some(IpAddr::V4(Ipv4Addr::new(addr[0], addr[1], addr[2], addr[3])));
    }
    Some(IpAddr::V6(Ipv6Addr::from(*addr)))
}

fn timestamp(sec: i32, usec: i32) -> Result<DateTime<Utc>, CodecError> {
    if !(0..1_000_000).contains(&usec) {
        return Err(CodecError::InvalidTimestamp { sec, usec });
    }
    DateTime::from_timestamp(i64::from(sec), (usec as u32) * 1_000)
        .ok_or(CodecError::InvalidTimestamp { sec, usec })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ORIGIN: &str = "/var/log/wtmp";

    fn decode_event(entry: &UtmpEntry, kind: UtmpKind) -> LoginEvent {
        match decode_record(&entry.to_bytes(), kind, ORIGIN).unwrap() {
            DecodedRecord::Event(event) => event,
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn wtmp_user_process_is_login() {
        let entry = UtmpEntry::new(ut_type::USER_PROCESS)
            .with_pid(1234)
            .with_line("pts/0")
            .with_user("alice")
            .with_host("workstation.local")
            .with_addr("192.168.1.20".parse().unwrap())
            .with_time(1_700_000_000, 123_456);

        let event = decode_event(&entry, UtmpKind::Wtmp);
        assert_eq!(event.kind, LoginEventKind::Login);
        assert_eq!(event.pid, 1234);
        assert_eq!(event.terminal, "pts/0");
        assert_eq!(event.username, "alice");
        assert_eq!(event.hostname, "workstation.local");
        assert_eq!(event.source_ip, Some("192.168.1.20".parse().unwrap()));
        assert_eq!(event.timestamp.timestamp(), 1_700_000_000);
        assert_eq!(event.timestamp.timestamp_subsec_micros(), 123_456);
        assert_eq!(event.user_id, None);
        assert_eq!(event.origin, ORIGIN);
    }

    #[test]
    fn wtmp_dead_process_is_logout() {
        let entry = UtmpEntry::new(ut_type::DEAD_PROCESS)
            .with_line("pts/0")
            .with_time(1_700_000_100, 0);
        assert_eq!(
            decode_event(&entry, UtmpKind::Wtmp).kind,
            LoginEventKind::Logout
        );
    }

    #[test]
    fn wtmp_boot_time_is_boot() {
        let entry = UtmpEntry::new(ut_type::BOOT_TIME)
            .with_line("~")
            .with_user("reboot")
            .with_time(1_700_000_000, 0);
        assert_eq!(decode_event(&entry, UtmpKind::Wtmp).kind, LoginEventKind::Boot);
    }

    #[test]
    fn run_level_shutdown_detection() {
        let by_user = UtmpEntry::new(ut_type::RUN_LVL)
            .with_user("shutdown")
            .with_line("~~")
            .with_time(1_700_000_000, 0);
        assert_eq!(
            decode_event(&by_user, UtmpKind::Wtmp).kind,
            LoginEventKind::Shutdown
        );

        // 런레벨 '6' (재부팅), 이전 런레벨 'N'
        let reboot = UtmpEntry::new(ut_type::RUN_LVL)
            .with_user("runlevel")
            .with_pid(i32::from(b'N') * 256 + i32::from(b'6'))
            .with_time(1_700_000_000, 0);
        assert_eq!(
            decode_event(&reboot, UtmpKind::Wtmp).kind,
            LoginEventKind::Shutdown
        );

        let multi_user = UtmpEntry::new(ut_type::RUN_LVL)
            .with_user("runlevel")
            .with_pid(i32::from(b'N') * 256 + i32::from(b'3'))
            .with_time(1_700_000_000, 0);
        assert_eq!(
            decode_record(&multi_user.to_bytes(), UtmpKind::Wtmp, ORIGIN).unwrap(),
            DecodedRecord::Unhandled(ut_type::RUN_LVL)
        );
    }

    #[test]
    fn btmp_user_and_login_process_are_failures() {
        for t in [ut_type::USER_PROCESS, ut_type::LOGIN_PROCESS] {
            let entry = UtmpEntry::new(t)
                .with_line("ssh:notty")
                .with_user("root")
                .with_addr("203.0.113.7".parse().unwrap())
                .with_time(1_700_000_000, 0);
            assert_eq!(
                decode_event(&entry, UtmpKind::Btmp).kind,
                LoginEventKind::LoginFailed
            );
        }
    }

    #[test]
    fn btmp_boot_is_unhandled() {
        let entry = UtmpEntry::new(ut_type::BOOT_TIME).with_time(1_700_000_000, 0);
        assert_eq!(
            decode_record(&entry.to_bytes(), UtmpKind::Btmp, ORIGIN).unwrap(),
            DecodedRecord::Unhandled(ut_type::BOOT_TIME)
        );
    }

    #[test]
    fn empty_slot_is_reported() {
        let raw = [0u8; UTMP_RECORD_SIZE];
        assert_eq!(
            decode_record(&raw, UtmpKind::Wtmp, ORIGIN).unwrap(),
            DecodedRecord::EmptySlot
        );
    }

    #[test]
    fn wtmp_other_known_types_are_unhandled() {
        for t in [
            ut_type::NEW_TIME,
            ut_type::OLD_TIME,
            ut_type::INIT_PROCESS,
            ut_type::LOGIN_PROCESS,
            ut_type::ACCOUNTING,
        ] {
            let entry = UtmpEntry::new(t).with_time(1_700_000_000, 0);
            assert_eq!(
                decode_record(&entry.to_bytes(), UtmpKind::Wtmp, ORIGIN).unwrap(),
                DecodedRecord::Unhandled(t)
            );
        }
    }

    #[test]
    fn unknown_type_is_malformed() {
        let entry = UtmpEntry::new(42).with_time(1_700_000_000, 0);
        assert_eq!(
            decode_record(&entry.to_bytes(), UtmpKind::Wtmp, ORIGIN).unwrap_err(),
            CodecError::UnknownType(42)
        );
        let negative = UtmpEntry::new(-1);
        assert!(decode_record(&negative.to_bytes(), UtmpKind::Wtmp, ORIGIN).is_err());
    }

    #[test]
    fn unterminated_string_is_malformed() {
        let mut entry = UtmpEntry::new(ut_type::USER_PROCESS).with_time(1_700_000_000, 0);
        entry.user = [b'x'; utmp::UT_NAMESIZE];
        assert_eq!(
            decode_record(&entry.to_bytes(), UtmpKind::Wtmp, ORIGIN).unwrap_err(),
            CodecError::Unterminated { field: "ut_user" }
        );
    }

    #[test]
    fn out_of_range_usec_is_malformed() {
        let entry = UtmpEntry::new(ut_type::USER_PROCESS)
            .with_line("tty1")
            .with_time(1_700_000_000, 2_000_000);
        assert!(matches!(
            decode_record(&entry.to_bytes(), UtmpKind::Wtmp, ORIGIN).unwrap_err(),
            CodecError::InvalidTimestamp { .. }
        ));
    }

    #[test]
    fn short_buffer_is_malformed() {
        let entry = UtmpEntry::new(ut_type::USER_PROCESS).to_bytes();
        assert_eq!(
            decode_record(&entry[..100], UtmpKind::Wtmp, ORIGIN).unwrap_err(),
            CodecError::InvalidLength { actual: 100 }
        );
    }

    #[test]
    fn source_ip_variants() {
        assert_eq!(source_ip(&[0; 16]), None);

        let mut v4 = [0u8; 16];
        v4[..4].copy_from_slice(&[127, 0, 0, 1]);
        assert_eq!(source_ip(&v4), Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));

        let v6: Ipv6Addr = "2001:db8::1".parse().unwrap();
        assert_eq!(source_ip(&v6.octets()), Some(IpAddr::V6(v6)));
    }

    #[test]
    fn to_record_copies_identity_fields() {
        let entry = UtmpEntry::new(ut_type::USER_PROCESS)
            .with_pid(77)
            .with_line("tty2")
            .with_user("bob")
            .with_time(1_700_000_000, 0);
        let event = decode_event(&entry, UtmpKind::Wtmp).with_user_id(Some(1001));
        let record = event.to_record(LoginRecordKind::UserLoginFailed);
        assert_eq!(record.kind, LoginRecordKind::UserLoginFailed);
        assert_eq!(record.pid, 77);
        assert_eq!(record.terminal, "tty2");
        assert_eq!(record.username, "bob");
        assert_eq!(record.user_id, Some(1001));
        assert_eq!(record.timestamp, event.timestamp);
        assert_eq!(record.origin, ORIGIN);
    }

    proptest! {
        #[test]
        fn decode_never_panics_on_arbitrary_records(
            raw in proptest::collection::vec(any::<u8>(), UTMP_RECORD_SIZE),
            btmp in any::<bool>(),
        ) {
            let kind = if btmp { UtmpKind::Btmp } else { UtmpKind::Wtmp };
            let _ = decode_record(&raw, kind, ORIGIN);
        }

        #[test]
        fn login_events_keep_terminal_and_user(
            line in "[a-z]{1,8}/[0-9]{1,3}",
            user in "[a-z][a-z0-9_]{0,15}",
            sec in 0i32..i32::MAX,
        ) {
            let entry = UtmpEntry::new(ut_type::USER_PROCESS)
                .with_line(&line)
                .with_user(&user)
                .with_time(sec, 0);
            let event = decode_event(&entry, UtmpKind::Wtmp);
            prop_assert_eq!(event.terminal, line);
            prop_assert_eq!(event.username, user);
            prop_assert_eq!(event.timestamp.timestamp(), i64::from(sec));
        }
    }
}
