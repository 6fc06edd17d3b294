//! glibc `struct utmp` 원시 레이아웃
//!
//! x86-64/aarch64 Linux의 `wtmp`/`btmp` 파일은 384바이트 고정 크기 레코드의 연속입니다.
//! 정수 필드는 리틀엔디언, `ut_addr_v6`는 네트워크 바이트 순서입니다.
//!
//! ```text
//! offset  size  field
//!      0     2  ut_type (+2 padding)
//!      4     4  ut_pid
//!      8    32  ut_line
//!     40     4  ut_id
//!     44    32  ut_user
//!     76   256  ut_host
//!    332     4  ut_exit (e_termination, e_exit)
//!    336     4  ut_session
//!    340     8  ut_tv (tv_sec, tv_usec)
//!    348    16  ut_addr_v6
//!    364    20  reserved
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::CodecError;

/// 레코드 하나의 크기 (바이트)
pub const UTMP_RECORD_SIZE: usize = 384;

/// `ut_line` 크기
pub const UT_LINESIZE: usize = 32;
/// `ut_id` 크기
pub const UT_IDSIZE: usize = 4;
/// `ut_user` 크기
pub const UT_NAMESIZE: usize = 32;
/// `ut_host` 크기
pub const UT_HOSTSIZE: usize = 256;
/// 예약 영역 크기
const UT_RESERVED: usize = 20;

/// `ut_type` 값
pub mod ut_type {
    /// 빈 슬롯
    pub const EMPTY: i16 = 0;
    /// 런레벨 변경
    pub const RUN_LVL: i16 = 1;
    /// 부팅 시각
    pub const BOOT_TIME: i16 = 2;
    /// 시계 변경 후 시각
    pub const NEW_TIME: i16 = 3;
    /// 시계 변경 전 시각
    pub const OLD_TIME: i16 = 4;
    /// init이 생성한 프로세스
    pub const INIT_PROCESS: i16 = 5;
    /// 로그인 대기 프로세스
    pub const LOGIN_PROCESS: i16 = 6;
    /// 사용자 프로세스 (로그인)
    pub const USER_PROCESS: i16 = 7;
    /// 종료된 프로세스 (로그아웃)
    pub const DEAD_PROCESS: i16 = 8;
    /// 사용되지 않음
    pub const ACCOUNTING: i16 = 9;
}

/// `struct utmp` 한 개를 필드 단위로 표현합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtmpEntry {
    pub ut_type: i16,
    pub pid: i32,
    pub line: [u8; UT_LINESIZE],
    pub id: [u8; UT_IDSIZE],
    pub user: [u8; UT_NAMESIZE],
    pub host: [u8; UT_HOSTSIZE],
    pub exit_termination: i16,
    pub exit_status: i16,
    pub session: i32,
    pub tv_sec: i32,
    pub tv_usec: i32,
    /// 네트워크 바이트 순서의 IPv4/IPv6 주소
    pub addr_v6: [u8; 16],
}

impl UtmpEntry {
    /// 모든 필드가 0인 엔트리를 생성합니다.
    pub fn new(ut_type: i16) -> Self {
        Self {
            ut_type,
            pid: 0,
            line: [0; UT_LINESIZE],
            id: [0; UT_IDSIZE],
            user: [0; UT_NAMESIZE],
            host: [0; UT_HOSTSIZE],
            exit_termination: 0,
            exit_status: 0,
            session: 0,
            tv_sec: 0,
            tv_usec: 0,
            addr_v6: [0; 16],
        }
    }

    /// 384바이트 버퍼에서 엔트리를 읽습니다.
    pub fn parse(buf: &[u8]) -> Result<Self, CodecError> {
        if buf.len() != UTMP_RECORD_SIZE {
            return Err(CodecError::InvalidLength { actual: buf.len() });
        }

        let mut cur = buf;
        let mut entry = Self::new(cur.get_i16_le());
        cur.advance(2);
        entry.pid = cur.get_i32_le();
        cur.copy_to_slice(&mut entry.line);
        cur.copy_to_slice(&mut entry.id);
        cur.copy_to_slice(&mut entry.user);
        cur.copy_to_slice(&mut entry.host);
        entry.exit_termination = cur.get_i16_le();
        entry.exit_status = cur.get_i16_le();
        entry.session = cur.get_i32_le();
        entry.tv_sec = cur.get_i32_le();
        entry.tv_usec = cur.get_i32_le();
        cur.copy_to_slice(&mut entry.addr_v6);
        debug_assert_eq!(cur.remaining(), UT_RESERVED);

        Ok(entry)
    }

    /// 엔트리를 384바이트 레코드로 직렬화합니다.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(UTMP_RECORD_SIZE);
        buf.put_i16_le(self.ut_type);
        buf.put_bytes(0, 2);
        buf.put_i32_le(self.pid);
        buf.put_slice(&self.line);
        buf.put_slice(&self.id);
        buf.put_slice(&self.user);
        buf.put_slice(&self.host);
        buf.put_i16_le(self.exit_termination);
        buf.put_i16_le(self.exit_status);
        buf.put_i32_le(self.session);
        buf.put_i32_le(self.tv_sec);
        buf.put_i32_le(self.tv_usec);
        buf.put_slice(&self.addr_v6);
        buf.put_bytes(0, UT_RESERVED);
        buf.freeze()
    }

    /// `ut_line`을 설정합니다. 마지막 바이트는 항상 NUL로 남깁니다.
    pub fn with_line(mut self, line: &str) -> Self {
        fill_c_string(&mut self.line, line);
        self
    }

    /// `ut_user`를 설정합니다.
    pub fn with_user(mut self, user: &str) -> Self {
        fill_c_string(&mut self.user, user);
        self
    }

    /// `ut_host`를 설정합니다.
    pub fn with_host(mut self, host: &str) -> Self {
        fill_c_string(&mut self.host, host);
        self
    }

    /// `ut_pid`를 설정합니다.
    pub fn with_pid(mut self, pid: i32) -> Self {
        self.pid = pid;
        self
    }

    /// `ut_tv`를 설정합니다.
    pub fn with_time(mut self, sec: i32, usec: i32) -> Self {
        self.tv_sec = sec;
        self.tv_usec = usec;
        self
    }

    /// `ut_addr_v6`를 설정합니다.
    pub fn with_addr(mut self, addr: std::net::IpAddr) -> Self {
        self.addr_v6 = [0; 16];
        match addr {
            std::net::IpAddr::V4(v4) => self.addr_v6[..4].copy_from_slice(&v4.octets()),
            std::net::IpAddr::V6(v6) => self.addr_v6.copy_from_slice(&v6.octets()),
        }
        self
    }
}

fn fill_c_string(dst: &mut [u8], value: &str) {
    dst.fill(0);
    let len = value.len().min(dst.len() - 1);
    dst[..len].copy_from_slice(&value.as_bytes()[..len]);
}
