//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 모듈은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`,
//! `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `loginpost_`
//! - 모듈명: `login_reader_`, `daemon_`
//! - 접미어: `_total` (counter), `_seconds` (histogram/latency), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(loginpost_core::metrics::LOGIN_READER_RECORDS_EMITTED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 레코드 종류 레이블 키 (boot, shutdown, user_login_session, user_login_failed)
pub const LABEL_KIND: &str = "kind";

/// 파일 종류 레이블 키 (wtmp, btmp)
pub const LABEL_FILE_KIND: &str = "file_kind";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// ─── Login Reader 메트릭 ────────────────────────────────────────────

/// Login Reader: 내보낸 레코드 수 (counter, label: kind)
pub const LOGIN_READER_RECORDS_EMITTED_TOTAL: &str =
    "loginpost_login_reader_records_emitted_total";

/// Login Reader: 해석하지 못한 원본 레코드 수 (counter)
pub const LOGIN_READER_MALFORMED_RECORDS_TOTAL: &str =
    "loginpost_login_reader_malformed_records_total";

/// Login Reader: 파일 단위 I/O 에러 수 (counter)
pub const LOGIN_READER_FILE_ERRORS_TOTAL: &str = "loginpost_login_reader_file_errors_total";

/// Login Reader: 완료된 읽기 주기 수 (counter, label: result)
pub const LOGIN_READER_CYCLES_TOTAL: &str = "loginpost_login_reader_cycles_total";

/// Login Reader: 읽기 주기 소요 시간 (histogram, 초)
pub const LOGIN_READER_CYCLE_DURATION_SECONDS: &str =
    "loginpost_login_reader_cycle_duration_seconds";

/// Login Reader: 읽은 바이트 수 (counter)
pub const LOGIN_READER_BYTES_READ_TOTAL: &str = "loginpost_login_reader_bytes_read_total";

/// Login Reader: 추적 중인 파일 수 (gauge)
pub const LOGIN_READER_TRACKED_FILES: &str = "loginpost_login_reader_tracked_files";

/// Login Reader: 열린 세션 수 (gauge)
pub const LOGIN_READER_OPEN_SESSIONS: &str = "loginpost_login_reader_open_sessions";

// ─── Daemon 메트릭 ──────────────────────────────────────────────────

/// Daemon: 가동 시간 (gauge, 초)
pub const DAEMON_UPTIME_SECONDS: &str = "loginpost_daemon_uptime_seconds";

/// Daemon: 등록된 모듈 수 (gauge)
pub const DAEMON_MODULES_REGISTERED: &str = "loginpost_daemon_modules_registered";

/// Daemon: 빌드 정보 (gauge, 항상 1, labels: version)
pub const DAEMON_BUILD_INFO: &str = "loginpost_daemon_build_info";

// ─── 히스토그램 버킷 정의 ────────────────────────────────────────────

/// 읽기 주기 소요 시간 히스토그램 버킷 (초)
///
/// 100us ~ 10s 범위
pub const CYCLE_DURATION_BUCKETS: [f64; 10] = [
    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 10.0,
];

// ─── 설명 등록 함수 ─────────────────────────────────────────────────

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 이 함수는 전역 레코더 설치 후 한 번만 호출해야 합니다.
/// 일반적으로 `loginpost-daemon`의 시작 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Login Reader
    describe_counter!(
        LOGIN_READER_RECORDS_EMITTED_TOTAL,
        "Total number of login records emitted, by kind"
    );
    describe_counter!(
        LOGIN_READER_MALFORMED_RECORDS_TOTAL,
        "Total number of accounting records that failed to decode"
    );
    describe_counter!(
        LOGIN_READER_FILE_ERRORS_TOTAL,
        "Total number of per-file read or stat failures"
    );
    describe_counter!(
        LOGIN_READER_CYCLES_TOTAL,
        "Total number of read cycles, by result"
    );
    describe_histogram!(
        LOGIN_READER_CYCLE_DURATION_SECONDS,
        "Time to complete a single read cycle in seconds"
    );
    describe_counter!(
        LOGIN_READER_BYTES_READ_TOTAL,
        "Total bytes consumed from accounting files"
    );
    describe_gauge!(
        LOGIN_READER_TRACKED_FILES,
        "Number of accounting files currently tracked by inode"
    );
    describe_gauge!(
        LOGIN_READER_OPEN_SESSIONS,
        "Number of login sessions waiting for a logout"
    );

    // Daemon
    describe_gauge!(DAEMON_UPTIME_SECONDS, "Loginpost daemon uptime in seconds");
    describe_gauge!(
        DAEMON_MODULES_REGISTERED,
        "Number of modules registered in the daemon"
    );
    describe_gauge!(
        DAEMON_BUILD_INFO,
        "Build information (always 1, with version label)"
    );
}
