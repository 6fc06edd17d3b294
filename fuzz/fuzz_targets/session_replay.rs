#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use loginpost_login_reader::record::ut_type;
use loginpost_login_reader::{
    DecodedRecord, SessionCorrelator, UtmpEntry, UtmpKind, decode_record,
};

/// 퍼저용 구조적 레코드 입력
#[derive(Arbitrary, Debug)]
struct FuzzRecord {
    ut_type: u8,
    terminal: u8,
    user: String,
    sec: i32,
}

fuzz_target!(|records: Vec<FuzzRecord>| {
    let mut correlator = SessionCorrelator::new();

    for r in records.iter().take(256) {
        let ut = match r.ut_type % 5 {
            0 => ut_type::BOOT_TIME,
            1 => ut_type::RUN_LVL,
            2 => ut_type::USER_PROCESS,
            3 => ut_type::DEAD_PROCESS,
            _ => ut_type::LOGIN_PROCESS,
        };
        let bytes = UtmpEntry::new(ut)
            .with_line(&format!("pts/{}", r.terminal % 4))
            .with_user(&r.user)
            .with_time(r.sec, 0)
            .to_bytes();

        let Ok(DecodedRecord::Event(event)) = decode_record(&bytes, UtmpKind::Wtmp, "/fuzz/wtmp")
        else {
            continue;
        };
        if let Some(record) = correlator.process(event) {
            if let Some(duration) = record.session_duration() {
                assert_eq!(record.timestamp + duration, record.logout_timestamp.unwrap());
            }
        }
        // 터미널당 열린 세션은 최대 하나
        assert!(correlator.open_count() <= 4);
    }
});
