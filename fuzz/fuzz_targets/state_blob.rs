#![no_main]

use libfuzzer_sys::fuzz_target;
use loginpost_login_reader::state::{
    decode_file_records, decode_sessions, encode_file_records, encode_sessions,
};

fuzz_target!(|data: &[u8]| {
    // 손상된 블롭은 CorruptState로 거부되어야 하며 패닉하면 안 된다
    if let Ok(files) = decode_file_records(data) {
        let blob = encode_file_records(&files).expect("decoded table must re-encode");
        let again = decode_file_records(&blob).expect("re-encoded table must decode");
        assert_eq!(files, again);
    }

    if let Ok(sessions) = decode_sessions(data) {
        let blob = encode_sessions(&sessions).expect("decoded table must re-encode");
        let again = decode_sessions(&blob).expect("re-encoded table must decode");
        assert_eq!(sessions, again);
    }
});
