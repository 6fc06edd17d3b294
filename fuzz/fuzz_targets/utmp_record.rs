#![no_main]

use libfuzzer_sys::fuzz_target;
use loginpost_login_reader::{UtmpKind, decode_record};

fuzz_target!(|data: &[u8]| {
    // 어떤 바이트열이든 패닉 없이 Ok 또는 Err을 반환해야 한다
    for kind in [UtmpKind::Wtmp, UtmpKind::Btmp] {
        let _ = decode_record(data, kind, "/fuzz/wtmp");
    }
});
