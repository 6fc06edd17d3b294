//! 상태 직렬화 -- 파일 식별 테이블과 세션 테이블을 바이트열로 변환
//!
//! 두 테이블은 서로 다른 키에 독립적으로 저장되고 독립적으로 복구됩니다.
//!
//! # 형식
//! 엔트리의 연속이며, 각 엔트리는 4바이트 빅엔디언 길이 뒤에
//! 해당 길이의 JSON 문서가 이어집니다.
//!
//! ```text
//! [len: u32 BE][json ...][len: u32 BE][json ...] ...
//! ```
//!
//! 블롭 끝에서 정확히 멈추면 정상 종료이며, 그 외의 해석 실패는
//! [`LoginReaderError::CorruptState`]입니다.

use std::collections::BTreeMap;

use bytes::{Buf, BufMut};
use serde::Serialize;
use serde::de::DeserializeOwned;

use loginpost_core::pipeline::StateStore;

use crate::error::LoginReaderError;
use crate::locator::TrackedFile;
use crate::record::LoginEvent;

/// 파일 식별 테이블 키
pub const FILE_RECORDS_KEY: &str = "file_records";

/// 세션 테이블 키
pub const LOGIN_SESSIONS_KEY: &str = "login_sessions";

const LEN_PREFIX: usize = 4;

/// inode -> 추적 파일
pub type FileTable = BTreeMap<u64, TrackedFile>;

/// 터미널 -> 열린 세션의 로그인 이벤트
pub type SessionTable = BTreeMap<String, LoginEvent>;

/// 엔트리들을 길이 접두사 블롭으로 직렬화합니다.
pub fn encode_entries<'a, T, I>(key: &str, entries: I) -> Result<Vec<u8>, LoginReaderError>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut blob = Vec::new();
    for entry in entries {
        let body = serde_json::to_vec(entry).map_err(|e| LoginReaderError::CorruptState {
            key: key.to_owned(),
            reason: format!("failed to encode entry: {e}"),
        })?;
        let len = u32::try_from(body.len()).map_err(|_| LoginReaderError::CorruptState {
            key: key.to_owned(),
            reason: format!("entry of {} bytes exceeds length prefix", body.len()),
        })?;
        blob.put_u32(len);
        blob.put_slice(&body);
    }
    Ok(blob)
}

/// 길이 접두사 블롭을 엔트리 목록으로 해석합니다.
pub fn decode_entries<T: DeserializeOwned>(
    key: &str,
    blob: &[u8],
) -> Result<Vec<T>, LoginReaderError> {
    let corrupt = |reason: String| LoginReaderError::CorruptState {
        key: key.to_owned(),
        reason,
    };

    let mut cur = blob;
    let mut entries = Vec::new();
    while cur.has_remaining() {
        let at = blob.len() - cur.remaining();
        if cur.remaining() < LEN_PREFIX {
            return Err(corrupt(format!("truncated length prefix at byte {at}")));
        }
        let len = cur.get_u32() as usize;
        if cur.remaining() < len {
            return Err(corrupt(format!(
                "entry at byte {at} declares {len} bytes, {} remain",
                cur.remaining()
            )));
        }
        let entry = serde_json::from_slice(&cur[..len])
            .map_err(|e| corrupt(format!("entry at byte {at}: {e}")))?;
        entries.push(entry);
        cur.advance(len);
    }
    Ok(entries)
}

/// 파일 식별 테이블을 직렬화합니다.
pub fn encode_file_records(files: &FileTable) -> Result<Vec<u8>, LoginReaderError> {
    encode_entries(FILE_RECORDS_KEY, files.values())
}

/// 파일 식별 테이블을 복원합니다. 같은 inode가 반복되면 뒤의 것이 남습니다.
pub fn decode_file_records(blob: &[u8]) -> Result<FileTable, LoginReaderError> {
    let entries: Vec<TrackedFile> = decode_entries(FILE_RECORDS_KEY, blob)?;
    Ok(entries.into_iter().map(|f| (f.inode, f)).collect())
}

/// 세션 테이블을 직렬화합니다.
pub fn encode_sessions(sessions: &SessionTable) -> Result<Vec<u8>, LoginReaderError> {
    encode_entries(LOGIN_SESSIONS_KEY, sessions.values())
}

/// 세션 테이블을 복원합니다.
pub fn decode_sessions(blob: &[u8]) -> Result<SessionTable, LoginReaderError> {
    let entries: Vec<LoginEvent> = decode_entries(LOGIN_SESSIONS_KEY, blob)?;
    Ok(entries
        .into_iter()
        .map(|e| (e.terminal.clone(), e))
        .collect())
}

/// 저장소에서 복원한 상태
#[derive(Debug, Default)]
pub struct PersistedState {
    /// 파일 식별 테이블
    pub files: FileTable,
    /// 세션 테이블
    pub sessions: SessionTable,
    /// 복원 중 발견한 손상 (해당 테이블은 비어 있음)
    pub diagnostics: Vec<LoginReaderError>,
}

impl PersistedState {
    /// 두 키를 각각 읽어 복원합니다.
    ///
    /// 저장소 I/O 실패만 에러로 반환합니다. 손상된 블롭은 해당 테이블을
    /// 빈 상태로 두고 `diagnostics`에 기록하며, 다른 키의 복원에는 영향을 주지 않습니다.
    pub fn load(store: &dyn StateStore) -> Result<Self, LoginReaderError> {
        let mut state = Self::default();

        if let Some(blob) = store.load(FILE_RECORDS_KEY)? {
            match decode_file_records(&blob) {
                Ok(files) => state.files = files,
                Err(e) => {
                    tracing::warn!(key = FILE_RECORDS_KEY, error = %e, "discarding corrupt state");
                    state.diagnostics.push(e);
                }
            }
        }

        if let Some(blob) = store.load(LOGIN_SESSIONS_KEY)? {
            match decode_sessions(&blob) {
                Ok(sessions) => state.sessions = sessions,
                Err(e) => {
                    tracing::warn!(key = LOGIN_SESSIONS_KEY, error = %e, "discarding corrupt state");
                    state.diagnostics.push(e);
                }
            }
        }

        tracing::debug!(
            files = state.files.len(),
            sessions = state.sessions.len(),
            "restored persisted state"
        );
        Ok(state)
    }
}

/// 두 테이블을 각자의 키에 저장합니다.
pub fn save(
    store: &dyn StateStore,
    files: &FileTable,
    sessions: &SessionTable,
) -> Result<(), LoginReaderError> {
    store.store(FILE_RECORDS_KEY, &encode_file_records(files)?)?;
    store.store(LOGIN_SESSIONS_KEY, &encode_sessions(sessions)?)?;
    Ok(())
}
