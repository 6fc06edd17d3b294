//! 상태 저장소 구현
//!
//! - [`FileStateStore`]: 디렉토리 아래 키마다 파일 하나, 임시 파일 + rename으로 원자적 교체
//! - [`MemoryStateStore`]: 프로세스 메모리 저장소 (CLI `--no-persist`, 테스트)

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use loginpost_core::error::StorageError;
use loginpost_core::pipeline::StateStore;

/// 상태 파일 확장자
const STATE_FILE_EXT: &str = "state";

/// 디렉토리 기반 상태 저장소
///
/// 키 `file_records`는 `<dir>/file_records.state`에 저장됩니다.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// 저장소를 열고, 디렉토리가 없으면 생성합니다.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        create_private_dir(&dir).map_err(|e| StorageError::Write {
            key: dir.display().to_string(),
            reason: format!("failed to create state directory: {e}"),
        })?;
        tracing::debug!(dir = %dir.display(), "state store opened");
        Ok(Self { dir })
    }

    /// 저장소 디렉토리
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.{STATE_FILE_EXT}")))
    }
}

impl StateStore for FileStateStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Read {
                key: key.to_owned(),
                reason: format!("{}: {e}", path.display()),
            }),
        }
    }

    fn store(&self, key: &str, blob: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let write_err = |e: std::io::Error| StorageError::Write {
            key: key.to_owned(),
            reason: format!("{}: {e}", path.display()),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(blob).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        tracing::trace!(key, bytes = blob.len(), "state persisted");
        Ok(())
    }
}

/// 메모리 상태 저장소
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStateStore {
    /// 빈 저장소를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 키 수
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        validate_key(key)?;
        Ok(self.lock().get(key).cloned())
    }

    fn store(&self, key: &str, blob: &[u8]) -> Result<(), StorageError> {
        validate_key(key)?;
        self.lock().insert(key.to_owned(), blob.to_vec());
        Ok(())
    }
}

/// 키는 영문자, 숫자, `_`, `-`만 허용합니다.
fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey {
            key: key.to_owned(),
            reason: "key must not be empty".to_owned(),
        });
    }
    if !key
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        return Err(StorageError::InvalidKey {
            key: key.to_owned(),
            reason: "only [A-Za-z0-9_-] allowed".to_owned(),
        });
    }
    Ok(())
}

fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        std::fs::DirBuilder::new()
            .mode(0o700)
            .recursive(true)
            .create(dir)
    }
    #[cfg(not(unix))]
    {
        std::fs::create_dir_all(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_missing_key_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(dir.path()).unwrap();
        assert!(store.load("file_records").unwrap().is_none());
    }

    #[test]
    fn file_store_overwrites_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(dir.path()).unwrap();
        store.store("login_sessions", b"first").unwrap();
        store.store("login_sessions", b"second").unwrap();
        assert_eq!(
            store.load("login_sessions").unwrap().as_deref(),
            Some(&b"second"[..])
        );

        // 임시 파일이 남지 않아야 함
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["login_sessions.state"]);
    }

    #[test]
    fn file_store_creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileStateStore::open(&nested).unwrap();
        store.store("file_records", b"x").unwrap();
        assert!(nested.join("file_records.state").exists());
        assert_eq!(store.dir(), nested.as_path());
    }

    #[test]
    fn keys_with_path_separators_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::open(dir.path()).unwrap();
        let err = store.store("../escape", b"x").unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey { .. }));
        assert!(MemoryStateStore::new().load("").is_err());
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStateStore::new();
        assert!(store.is_empty());
        store.store("file_records", &[1, 2, 3]).unwrap();
        assert_eq!(store.load("file_records").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.len(), 1);
    }
}
