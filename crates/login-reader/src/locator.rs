//! 파일 탐색 -- glob 패턴으로 로그인 기록 파일을 찾고 inode로 식별
//!
//! 회전된 파일은 `wtmp.2`, `wtmp.1`, `wtmp` 순(역사전순)으로 정렬되어
//! 가장 오래된 회전본부터 처리됩니다.
//! 패턴 확장과 stat 사이에 사라진 파일은 조용히 건너뜁니다.

use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LoginReaderError;
use crate::record::UtmpKind;

/// inode로 추적되는 파일 한 개
///
/// 불변식: `offset <= size`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedFile {
    /// 파일 식별자
    pub inode: u64,
    /// 마지막으로 관측된 경로 (로깅 및 고아 파일 재오픈용)
    pub path: PathBuf,
    /// 마지막 stat 시점의 크기 (바이트)
    pub size: u64,
    /// 소비한 바이트 수
    pub offset: u64,
    /// 파일 종류
    pub kind: UtmpKind,
}

impl TrackedFile {
    /// 아직 읽지 않은 바이트 수
    pub fn unread(&self) -> u64 {
        self.size.saturating_sub(self.offset)
    }

    /// 모든 바이트를 소비했는지 확인합니다.
    pub fn is_consumed(&self) -> bool {
        self.offset >= self.size
    }
}

/// 패턴 하나의 탐색 결과
///
/// stat 실패는 탐색 전체를 중단시키지 않고 `errors`에 모입니다.
#[derive(Debug, Default)]
pub struct Discovery {
    /// 찾은 파일 (역사전순, `offset = 0`)
    pub files: Vec<TrackedFile>,
    /// 파일 단위 진단
    pub errors: Vec<LoginReaderError>,
}

/// glob 패턴 문법을 검사합니다.
pub fn validate_pattern(pattern: &str) -> Result<(), LoginReaderError> {
    glob::Pattern::new(pattern)
        .map(|_| ())
        .map_err(|e| LoginReaderError::Pattern {
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })
}

/// 패턴에 맞는 일반 파일을 찾아 stat 합니다.
///
/// 패턴 문법이 잘못된 경우에만 에러를 반환합니다.
pub fn find_files(pattern: &str, kind: UtmpKind) -> Result<Discovery, LoginReaderError> {
    let paths = glob::glob(pattern).map_err(|e| LoginReaderError::Pattern {
        pattern: pattern.to_owned(),
        reason: e.to_string(),
    })?;

    let mut discovery = Discovery::default();
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                if e.error().kind() != io::ErrorKind::NotFound {
                    discovery.errors.push(LoginReaderError::FileIo {
                        path: e.path().display().to_string(),
                        reason: e.error().to_string(),
                    });
                }
                continue;
            }
        };

        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {
                discovery.files.push(TrackedFile {
                    inode: inode_of(&meta),
                    path,
                    size: meta.len(),
                    offset: 0,
                    kind,
                });
            }
            Ok(_) => {
                tracing::debug!(path = %path.display(), "skipping non-regular file");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "file vanished before stat");
            }
            Err(e) => discovery.errors.push(LoginReaderError::FileIo {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    discovery.files.sort_by(|a, b| b.path.cmp(&a.path));
    tracing::debug!(
        pattern,
        kind = %kind,
        files = discovery.files.len(),
        errors = discovery.errors.len(),
        "file discovery complete"
    );
    Ok(discovery)
}

/// 경로의 (inode, 크기)를 반환합니다.
pub fn identity(path: &Path) -> io::Result<(u64, u64)> {
    let meta = std::fs::metadata(path)?;
    Ok((inode_of(&meta), meta.len()))
}

/// 메타데이터에서 inode를 읽습니다.
#[cfg(unix)]
pub fn inode_of(meta: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    meta.ino()
}

/// inode 개념이 없는 플랫폼에서는 항상 0입니다.
#[cfg(not(unix))]
pub fn inode_of(_meta: &Metadata) -> u64 {
    0
}
