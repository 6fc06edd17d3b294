//! 사용자명 -> UID 조회
//!
//! glibc utmp 레코드에는 UID가 없으므로, 필요하면 호출자가 [`UserLookup`]을 주입합니다.
//! 조회 결과는 로그인/로그인 실패 이벤트에만 적용됩니다.

use std::collections::HashMap;
use std::path::Path;

/// 사용자명으로 UID를 찾습니다.
pub trait UserLookup: Send + Sync {
    /// 알 수 없는 사용자면 `None`
    fn uid_of(&self, username: &str) -> Option<u32>;
}

impl UserLookup for HashMap<String, u32> {
    fn uid_of(&self, username: &str) -> Option<u32> {
        self.get(username).copied()
    }
}

/// `/etc/passwd` 형식 파일을 한 번 읽어 둔 조회 테이블
#[derive(Debug, Clone, Default)]
pub struct PasswdLookup {
    users: HashMap<String, u32>,
}

impl PasswdLookup {
    /// passwd 파일을 읽습니다.
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let lookup = Self::parse(&content);
        tracing::debug!(
            path = %path.as_ref().display(),
            users = lookup.users.len(),
            "loaded passwd entries"
        );
        Ok(lookup)
    }

    /// passwd 형식 문자열을 파싱합니다. 형식이 맞지 않는 줄은 무시합니다.
    pub fn parse(content: &str) -> Self {
        let users = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| {
                let mut fields = line.split(':');
                let name = fields.next()?;
                let _password = fields.next()?;
                let uid = fields.next()?.parse::<u32>().ok()?;
                (!name.is_empty()).then(|| (name.to_owned(), uid))
            })
            .collect();
        Self { users }
    }

    /// 등록된 사용자 수
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl UserLookup for PasswdLookup {
    fn uid_of(&self, username: &str) -> Option<u32> {
        self.users.uid_of(username)
    }
}
