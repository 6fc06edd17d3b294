//! 증분 파일 리더 -- 탐색, 재조정, 읽기, 상관, 영속화를 한 주기로 묶음
//!
//! # 한 주기의 흐름
//! ```text
//! find_files(wtmp) + find_files(btmp)
//!        │
//!        ▼
//! reconcile (inode 기준 합집합, 고아 파일 유지, 잘림 감지)
//!        │
//!        ▼
//! 파일마다: open → inode 확인 → seek → 완전한 레코드만 해석
//!          → 임시 상관기 사본 → sink.emit → 커밋 → 영속화
//!        │
//!        ▼
//! 주기 끝 영속화
//! ```
//!
//! 레코드는 sink로 먼저 전달되고 그 뒤에 오프셋이 저장되므로
//! 영속화 직전에 중단되면 같은 레코드가 다시 방출될 수 있습니다 (at-least-once).

use std::any::Any;
use std::collections::HashSet;
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use loginpost_core::event::LoginRecord;
use loginpost_core::metrics as m;
use loginpost_core::pipeline::StateStore;

use crate::config::ReaderConfig;
use crate::correlator::SessionCorrelator;
use crate::error::LoginReaderError;
use crate::locator::{self, TrackedFile};
use crate::record::{DecodedRecord, LoginEvent, LoginEventKind, UTMP_RECORD_SIZE, UtmpKind};
use crate::state::{self, FileTable, PersistedState, SessionTable};
use crate::users::UserLookup;

/// 레코드와 진단을 받는 출력 지점
pub trait RecordSink {
    /// 완성된 레코드 하나를 전달합니다.
    ///
    /// 소비자가 사라졌으면 `Err`를 반환하고, 리더는 파일 경계에서 주기를 멈춥니다.
    fn emit(&mut self, record: LoginRecord) -> Result<(), LoginReaderError>;

    /// 복구 가능한 진단을 전달합니다.
    fn report(&mut self, error: LoginReaderError);
}

/// 레코드와 진단을 메모리에 모으는 sink
#[derive(Debug, Default)]
pub struct CycleOutput {
    /// 방출 순서대로 모인 레코드
    pub records: Vec<LoginRecord>,
    /// 진단 목록 (주기 중단 에러가 있으면 마지막 항목)
    pub errors: Vec<LoginReaderError>,
}

impl CycleOutput {
    /// 주기가 중단되었는지 확인합니다.
    pub fn is_aborted(&self) -> bool {
        self.errors.iter().any(LoginReaderError::is_fatal)
    }
}

impl RecordSink for CycleOutput {
    fn emit(&mut self, record: LoginRecord) -> Result<(), LoginReaderError> {
        self.records.push(record);
        Ok(())
    }

    fn report(&mut self, error: LoginReaderError) {
        self.errors.push(error);
    }
}

/// 두 개의 bounded mpsc 채널로 내보내는 sink
///
/// 블로킹 전송을 사용하므로 `spawn_blocking` 스레드에서만 사용해야 합니다.
pub struct ChannelSink {
    records: mpsc::Sender<LoginRecord>,
    errors: mpsc::Sender<LoginReaderError>,
}

impl ChannelSink {
    /// 레코드/에러 송신자로 sink를 만듭니다.
    pub fn new(
        records: mpsc::Sender<LoginRecord>,
        errors: mpsc::Sender<LoginReaderError>,
    ) -> Self {
        Self { records, errors }
    }
}

impl RecordSink for ChannelSink {
    fn emit(&mut self, record: LoginRecord) -> Result<(), LoginReaderError> {
        self.records
            .blocking_send(record)
            .map_err(|_| LoginReaderError::Channel("record receiver dropped".to_owned()))
    }

    fn report(&mut self, error: LoginReaderError) {
        if self.errors.blocking_send(error).is_err() {
            debug!("error receiver dropped, diagnostic discarded");
        }
    }
}

/// 한 주기의 집계
#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    /// 실제로 읽은 파일 수
    pub files_read: usize,
    /// 방출한 레코드 수
    pub records_emitted: usize,
    /// 건너뛴 손상 레코드 수
    pub malformed_records: usize,
    /// 파일 단위 에러 수
    pub file_errors: usize,
    /// 소비한 바이트 수
    pub bytes_consumed: u64,
    /// 주기 종료 시 추적 중인 파일 수
    pub tracked_files: usize,
    /// 주기 종료 시 열린 세션 수
    pub open_sessions: usize,
    /// 소요 시간
    pub duration: Duration,
}

/// 백그라운드에서 실행 중인 한 주기
///
/// 두 수신자는 주기가 끝날 때 함께 닫힙니다.
pub struct ReadCycle {
    /// 레코드 수신자
    pub records: mpsc::Receiver<LoginRecord>,
    /// 진단 수신자
    pub errors: mpsc::Receiver<LoginReaderError>,
    handle: JoinHandle<(LoginReader, Result<CycleSummary, LoginReaderError>)>,
}

impl ReadCycle {
    /// 주기 종료를 기다려 리더와 주기 결과를 돌려받습니다.
    ///
    /// 수신자를 비우지 않은 채 호출하면 채널이 가득 찬 경우 주기가 끝나지 않으므로,
    /// 두 수신자를 모두 소비했거나 닫은 뒤에 호출해야 합니다.
    pub async fn finish(
        self,
    ) -> Result<(LoginReader, Result<CycleSummary, LoginReaderError>), LoginReaderError> {
        self.handle
            .await
            .map_err(|e| LoginReaderError::Panic(format!("read cycle task failed: {e}")))
    }

    /// 두 수신자를 동시에 비우고 리더와 수집 결과를 돌려받습니다.
    pub async fn drain(self) -> Result<(LoginReader, CycleOutput), LoginReaderError> {
        let ReadCycle {
            mut records,
            mut errors,
            handle,
        } = self;
        let mut output = CycleOutput::default();
        let mut records_open = true;
        let mut errors_open = true;

        while records_open || errors_open {
            tokio::select! {
                record = records.recv(), if records_open => match record {
                    Some(record) => output.records.push(record),
                    None => records_open = false,
                },
                error = errors.recv(), if errors_open => match error {
                    Some(error) => output.errors.push(error),
                    None => errors_open = false,
                },
            }
        }

        let (reader, result) = handle
            .await
            .map_err(|e| LoginReaderError::Panic(format!("read cycle task failed: {e}")))?;
        if let Err(e) = result {
            output.errors.push(e);
        }
        Ok((reader, output))
    }
}

/// 파일 하나를 처리한 결과
enum FileOutcome {
    Committed,
    Skipped,
    Cancelled(LoginReaderError),
}

/// wtmp/btmp 증분 리더
///
/// 파일 식별 테이블과 세션 상관기를 소유하며, 모든 협력자(저장소, UID 조회)는
/// 생성 시 주입됩니다.
pub struct LoginReader {
    config: ReaderConfig,
    store: Arc<dyn StateStore>,
    users: Option<Arc<dyn UserLookup>>,
    files: FileTable,
    correlator: SessionCorrelator,
    pending: Vec<LoginReaderError>,
}

impl std::fmt::Debug for LoginReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginReader")
            .field("config", &self.config)
            .field("tracked_files", &self.files.len())
            .field("open_sessions", &self.correlator.open_count())
            .field("uid_lookup", &self.users.is_some())
            .finish()
    }
}

impl LoginReader {
    /// 저장소에서 상태를 복원하여 리더를 생성합니다.
    ///
    /// 손상된 상태는 빈 테이블로 대체되고 첫 주기에서 진단으로 보고됩니다.
    ///
    /// # Errors
    ///
    /// 설정이 유효하지 않거나 저장소 읽기에 실패하면 에러를 반환합니다.
    pub fn new(
        config: ReaderConfig,
        store: Arc<dyn StateStore>,
        users: Option<Arc<dyn UserLookup>>,
    ) -> Result<Self, LoginReaderError> {
        config.validate()?;
        let restored = PersistedState::load(store.as_ref())?;

        info!(
            wtmp = %config.wtmp_file_pattern,
            btmp = %config.btmp_file_pattern,
            files = restored.files.len(),
            sessions = restored.sessions.len(),
            "login reader initialized"
        );

        Ok(Self {
            config,
            store,
            users,
            files: restored.files,
            correlator: SessionCorrelator::from_sessions(restored.sessions),
            pending: restored.diagnostics,
        })
    }

    /// 설정을 반환합니다.
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// 추적 중인 파일 테이블
    pub fn tracked_files(&self) -> &FileTable {
        &self.files
    }

    /// 열린 세션 테이블
    pub fn open_sessions(&self) -> &SessionTable {
        self.correlator.sessions()
    }

    /// 현재 테이블을 저장소에 기록합니다.
    pub fn save_state(&self) -> Result<(), LoginReaderError> {
        state::save(self.store.as_ref(), &self.files, self.correlator.sessions())
    }

    /// 한 주기를 실행하고 결과를 메모리에 모읍니다.
    ///
    /// 주기를 중단시킨 에러는 `errors`의 마지막 항목으로 들어갑니다.
    pub fn read(&mut self) -> CycleOutput {
        let mut output = CycleOutput::default();
        if let Err(e) = self.run_cycle(&mut output) {
            output.errors.push(e);
        }
        output
    }

    /// 블로킹 스레드에서 한 주기를 실행합니다.
    ///
    /// tokio 런타임 안에서 호출해야 합니다.
    pub fn spawn_cycle(mut self, capacity: usize) -> ReadCycle {
        let (record_tx, records) = mpsc::channel(capacity.max(1));
        let (error_tx, errors) = mpsc::channel(capacity.max(1));

        let handle = tokio::task::spawn_blocking(move || {
            let mut sink = ChannelSink::new(record_tx, error_tx);
            let result = self.run_cycle(&mut sink);
            drop(sink);
            (self, result)
        });

        ReadCycle {
            records,
            errors,
            handle,
        }
    }

    /// 한 주기를 실행합니다.
    ///
    /// 복구 가능한 진단은 `sink.report`로 전달되고, 주기를 중단시킨 에러만
    /// `Err`로 반환됩니다. 주기 안의 panic은 [`LoginReaderError::Panic`]으로 바뀝니다.
    pub fn run_cycle(
        &mut self,
        sink: &mut dyn RecordSink,
    ) -> Result<CycleSummary, LoginReaderError> {
        let started = Instant::now();
        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.cycle(sink))) {
            Ok(result) => result,
            Err(payload) => Err(LoginReaderError::Panic(panic_message(payload.as_ref()))),
        };
        let elapsed = started.elapsed();

        metrics::histogram!(m::LOGIN_READER_CYCLE_DURATION_SECONDS).record(elapsed.as_secs_f64());
        metrics::gauge!(m::LOGIN_READER_TRACKED_FILES).set(self.files.len() as f64);
        metrics::gauge!(m::LOGIN_READER_OPEN_SESSIONS).set(self.correlator.open_count() as f64);

        match result {
            Ok(mut summary) => {
                summary.duration = elapsed;
                metrics::counter!(m::LOGIN_READER_CYCLES_TOTAL, m::LABEL_RESULT => "success")
                    .increment(1);
                info!(
                    files_read = summary.files_read,
                    records = summary.records_emitted,
                    malformed = summary.malformed_records,
                    file_errors = summary.file_errors,
                    bytes = summary.bytes_consumed,
                    tracked_files = summary.tracked_files,
                    open_sessions = summary.open_sessions,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "read cycle complete"
                );
                Ok(summary)
            }
            Err(e) => {
                metrics::counter!(m::LOGIN_READER_CYCLES_TOTAL, m::LABEL_RESULT => "failure")
                    .increment(1);
                warn!(error = %e, elapsed_ms = elapsed.as_millis() as u64, "read cycle aborted");
                Err(e)
            }
        }
    }

    fn cycle(&mut self, sink: &mut dyn RecordSink) -> Result<CycleSummary, LoginReaderError> {
        let mut summary = CycleSummary::default();

        for diagnostic in std::mem::take(&mut self.pending) {
            sink.report(diagnostic);
        }

        let mut located = Vec::new();
        let mut failed_kinds = Vec::new();
        let mut reported = HashSet::new();
        for (pattern, kind) in [
            (self.config.wtmp_file_pattern.clone(), UtmpKind::Wtmp),
            (self.config.btmp_file_pattern.clone(), UtmpKind::Btmp),
        ] {
            match locator::find_files(&pattern, kind) {
                Ok(discovery) => {
                    for error in discovery.errors {
                        if let LoginReaderError::FileIo { path, .. } = &error {
                            reported.insert(path.clone());
                        }
                        self.file_error(error, sink, &mut summary);
                    }
                    located.extend(discovery.files);
                }
                Err(e) => {
                    warn!(pattern = %pattern, kind = %kind, error = %e, "file discovery failed");
                    sink.report(e);
                    failed_kinds.push(kind);
                }
            }
        }

        let order = self.reconcile(located, &failed_kinds, &reported, sink, &mut summary);

        let mut cancelled = None;
        for inode in order {
            match self.read_file(inode, sink, &mut summary)? {
                FileOutcome::Committed => summary.files_read += 1,
                FileOutcome::Skipped => {}
                FileOutcome::Cancelled(e) => {
                    cancelled = Some(e);
                    break;
                }
            }
        }

        self.save_state()?;
        summary.tracked_files = self.files.len();
        summary.open_sessions = self.correlator.open_count();

        match cancelled {
            Some(e) => {
                info!(error = %e, "record consumer gone, cycle stopped early");
                Err(e)
            }
            None => Ok(summary),
        }
    }

    /// 탐색 결과를 기존 테이블과 inode 기준으로 합치고, 읽을 순서를 반환합니다.
    ///
    /// 순서: 고아 파일 → wtmp → btmp
    ///
    /// 읽지 않은 바이트가 남은 고아는 마지막 경로에서 찾지 못해도 테이블에 남아,
    /// 나중에 다른 경로로 다시 발견되면 저장된 오프셋부터 이어 읽습니다.
    fn reconcile(
        &mut self,
        located: Vec<TrackedFile>,
        failed_kinds: &[UtmpKind],
        reported: &HashSet<String>,
        sink: &mut dyn RecordSink,
        summary: &mut CycleSummary,
    ) -> Vec<u64> {
        let mut next = FileTable::new();
        let mut seen = HashSet::new();
        let mut located_order = Vec::new();

        for mut file in located {
            if !seen.insert(file.inode) {
                // 두 패턴이 같은 파일을 가리킴
                continue;
            }
            if let Some(known) = self.files.get(&file.inode) {
                if file.size < known.offset {
                    warn!(
                        path = %file.path.display(),
                        size = file.size,
                        offset = known.offset,
                        "file truncated in place, reading from start"
                    );
                } else {
                    file.offset = known.offset;
                }
            }
            located_order.push(file.inode);
            next.insert(file.inode, file);
        }

        let mut orphans: Vec<&TrackedFile> = Vec::new();
        for (inode, known) in &self.files {
            if seen.contains(inode) {
                continue;
            }
            if failed_kinds.contains(&known.kind) {
                next.insert(*inode, known.clone());
                continue;
            }
            if known.is_consumed() {
                debug!(path = %known.path.display(), inode, "dropping consumed file");
                continue;
            }
            orphans.push(known);
        }
        orphans.sort_by(|a, b| b.path.cmp(&a.path));

        let mut order = Vec::new();
        let mut errors = Vec::new();
        for known in orphans {
            next.insert(known.inode, known.clone());
            let path = known.path.display().to_string();
            if reported.contains(&path) {
                // 탐색 단계에서 이미 보고됨
                continue;
            }
            match locator::identity(&known.path) {
                Ok((inode, size)) if inode == known.inode => {
                    let mut file = known.clone();
                    if size < file.offset {
                        warn!(path = %path, "orphaned file truncated, reading from start");
                        file.offset = 0;
                    }
                    file.size = size;
                    debug!(path = %path, unread = file.unread(), "reading orphaned file");
                    order.push(file.inode);
                    next.insert(file.inode, file);
                }
                Ok(_) => errors.push((
                    path,
                    "last path now holds another file, remaining records kept".to_owned(),
                )),
                Err(e) if e.kind() == io::ErrorKind::NotFound => errors.push((
                    path,
                    "file not found, remaining records kept".to_owned(),
                )),
                Err(e) => errors.push((path, e.to_string())),
            }
        }

        for (path, reason) in errors {
            self.file_error(LoginReaderError::FileIo { path, reason }, sink, summary);
        }

        self.files = next;
        order.extend(located_order);
        order
    }

    fn read_file(
        &mut self,
        inode: u64,
        sink: &mut dyn RecordSink,
        summary: &mut CycleSummary,
    ) -> Result<FileOutcome, LoginReaderError> {
        let Some(tracked) = self.files.get(&inode).cloned() else {
            return Ok(FileOutcome::Skipped);
        };
        if tracked.unread() < UTMP_RECORD_SIZE as u64 {
            return Ok(FileOutcome::Skipped);
        }

        let buf = match read_tail(&tracked) {
            Ok(buf) => buf,
            Err(reason) => {
                self.file_error(
                    LoginReaderError::FileIo {
                        path: tracked.path.display().to_string(),
                        reason,
                    },
                    sink,
                    summary,
                );
                return Ok(FileOutcome::Skipped);
            }
        };

        let origin = tracked.path.display().to_string();
        let whole = buf.len() - buf.len() % UTMP_RECORD_SIZE;
        let mut scratch = self.correlator.clone();
        let mut records = Vec::new();

        for (index, chunk) in buf[..whole].chunks_exact(UTMP_RECORD_SIZE).enumerate() {
            let offset = tracked.offset + (index * UTMP_RECORD_SIZE) as u64;
            match crate::record::decode_record(chunk, tracked.kind, &origin) {
                Ok(DecodedRecord::EmptySlot) => {}
                Ok(DecodedRecord::Unhandled(ut_type)) => {
                    tracing::trace!(path = %origin, offset, ut_type, "ignoring record");
                }
                Ok(DecodedRecord::Event(event)) => {
                    let event = self.resolve_uid(event);
                    if let Some(record) = scratch.process(event) {
                        records.push(record);
                    }
                }
                Err(source) => {
                    debug!(path = %origin, offset, error = %source, "skipping malformed record");
                    metrics::counter!(m::LOGIN_READER_MALFORMED_RECORDS_TOTAL).increment(1);
                    summary.malformed_records += 1;
                    sink.report(LoginReaderError::MalformedRecord {
                        path: origin.clone(),
                        offset,
                        source,
                    });
                }
            }
        }

        let emitted = records.len();
        for record in records {
            let kind = record.kind.as_str();
            if let Err(e) = sink.emit(record) {
                return Ok(FileOutcome::Cancelled(e));
            }
            metrics::counter!(m::LOGIN_READER_RECORDS_EMITTED_TOTAL, m::LABEL_KIND => kind)
                .increment(1);
        }

        self.correlator = scratch;
        if let Some(entry) = self.files.get_mut(&inode) {
            entry.offset = tracked.offset + whole as u64;
        }
        self.save_state()?;

        metrics::counter!(m::LOGIN_READER_BYTES_READ_TOTAL, m::LABEL_FILE_KIND => tracked.kind.as_str())
            .increment(whole as u64);
        summary.records_emitted += emitted;
        summary.bytes_consumed += whole as u64;
        debug!(
            path = %origin,
            from = tracked.offset,
            to = tracked.offset + whole as u64,
            records = emitted,
            "file committed"
        );
        Ok(FileOutcome::Committed)
    }

    fn resolve_uid(&self, event: LoginEvent) -> LoginEvent {
        let Some(users) = &self.users else {
            return event;
        };
        let wants_uid = matches!(event.kind, LoginEventKind::Login | LoginEventKind::LoginFailed);
        if !wants_uid || event.user_id.is_some() || event.username.is_empty() {
            return event;
        }
        let uid = users.uid_of(&event.username);
        event.with_user_id(uid)
    }

    fn file_error(
        &self,
        error: LoginReaderError,
        sink: &mut dyn RecordSink,
        summary: &mut CycleSummary,
    ) {
        warn!(error = %error, "file skipped this cycle");
        metrics::counter!(m::LOGIN_READER_FILE_ERRORS_TOTAL).increment(1);
        summary.file_errors += 1;
        sink.report(error);
    }
}

/// 추적 중인 파일의 읽지 않은 구간을 읽습니다.
///
/// 경로가 다른 파일로 바뀌었으면 에러 사유를 반환합니다.
fn read_tail(tracked: &TrackedFile) -> Result<Vec<u8>, String> {
    let mut file = File::open(&tracked.path).map_err(|e| e.to_string())?;
    let meta = file.metadata().map_err(|e| e.to_string())?;
    let inode = locator::inode_of(&meta);
    if inode != tracked.inode {
        return Err(format!(
            "inode changed (expected {}, found {inode})",
            tracked.inode
        ));
    }

    file.seek(SeekFrom::Start(tracked.offset))
        .map_err(|e| e.to_string())?;
    let mut buf = Vec::with_capacity(usize::try_from(tracked.unread()).unwrap_or(0));
    file.take(tracked.unread())
        .read_to_end(&mut buf)
        .map_err(|e| e.to_string())?;
    Ok(buf)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
