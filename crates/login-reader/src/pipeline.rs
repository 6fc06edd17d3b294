//! 폴링 파이프라인 -- 일정 주기로 읽기 주기를 실행하고 레코드를 하위로 전달
//!
//! [`LoginPipeline`]은 core의 [`Pipeline`](loginpost_core::pipeline::Pipeline) trait을 구현하여
//! daemon에서 start/stop/health_check 생명주기로 관리됩니다.
//!
//! # 내부 아키텍처
//! ```text
//! interval tick -> spawn_blocking(LoginReader::run_cycle) -> ChannelSink
//!     -> records -> mpsc -> downstream
//!     -> errors  -> tracing 로그
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use loginpost_core::error::{LoginpostError, PipelineError};
use loginpost_core::event::LoginRecord;
use loginpost_core::pipeline::{HealthStatus, Pipeline, StateStore};

use crate::config::ReaderConfig;
use crate::error::LoginReaderError;
use crate::reader::LoginReader;
use crate::store::FileStateStore;
use crate::users::UserLookup;

/// 파이프라인 실행 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 폴링 태스크와 공유하는 카운터
#[derive(Debug, Default)]
struct PollStats {
    cycles: AtomicU64,
    records: AtomicU64,
    diagnostics: AtomicU64,
    last_cycle_failed: AtomicBool,
}

/// 로그인 기록 폴링 파이프라인
///
/// # 사용 예시
/// ```ignore
/// use loginpost_login_reader::LoginPipelineBuilder;
///
/// let (mut pipeline, record_rx) = LoginPipelineBuilder::new()
///     .config(config)
///     .build()?;
///
/// pipeline.start().await?;
/// ```
pub struct LoginPipeline {
    config: ReaderConfig,
    state: PipelineState,
    /// 정지 상태일 때만 보관, 실행 중에는 폴링 태스크가 소유
    reader: Option<LoginReader>,
    record_tx: mpsc::Sender<LoginRecord>,
    cancel: CancellationToken,
    task: Option<JoinHandle<Option<LoginReader>>>,
    stats: Arc<PollStats>,
}

impl LoginPipeline {
    /// 현재 상태를 반환합니다.
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 완료된 읽기 주기 수
    pub fn cycle_count(&self) -> u64 {
        self.stats.cycles.load(Ordering::Relaxed)
    }

    /// 하위로 전달한 레코드 수
    pub fn forwarded_count(&self) -> u64 {
        self.stats.records.load(Ordering::Relaxed)
    }

    /// 보고된 진단 수
    pub fn diagnostic_count(&self) -> u64 {
        self.stats.diagnostics.load(Ordering::Relaxed)
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }
}

impl Pipeline for LoginPipeline {
    async fn start(&mut self) -> Result<(), LoginpostError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let reader = self.reader.take().ok_or_else(|| {
            PipelineError::InitFailed("login reader was lost by a previous run".to_owned())
        })?;

        tracing::info!(
            interval_secs = self.config.poll_interval_secs,
            "starting login pipeline"
        );

        self.cancel = CancellationToken::new();
        self.stats.last_cycle_failed.store(false, Ordering::Relaxed);
        self.task = Some(tokio::spawn(poll_loop(
            reader,
            Duration::from_secs(self.config.poll_interval_secs),
            self.config.channel_capacity,
            self.record_tx.clone(),
            self.cancel.clone(),
            Arc::clone(&self.stats),
        )));

        self.state = PipelineState::Running;
        tracing::info!("login pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), LoginpostError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping login pipeline");
        self.cancel.cancel();
        self.state = PipelineState::Stopped;

        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(Some(reader)) => {
                reader.save_state()?;
                self.reader = Some(reader);
            }
            Ok(None) => tracing::warn!("poll task ended without returning the reader"),
            Err(e) => {
                return Err(PipelineError::StopFailed(format!("poll task failed: {e}")).into());
            }
        }

        tracing::info!(
            cycles = self.cycle_count(),
            records = self.forwarded_count(),
            "login pipeline stopped"
        );
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                if self.task.as_ref().is_some_and(JoinHandle::is_finished) {
                    HealthStatus::Unhealthy("poll task exited".to_owned())
                } else if self.stats.last_cycle_failed.load(Ordering::Relaxed) {
                    HealthStatus::Degraded("last read cycle aborted".to_owned())
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

/// 취소될 때까지 주기를 반복하고 리더를 돌려줍니다.
///
/// 읽기 태스크 자체가 사라지면 `None`을 반환합니다.
async fn poll_loop(
    mut reader: LoginReader,
    interval: Duration,
    capacity: usize,
    downstream: mpsc::Sender<LoginRecord>,
    cancel: CancellationToken,
    stats: Arc<PollStats>,
) -> Option<LoginReader> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut downstream_closed = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let mut cycle = reader.spawn_cycle(capacity);
        let mut records_open = true;
        let mut errors_open = true;

        while records_open || errors_open {
            tokio::select! {
                record = cycle.records.recv(), if records_open => match record {
                    Some(record) => {
                        tracing::trace!(%record, "forwarding record");
                        if downstream.send(record).await.is_ok() {
                            stats.records.fetch_add(1, Ordering::Relaxed);
                        } else if !downstream_closed {
                            tracing::warn!("record receiver dropped, stopping after this cycle");
                            downstream_closed = true;
                            cycle.records.close();
                        }
                    }
                    None => records_open = false,
                },
                error = cycle.errors.recv(), if errors_open => match error {
                    Some(error) => {
                        stats.diagnostics.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(error = %error, "login reader diagnostic");
                    }
                    None => errors_open = false,
                },
            }
        }

        match cycle.finish().await {
            Ok((back, result)) => {
                reader = back;
                stats.cycles.fetch_add(1, Ordering::Relaxed);
                match result {
                    Ok(_) => stats.last_cycle_failed.store(false, Ordering::Relaxed),
                    Err(LoginReaderError::Channel(_)) => downstream_closed = true,
                    Err(e) => {
                        stats.last_cycle_failed.store(true, Ordering::Relaxed);
                        stats.diagnostics.fetch_add(1, Ordering::Relaxed);
                        tracing::error!(error = %e, "read cycle aborted, retrying next interval");
                    }
                }
            }
            Err(e) => {
                stats.last_cycle_failed.store(true, Ordering::Relaxed);
                tracing::error!(error = %e, "read cycle task lost");
                return None;
            }
        }

        if downstream_closed {
            break;
        }
    }

    Some(reader)
}

/// 로그인 파이프라인 빌더
///
/// 저장소를 지정하지 않으면 `state_dir`에 [`FileStateStore`]를 엽니다.
pub struct LoginPipelineBuilder {
    config: ReaderConfig,
    store: Option<Arc<dyn StateStore>>,
    users: Option<Arc<dyn UserLookup>>,
    record_tx: Option<mpsc::Sender<LoginRecord>>,
}

impl LoginPipelineBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: ReaderConfig::default(),
            store: None,
            users: None,
            record_tx: None,
        }
    }

    /// 수집기 설정을 지정합니다.
    pub fn config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    /// 상태 저장소를 지정합니다.
    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// UID 조회기를 지정합니다.
    pub fn user_lookup(mut self, users: Arc<dyn UserLookup>) -> Self {
        self.users = Some(users);
        self
    }

    /// 외부 레코드 전송 채널을 설정합니다.
    ///
    /// 설정하지 않으면 빌더가 새 채널을 생성합니다.
    pub fn record_sender(mut self, tx: mpsc::Sender<LoginRecord>) -> Self {
        self.record_tx = Some(tx);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `LoginPipeline`: 파이프라인 인스턴스
    /// - `Option<mpsc::Receiver<LoginRecord>>`: 레코드 수신 채널
    ///   (외부 record_sender를 설정한 경우 None)
    pub fn build(
        self,
    ) -> Result<(LoginPipeline, Option<mpsc::Receiver<LoginRecord>>), LoginReaderError> {
        self.config.validate()?;

        let store: Arc<dyn StateStore> = match self.store {
            Some(store) => store,
            None => Arc::new(FileStateStore::open(&self.config.state_dir)?),
        };
        let reader = LoginReader::new(self.config.clone(), store, self.users)?;

        let (record_tx, record_rx) = match self.record_tx {
            Some(tx) => (tx, None),
            None => {
                let (tx, rx) = mpsc::channel(self.config.channel_capacity);
                (tx, Some(rx))
            }
        };

        let pipeline = LoginPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            reader: Some(reader),
            record_tx,
            cancel: CancellationToken::new(),
            task: None,
            stats: Arc::new(PollStats::default()),
        };

        Ok((pipeline, record_rx))
    }
}

impl Default for LoginPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
