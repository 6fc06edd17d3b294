//! 파이프라인 trait -- 모듈 확장 포인트 정의
//!
//! - [`Pipeline`]: daemon이 관리하는 모듈의 생명주기 (start/stop/health_check)
//! - [`DynPipeline`]: `Box<dyn DynPipeline>`으로 보관하기 위한 object-safe 버전
//! - [`StateStore`]: 재시작 사이에 유지되는 키/값 영속화 저장소

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::{LoginpostError, StorageError};

/// `DynPipeline`이 반환하는 boxed future
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// 모듈 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상 동작
    Healthy,
    /// 동작 중이지만 문제가 있음
    Degraded(String),
    /// 동작하지 않음
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 상태인지 확인합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 상태인지 확인합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

/// daemon이 관리하는 모듈의 생명주기 trait
///
/// 구현체는 `async fn`으로 작성할 수 있습니다.
pub trait Pipeline: Send + Sync {
    /// 모듈을 시작합니다. 이미 실행 중이면 에러를 반환합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), LoginpostError>> + Send;

    /// 모듈을 정지합니다. 실행 중이 아니면 에러를 반환합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), LoginpostError>> + Send;

    /// 현재 상태를 보고합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// [`Pipeline`]의 object-safe 버전
///
/// 모든 `Pipeline` 구현체에 대해 자동으로 구현됩니다.
pub trait DynPipeline: Send + Sync {
    /// 모듈을 시작합니다.
    fn start(&mut self) -> BoxFuture<'_, Result<(), LoginpostError>>;

    /// 모듈을 정지합니다.
    fn stop(&mut self) -> BoxFuture<'_, Result<(), LoginpostError>>;

    /// 현재 상태를 보고합니다.
    fn health_check(&self) -> BoxFuture<'_, HealthStatus>;
}

impl<T: Pipeline> DynPipeline for T {
    fn start(&mut self) -> BoxFuture<'_, Result<(), LoginpostError>> {
        Box::pin(Pipeline::start(self))
    }

    fn stop(&mut self) -> BoxFuture<'_, Result<(), LoginpostError>> {
        Box::pin(Pipeline::stop(self))
    }

    fn health_check(&self) -> BoxFuture<'_, HealthStatus> {
        Box::pin(Pipeline::health_check(self))
    }
}

/// 키/값 영속화 저장소
///
/// 값은 저장소가 해석하지 않는 바이트열입니다.
/// 구현체는 키 단위로 원자적인 덮어쓰기를 보장해야 합니다.
/// 서로 다른 키 사이의 트랜잭션은 보장하지 않습니다.
pub trait StateStore: Send + Sync {
    /// 키에 저장된 값을 읽습니다. 값이 없으면 `Ok(None)`을 반환합니다.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// 키의 값을 원자적으로 덮어씁니다.
    fn store(&self, key: &str, blob: &[u8]) -> Result<(), StorageError>;
}

impl<S: StateStore + ?Sized> StateStore for std::sync::Arc<S> {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).load(key)
    }

    fn store(&self, key: &str, blob: &[u8]) -> Result<(), StorageError> {
        (**self).store(key, blob)
    }
}
