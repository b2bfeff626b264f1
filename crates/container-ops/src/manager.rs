//! 컨테이너 매니저 — 상태 기계 구동과 드리프트 조정
//!
//! [`ContainerManager`]는 관리 중인 컨테이너의 레지스트리를 소유하고
//! `create`/`start`/`stop`/`inspect`/`remove`로 상태 기계를 구동합니다.
//! 백엔드 불가는 공유 백오프 정책으로 재시도하고, 없는 식별자는 해당
//! 엔트리를 `error`로 전이시키며 재시도하지 않습니다.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::{counter, gauge};
use tracing::{debug, info, warn};

use drydock_core::component::{Component, HealthStatus};
use drydock_core::error::ContainerError;
use drydock_core::metrics::{
    CONTAINER_ACTIONS_TOTAL, CONTAINER_BACKEND_RETRIES_TOTAL, CONTAINER_MANAGED, LABEL_ACTION,
    LABEL_RESULT,
};
use drydock_core::retry::RetryPolicy;

use crate::backend::{BackendFailure, ContainerBackend, RuntimeStatus};
use crate::config::ContainerOpsConfig;
use crate::spec::ContainerSpec;
use crate::state::{ContainerState, ManagedContainer};

/// 시도당 타임아웃을 포함한 백엔드 호출 실패
enum CallFailure {
    Backend(BackendFailure),
    TimedOut,
}

impl CallFailure {
    fn is_transient(&self) -> bool {
        match self {
            CallFailure::Backend(failure) => failure.is_transient(),
            CallFailure::TimedOut => true,
        }
    }
}

/// 컨테이너 라이프사이클 매니저
///
/// 하나의 설정 스냅샷에서 생성되며, 동시 호출에 안전합니다. 레지스트리
/// 잠금은 백엔드 호출을 기다리는 동안 잡지 않습니다.
pub struct ContainerManager<B: ContainerBackend> {
    backend: Arc<B>,
    config: ContainerOpsConfig,
    registry: Mutex<HashMap<String, ManagedContainer>>,
    retry: RetryPolicy,
    action_timeout: Duration,
}

impl<B: ContainerBackend> ContainerManager<B> {
    /// 설정을 검증하고 매니저를 생성합니다.
    pub fn new(config: ContainerOpsConfig, backend: B) -> Result<Self, ContainerError> {
        config.validate()?;
        let retry = config.retry_policy();
        let action_timeout = config.action_timeout();
        Ok(Self {
            backend: Arc::new(backend),
            config,
            registry: Mutex::new(HashMap::new()),
            retry,
            action_timeout,
        })
    }

    /// 스펙을 검증하고 컨테이너를 `created` 상태로 등록합니다.
    ///
    /// 이미지 참조 구문과 요청 리소스가 설정 상한 이내인지 확인하며,
    /// 위반은 [`ContainerError::InvalidSpec`]으로 즉시 반환됩니다.
    pub async fn create(&self, spec: &ContainerSpec) -> Result<String, ContainerError> {
        spec.validate(&self.config)?;

        let backend = Arc::clone(&self.backend);
        let owned_spec = spec.clone();
        let (result, attempts) = self
            .call_backend("create", move || {
                let backend = Arc::clone(&backend);
                let spec = owned_spec.clone();
                async move { backend.create(&spec).await }
            })
            .await;
        let id = self.surface("create", None, result, attempts)?;

        let managed = {
            let mut registry = self.registry.lock().expect("container registry lock poisoned");
            let container = ManagedContainer::new(id.clone(), spec.name.clone(), spec.image.clone());
            registry.insert(id.clone(), container);
            registry.values().filter(|c| c.observed != ContainerState::Removed).count()
        };
        gauge!(CONTAINER_MANAGED).set(managed as f64);
        info!(id = id.as_str(), name = spec.name.as_str(), image = spec.image.as_str(), "container created");
        Ok(id)
    }

    /// 컨테이너를 시작합니다.
    ///
    /// 이미 `running`이면 에러 없는 no-op 성공입니다. 단조 규칙상
    /// `stopped`에서의 재시작은 허용되지 않습니다.
    pub async fn start(&self, id: &str) -> Result<ContainerState, ContainerError> {
        match self.observed(id)? {
            // 멱등: 이미 실행 중
            ContainerState::Running => return Ok(ContainerState::Running),
            ContainerState::Created => {}
            ContainerState::Removed => return Err(ContainerError::NotFound(id.to_owned())),
            state @ (ContainerState::Stopped | ContainerState::Error) => {
                return Err(ContainerError::InvalidTransition {
                    id: id.to_owned(),
                    from: state.to_string(),
                    to: ContainerState::Running.to_string(),
                });
            }
        }

        let backend = Arc::clone(&self.backend);
        let owned_id = id.to_owned();
        let (result, attempts) = self
            .call_backend("start", move || {
                let backend = Arc::clone(&backend);
                let id = owned_id.clone();
                async move { backend.start(&id).await }
            })
            .await;
        self.surface("start", Some(id), result, attempts)?;

        self.apply_transition(id, ContainerState::Running)?;
        Ok(ContainerState::Running)
    }

    /// 컨테이너를 정지합니다.
    ///
    /// 이미 `stopped`/`removed`이면 에러 없는 no-op 성공입니다.
    pub async fn stop(&self, id: &str) -> Result<ContainerState, ContainerError> {
        match self.observed(id)? {
            // 멱등: 이미 정지/제거됨
            state @ (ContainerState::Stopped | ContainerState::Removed) => return Ok(state),
            ContainerState::Created | ContainerState::Running => {}
            ContainerState::Error => {
                return Err(ContainerError::InvalidTransition {
                    id: id.to_owned(),
                    from: ContainerState::Error.to_string(),
                    to: ContainerState::Stopped.to_string(),
                });
            }
        }

        let backend = Arc::clone(&self.backend);
        let owned_id = id.to_owned();
        let (result, attempts) = self
            .call_backend("stop", move || {
                let backend = Arc::clone(&backend);
                let id = owned_id.clone();
                async move { backend.stop(&id).await }
            })
            .await;
        self.surface("stop", Some(id), result, attempts)?;

        self.apply_transition(id, ContainerState::Stopped)?;
        Ok(ContainerState::Stopped)
    }

    /// 컨테이너를 제거합니다.
    ///
    /// 미등록 식별자, 이미 제거된 엔트리, 백엔드에서 이미 사라진
    /// 컨테이너 모두 멱등 성공입니다. `error` 상태에서 나가는 유일한
    /// 경로입니다.
    pub async fn remove(&self, id: &str) -> Result<(), ContainerError> {
        let Some(observed) = self.try_observed(id) else {
            // 등록된 적 없는 식별자 — 멱등 성공
            counter!(CONTAINER_ACTIONS_TOTAL, LABEL_ACTION => "remove", LABEL_RESULT => "success")
                .increment(1);
            return Ok(());
        };
        if observed == ContainerState::Removed {
            return Ok(());
        }

        let backend = Arc::clone(&self.backend);
        let owned_id = id.to_owned();
        let (result, attempts) = self
            .call_backend("remove", move || {
                let backend = Arc::clone(&backend);
                let id = owned_id.clone();
                async move { backend.remove(&id).await }
            })
            .await;

        // 백엔드에서 이미 사라진 경우는 멱등 성공으로 취급
        let result = match result {
            Err(CallFailure::Backend(BackendFailure::NotFound(_))) => {
                debug!(id = id, "container already gone from backend");
                Ok(())
            }
            other => other,
        };
        self.surface("remove", Some(id), result, attempts)?;

        self.apply_transition(id, ContainerState::Removed)?;
        let managed = {
            let registry = self.registry.lock().expect("container registry lock poisoned");
            registry.values().filter(|c| c.observed != ContainerState::Removed).count()
        };
        gauge!(CONTAINER_MANAGED).set(managed as f64);
        info!(id = id, "container removed");
        Ok(())
    }

    /// 백엔드를 질의하여 현재 관측 상태를 반환합니다.
    ///
    /// 저장된 상태와 백엔드 보고가 다르면 드리프트를 저장된 상태로
    /// 반영합니다 (예: 스스로 종료한 컨테이너는 `stopped`가 됩니다).
    /// 제거되었거나 등록된 적 없는 식별자는 "not found" 분류로
    /// 실패하며 재시도하지 않습니다.
    pub async fn inspect(&self, id: &str) -> Result<ManagedContainer, ContainerError> {
        match self.try_observed(id) {
            None => return Err(ContainerError::NotFound(id.to_owned())),
            Some(ContainerState::Removed) => {
                return Err(ContainerError::NotFound(id.to_owned()));
            }
            Some(_) => {}
        }

        let backend = Arc::clone(&self.backend);
        let owned_id = id.to_owned();
        let (result, attempts) = self
            .call_backend("inspect", move || {
                let backend = Arc::clone(&backend);
                let id = owned_id.clone();
                async move { backend.inspect(&id).await }
            })
            .await;
        let status: RuntimeStatus = self.surface("inspect", Some(id), result, attempts)?;

        let mut registry = self.registry.lock().expect("container registry lock poisoned");
        let entry = registry
            .get_mut(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_owned()))?;
        if entry.observed != status.state {
            info!(
                id = id,
                stored = entry.observed.as_str(),
                reported = status.state.as_str(),
                "reconciling observed state drift"
            );
            entry.reconcile(status.state);
        }
        Ok(entry.clone())
    }

    /// 관리 중인 컨테이너 전체의 스냅샷을 반환합니다.
    pub fn list(&self) -> Vec<ManagedContainer> {
        self.registry
            .lock()
            .expect("container registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// 이름이 접두어로 시작하는 컨테이너를 모두 정지 후 제거합니다.
    ///
    /// 테스트 리소스 정리 경로입니다. 개별 정지 실패는 제거 시도를
    /// 막지 않으며, 제거에 성공한 수를 반환합니다.
    pub async fn purge_prefix(&self, prefix: &str) -> Result<usize, ContainerError> {
        let ids: Vec<String> = {
            let registry = self.registry.lock().expect("container registry lock poisoned");
            registry
                .values()
                .filter(|c| c.name.starts_with(prefix) && c.observed != ContainerState::Removed)
                .map(|c| c.id.clone())
                .collect()
        };

        let mut purged = 0;
        for id in ids {
            if let Err(e) = self.stop(&id).await {
                debug!(id = id.as_str(), error = %e, "stop before purge failed, removing anyway");
            }
            match self.remove(&id).await {
                Ok(()) => purged += 1,
                Err(e) => warn!(id = id.as_str(), error = %e, "failed to purge container"),
            }
        }
        info!(prefix = prefix, purged = purged, "purged containers by prefix");
        Ok(purged)
    }

    /// 현재 관리 중인 (제거되지 않은) 컨테이너 수
    pub fn managed_count(&self) -> usize {
        self.registry
            .lock()
            .expect("container registry lock poisoned")
            .values()
            .filter(|c| c.observed != ContainerState::Removed)
            .count()
    }

    // --- 내부 헬퍼 ---

    fn observed(&self, id: &str) -> Result<ContainerState, ContainerError> {
        self.try_observed(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_owned()))
    }

    fn try_observed(&self, id: &str) -> Option<ContainerState> {
        self.registry
            .lock()
            .expect("container registry lock poisoned")
            .get(id)
            .map(|c| c.observed)
    }

    fn apply_transition(&self, id: &str, to: ContainerState) -> Result<(), ContainerError> {
        let mut registry = self.registry.lock().expect("container registry lock poisoned");
        let entry = registry
            .get_mut(id)
            .ok_or_else(|| ContainerError::NotFound(id.to_owned()))?;
        entry.desired = to;
        entry.transition(to)
    }

    fn mark_error(&self, id: &str) {
        let mut registry = self.registry.lock().expect("container registry lock poisoned");
        if let Some(entry) = registry.get_mut(id) {
            // any -> error는 항상 허용됨
            let _ = entry.transition(ContainerState::Error);
        }
    }

    /// 시도당 타임아웃과 공유 재시도 정책으로 백엔드 호출을 감쌉니다.
    async fn call_backend<T, F, Fut>(&self, action: &'static str, f: F) -> (Result<T, CallFailure>, u32)
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, BackendFailure>> + Send,
    {
        let timeout = self.action_timeout;
        self.retry
            .run(
                |attempt| {
                    if attempt > 1 {
                        counter!(CONTAINER_BACKEND_RETRIES_TOTAL, LABEL_ACTION => action)
                            .increment(1);
                    }
                    let fut = f();
                    async move {
                        match tokio::time::timeout(timeout, fut).await {
                            Ok(Ok(value)) => Ok(value),
                            Ok(Err(failure)) => Err(CallFailure::Backend(failure)),
                            Err(_elapsed) => Err(CallFailure::TimedOut),
                        }
                    }
                },
                CallFailure::is_transient,
            )
            .await
    }

    /// 백엔드 호출 결과를 에러 분류 체계로 변환합니다.
    ///
    /// `NotFound`는 해당 엔트리를 `error` 상태로 전이시킵니다 — 이후
    /// 그 엔트리에서 나가는 길은 `remove`뿐입니다.
    fn surface<T>(
        &self,
        action: &'static str,
        id: Option<&str>,
        result: Result<T, CallFailure>,
        attempts: u32,
    ) -> Result<T, ContainerError> {
        let outcome = match result {
            Ok(value) => Ok(value),
            Err(CallFailure::Backend(BackendFailure::NotFound(missing))) => {
                if let Some(id) = id {
                    self.mark_error(id);
                }
                Err(ContainerError::NotFound(missing))
            }
            Err(CallFailure::Backend(BackendFailure::Api(reason))) => {
                Err(ContainerError::Backend(reason))
            }
            Err(CallFailure::Backend(BackendFailure::Unavailable(reason))) => {
                Err(ContainerError::BackendUnavailable { reason, attempts })
            }
            Err(CallFailure::TimedOut) => Err(ContainerError::BackendUnavailable {
                reason: "backend call timed out".to_owned(),
                attempts,
            }),
        };

        let result_label = if outcome.is_ok() { "success" } else { "failure" };
        counter!(CONTAINER_ACTIONS_TOTAL, LABEL_ACTION => action, LABEL_RESULT => result_label)
            .increment(1);
        if let Err(ref e) = outcome {
            warn!(action = action, id = id.unwrap_or("-"), error = %e, "backend call failed");
        }
        outcome
    }
}

impl<B: ContainerBackend> Component for ContainerManager<B> {
    fn name(&self) -> &str {
        "container-ops"
    }

    async fn health_check(&self) -> HealthStatus {
        match self.backend.ping().await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Degraded(format!("backend unreachable: {e}")),
        }
    }
}
