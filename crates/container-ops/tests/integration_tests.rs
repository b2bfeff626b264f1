//! 통합 테스트 — 전체 라이프사이클 플로우 검증
//!
//! create -> start -> stop -> remove -> inspect 시나리오를 mock
//! 백엔드로 검증합니다.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use drydock_core::component::Component;
use drydock_core::error::ContainerError;
use drydock_container_ops::{
    BackendFailure, ContainerBackend, ContainerManager, ContainerOpsConfig, ContainerSpec,
    ContainerState, RuntimeStatus,
};

// Mock container backend for integration tests
mod mock {
    use super::*;

    #[derive(Default)]
    pub struct InMemoryRuntime {
        pub containers: Mutex<HashMap<String, RuntimeStatus>>,
        pub next_id: AtomicU32,
        pub unavailable_budget: AtomicU32,
    }

    impl InMemoryRuntime {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn make_unavailable_for(&self, calls: u32) {
            self.unavailable_budget.store(calls, Ordering::SeqCst);
        }

        pub fn exit_on_its_own(&self, id: &str, code: i64) {
            self.containers
                .lock()
                .unwrap()
                .insert(id.to_owned(), RuntimeStatus::exited(code));
        }

        fn gate(&self) -> Result<(), BackendFailure> {
            if self
                .unavailable_budget
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(BackendFailure::Unavailable("runtime offline".to_owned()));
            }
            Ok(())
        }
    }

    impl ContainerBackend for &'static InMemoryRuntime {
        async fn create(&self, _spec: &ContainerSpec) -> Result<String, BackendFailure> {
            self.gate()?;
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            let id = format!("{n:012x}");
            self.containers
                .lock()
                .unwrap()
                .insert(id.clone(), RuntimeStatus::new(ContainerState::Created));
            Ok(id)
        }

        async fn start(&self, id: &str) -> Result<(), BackendFailure> {
            self.gate()?;
            let mut containers = self.containers.lock().unwrap();
            let status = containers
                .get_mut(id)
                .ok_or_else(|| BackendFailure::NotFound(id.to_owned()))?;
            status.state = ContainerState::Running;
            Ok(())
        }

        async fn stop(&self, id: &str) -> Result<(), BackendFailure> {
            self.gate()?;
            let mut containers = self.containers.lock().unwrap();
            let status = containers
                .get_mut(id)
                .ok_or_else(|| BackendFailure::NotFound(id.to_owned()))?;
            status.state = ContainerState::Stopped;
            status.exit_code = Some(0);
            Ok(())
        }

        async fn remove(&self, id: &str) -> Result<(), BackendFailure> {
            self.gate()?;
            self.containers
                .lock()
                .unwrap()
                .remove(id)
                .map(|_| ())
                .ok_or_else(|| BackendFailure::NotFound(id.to_owned()))
        }

        async fn inspect(&self, id: &str) -> Result<RuntimeStatus, BackendFailure> {
            self.gate()?;
            self.containers
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| BackendFailure::NotFound(id.to_owned()))
        }

        async fn ping(&self) -> Result<(), BackendFailure> {
            Ok(())
        }
    }
}

use mock::InMemoryRuntime;

fn leak(runtime: InMemoryRuntime) -> &'static InMemoryRuntime {
    Box::leak(Box::new(runtime))
}

fn manager(runtime: &'static InMemoryRuntime) -> ContainerManager<&'static InMemoryRuntime> {
    let config = ContainerOpsConfig {
        retry_max_attempts: 3,
        retry_backoff_base_ms: 1,
        action_timeout_secs: 5,
        ..Default::default()
    };
    ContainerManager::new(config, runtime).unwrap()
}

#[tokio::test]
async fn full_lifecycle_flow() {
    let runtime = leak(InMemoryRuntime::new());
    let mgr = manager(runtime);

    let spec = ContainerSpec::new("ci-build-01", "alpine:3.20")
        .command(vec!["sh".to_owned(), "-c".to_owned(), "make test".to_owned()])
        .env("CI", "true")
        .cpu("500m")
        .memory("256Mi");

    let id = mgr.create(&spec).await.unwrap();
    assert_eq!(mgr.inspect(&id).await.unwrap().observed, ContainerState::Created);

    assert_eq!(mgr.start(&id).await.unwrap(), ContainerState::Running);
    assert_eq!(mgr.inspect(&id).await.unwrap().observed, ContainerState::Running);

    assert_eq!(mgr.stop(&id).await.unwrap(), ContainerState::Stopped);
    mgr.remove(&id).await.unwrap();

    let err = mgr.inspect(&id).await.unwrap_err();
    assert!(matches!(err, ContainerError::NotFound(_)));
}

#[tokio::test]
async fn start_is_idempotent_across_calls() {
    let runtime = leak(InMemoryRuntime::new());
    let mgr = manager(runtime);

    let id = mgr.create(&ContainerSpec::new("agent", "alpine:3.20")).await.unwrap();
    assert_eq!(mgr.start(&id).await.unwrap(), ContainerState::Running);
    assert_eq!(mgr.start(&id).await.unwrap(), ContainerState::Running);
    assert_eq!(mgr.inspect(&id).await.unwrap().observed, ContainerState::Running);
}

#[tokio::test]
async fn drift_from_self_exit_is_reconciled() {
    let runtime = leak(InMemoryRuntime::new());
    let mgr = manager(runtime);

    let id = mgr.create(&ContainerSpec::new("flaky", "alpine:3.20")).await.unwrap();
    mgr.start(&id).await.unwrap();

    // 프로세스가 스스로 죽음 — 매니저는 모르는 상태
    runtime.exit_on_its_own(&id, 137);

    let container = mgr.inspect(&id).await.unwrap();
    assert_eq!(container.observed, ContainerState::Stopped);
}

#[tokio::test]
async fn backend_outage_is_retried_until_recovery() {
    let runtime = leak(InMemoryRuntime::new());
    let mgr = manager(runtime);

    runtime.make_unavailable_for(2);
    let id = mgr.create(&ContainerSpec::new("resilient", "alpine:3.20")).await.unwrap();
    assert_eq!(mgr.inspect(&id).await.unwrap().observed, ContainerState::Created);
}

#[tokio::test]
async fn prolonged_outage_surfaces_unavailable_with_attempts() {
    let runtime = leak(InMemoryRuntime::new());
    let mgr = manager(runtime);

    runtime.make_unavailable_for(100);
    let err = mgr
        .create(&ContainerSpec::new("doomed", "alpine:3.20"))
        .await
        .unwrap_err();
    match err {
        ContainerError::BackendUnavailable { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected backend unavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_lifecycle_on_distinct_containers() {
    let runtime = leak(InMemoryRuntime::new());
    let mgr = std::sync::Arc::new(manager(runtime));

    let mut handles = Vec::new();
    for i in 0..8 {
        let mgr = std::sync::Arc::clone(&mgr);
        handles.push(tokio::spawn(async move {
            let spec = ContainerSpec::new(format!("worker-{i}"), "alpine:3.20");
            let id = mgr.create(&spec).await.unwrap();
            mgr.start(&id).await.unwrap();
            mgr.stop(&id).await.unwrap();
            mgr.remove(&id).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(mgr.managed_count(), 0);
    assert!(runtime.containers.lock().unwrap().is_empty());
}

#[tokio::test]
async fn purge_prefix_cleans_only_matching() {
    let runtime = leak(InMemoryRuntime::new());
    let mgr = manager(runtime);

    for name in ["test-db", "test-cache", "monitoring"] {
        let id = mgr.create(&ContainerSpec::new(name, "alpine:3.20")).await.unwrap();
        mgr.start(&id).await.unwrap();
    }

    let purged = mgr.purge_prefix("test-").await.unwrap();
    assert_eq!(purged, 2);
    assert_eq!(mgr.managed_count(), 1);
    assert_eq!(runtime.containers.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn health_check_is_healthy_with_reachable_backend() {
    let runtime = leak(InMemoryRuntime::new());
    let mgr = manager(runtime);
    assert!(Component::health_check(&mgr).await.is_healthy());
}
