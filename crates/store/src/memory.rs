//! 인메모리 스토어 백엔드 — 결정적 테스트/개발용
//!
//! [`MemoryStoreBackend`]는 외부 프로세스 없이 [`StoreBackend`] 계약을
//! 완전히 구현합니다. 캐시 작업은 실제 키-값 의미론을 따르고, 관계형
//! 작업은 사전에 등록한 행(fixture)을 반환합니다.
//!
//! 테스트 지원:
//! - 실패 주입: 다음 N번의 연결/실행/핑을 transient 또는 permanent로
//!   실패시킬 수 있습니다.
//! - 세션 계수: 현재/최대 동시 세션 수를 추적하여 풀 상한 불변식을
//!   검증할 수 있습니다.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use drydock_core::error::StoreError;

use crate::backend::{Row, StoreBackend, StoreKind, StoreOperation, StoreValue};

/// 주입할 실패의 분류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    /// 재시도 대상 (네트워크 리셋/타임아웃에 대응)
    Transient,
    /// 즉시 표면화 (제약 조건 위반/잘못된 문장에 대응)
    Permanent,
}

impl InjectedFailure {
    fn into_error(self) -> StoreError {
        match self {
            InjectedFailure::Transient => StoreError::Transient {
                reason: "injected transient failure".to_owned(),
                attempts: 1,
            },
            InjectedFailure::Permanent => StoreError::Permanent {
                reason: "injected permanent failure".to_owned(),
            },
        }
    }
}

#[derive(Default)]
struct MemoryState {
    cache: HashMap<String, String>,
    scripted_rows: Vec<(String, Vec<Row>)>,
    fail_connects: u32,
    fail_executes: VecDeque<InjectedFailure>,
    fail_pings: u32,
    mutations: u64,
    total_connects: u64,
}

/// 결정적 인메모리 백엔드
///
/// `Clone`은 같은 상태를 공유하므로, 테스트에서 백엔드 핸들을 들고
/// 계수기를 조회할 수 있습니다.
#[derive(Clone, Default)]
pub struct MemoryStoreBackend {
    state: Arc<Mutex<MemoryState>>,
    open_sessions: Arc<AtomicUsize>,
    peak_sessions: Arc<AtomicUsize>,
}

/// 인메모리 세션 — 드롭 시 세션 계수가 줄어듭니다.
pub struct MemorySession {
    kind: StoreKind,
    open: Arc<AtomicUsize>,
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MemoryStoreBackend {
    /// 빈 백엔드를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 캐시 엔트리를 미리 채웁니다.
    pub fn with_cache_entry(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.state
            .lock()
            .expect("memory backend lock poisoned")
            .cache
            .insert(key.into(), value.into());
        self
    }

    /// 특정 SQL 접두어에 대한 질의 결과를 등록합니다.
    pub fn with_rows(self, statement_prefix: impl Into<String>, rows: Vec<Row>) -> Self {
        self.state
            .lock()
            .expect("memory backend lock poisoned")
            .scripted_rows
            .push((statement_prefix.into(), rows));
        self
    }

    /// 다음 `n`번의 연결 시도를 transient로 실패시킵니다.
    pub fn with_failing_connects(self, n: u32) -> Self {
        self.state
            .lock()
            .expect("memory backend lock poisoned")
            .fail_connects = n;
        self
    }

    /// 다음 실행을 지정한 분류로 실패시킵니다 (호출 순서대로 소비).
    pub fn fail_next_execute(&self, failure: InjectedFailure) {
        self.state
            .lock()
            .expect("memory backend lock poisoned")
            .fail_executes
            .push_back(failure);
    }

    /// 다음 `n`번의 실행을 transient로 실패시킵니다.
    pub fn fail_next_executes(&self, n: u32, failure: InjectedFailure) {
        let mut state = self.state.lock().expect("memory backend lock poisoned");
        for _ in 0..n {
            state.fail_executes.push_back(failure);
        }
    }

    /// 다음 `n`번의 핑을 실패시킵니다.
    pub fn fail_next_pings(&self, n: u32) {
        self.state
            .lock()
            .expect("memory backend lock poisoned")
            .fail_pings = n;
    }

    /// 현재 열린 세션 수
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }

    /// 동시에 열렸던 최대 세션 수
    pub fn peak_sessions(&self) -> usize {
        self.peak_sessions.load(Ordering::SeqCst)
    }

    /// 지금까지 수립된 연결 수
    pub fn total_connects(&self) -> u64 {
        self.state
            .lock()
            .expect("memory backend lock poisoned")
            .total_connects
    }

    /// 수행된 쓰기 작업 수
    pub fn mutations(&self) -> u64 {
        self.state
            .lock()
            .expect("memory backend lock poisoned")
            .mutations
    }

    /// 캐시 값을 직접 조회합니다 (테스트 단언용).
    pub fn cache_value(&self, key: &str) -> Option<String> {
        self.state
            .lock()
            .expect("memory backend lock poisoned")
            .cache
            .get(key)
            .cloned()
    }
}

impl StoreBackend for MemoryStoreBackend {
    type Session = MemorySession;

    async fn connect(&self, kind: StoreKind) -> Result<MemorySession, StoreError> {
        {
            let mut state = self.state.lock().expect("memory backend lock poisoned");
            if state.fail_connects > 0 {
                state.fail_connects -= 1;
                return Err(StoreError::Transient {
                    reason: "injected connect failure".to_owned(),
                    attempts: 1,
                });
            }
            state.total_connects += 1;
        }
        let open = self.open_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_sessions.fetch_max(open, Ordering::SeqCst);
        Ok(MemorySession {
            kind,
            open: Arc::clone(&self.open_sessions),
        })
    }

    async fn execute(
        &self,
        session: &mut MemorySession,
        operation: &StoreOperation,
    ) -> Result<StoreValue, StoreError> {
        if operation.kind() != session.kind {
            return Err(StoreError::Permanent {
                reason: format!(
                    "operation targets {} but session is {}",
                    operation.kind(),
                    session.kind
                ),
            });
        }

        let mut state = self.state.lock().expect("memory backend lock poisoned");
        if let Some(failure) = state.fail_executes.pop_front() {
            return Err(failure.into_error());
        }

        match operation {
            StoreOperation::Query { statement, .. } => {
                let rows = state
                    .scripted_rows
                    .iter()
                    .find(|(prefix, _)| statement.starts_with(prefix.as_str()))
                    .map(|(_, rows)| rows.clone())
                    .unwrap_or_default();
                Ok(StoreValue::Rows(rows))
            }
            StoreOperation::Mutate { .. } => {
                state.mutations += 1;
                Ok(StoreValue::Affected(1))
            }
            StoreOperation::CacheGet { key } => Ok(StoreValue::Value(state.cache.get(key).cloned())),
            StoreOperation::CacheSet { key, value, .. } => {
                state.cache.insert(key.clone(), value.clone());
                Ok(StoreValue::Unit)
            }
            StoreOperation::CacheDelete { key } => {
                let removed = state.cache.remove(key).is_some();
                Ok(StoreValue::Affected(u64::from(removed)))
            }
        }
    }

    async fn ping(&self, _session: &mut MemorySession) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("memory backend lock poisoned");
        if state.fail_pings > 0 {
            state.fail_pings -= 1;
            return Err(StoreError::Transient {
                reason: "injected ping failure".to_owned(),
                attempts: 1,
            });
        }
        Ok(())
    }

    async fn close(&self, session: MemorySession) {
        drop(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cache_set_get_delete_roundtrip() {
        let backend = MemoryStoreBackend::new();
        let mut session = backend.connect(StoreKind::Cache).await.unwrap();

        let set = StoreOperation::CacheSet {
            key: "build:42".to_owned(),
            value: "green".to_owned(),
            ttl_secs: Some(30),
        };
        assert_eq!(
            backend.execute(&mut session, &set).await.unwrap(),
            StoreValue::Unit
        );

        let get = StoreOperation::CacheGet {
            key: "build:42".to_owned(),
        };
        assert_eq!(
            backend.execute(&mut session, &get).await.unwrap(),
            StoreValue::Value(Some("green".to_owned()))
        );

        let del = StoreOperation::CacheDelete {
            key: "build:42".to_owned(),
        };
        assert_eq!(
            backend.execute(&mut session, &del).await.unwrap(),
            StoreValue::Affected(1)
        );
        assert_eq!(
            backend.execute(&mut session, &get).await.unwrap(),
            StoreValue::Value(None)
        );
    }

    #[tokio::test]
    async fn cache_delete_missing_key_affects_zero() {
        let backend = MemoryStoreBackend::new();
        let mut session = backend.connect(StoreKind::Cache).await.unwrap();
        let del = StoreOperation::CacheDelete {
            key: "missing".to_owned(),
        };
        assert_eq!(
            backend.execute(&mut session, &del).await.unwrap(),
            StoreValue::Affected(0)
        );
    }

    #[tokio::test]
    async fn scripted_rows_match_by_prefix() {
        let row: Row = vec![("id".to_owned(), Some("1".to_owned()))];
        let backend =
            MemoryStoreBackend::new().with_rows("SELECT id FROM builds", vec![row.clone()]);
        let mut session = backend.connect(StoreKind::Database).await.unwrap();

        let hit = StoreOperation::Query {
            statement: "SELECT id FROM builds WHERE status = $1".to_owned(),
            params: vec!["green".to_owned()],
        };
        assert_eq!(
            backend.execute(&mut session, &hit).await.unwrap(),
            StoreValue::Rows(vec![row])
        );

        let miss = StoreOperation::Query {
            statement: "SELECT id FROM jobs".to_owned(),
            params: vec![],
        };
        assert_eq!(
            backend.execute(&mut session, &miss).await.unwrap(),
            StoreValue::Rows(vec![])
        );
    }

    #[tokio::test]
    async fn mutate_counts_and_affects_one() {
        let backend = MemoryStoreBackend::new();
        let mut session = backend.connect(StoreKind::Database).await.unwrap();
        let op = StoreOperation::Mutate {
            statement: "INSERT INTO builds VALUES ($1)".to_owned(),
            params: vec!["42".to_owned()],
        };
        assert_eq!(
            backend.execute(&mut session, &op).await.unwrap(),
            StoreValue::Affected(1)
        );
        assert_eq!(backend.mutations(), 1);
    }

    #[tokio::test]
    async fn kind_mismatch_is_permanent() {
        let backend = MemoryStoreBackend::new();
        let mut session = backend.connect(StoreKind::Database).await.unwrap();
        let op = StoreOperation::CacheGet {
            key: "k".to_owned(),
        };
        let err = backend.execute(&mut session, &op).await.unwrap_err();
        assert!(matches!(err, StoreError::Permanent { .. }));
    }

    #[tokio::test]
    async fn injected_execute_failures_are_consumed_in_order() {
        let backend = MemoryStoreBackend::new();
        backend.fail_next_execute(InjectedFailure::Transient);
        backend.fail_next_execute(InjectedFailure::Permanent);
        let mut session = backend.connect(StoreKind::Cache).await.unwrap();
        let op = StoreOperation::CacheGet {
            key: "k".to_owned(),
        };

        let first = backend.execute(&mut session, &op).await.unwrap_err();
        assert!(first.is_transient());
        let second = backend.execute(&mut session, &op).await.unwrap_err();
        assert!(matches!(second, StoreError::Permanent { .. }));
        // 계획 소진 후에는 정상 동작
        assert!(backend.execute(&mut session, &op).await.is_ok());
    }

    #[tokio::test]
    async fn session_counting_tracks_peak() {
        let backend = MemoryStoreBackend::new();
        let a = backend.connect(StoreKind::Database).await.unwrap();
        let b = backend.connect(StoreKind::Database).await.unwrap();
        assert_eq!(backend.open_sessions(), 2);
        drop(a);
        assert_eq!(backend.open_sessions(), 1);
        let c = backend.connect(StoreKind::Cache).await.unwrap();
        assert_eq!(backend.open_sessions(), 2);
        assert_eq!(backend.peak_sessions(), 2);
        drop(b);
        drop(c);
        assert_eq!(backend.open_sessions(), 0);
        assert_eq!(backend.total_connects(), 3);
    }

    #[tokio::test]
    async fn failing_connects_then_recovers() {
        let backend = MemoryStoreBackend::new().with_failing_connects(2);
        assert!(backend.connect(StoreKind::Database).await.is_err());
        assert!(backend.connect(StoreKind::Database).await.is_err());
        assert!(backend.connect(StoreKind::Database).await.is_ok());
    }

    #[tokio::test]
    async fn ping_failure_injection() {
        let backend = MemoryStoreBackend::new();
        let mut session = backend.connect(StoreKind::Cache).await.unwrap();
        backend.fail_next_pings(1);
        assert!(backend.ping(&mut session).await.is_err());
        assert!(backend.ping(&mut session).await.is_ok());
    }

    #[tokio::test]
    async fn clones_share_state() {
        let backend = MemoryStoreBackend::new();
        let clone = backend.clone();
        let mut session = clone.connect(StoreKind::Cache).await.unwrap();
        let set = StoreOperation::CacheSet {
            key: "shared".to_owned(),
            value: "yes".to_owned(),
            ttl_secs: None,
        };
        clone.execute(&mut session, &set).await.unwrap();
        assert_eq!(backend.cache_value("shared").as_deref(), Some("yes"));
    }
}
