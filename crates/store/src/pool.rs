//! 커넥션 풀 — 종류별 상한이 있는 커넥션 관리
//!
//! [`ConnectionPool`]은 세마포어로 동시 커넥션 수를 `max_size` 이하로
//! 강제하고, 반환된 커넥션을 idle 큐에 보관하여 재사용합니다.
//! 호출자는 [`PooledConnection`] 가드를 통해 커넥션을 빌리며, 가드가
//! 드롭되면 커넥션은 자동으로 풀에 반환됩니다 — 작업이 중도 포기돼도
//! 슬롯이 누수되지 않습니다.
//!
//! broken 커넥션은 반환 시 폐기되고 슬롯만 해제됩니다. 교체는 지연
//! 방식입니다: 다음 `acquire`가 새 세션을 연결합니다.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use metrics::{counter, gauge};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use drydock_core::error::StoreError;
use drydock_core::metrics::{
    LABEL_KIND, STORE_ACQUIRE_TIMEOUTS_TOTAL, STORE_ACQUIRES_TOTAL, STORE_BROKEN_DISCARDED_TOTAL,
    STORE_CONNECTIONS_OPEN,
};

use crate::backend::{StoreBackend, StoreKind};
use crate::connection::{Connection, ConnectionState};

struct PoolInner<S> {
    idle: VecDeque<Connection<S>>,
    open: usize,
}

/// 종류별 커넥션 풀
///
/// 불변식: 열린 커넥션 수는 어떤 동시 실행 순서에서도 `max_size`를
/// 넘지 않습니다 (세마포어 허가 1개 = 커넥션 슬롯 1개).
pub struct ConnectionPool<B: StoreBackend> {
    kind: StoreKind,
    backend: Arc<B>,
    max_size: usize,
    acquire_timeout: Duration,
    semaphore: Arc<Semaphore>,
    inner: Arc<Mutex<PoolInner<B::Session>>>,
}

impl<B: StoreBackend> ConnectionPool<B> {
    /// 새 풀을 생성합니다. 커넥션은 미리 연결하지 않고 첫 `acquire`에서
    /// 연결합니다.
    pub fn new(kind: StoreKind, backend: Arc<B>, max_size: usize, acquire_timeout: Duration) -> Self {
        Self {
            kind,
            backend,
            max_size: max_size.max(1),
            acquire_timeout,
            semaphore: Arc::new(Semaphore::new(max_size.max(1))),
            inner: Arc::new(Mutex::new(PoolInner {
                idle: VecDeque::new(),
                open: 0,
            })),
        }
    }

    /// 풀에서 커넥션을 빌립니다.
    ///
    /// 풀이 가득 차면 획득 타임아웃까지 대기한 뒤
    /// [`StoreError::PoolExhausted`]를 반환합니다. idle 커넥션이 있으면
    /// 재사용하고, 없으면 백엔드에 새 세션을 연결합니다.
    pub async fn acquire(&self) -> Result<PooledConnection<B>, StoreError> {
        let start = Instant::now();
        let permit = match tokio::time::timeout(
            self.acquire_timeout,
            Arc::clone(&self.semaphore).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(StoreError::Closed),
            Err(_) => {
                let waited_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                counter!(STORE_ACQUIRE_TIMEOUTS_TOTAL, LABEL_KIND => self.kind.as_str())
                    .increment(1);
                warn!(
                    kind = self.kind.as_str(),
                    waited_ms = waited_ms,
                    "pool exhausted, acquire timed out"
                );
                return Err(StoreError::PoolExhausted {
                    kind: self.kind.to_string(),
                    waited_ms,
                });
            }
        };

        // idle 재사용 우선, 없으면 새로 연결
        let reused = {
            let mut inner = self.inner.lock().expect("store pool lock poisoned");
            inner.idle.pop_front()
        };

        let conn = match reused {
            Some(mut conn) => {
                conn.set_state(ConnectionState::Active);
                conn.touch();
                debug!(kind = self.kind.as_str(), id = %conn.id(), "reusing idle connection");
                conn
            }
            None => {
                // 연결 수립도 획득 타임아웃의 남은 예산 안에서 끝나야 함.
                // 실패 시 permit이 드롭되며 슬롯이 해제됨.
                let remaining = self.acquire_timeout.saturating_sub(start.elapsed());
                let session = match tokio::time::timeout(
                    remaining,
                    self.backend.connect(self.kind),
                )
                .await
                {
                    Ok(Ok(session)) => session,
                    Ok(Err(e)) => return Err(e),
                    Err(_elapsed) => {
                        return Err(StoreError::Transient {
                            reason: "backend connect timed out".to_owned(),
                            attempts: 1,
                        });
                    }
                };
                let conn = Connection::new(self.kind, session);
                let open = {
                    let mut inner = self.inner.lock().expect("store pool lock poisoned");
                    inner.open += 1;
                    inner.open
                };
                gauge!(STORE_CONNECTIONS_OPEN, LABEL_KIND => self.kind.as_str()).set(open as f64);
                debug!(kind = self.kind.as_str(), id = %conn.id(), open = open, "opened new connection");
                conn
            }
        };

        counter!(STORE_ACQUIRES_TOTAL, LABEL_KIND => self.kind.as_str()).increment(1);
        Ok(PooledConnection {
            conn: Some(conn),
            kind: self.kind,
            inner: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    /// idle 커넥션을 모두 닫습니다 (정상 종료 경로).
    ///
    /// 빌려간 커넥션은 건드리지 않으며, 반환 시 평소처럼 idle 큐로
    /// 돌아갑니다.
    pub async fn close_idle(&self) {
        let drained: Vec<Connection<B::Session>> = {
            let mut inner = self.inner.lock().expect("store pool lock poisoned");
            let drained: Vec<_> = inner.idle.drain(..).collect();
            inner.open = inner.open.saturating_sub(drained.len());
            drained
        };
        let closed = drained.len();
        for conn in drained {
            self.backend.close(conn.into_session()).await;
        }
        let open = self.open_connections();
        gauge!(STORE_CONNECTIONS_OPEN, LABEL_KIND => self.kind.as_str()).set(open as f64);
        if closed > 0 {
            debug!(kind = self.kind.as_str(), closed = closed, "closed idle connections");
        }
    }

    /// 스토어 종류
    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    /// 풀 최대 크기
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// 현재 열린 커넥션 수 (빌려간 것 포함)
    pub fn open_connections(&self) -> usize {
        self.inner.lock().expect("store pool lock poisoned").open
    }

    /// 현재 idle 커넥션 수
    pub fn idle_connections(&self) -> usize {
        self.inner.lock().expect("store pool lock poisoned").idle.len()
    }
}

/// 빌린 커넥션에 대한 RAII 가드
///
/// 드롭 시 커넥션을 풀에 반환합니다. broken 상태의 커넥션은 폐기되고
/// 슬롯만 해제됩니다. 가드가 살아 있는 동안 커넥션에 대한 접근은
/// 배타적이므로, 헬스체크와 반환이 같은 커넥션에서 겹칠 수 없습니다.
pub struct PooledConnection<B: StoreBackend> {
    conn: Option<Connection<B::Session>>,
    kind: StoreKind,
    inner: Arc<Mutex<PoolInner<B::Session>>>,
    _permit: OwnedSemaphorePermit,
}

impl<B: StoreBackend> PooledConnection<B> {
    /// 커넥션 식별자
    pub fn id(&self) -> uuid::Uuid {
        self.conn.as_ref().expect("connection already returned").id()
    }

    /// 스토어 종류
    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    /// 현재 커넥션 상태
    pub fn state(&self) -> ConnectionState {
        self.conn
            .as_ref()
            .expect("connection already returned")
            .state()
    }

    /// 커넥션을 broken으로 표시합니다. 반환 시 폐기됩니다.
    pub fn mark_broken(&mut self) {
        if let Some(conn) = self.conn.as_mut() {
            conn.mark_broken();
        }
    }

    /// 커넥션을 풀에 반환합니다 (드롭과 동일).
    pub fn release(self) {
        drop(self);
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection<B::Session> {
        self.conn.as_mut().expect("connection already returned")
    }
}

impl<B: StoreBackend> Drop for PooledConnection<B> {
    fn drop(&mut self) {
        let Some(mut conn) = self.conn.take() else {
            return;
        };
        let mut inner = self.inner.lock().expect("store pool lock poisoned");
        match conn.state() {
            ConnectionState::Broken | ConnectionState::Closed => {
                inner.open = inner.open.saturating_sub(1);
                let open = inner.open;
                drop(inner);
                counter!(STORE_BROKEN_DISCARDED_TOTAL, LABEL_KIND => self.kind.as_str())
                    .increment(1);
                gauge!(STORE_CONNECTIONS_OPEN, LABEL_KIND => self.kind.as_str()).set(open as f64);
                warn!(kind = self.kind.as_str(), id = %conn.id(), "discarding broken connection");
                // 세션 드롭으로 자원 회수; 새 커넥션은 다음 acquire가 연결
            }
            _ => {
                conn.set_state(ConnectionState::Idle);
                conn.touch();
                inner.idle.push_back(conn);
            }
        }
    }
}
