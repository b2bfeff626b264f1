//! 커넥션 매니저 — 풀 소유, 작업 실행, 헬스체크
//!
//! [`ConnectionManager`]는 관계형/캐시 풀을 하나씩 소유하고, 작업
//! 실행 시 실패를 분류하여 transient만 공유 재시도 정책으로
//! 재시도합니다. permanent 실패는 첫 발생 시 그대로 표면화됩니다.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, warn};

use drydock_core::component::{Component, HealthStatus};
use drydock_core::error::StoreError;
use drydock_core::metrics::{LABEL_KIND, STORE_EXECUTE_RETRIES_TOTAL};
use drydock_core::retry::RetryPolicy;

use crate::backend::{StoreBackend, StoreKind, StoreOperation, StoreValue};
use crate::config::StoreConfig;
use crate::pool::{ConnectionPool, PooledConnection};

/// 데이터베이스/캐시 커넥션 매니저
///
/// 하나의 설정 스냅샷에서 생성되며 전역 상태를 갖지 않습니다.
/// 독립적인 스냅샷으로 만든 매니저들은 서로 간섭하지 않습니다.
pub struct ConnectionManager<B: StoreBackend> {
    backend: Arc<B>,
    database: ConnectionPool<B>,
    cache: ConnectionPool<B>,
    retry: RetryPolicy,
    operation_timeout: Duration,
}

impl<B: StoreBackend> ConnectionManager<B> {
    /// 설정을 검증하고 매니저를 생성합니다.
    ///
    /// 커넥션은 미리 연결하지 않습니다 — 첫 `acquire`에서 연결됩니다.
    pub fn new(config: StoreConfig, backend: B) -> Result<Self, StoreError> {
        config.validate()?;
        let backend = Arc::new(backend);
        let database = ConnectionPool::new(
            StoreKind::Database,
            Arc::clone(&backend),
            config.database_pool_size,
            config.acquire_timeout(),
        );
        let cache = ConnectionPool::new(
            StoreKind::Cache,
            Arc::clone(&backend),
            config.cache_pool_size,
            config.acquire_timeout(),
        );
        Ok(Self {
            backend,
            database,
            cache,
            retry: config.retry_policy(),
            operation_timeout: config.operation_timeout(),
        })
    }

    fn pool(&self, kind: StoreKind) -> &ConnectionPool<B> {
        match kind {
            StoreKind::Database => &self.database,
            StoreKind::Cache => &self.cache,
        }
    }

    /// 지정한 종류의 풀에서 커넥션을 빌립니다.
    ///
    /// 풀이 가득 차면 설정된 획득 타임아웃까지 대기한 뒤
    /// [`StoreError::PoolExhausted`]를 반환합니다.
    pub async fn acquire(&self, kind: StoreKind) -> Result<PooledConnection<B>, StoreError> {
        self.pool(kind).acquire().await
    }

    /// 커넥션 위에서 데이터 작업을 실행합니다.
    ///
    /// transient 실패(네트워크 리셋, 타임아웃)는 지수 백오프 + 지터로
    /// 설정된 예산까지 재시도하고, permanent 실패(제약 조건 위반,
    /// 잘못된 문장)는 즉시 표면화합니다. 시도당 타임아웃이 적용되므로
    /// 전체 소요 시간은 `시도 횟수 x 시도당 타임아웃 + 누적 백오프`로
    /// 유계입니다.
    ///
    /// transient 예산을 소진하면 커넥션은 broken으로 표시되어 반환 시
    /// 폐기됩니다.
    pub async fn execute(
        &self,
        conn: &mut PooledConnection<B>,
        operation: &StoreOperation,
    ) -> Result<StoreValue, StoreError> {
        let mut last_error: Option<StoreError> = None;
        let max_attempts = self.retry.max_attempts();

        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let backoff = self.retry.delay_for(attempt - 1);
                counter!(STORE_EXECUTE_RETRIES_TOTAL, LABEL_KIND => conn.kind().as_str())
                    .increment(1);
                debug!(
                    kind = conn.kind().as_str(),
                    attempt = attempt,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    "retrying store operation"
                );
                tokio::time::sleep(backoff).await;
            }

            let connection = conn.connection_mut();
            connection.touch();
            match tokio::time::timeout(
                self.operation_timeout,
                self.backend.execute(connection.session_mut(), operation),
            )
            .await
            {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if e.is_transient() => {
                    last_error = Some(e);
                }
                // permanent — 재시도 없이 즉시 표면화
                Ok(Err(e)) => return Err(e),
                Err(_elapsed) => {
                    last_error = Some(StoreError::Transient {
                        reason: "operation timed out".to_owned(),
                        attempts: attempt,
                    });
                }
            }
        }

        // transient 예산 소진 — 커넥션을 오염 처리하고 시도 횟수를 실어 반환
        conn.mark_broken();
        Err(match last_error {
            Some(StoreError::Transient { reason, .. }) => StoreError::Transient {
                reason,
                attempts: max_attempts,
            },
            Some(other) => other,
            None => StoreError::Transient {
                reason: "unknown transient failure".to_owned(),
                attempts: max_attempts,
            },
        })
    }

    /// 커넥션에 대해 경량 생존 확인을 수행합니다.
    ///
    /// 실패 시 커넥션을 broken으로 표시합니다 — 반환되면 폐기되고
    /// 다음 `acquire`가 새 커넥션으로 교체합니다.
    pub async fn health_check(&self, conn: &mut PooledConnection<B>) -> Result<(), StoreError> {
        let result = self.backend.ping(conn.connection_mut().session_mut()).await;
        if let Err(ref e) = result {
            warn!(
                kind = conn.kind().as_str(),
                id = %conn.id(),
                error = %e,
                "health check failed, marking connection broken"
            );
            conn.mark_broken();
        }
        result
    }

    /// idle 커넥션을 모두 닫습니다 (정상 종료 경로).
    pub async fn shutdown(&self) {
        self.database.close_idle().await;
        self.cache.close_idle().await;
    }

    /// 현재 열린 커넥션 수 (빌려간 것 포함)
    pub fn open_connections(&self, kind: StoreKind) -> usize {
        self.pool(kind).open_connections()
    }

    /// 현재 idle 커넥션 수
    pub fn idle_connections(&self, kind: StoreKind) -> usize {
        self.pool(kind).idle_connections()
    }

    /// 풀 최대 크기
    pub fn max_pool_size(&self, kind: StoreKind) -> usize {
        self.pool(kind).max_size()
    }

    async fn probe(&self, kind: StoreKind) -> Result<(), StoreError> {
        let mut conn = self.acquire(kind).await?;
        self.health_check(&mut conn).await
    }
}

impl<B: StoreBackend> Component for ConnectionManager<B> {
    fn name(&self) -> &str {
        "store"
    }

    async fn health_check(&self) -> HealthStatus {
        if let Err(e) = self.probe(StoreKind::Database).await {
            return HealthStatus::Unhealthy(format!("database: {e}"));
        }
        match self.probe(StoreKind::Cache).await {
            Ok(()) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Degraded(format!("cache: {e}")),
        }
    }
}
