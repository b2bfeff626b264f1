//! 프로덕션 스토어 백엔드 — PostgreSQL(sqlx) + Redis
//!
//! [`NativeStoreBackend`]는 관계형 종류에는 sqlx 단일 커넥션을,
//! 캐시 종류에는 redis 비동기 커넥션을 세션으로 사용합니다.
//! 풀링은 이 크레이트의 [`ConnectionPool`](crate::pool::ConnectionPool)이
//! 담당하므로 백엔드는 세션 하나를 연결하는 일만 합니다.

use redis::AsyncCommands as _;
use sqlx::{Column as _, Connection as _, Row as _};
use tracing::debug;

use drydock_core::config::{DatabaseConfig, RedisConfig};
use drydock_core::error::StoreError;

use crate::backend::{Row, StoreBackend, StoreKind, StoreOperation, StoreValue};

/// sqlx + redis 기반 프로덕션 백엔드
#[derive(Debug, Clone)]
pub struct NativeStoreBackend {
    database_url: String,
    redis_url: String,
}

/// 프로덕션 세션 — 종류별 실제 커넥션
pub enum NativeSession {
    /// PostgreSQL 단일 커넥션
    Postgres(Box<sqlx::PgConnection>),
    /// Redis 비동기 커넥션
    Redis(redis::aio::ConnectionManager),
}

impl NativeStoreBackend {
    /// 설정 스냅샷의 database/redis 섹션에서 백엔드를 생성합니다.
    pub fn from_config(database: &DatabaseConfig, redis: &RedisConfig) -> Self {
        Self {
            database_url: database.url(),
            redis_url: redis.url(),
        }
    }

    /// 연결 URL을 직접 지정하여 백엔드를 생성합니다.
    pub fn new(database_url: impl Into<String>, redis_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            redis_url: redis_url.into(),
        }
    }
}

/// sqlx 에러를 transient/permanent로 분류합니다.
fn classify_sqlx(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Protocol(_) => StoreError::Transient {
            reason: e.to_string(),
            attempts: 1,
        },
        sqlx::Error::Database(db_err) => StoreError::Permanent {
            reason: db_err.to_string(),
        },
        other => StoreError::Permanent {
            reason: other.to_string(),
        },
    }
}

/// redis 에러를 transient/permanent로 분류합니다.
fn classify_redis(e: redis::RedisError) -> StoreError {
    if e.is_timeout() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_io_error() {
        StoreError::Transient {
            reason: e.to_string(),
            attempts: 1,
        }
    } else {
        StoreError::Permanent {
            reason: e.to_string(),
        }
    }
}

impl StoreBackend for NativeStoreBackend {
    type Session = NativeSession;

    async fn connect(&self, kind: StoreKind) -> Result<NativeSession, StoreError> {
        match kind {
            StoreKind::Database => {
                let conn = sqlx::PgConnection::connect(&self.database_url)
                    .await
                    .map_err(classify_sqlx)?;
                debug!(kind = kind.as_str(), "postgres session established");
                Ok(NativeSession::Postgres(Box::new(conn)))
            }
            StoreKind::Cache => {
                let client = redis::Client::open(self.redis_url.as_str())
                    .map_err(classify_redis)?;
                let conn = redis::aio::ConnectionManager::new(client)
                    .await
                    .map_err(classify_redis)?;
                debug!(kind = kind.as_str(), "redis session established");
                Ok(NativeSession::Redis(conn))
            }
        }
    }

    async fn execute(
        &self,
        session: &mut NativeSession,
        operation: &StoreOperation,
    ) -> Result<StoreValue, StoreError> {
        match (session, operation) {
            (NativeSession::Postgres(conn), StoreOperation::Query { statement, params }) => {
                let mut query = sqlx::query(statement);
                for param in params {
                    query = query.bind(param);
                }
                let rows = query.fetch_all(conn.as_mut()).await.map_err(classify_sqlx)?;

                let mut out = Vec::with_capacity(rows.len());
                for row in rows {
                    let mut cols: Row = Vec::with_capacity(row.columns().len());
                    for col in row.columns() {
                        // 텍스트로 투영되지 않는 컬럼은 None으로 강등
                        let value: Option<String> =
                            row.try_get::<Option<String>, _>(col.ordinal()).unwrap_or(None);
                        cols.push((col.name().to_owned(), value));
                    }
                    out.push(cols);
                }
                Ok(StoreValue::Rows(out))
            }
            (NativeSession::Postgres(conn), StoreOperation::Mutate { statement, params }) => {
                let mut query = sqlx::query(statement);
                for param in params {
                    query = query.bind(param);
                }
                let result = query.execute(conn.as_mut()).await.map_err(classify_sqlx)?;
                Ok(StoreValue::Affected(result.rows_affected()))
            }
            (NativeSession::Redis(conn), StoreOperation::CacheGet { key }) => {
                let value: Option<String> = conn.get(key).await.map_err(classify_redis)?;
                Ok(StoreValue::Value(value))
            }
            (NativeSession::Redis(conn), StoreOperation::CacheSet {
                key,
                value,
                ttl_secs,
            }) => {
                match ttl_secs {
                    Some(ttl) => {
                        conn.set_ex::<_, _, ()>(key, value, *ttl)
                            .await
                            .map_err(classify_redis)?;
                    }
                    None => {
                        conn.set::<_, _, ()>(key, value)
                            .await
                            .map_err(classify_redis)?;
                    }
                }
                Ok(StoreValue::Unit)
            }
            (NativeSession::Redis(conn), StoreOperation::CacheDelete { key }) => {
                let removed: u64 = conn.del(key).await.map_err(classify_redis)?;
                Ok(StoreValue::Affected(removed))
            }
            (session, operation) => {
                let session_kind = match session {
                    NativeSession::Postgres(_) => StoreKind::Database,
                    NativeSession::Redis(_) => StoreKind::Cache,
                };
                Err(StoreError::Permanent {
                    reason: format!(
                        "operation targets {} but session is {}",
                        operation.kind(),
                        session_kind
                    ),
                })
            }
        }
    }

    async fn ping(&self, session: &mut NativeSession) -> Result<(), StoreError> {
        match session {
            NativeSession::Postgres(conn) => conn.ping().await.map_err(classify_sqlx),
            NativeSession::Redis(conn) => {
                let _: String = redis::cmd("PING")
                    .query_async(conn)
                    .await
                    .map_err(classify_redis)?;
                Ok(())
            }
        }
    }

    async fn close(&self, session: NativeSession) {
        match session {
            NativeSession::Postgres(conn) => {
                if let Err(e) = conn.close().await {
                    debug!(error = %e, "postgres session close failed");
                }
            }
            // redis 커넥션은 드롭으로 정리됨
            NativeSession::Redis(_) => {}
        }
    }
}
