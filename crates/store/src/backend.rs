//! 스토어 백엔드 추상화
//!
//! [`StoreBackend`] trait은 관계형 데이터베이스와 캐시에 대한 실제
//! 호출을 추상화합니다. 프로덕션 코드는 [`NativeStoreBackend`]를,
//! 테스트는 [`MemoryStoreBackend`]를 주입하며, 호출자는 어느 쪽인지
//! 알 수 없습니다.
//!
//! [`NativeStoreBackend`]: crate::native::NativeStoreBackend
//! [`MemoryStoreBackend`]: crate::memory::MemoryStoreBackend

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

use drydock_core::error::StoreError;

/// 스토어 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreKind {
    /// 관계형 데이터베이스
    Database,
    /// 키-값 캐시
    Cache,
}

impl StoreKind {
    /// 메트릭 레이블용 고정 이름을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Database => "database",
            StoreKind::Cache => "cache",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 하나의 결과 행 — (컬럼명, 텍스트 값) 쌍의 목록
pub type Row = Vec<(String, Option<String>)>;

/// 스토어에 대한 데이터 작업
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StoreOperation {
    /// 관계형 읽기
    Query {
        /// SQL 문
        statement: String,
        /// 위치 기반 파라미터
        params: Vec<String>,
    },
    /// 관계형 쓰기 (INSERT/UPDATE/DELETE)
    Mutate {
        /// SQL 문
        statement: String,
        /// 위치 기반 파라미터
        params: Vec<String>,
    },
    /// 캐시 조회
    CacheGet {
        /// 키
        key: String,
    },
    /// 캐시 저장
    CacheSet {
        /// 키
        key: String,
        /// 값
        value: String,
        /// 만료 시간 (초, 없으면 영구)
        ttl_secs: Option<u64>,
    },
    /// 캐시 삭제
    CacheDelete {
        /// 키
        key: String,
    },
}

impl StoreOperation {
    /// 이 작업이 대상으로 하는 스토어 종류를 반환합니다.
    pub fn kind(&self) -> StoreKind {
        match self {
            StoreOperation::Query { .. } | StoreOperation::Mutate { .. } => StoreKind::Database,
            StoreOperation::CacheGet { .. }
            | StoreOperation::CacheSet { .. }
            | StoreOperation::CacheDelete { .. } => StoreKind::Cache,
        }
    }

    /// 쓰기 작업 여부를 반환합니다.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            StoreOperation::Mutate { .. }
                | StoreOperation::CacheSet { .. }
                | StoreOperation::CacheDelete { .. }
        )
    }
}

/// 스토어 작업 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreValue {
    /// 질의 결과 행
    Rows(Vec<Row>),
    /// 영향받은 행/키 수
    Affected(u64),
    /// 캐시 값 (없으면 `None`)
    Value(Option<String>),
    /// 결과 없음
    Unit,
}

/// 스토어 백엔드 능력 계약
///
/// 모든 데이터베이스/캐시 호출은 이 trait을 통해 이루어집니다.
/// 세션 하나가 커넥션 하나에 대응하며, 풀이 세션의 소유권을
/// 관리합니다.
///
/// # 에러 분류
///
/// 구현체는 실패를 [`StoreError::Transient`] (네트워크 리셋,
/// 타임아웃 — 재시도 대상)와 [`StoreError::Permanent`] (제약 조건
/// 위반, 잘못된 문장 — 즉시 표면화)로 분류해야 합니다.
pub trait StoreBackend: Send + Sync + 'static {
    /// 백엔드별 커넥션 세션 타입
    type Session: Send + 'static;

    /// 지정한 종류의 스토어에 새 세션을 연결합니다.
    fn connect(
        &self,
        kind: StoreKind,
    ) -> impl Future<Output = Result<Self::Session, StoreError>> + Send;

    /// 세션 위에서 데이터 작업을 실행합니다.
    fn execute(
        &self,
        session: &mut Self::Session,
        operation: &StoreOperation,
    ) -> impl Future<Output = Result<StoreValue, StoreError>> + Send;

    /// 경량 생존 확인을 수행합니다.
    fn ping(&self, session: &mut Self::Session)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    /// 세션을 명시적으로 닫습니다.
    ///
    /// 드롭만으로도 자원은 회수되지만, 정상 종료 경로에서는 이 메서드로
    /// 서버에 종료를 알립니다.
    fn close(&self, session: Self::Session) -> impl Future<Output = ()> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_display_matches_labels() {
        assert_eq!(StoreKind::Database.to_string(), "database");
        assert_eq!(StoreKind::Cache.to_string(), "cache");
    }

    #[test]
    fn operation_kind_classification() {
        let query = StoreOperation::Query {
            statement: "SELECT 1".to_owned(),
            params: vec![],
        };
        let mutate = StoreOperation::Mutate {
            statement: "DELETE FROM jobs".to_owned(),
            params: vec![],
        };
        let get = StoreOperation::CacheGet {
            key: "k".to_owned(),
        };
        assert_eq!(query.kind(), StoreKind::Database);
        assert_eq!(mutate.kind(), StoreKind::Database);
        assert_eq!(get.kind(), StoreKind::Cache);
    }

    #[test]
    fn operation_write_classification() {
        assert!(
            !StoreOperation::Query {
                statement: "SELECT 1".to_owned(),
                params: vec![],
            }
            .is_write()
        );
        assert!(
            StoreOperation::Mutate {
                statement: "UPDATE jobs SET done = true".to_owned(),
                params: vec![],
            }
            .is_write()
        );
        assert!(
            !StoreOperation::CacheGet {
                key: "k".to_owned()
            }
            .is_write()
        );
        assert!(
            StoreOperation::CacheSet {
                key: "k".to_owned(),
                value: "v".to_owned(),
                ttl_secs: None,
            }
            .is_write()
        );
        assert!(
            StoreOperation::CacheDelete {
                key: "k".to_owned()
            }
            .is_write()
        );
    }

    #[test]
    fn operation_serialize_roundtrip() {
        let op = StoreOperation::CacheSet {
            key: "build:123".to_owned(),
            value: "passed".to_owned(),
            ttl_secs: Some(60),
        };
        let json = serde_json::to_string(&op).unwrap();
        let parsed: StoreOperation = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, StoreOperation::CacheSet { .. }));
    }
}
