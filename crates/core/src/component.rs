//! 컴포넌트 계약 — 헬스체크 확장 포인트 정의

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

/// 컴포넌트 헬스 상태
///
/// Degraded/Unhealthy는 사유 문자열을 함께 전달합니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    /// 정상 동작 중
    Healthy,
    /// 동작하지만 일부 기능 저하 (예: 백엔드 일시 불가)
    Degraded(String),
    /// 동작 불가
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 여부를 반환합니다.
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    /// 동작 불가 여부를 반환합니다.
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded(reason) => write!(f, "degraded: {reason}"),
            HealthStatus::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 리소스 컴포넌트가 구현하는 공통 trait
///
/// 각 매니저(store, api-client, container-ops)는 이 trait을 구현하여
/// 상위 하네스에서 동일한 방식으로 헬스를 집계할 수 있습니다.
pub trait Component: Send + Sync {
    /// 컴포넌트 이름
    fn name(&self) -> &str;

    /// 경량 생존 확인을 수행합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}
