//! 메트릭 상수 및 설명 등록
//!
//! 모든 Prometheus 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 각 크레이트는 이 상수를 사용하여 `metrics::counter!()`,
//! `metrics::gauge!()`, `metrics::histogram!()` 매크로를 호출합니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `drydock_`
//! - 컴포넌트명: `store_`, `api_`, `container_`
//! - 접미어: `_total` (counter), `_seconds` (histogram), 없음 (gauge)

// --- 레이블 키 상수 ---

/// 스토어 종류 레이블 키 (database, cache)
pub const LABEL_KIND: &str = "kind";

/// HTTP 메서드 레이블 키
pub const LABEL_METHOD: &str = "method";

/// 컨테이너 액션 레이블 키 (create, start, stop, remove, inspect)
pub const LABEL_ACTION: &str = "action";

/// 결과 레이블 키 (success, failure)
pub const LABEL_RESULT: &str = "result";

// --- Store 메트릭 ---

/// Store: 풀 획득 성공 수 (counter, label: kind)
pub const STORE_ACQUIRES_TOTAL: &str = "drydock_store_acquires_total";

/// Store: 풀 획득 타임아웃 수 (counter, label: kind)
pub const STORE_ACQUIRE_TIMEOUTS_TOTAL: &str = "drydock_store_acquire_timeouts_total";

/// Store: 현재 열린 커넥션 수 (gauge, label: kind)
pub const STORE_CONNECTIONS_OPEN: &str = "drydock_store_connections_open";

/// Store: 폐기된 broken 커넥션 수 (counter, label: kind)
pub const STORE_BROKEN_DISCARDED_TOTAL: &str = "drydock_store_broken_discarded_total";

/// Store: 작업 재시도 수 (counter, label: kind)
pub const STORE_EXECUTE_RETRIES_TOTAL: &str = "drydock_store_execute_retries_total";

// --- API Client 메트릭 ---

/// API: 전송 완료된 요청 수 (counter, labels: method, result)
pub const API_REQUESTS_TOTAL: &str = "drydock_api_requests_total";

/// API: 재시도 수 (counter, label: method)
pub const API_RETRIES_TOTAL: &str = "drydock_api_retries_total";

/// API: 전송 실패(재시도 소진) 수 (counter)
pub const API_TRANSPORT_FAILURES_TOTAL: &str = "drydock_api_transport_failures_total";

/// API: 요청 전체 소요 시간 (histogram, 초)
pub const API_REQUEST_DURATION_SECONDS: &str = "drydock_api_request_duration_seconds";

// --- Container 메트릭 ---

/// Container: 수행된 라이프사이클 액션 수 (counter, labels: action, result)
pub const CONTAINER_ACTIONS_TOTAL: &str = "drydock_container_actions_total";

/// Container: 현재 관리 중인 컨테이너 수 (gauge)
pub const CONTAINER_MANAGED: &str = "drydock_container_managed";

/// Container: 백엔드 호출 재시도 수 (counter, label: action)
pub const CONTAINER_BACKEND_RETRIES_TOTAL: &str = "drydock_container_backend_retries_total";

/// 요청 소요 시간 히스토그램 버킷 (초)
///
/// 1ms - 30s 범위, 로그 단위 분포
pub const REQUEST_DURATION_BUCKETS: [f64; 10] =
    [0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0];

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출해야 합니다. 일반적으로
/// 하네스 초기화 시점에서 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge, describe_histogram};

    // Store
    describe_counter!(
        STORE_ACQUIRES_TOTAL,
        "Total number of successful pool acquisitions"
    );
    describe_counter!(
        STORE_ACQUIRE_TIMEOUTS_TOTAL,
        "Total number of pool acquisitions that timed out (pool exhausted)"
    );
    describe_gauge!(
        STORE_CONNECTIONS_OPEN,
        "Number of currently open store connections"
    );
    describe_counter!(
        STORE_BROKEN_DISCARDED_TOTAL,
        "Total number of broken connections discarded from the pool"
    );
    describe_counter!(
        STORE_EXECUTE_RETRIES_TOTAL,
        "Total number of store operation retries after transient failures"
    );

    // API Client
    describe_counter!(
        API_REQUESTS_TOTAL,
        "Total number of API requests that produced a final outcome"
    );
    describe_counter!(
        API_RETRIES_TOTAL,
        "Total number of API request retries after transient failures"
    );
    describe_counter!(
        API_TRANSPORT_FAILURES_TOTAL,
        "Total number of API requests that failed at the transport level after exhausting retries"
    );
    describe_histogram!(
        API_REQUEST_DURATION_SECONDS,
        "Wall-clock time of an API request including retries, in seconds"
    );

    // Container
    describe_counter!(
        CONTAINER_ACTIONS_TOTAL,
        "Total number of container lifecycle actions executed"
    );
    describe_gauge!(
        CONTAINER_MANAGED,
        "Number of containers currently tracked by the manager"
    );
    describe_counter!(
        CONTAINER_BACKEND_RETRIES_TOTAL,
        "Total number of container backend call retries after transient failures"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        STORE_ACQUIRES_TOTAL,
        STORE_ACQUIRE_TIMEOUTS_TOTAL,
        STORE_CONNECTIONS_OPEN,
        STORE_BROKEN_DISCARDED_TOTAL,
        STORE_EXECUTE_RETRIES_TOTAL,
        API_REQUESTS_TOTAL,
        API_RETRIES_TOTAL,
        API_TRANSPORT_FAILURES_TOTAL,
        API_REQUEST_DURATION_SECONDS,
        CONTAINER_ACTIONS_TOTAL,
        CONTAINER_MANAGED,
        CONTAINER_BACKEND_RETRIES_TOTAL,
    ];

    #[test]
    fn all_metrics_start_with_drydock_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("drydock_"),
                "Metric '{}' does not start with 'drydock_' prefix",
                name
            );
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        // 레코더가 설치되지 않아도 describe_all()은 패닉하지 않아야 함
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        let labels = [LABEL_KIND, LABEL_METHOD, LABEL_ACTION, LABEL_RESULT];
        for label in &labels {
            assert_eq!(
                label.to_lowercase(),
                *label,
                "Label key '{}' should be lowercase",
                label
            );
        }
    }

    #[test]
    fn duration_buckets_are_sorted() {
        let buckets = REQUEST_DURATION_BUCKETS;
        for i in 1..buckets.len() {
            assert!(
                buckets[i] > buckets[i - 1],
                "Bucket values must be in ascending order"
            );
        }
    }
}
