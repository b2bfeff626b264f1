//! 통합 테스트 — 재시도/멱등성/레이트 리밋의 전체 플로우 검증

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use drydock_api_client::{
    ApiClient, ApiClientConfig, ApiRequest, HttpBackend, HttpMethod, PreparedRequest, RawResponse,
    TransportFailure,
};
use drydock_core::error::ApiError;

/// 상태 코드 시퀀스를 재생하는 백엔드
struct SequenceBackend {
    statuses: Mutex<VecDeque<u16>>,
    refuse_first: AtomicU32,
    calls: AtomicU32,
}

impl SequenceBackend {
    fn new(statuses: &[u16]) -> Self {
        Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            refuse_first: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    fn refusing_first(self, n: u32) -> Self {
        self.refuse_first.store(n, Ordering::SeqCst);
        self
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HttpBackend for &'static SequenceBackend {
    async fn send(&self, _request: &PreparedRequest) -> Result<RawResponse, TransportFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self
            .refuse_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportFailure::ConnectionRefused(
                "connection refused".to_owned(),
            ));
        }
        let status = self.statuses.lock().unwrap().pop_front().unwrap_or(200);
        Ok(RawResponse {
            status,
            headers: vec![],
            body: String::new(),
        })
    }
}

fn leak(backend: SequenceBackend) -> &'static SequenceBackend {
    Box::leak(Box::new(backend))
}

fn config(max_attempts: u32, rate_limit_per_minute: u32) -> ApiClientConfig {
    ApiClientConfig {
        base_url: "http://api.test:8080".to_owned(),
        timeout_secs: 2,
        max_attempts,
        retry_backoff_base_ms: 1,
        rate_limit_per_minute,
        ..Default::default()
    }
}

#[tokio::test]
async fn recovery_after_two_refusals_counts_three_attempts() {
    let backend = leak(SequenceBackend::new(&[200]).refusing_first(2));
    let client = ApiClient::new(config(3, 0), backend).unwrap();

    let response = client.get("/builds").await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.attempts, 3);
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn gateway_errors_then_success_for_idempotent_request() {
    let backend = leak(SequenceBackend::new(&[502, 504, 200]));
    let client = ApiClient::new(config(5, 0), backend).unwrap();

    let response = client.get("/builds").await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.attempts, 3);
}

#[tokio::test]
async fn gateway_error_budget_exhaustion_returns_last_status() {
    let backend = leak(SequenceBackend::new(&[503, 503, 503]));
    let client = ApiClient::new(config(3, 0), backend).unwrap();

    // 예산을 다 써도 상태는 데이터로 반환됨
    let response = client.get("/builds").await.unwrap();
    assert_eq!(response.status, 503);
    assert_eq!(response.attempts, 3);
}

#[tokio::test]
async fn non_idempotent_request_never_retries_transport_failure() {
    let backend = leak(SequenceBackend::new(&[200]).refusing_first(1));
    let client = ApiClient::new(config(5, 0), backend).unwrap();

    let err = client.post("/builds", "{}").await.unwrap_err();
    match err {
        ApiError::Transport { attempts, .. } => assert_eq!(attempts, 1),
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(backend.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn rate_limiter_spaces_out_attempts() {
    let backend = leak(SequenceBackend::new(&[200, 200, 200]));
    // 분당 2건 — 세 번째 요청은 윈도우가 빌 때까지 대기
    let client = ApiClient::new(config(1, 2), backend).unwrap();

    let start = tokio::time::Instant::now();
    client.get("/a").await.unwrap();
    client.get("/b").await.unwrap();
    client.get("/c").await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(60));
    assert_eq!(backend.calls(), 3);
}

#[tokio::test]
async fn verbs_map_to_methods() {
    let backend = leak(SequenceBackend::new(&[200, 200, 200, 200, 200]));
    let client = ApiClient::new(config(1, 0), backend).unwrap();

    assert!(client.get("/r").await.unwrap().is_success());
    assert!(client.post("/r", "{}").await.unwrap().is_success());
    assert!(client.put("/r", "{}").await.unwrap().is_success());
    assert!(client.patch("/r", "{}").await.unwrap().is_success());
    assert!(client.delete("/r").await.unwrap().is_success());
    assert_eq!(backend.calls(), 5);
}

#[tokio::test]
async fn attempt_count_never_exceeds_budget() {
    for budget in 1..=4u32 {
        let backend = leak(SequenceBackend::new(&[]).refusing_first(10));
        let client = ApiClient::new(config(budget, 0), backend).unwrap();

        let err = client
            .send(&ApiRequest::new(HttpMethod::Get, "/x"))
            .await
            .unwrap_err();
        match err {
            ApiError::Transport { attempts, .. } => assert!(attempts <= budget),
            other => panic!("expected transport error, got {other:?}"),
        }
        assert_eq!(backend.calls(), budget);
    }
}
