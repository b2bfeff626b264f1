//! API 클라이언트 — 인증, 타임아웃, 재시도, 레이트 리밋
//!
//! [`ApiClient::send`]는 설정된 인증을 부착하고, 시도당 타임아웃을
//! 강제하며, transient 실패(연결 거부, 타임아웃, 502/503/504/429)를
//! 지수 백오프 + 지터로 재시도합니다. HTTP 에러 상태는 데이터로
//! 반환되고, [`ApiError::Transport`]는 재시도 예산을 소진하고도
//! 연결을 수립하지 못했을 때만 발생합니다.
//!
//! 비멱등 요청(POST/PATCH)은 호출자가 명시적으로 멱등으로 표시하지
//! 않는 한 어떤 실패에서도 재시도하지 않습니다.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tracing::{debug, warn};

use drydock_core::component::{Component, HealthStatus};
use drydock_core::error::ApiError;
use drydock_core::metrics::{
    API_REQUEST_DURATION_SECONDS, API_REQUESTS_TOTAL, API_RETRIES_TOTAL,
    API_TRANSPORT_FAILURES_TOTAL, LABEL_METHOD, LABEL_RESULT,
};
use drydock_core::retry::RetryPolicy;

use crate::backend::{HttpBackend, PreparedRequest, TransportFailure};
use crate::config::ApiClientConfig;
use crate::limiter::RateLimiter;
use crate::request::{ApiRequest, ApiResponse, HttpMethod};

/// 재시도 대상 HTTP 상태인지 반환합니다.
///
/// 429를 제외한 4xx는 재시도하지 않습니다 — 입력이 바뀌지 않는 한
/// 결과도 바뀌지 않습니다.
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

/// 플랫폼 API 클라이언트
///
/// 하나의 설정 스냅샷에서 생성되며, 동시 호출에 안전합니다.
pub struct ApiClient<H: HttpBackend> {
    backend: Arc<H>,
    config: ApiClientConfig,
    retry: RetryPolicy,
    limiter: Option<RateLimiter>,
}

impl<H: HttpBackend> ApiClient<H> {
    /// 설정을 검증하고 클라이언트를 생성합니다.
    pub fn new(config: ApiClientConfig, backend: H) -> Result<Self, ApiError> {
        config.validate()?;
        let retry = config.retry_policy();
        let limiter = (config.rate_limit_per_minute > 0).then(|| {
            RateLimiter::new(
                config.rate_limit_per_minute as usize,
                std::time::Duration::from_secs(60),
            )
        });
        Ok(Self {
            backend: Arc::new(backend),
            config,
            retry,
            limiter,
        })
    }

    /// 요청을 전송합니다.
    ///
    /// 반환되는 [`ApiResponse`]는 최종 상태 코드와 실제 수행된 시도
    /// 횟수를 담습니다 (`attempts <= 예산` 불변식). 전체 소요 시간은
    /// `시도 횟수 x 시도당 타임아웃 + 누적 백오프`로 유계입니다.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let prepared = self.prepare(request)?;
        let budget = if request.retryable() {
            request
                .max_attempts
                .unwrap_or(self.retry.max_attempts())
                .max(1)
        } else {
            1
        };

        let start = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            if let Some(limiter) = &self.limiter {
                limiter.acquire().await;
            }

            match self.backend.send(&prepared).await {
                Ok(raw) => {
                    if is_retryable_status(raw.status) && attempts < budget {
                        let backoff = self.retry.delay_for(attempts);
                        counter!(API_RETRIES_TOTAL, LABEL_METHOD => request.method.as_str())
                            .increment(1);
                        debug!(
                            status = raw.status,
                            attempt = attempts,
                            backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                            "retryable status, backing off"
                        );
                        tokio::time::sleep(backoff).await;
                        continue;
                    }

                    let elapsed = start.elapsed();
                    histogram!(API_REQUEST_DURATION_SECONDS).record(elapsed.as_secs_f64());
                    let result = if raw.status < 400 { "success" } else { "failure" };
                    counter!(
                        API_REQUESTS_TOTAL,
                        LABEL_METHOD => request.method.as_str(),
                        LABEL_RESULT => result
                    )
                    .increment(1);
                    return Ok(ApiResponse {
                        status: raw.status,
                        headers: raw.headers,
                        body: raw.body,
                        elapsed,
                        attempts,
                    });
                }
                Err(failure) if failure.is_transient() && attempts < budget => {
                    let backoff = self.retry.delay_for(attempts);
                    counter!(API_RETRIES_TOTAL, LABEL_METHOD => request.method.as_str())
                        .increment(1);
                    debug!(
                        error = %failure,
                        attempt = attempts,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        "transport failure, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(TransportFailure::MalformedBody(reason)) => {
                    return Err(ApiError::MalformedResponse { reason });
                }
                Err(TransportFailure::Invalid(reason)) => {
                    return Err(ApiError::InvalidRequest { reason });
                }
                Err(failure) => {
                    counter!(API_TRANSPORT_FAILURES_TOTAL).increment(1);
                    warn!(
                        method = request.method.as_str(),
                        url = prepared.url.as_str(),
                        attempts = attempts,
                        error = %failure,
                        "transport failure, retry budget exhausted"
                    );
                    return Err(ApiError::Transport {
                        reason: failure.to_string(),
                        attempts,
                    });
                }
            }
        }
    }

    /// GET 요청을 전송합니다.
    pub async fn get(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.send(&ApiRequest::new(HttpMethod::Get, path)).await
    }

    /// POST 요청을 전송합니다.
    pub async fn post(&self, path: &str, body: impl Into<String>) -> Result<ApiResponse, ApiError> {
        self.send(&ApiRequest::new(HttpMethod::Post, path).body(body))
            .await
    }

    /// PUT 요청을 전송합니다.
    pub async fn put(&self, path: &str, body: impl Into<String>) -> Result<ApiResponse, ApiError> {
        self.send(&ApiRequest::new(HttpMethod::Put, path).body(body))
            .await
    }

    /// PATCH 요청을 전송합니다.
    pub async fn patch(&self, path: &str, body: impl Into<String>) -> Result<ApiResponse, ApiError> {
        self.send(&ApiRequest::new(HttpMethod::Patch, path).body(body))
            .await
    }

    /// DELETE 요청을 전송합니다.
    pub async fn delete(&self, path: &str) -> Result<ApiResponse, ApiError> {
        self.send(&ApiRequest::new(HttpMethod::Delete, path)).await
    }

    /// 인증/기본 헤더를 부착하고 URL을 조인하여 전송 준비를 마칩니다.
    fn prepare(&self, request: &ApiRequest) -> Result<PreparedRequest, ApiError> {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            request.path.trim_start_matches('/'),
        );

        let mut headers: Vec<(String, String)> = vec![
            ("Content-Type".to_owned(), "application/json".to_owned()),
            ("Accept".to_owned(), "application/json".to_owned()),
            ("User-Agent".to_owned(), self.config.user_agent.clone()),
        ];
        if let Some(token) = &self.config.auth_token {
            headers.push(("Authorization".to_owned(), format!("Bearer {token}")));
        } else if let Some(key) = &self.config.api_key {
            headers.push(("X-Api-Key".to_owned(), key.clone()));
        }
        // 요청 헤더가 같은 이름의 기본 헤더를 덮어씀
        for (name, value) in &request.headers {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }

        Ok(PreparedRequest {
            method: request.method,
            url,
            headers,
            body: request.body.clone(),
            timeout: request.timeout.unwrap_or(self.config.timeout()),
        })
    }
}

impl<H: HttpBackend> Component for ApiClient<H> {
    fn name(&self) -> &str {
        "api-client"
    }

    async fn health_check(&self) -> HealthStatus {
        let request = ApiRequest::new(HttpMethod::Head, "/").max_attempts(1);
        match self.send(&request).await {
            // 어떤 HTTP 상태든 도달 가능하면 healthy — 상태는 데이터
            Ok(_) => HealthStatus::Healthy,
            Err(e) => HealthStatus::Unhealthy(e.to_string()),
        }
    }
}
