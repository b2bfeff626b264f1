//! 요청/응답 타입

use std::fmt;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use drydock_core::error::ApiError;

/// HTTP 메서드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    /// GET
    Get,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// POST
    Post,
    /// PATCH
    Patch,
}

impl HttpMethod {
    /// 와이어 표기를 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
        }
    }

    /// RFC 9110 기준 멱등 메서드 여부
    ///
    /// POST/PATCH는 상태를 변경할 수 있으므로 멱등이 아닙니다.
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, HttpMethod::Post | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// API 요청
///
/// 경로는 클라이언트 설정의 `base_url`에 조인됩니다. 시도당 타임아웃과
/// 시도 예산은 설정값을 요청 단위로 오버라이드할 수 있습니다.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    /// HTTP 메서드
    pub method: HttpMethod,
    /// base_url 기준 상대 경로
    pub path: String,
    /// 추가 헤더 (기본 헤더를 이름 기준으로 덮어씀)
    pub headers: Vec<(String, String)>,
    /// 요청 본문
    pub body: Option<String>,
    /// 시도당 타임아웃 오버라이드
    pub timeout: Option<Duration>,
    /// 시도 예산 오버라이드
    pub max_attempts: Option<u32>,
    /// 명시적 멱등 표시 — 비멱등 메서드도 재시도를 허용
    pub idempotent: bool,
}

impl ApiRequest {
    /// 새 요청을 만듭니다.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
            max_attempts: None,
            idempotent: false,
        }
    }

    /// 헤더를 추가합니다.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 본문을 설정합니다.
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// JSON 본문을 직렬화해 설정합니다.
    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, ApiError> {
        let body = serde_json::to_string(value).map_err(|e| ApiError::InvalidRequest {
            reason: format!("body serialization failed: {e}"),
        })?;
        self.body = Some(body);
        Ok(self)
    }

    /// 시도당 타임아웃을 오버라이드합니다.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// 시도 예산을 오버라이드합니다.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// 비멱등 메서드를 명시적으로 멱등으로 표시합니다.
    ///
    /// 서버가 중복 요청을 안전하게 처리함을 호출자가 보장할 때만
    /// 사용해야 합니다.
    pub fn mark_idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }

    /// 이 요청이 재시도 대상인지 반환합니다.
    pub fn retryable(&self) -> bool {
        self.idempotent || self.method.is_idempotent()
    }
}

/// API 응답
///
/// HTTP 에러 상태도 정상적인 응답 데이터입니다. 불변식:
/// `attempts <= 시도 예산`.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// 최종 상태 코드
    pub status: u16,
    /// 응답 헤더
    pub headers: Vec<(String, String)>,
    /// 응답 본문
    pub body: String,
    /// 재시도 포함 전체 소요 시간
    pub elapsed: Duration,
    /// 수행된 시도 횟수
    pub attempts: u32,
}

impl ApiResponse {
    /// 2xx 여부
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 4xx 여부
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// 5xx 여부
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// 본문을 JSON으로 역직렬화합니다.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::MalformedResponse {
            reason: format!("json deserialization failed: {e}"),
        })
    }

    /// 이름으로 헤더 값을 찾습니다 (대소문자 무시).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_idempotency_classification() {
        assert!(HttpMethod::Get.is_idempotent());
        assert!(HttpMethod::Head.is_idempotent());
        assert!(HttpMethod::Options.is_idempotent());
        assert!(HttpMethod::Put.is_idempotent());
        assert!(HttpMethod::Delete.is_idempotent());
        assert!(!HttpMethod::Post.is_idempotent());
        assert!(!HttpMethod::Patch.is_idempotent());
    }

    #[test]
    fn method_display() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
    }

    #[test]
    fn post_is_not_retryable_by_default() {
        let request = ApiRequest::new(HttpMethod::Post, "/jobs");
        assert!(!request.retryable());
    }

    #[test]
    fn post_marked_idempotent_is_retryable() {
        let request = ApiRequest::new(HttpMethod::Post, "/jobs").mark_idempotent();
        assert!(request.retryable());
    }

    #[test]
    fn get_is_retryable_by_default() {
        let request = ApiRequest::new(HttpMethod::Get, "/jobs");
        assert!(request.retryable());
    }

    #[test]
    fn builder_accumulates_fields() {
        let request = ApiRequest::new(HttpMethod::Put, "/jobs/1")
            .header("X-Request-Id", "abc")
            .body("{}")
            .timeout(Duration::from_secs(5))
            .max_attempts(2);
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.body.as_deref(), Some("{}"));
        assert_eq!(request.timeout, Some(Duration::from_secs(5)));
        assert_eq!(request.max_attempts, Some(2));
    }

    #[test]
    fn json_body_serialization() {
        #[derive(Serialize)]
        struct Job {
            name: String,
        }
        let request = ApiRequest::new(HttpMethod::Post, "/jobs")
            .json(&Job {
                name: "build".to_owned(),
            })
            .unwrap();
        assert_eq!(request.body.as_deref(), Some(r#"{"name":"build"}"#));
    }

    #[test]
    fn response_status_predicates() {
        let mut response = ApiResponse {
            status: 200,
            headers: vec![],
            body: String::new(),
            elapsed: Duration::ZERO,
            attempts: 1,
        };
        assert!(response.is_success());
        response.status = 404;
        assert!(response.is_client_error());
        response.status = 503;
        assert!(response.is_server_error());
    }

    #[test]
    fn response_json_parsing() {
        #[derive(Deserialize)]
        struct Health {
            ok: bool,
        }
        let response = ApiResponse {
            status: 200,
            headers: vec![],
            body: r#"{"ok":true}"#.to_owned(),
            elapsed: Duration::ZERO,
            attempts: 1,
        };
        let health: Health = response.json().unwrap();
        assert!(health.ok);
    }

    #[test]
    fn response_json_parse_failure_is_malformed() {
        let response = ApiResponse {
            status: 200,
            headers: vec![],
            body: "not json".to_owned(),
            elapsed: Duration::ZERO,
            attempts: 1,
        };
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse { .. }));
    }

    #[test]
    fn response_header_lookup_is_case_insensitive() {
        let response = ApiResponse {
            status: 200,
            headers: vec![("Content-Type".to_owned(), "application/json".to_owned())],
            body: String::new(),
            elapsed: Duration::ZERO,
            attempts: 1,
        };
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("x-missing"), None);
    }
}
