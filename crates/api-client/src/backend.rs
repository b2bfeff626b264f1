//! HTTP 백엔드 추상화
//!
//! [`HttpBackend`] trait은 실제 HTTP 전송을 추상화합니다. HTTP 상태
//! 코드는 실패가 아니라 [`RawResponse`] 데이터입니다 — 에러는
//! 연결/타임아웃 같은 전송 계층 문제에만 쓰입니다.

use std::future::Future;
use std::time::Duration;

use crate::request::HttpMethod;

/// 백엔드에 전달되는 전송 준비가 끝난 요청
///
/// 인증 헤더 부착과 URL 조인은 클라이언트가 끝낸 상태입니다.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    /// HTTP 메서드
    pub method: HttpMethod,
    /// 완전한 URL
    pub url: String,
    /// 전송할 헤더 전체
    pub headers: Vec<(String, String)>,
    /// 요청 본문
    pub body: Option<String>,
    /// 시도당 타임아웃
    pub timeout: Duration,
}

/// 전송 계층 응답
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// 상태 코드
    pub status: u16,
    /// 응답 헤더
    pub headers: Vec<(String, String)>,
    /// 응답 본문
    pub body: String,
}

/// 전송 계층 실패
#[derive(Debug, thiserror::Error)]
pub enum TransportFailure {
    /// 연결 수립 실패
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    /// 시도당 타임아웃 초과
    #[error("request timed out")]
    TimedOut,

    /// 상태/헤더는 받았으나 본문을 읽을 수 없음 — 재시도 대상 아님
    #[error("malformed response body: {0}")]
    MalformedBody(String),

    /// 전송 전에 거부된 요청 (URL 구성 실패 등) — 재시도 대상 아님
    #[error("invalid request: {0}")]
    Invalid(String),

    /// 그 외 I/O 실패
    #[error("io failure: {0}")]
    Io(String),
}

impl TransportFailure {
    /// 재시도 대상 여부
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportFailure::ConnectionRefused(_)
                | TransportFailure::TimedOut
                | TransportFailure::Io(_)
        )
    }
}

/// HTTP 백엔드 능력 계약
pub trait HttpBackend: Send + Sync + 'static {
    /// 요청 하나를 전송하고 응답 또는 전송 실패를 반환합니다.
    fn send(
        &self,
        request: &PreparedRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportFailure>> + Send;
}

/// reqwest 기반 프로덕션 백엔드
pub struct ReqwestBackend {
    client: reqwest::Client,
}

impl ReqwestBackend {
    /// TLS 검증 설정으로 백엔드를 생성합니다.
    pub fn new(verify_ssl: bool) -> Result<Self, drydock_core::error::ApiError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(!verify_ssl)
            .build()
            .map_err(|e| drydock_core::error::ApiError::Config {
                field: "verify_ssl".to_owned(),
                reason: format!("failed to build http client: {e}"),
            })?;
        Ok(Self { client })
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Patch => reqwest::Method::PATCH,
    }
}

fn classify_reqwest(e: reqwest::Error) -> TransportFailure {
    if e.is_builder() {
        TransportFailure::Invalid(e.to_string())
    } else if e.is_timeout() {
        TransportFailure::TimedOut
    } else if e.is_connect() {
        TransportFailure::ConnectionRefused(e.to_string())
    } else {
        TransportFailure::Io(e.to_string())
    }
}

impl HttpBackend for ReqwestBackend {
    async fn send(&self, request: &PreparedRequest) -> Result<RawResponse, TransportFailure> {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(classify_reqwest)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|e| TransportFailure::MalformedBody(e.to_string()))?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(TransportFailure::ConnectionRefused("refused".to_owned()).is_transient());
        assert!(TransportFailure::TimedOut.is_transient());
        assert!(TransportFailure::Io("reset".to_owned()).is_transient());
        assert!(!TransportFailure::MalformedBody("truncated".to_owned()).is_transient());
        assert!(!TransportFailure::Invalid("bad url".to_owned()).is_transient());
    }

    #[test]
    fn reqwest_backend_builds_with_both_tls_modes() {
        assert!(ReqwestBackend::new(true).is_ok());
        assert!(ReqwestBackend::new(false).is_ok());
    }

    #[test]
    fn method_mapping_is_complete() {
        let methods = [
            HttpMethod::Get,
            HttpMethod::Head,
            HttpMethod::Options,
            HttpMethod::Put,
            HttpMethod::Delete,
            HttpMethod::Post,
            HttpMethod::Patch,
        ];
        for method in methods {
            assert_eq!(to_reqwest_method(method).as_str(), method.as_str());
        }
    }
}
