//! API 클라이언트 설정
//!
//! [`ApiClientConfig`]는 플랫폼 스냅샷의 `api` 섹션에서 파생됩니다.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use drydock_core::RetryPolicy;
use drydock_core::config::ApiConfig;
use drydock_core::error::ApiError;

/// 설정 상한값 상수
const MAX_ATTEMPTS: u32 = 10;
const MAX_TIMEOUT_SECS: u64 = 300;
const MAX_RETRY_BACKOFF_BASE_MS: u64 = 30_000;
const MAX_RATE_LIMIT_PER_MINUTE: u32 = 100_000;

/// API 클라이언트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiClientConfig {
    /// 기본 URL
    pub base_url: String,
    /// 시도당 타임아웃 (초)
    pub timeout_secs: u64,
    /// 최대 시도 횟수 (1 = 재시도 없음)
    pub max_attempts: u32,
    /// 재시도 백오프 기본 간격 (밀리초)
    pub retry_backoff_base_ms: u64,
    /// 분당 요청 상한 (0 = 제한 없음)
    pub rate_limit_per_minute: u32,
    /// Bearer 인증 토큰
    pub auth_token: Option<String>,
    /// API 키 (auth_token이 없을 때 사용)
    pub api_key: Option<String>,
    /// TLS 인증서 검증 여부
    pub verify_ssl: bool,
    /// User-Agent 헤더 값
    pub user_agent: String,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_owned(),
            timeout_secs: 30,
            max_attempts: 3,
            retry_backoff_base_ms: 200,
            rate_limit_per_minute: 100,
            auth_token: None,
            api_key: None,
            verify_ssl: true,
            user_agent: "drydock-api-client/0.1".to_owned(),
        }
    }
}

impl ApiClientConfig {
    /// 플랫폼 스냅샷의 `api` 섹션에서 설정을 생성합니다.
    pub fn from_core(api: &ApiConfig) -> Self {
        Self {
            base_url: api.base_url.clone(),
            timeout_secs: api.timeout_secs,
            max_attempts: api.max_attempts,
            retry_backoff_base_ms: api.retry_backoff_base_ms,
            rate_limit_per_minute: api.rate_limit_per_minute,
            auth_token: api.auth_token.clone(),
            api_key: api.api_key.clone(),
            verify_ssl: api.verify_ssl,
            ..Self::default()
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.base_url.is_empty() {
            return Err(ApiError::Config {
                field: "base_url".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ApiError::Config {
                field: "base_url".to_owned(),
                reason: "must start with http:// or https://".to_owned(),
            });
        }

        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS {
            return Err(ApiError::Config {
                field: "max_attempts".to_owned(),
                reason: format!("must be 1-{MAX_ATTEMPTS}"),
            });
        }

        if self.timeout_secs == 0 || self.timeout_secs > MAX_TIMEOUT_SECS {
            return Err(ApiError::Config {
                field: "timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_TIMEOUT_SECS}"),
            });
        }

        if self.retry_backoff_base_ms > MAX_RETRY_BACKOFF_BASE_MS {
            return Err(ApiError::Config {
                field: "retry_backoff_base_ms".to_owned(),
                reason: format!("must be 0-{MAX_RETRY_BACKOFF_BASE_MS}"),
            });
        }

        if self.rate_limit_per_minute > MAX_RATE_LIMIT_PER_MINUTE {
            return Err(ApiError::Config {
                field: "rate_limit_per_minute".to_owned(),
                reason: format!("must be 0-{MAX_RATE_LIMIT_PER_MINUTE}"),
            });
        }

        Ok(())
    }

    /// 시도당 타임아웃
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// 이 설정의 재시도 정책을 만듭니다.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_backoff_base_ms),
        )
    }
}

/// API 클라이언트 설정 빌더
#[derive(Default)]
pub struct ApiClientConfigBuilder {
    config: ApiClientConfig,
}

impl ApiClientConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 기본 URL을 설정합니다.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// 시도당 타임아웃(초)을 설정합니다.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    /// 최대 시도 횟수를 설정합니다.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// 재시도 백오프 기본 간격(밀리초)을 설정합니다.
    pub fn retry_backoff_base_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_base_ms = ms;
        self
    }

    /// 분당 요청 상한을 설정합니다 (0 = 제한 없음).
    pub fn rate_limit_per_minute(mut self, limit: u32) -> Self {
        self.config.rate_limit_per_minute = limit;
        self
    }

    /// Bearer 인증 토큰을 설정합니다.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth_token = Some(token.into());
        self
    }

    /// API 키를 설정합니다.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// TLS 검증 여부를 설정합니다.
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.config.verify_ssl = verify;
        self
    }

    /// 설정을 검증하고 `ApiClientConfig`를 생성합니다.
    pub fn build(self) -> Result<ApiClientConfig, ApiError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
