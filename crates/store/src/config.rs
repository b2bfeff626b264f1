//! 스토어 설정
//!
//! [`StoreConfig`]는 플랫폼 스냅샷의 `database`/`redis` 섹션에서
//! 풀 크기, 획득 타임아웃, 재시도 예산을 모아 매니저에 전달합니다.
//!
//! # 사용 예시
//! ```
//! use drydock_core::config::PlatformConfig;
//! use drydock_store::StoreConfig;
//!
//! let snapshot = PlatformConfig::default();
//! let config = StoreConfig::from_core(&snapshot);
//! assert_eq!(config.database_pool_size, 10);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use drydock_core::RetryPolicy;
use drydock_core::config::PlatformConfig;
use drydock_core::error::StoreError;

/// 설정 상한값 상수
const MAX_POOL_SIZE: usize = 1_000;
const MAX_ACQUIRE_TIMEOUT_MS: u64 = 60_000;
const MAX_RETRY_ATTEMPTS: u32 = 10;
const MAX_RETRY_BACKOFF_BASE_MS: u64 = 30_000;
const MAX_OPERATION_TIMEOUT_MS: u64 = 300_000;

/// 스토어 매니저 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// 관계형 풀 최대 크기
    pub database_pool_size: usize,
    /// 캐시 풀 최대 크기
    pub cache_pool_size: usize,
    /// 풀 획득 타임아웃 (밀리초)
    pub acquire_timeout_ms: u64,
    /// 작업 최대 시도 횟수 (1 = 재시도 없음)
    pub retry_max_attempts: u32,
    /// 재시도 백오프 기본 간격 (밀리초)
    pub retry_backoff_base_ms: u64,
    /// 시도당 작업 타임아웃 (밀리초)
    pub operation_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_pool_size: 10,
            cache_pool_size: 50,
            acquire_timeout_ms: 5_000,
            retry_max_attempts: 3,
            retry_backoff_base_ms: 100,
            operation_timeout_ms: 30_000,
        }
    }
}

impl StoreConfig {
    /// 플랫폼 스냅샷에서 스토어 설정을 생성합니다.
    pub fn from_core(config: &PlatformConfig) -> Self {
        Self {
            database_pool_size: config.database.pool_size,
            cache_pool_size: config.redis.max_connections,
            acquire_timeout_ms: config.database.acquire_timeout_ms,
            retry_max_attempts: config.database.retry_max_attempts,
            retry_backoff_base_ms: config.database.retry_backoff_base_ms,
            operation_timeout_ms: config.database.operation_timeout_ms,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.database_pool_size == 0 || self.database_pool_size > MAX_POOL_SIZE {
            return Err(StoreError::Config {
                field: "database_pool_size".to_owned(),
                reason: format!("must be 1-{MAX_POOL_SIZE}"),
            });
        }

        if self.cache_pool_size == 0 || self.cache_pool_size > MAX_POOL_SIZE {
            return Err(StoreError::Config {
                field: "cache_pool_size".to_owned(),
                reason: format!("must be 1-{MAX_POOL_SIZE}"),
            });
        }

        if self.acquire_timeout_ms == 0 || self.acquire_timeout_ms > MAX_ACQUIRE_TIMEOUT_MS {
            return Err(StoreError::Config {
                field: "acquire_timeout_ms".to_owned(),
                reason: format!("must be 1-{MAX_ACQUIRE_TIMEOUT_MS}"),
            });
        }

        if self.retry_max_attempts == 0 || self.retry_max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(StoreError::Config {
                field: "retry_max_attempts".to_owned(),
                reason: format!("must be 1-{MAX_RETRY_ATTEMPTS}"),
            });
        }

        if self.retry_backoff_base_ms > MAX_RETRY_BACKOFF_BASE_MS {
            return Err(StoreError::Config {
                field: "retry_backoff_base_ms".to_owned(),
                reason: format!("must be 0-{MAX_RETRY_BACKOFF_BASE_MS}"),
            });
        }

        if self.operation_timeout_ms == 0 || self.operation_timeout_ms > MAX_OPERATION_TIMEOUT_MS {
            return Err(StoreError::Config {
                field: "operation_timeout_ms".to_owned(),
                reason: format!("must be 1-{MAX_OPERATION_TIMEOUT_MS}"),
            });
        }

        Ok(())
    }

    /// 풀 획득 타임아웃
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// 시도당 작업 타임아웃
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// 이 설정의 재시도 정책을 만듭니다.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_backoff_base_ms),
        )
    }
}

/// 스토어 설정 빌더
#[derive(Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 관계형 풀 최대 크기를 설정합니다.
    pub fn database_pool_size(mut self, size: usize) -> Self {
        self.config.database_pool_size = size;
        self
    }

    /// 캐시 풀 최대 크기를 설정합니다.
    pub fn cache_pool_size(mut self, size: usize) -> Self {
        self.config.cache_pool_size = size;
        self
    }

    /// 획득 타임아웃(밀리초)을 설정합니다.
    pub fn acquire_timeout_ms(mut self, ms: u64) -> Self {
        self.config.acquire_timeout_ms = ms;
        self
    }

    /// 최대 시도 횟수를 설정합니다.
    pub fn retry_max_attempts(mut self, attempts: u32) -> Self {
        self.config.retry_max_attempts = attempts;
        self
    }

    /// 재시도 백오프 기본 간격(밀리초)을 설정합니다.
    pub fn retry_backoff_base_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_base_ms = ms;
        self
    }

    /// 시도당 작업 타임아웃(밀리초)을 설정합니다.
    pub fn operation_timeout_ms(mut self, ms: u64) -> Self {
        self.config.operation_timeout_ms = ms;
        self
    }

    /// 설정을 검증하고 `StoreConfig`를 생성합니다.
    pub fn build(self) -> Result<StoreConfig, StoreError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
