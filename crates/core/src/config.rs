//! 설정 관리 — drydock.toml 파싱 및 환경변수 오버라이드
//!
//! [`PlatformConfig`]는 모든 컴포넌트의 설정을 담는 불변 스냅샷입니다.
//!
//! # 설정 로딩 우선순위
//! 1. 환경변수 (`DB_PORT=5434` 형식, 최고 우선)
//! 2. 설정 파일 (`drydock.toml`)
//! 3. 기본값 (`Default` 구현, 모든 키에 대해 항상 존재)
//!
//! 한 번 해석된 스냅샷은 변경되지 않습니다. 다른 오버라이드가 필요하면
//! 새 스냅샷을 만들어야 하며, 이전 스냅샷은 영향을 받지 않습니다.
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), drydock_core::error::DrydockError> {
//! use drydock_core::config::PlatformConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = PlatformConfig::load("drydock.toml").await?;
//!
//! // 파일이 없어도 되는 경우 (기본값 + 환경변수)
//! let config = PlatformConfig::resolve(None::<&str>).await?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DrydockError};

/// Drydock 통합 설정 스냅샷
///
/// `drydock.toml` 파일의 최상위 구조를 나타냅니다.
/// 각 컴포넌트는 생성 시점에 자기 섹션만 읽어 사용합니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// 관계형 데이터베이스 설정
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Redis 캐시 설정
    #[serde(default)]
    pub redis: RedisConfig,
    /// API 클라이언트 설정
    #[serde(default)]
    pub api: ApiConfig,
    /// 컨테이너 오케스트레이션 설정
    #[serde(default)]
    pub container: ContainerConfig,
    /// 모니터링/로깅 설정
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl PlatformConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    ///
    /// 설정 로딩 순서:
    /// 1. TOML 파일 파싱 (기본값 위에 병합)
    /// 2. 환경변수 오버라이드 적용
    /// 3. 검증
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DrydockError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 파일이 없을 수도 있는 환경에서 설정을 해석합니다.
    ///
    /// `path`가 `None`이거나 파일이 존재하지 않으면 기본값에서 시작하고,
    /// 존재하면 파일을 병합합니다. 이후 환경변수 오버라이드와 검증은
    /// [`load`](Self::load)와 동일합니다.
    pub async fn resolve(path: Option<impl AsRef<Path>>) -> Result<Self, DrydockError> {
        let mut config = match path {
            Some(p) if p.as_ref().exists() => Self::from_file(p).await?,
            Some(p) => {
                warn!(
                    path = %p.as_ref().display(),
                    "config file not found, using built-in defaults"
                );
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DrydockError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DrydockError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DrydockError::Io(e)
            }
        })?;
        Self::parse(&content)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    ///
    /// 파일에 없는 키는 기본값을 유지합니다 (섹션 단위 1레벨 병합).
    pub fn parse(toml_str: &str) -> Result<Self, DrydockError> {
        toml::from_str(toml_str).map_err(|e| {
            DrydockError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수는 가장 높은 우선순위 레이어입니다. 타입 강제 변환에
    /// 실패하는 값(예: 숫자가 아닌 `DB_PORT`)은 무시되지 않고
    /// [`ConfigError::InvalidValue`]로 해석 전체를 실패시킵니다.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        // Database
        override_string(&mut self.database.host, "DB_HOST");
        override_port(&mut self.database.port, "DB_PORT")?;
        override_string(&mut self.database.name, "DB_NAME");
        override_string(&mut self.database.user, "DB_USER");
        override_string(&mut self.database.password, "DB_PASSWORD");

        // Redis
        override_string(&mut self.redis.host, "REDIS_HOST");
        override_port(&mut self.redis.port, "REDIS_PORT")?;
        override_opt_string(&mut self.redis.password, "REDIS_PASSWORD");

        // API
        override_string(&mut self.api.base_url, "API_BASE_URL");
        override_opt_string(&mut self.api.auth_token, "API_AUTH_TOKEN");

        // Container
        override_opt_string(&mut self.container.kubeconfig, "KUBECONFIG");
        override_string(&mut self.container.namespace, "K8S_NAMESPACE");

        Ok(())
    }

    /// 설정값의 유효성을 검증합니다.
    ///
    /// 필수 키가 모든 레이어 병합 후에도 비어 있으면
    /// [`ConfigError::MissingKey`], 범위를 벗어난 값은
    /// [`ConfigError::InvalidValue`]를 반환합니다.
    pub fn validate(&self) -> Result<(), DrydockError> {
        if self.database.host.is_empty() {
            return Err(ConfigError::MissingKey {
                key: "database.host".to_owned(),
            }
            .into());
        }

        if self.database.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "database.port".to_owned(),
                reason: "must be 1-65535".to_owned(),
            }
            .into());
        }

        if self.database.pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "database.pool_size".to_owned(),
                reason: "must be at least 1".to_owned(),
            }
            .into());
        }

        if self.redis.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "redis.port".to_owned(),
                reason: "must be 1-65535".to_owned(),
            }
            .into());
        }

        if self.redis.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "redis.max_connections".to_owned(),
                reason: "must be at least 1".to_owned(),
            }
            .into());
        }

        if self.api.base_url.is_empty() {
            return Err(ConfigError::MissingKey {
                key: "api.base_url".to_owned(),
            }
            .into());
        }

        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "api.base_url".to_owned(),
                reason: "must start with http:// or https://".to_owned(),
            }
            .into());
        }

        if self.api.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "api.max_attempts".to_owned(),
                reason: "must be at least 1".to_owned(),
            }
            .into());
        }

        if self.container.docker_socket.is_empty() {
            return Err(ConfigError::MissingKey {
                key: "container.docker_socket".to_owned(),
            }
            .into());
        }

        // log_level 검증
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.monitoring.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "monitoring.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        // log_format 검증
        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.monitoring.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "monitoring.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        Ok(())
    }
}

/// 관계형 데이터베이스 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 호스트명
    pub host: String,
    /// 포트 (1-65535)
    pub port: u16,
    /// 데이터베이스 이름
    pub name: String,
    /// 사용자명
    pub user: String,
    /// 비밀번호
    pub password: String,
    /// SSL 모드 (disable, prefer, require)
    pub ssl_mode: String,
    /// 커넥션 풀 최대 크기
    pub pool_size: usize,
    /// 풀 획득 타임아웃 (밀리초)
    pub acquire_timeout_ms: u64,
    /// 작업 실패 시 재시도 최대 시도 횟수 (1 = 재시도 없음)
    pub retry_max_attempts: u32,
    /// 재시도 백오프 기본 간격 (밀리초)
    pub retry_backoff_base_ms: u64,
    /// 시도당 작업 타임아웃 (밀리초)
    pub operation_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 5432,
            name: "drydock".to_owned(),
            user: "drydock".to_owned(),
            password: String::new(),
            ssl_mode: "prefer".to_owned(),
            pool_size: 10,
            acquire_timeout_ms: 5_000,
            retry_max_attempts: 3,
            retry_backoff_base_ms: 100,
            operation_timeout_ms: 30_000,
        }
    }
}

impl DatabaseConfig {
    /// PostgreSQL 연결 URL을 구성합니다.
    pub fn url(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name,
        )
    }
}

/// Redis 캐시 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// 호스트명
    pub host: String,
    /// 포트 (1-65535)
    pub port: u16,
    /// 데이터베이스 인덱스
    pub db: u8,
    /// 비밀번호 (없으면 인증 생략)
    pub password: Option<String>,
    /// 소켓 타임아웃 (초)
    pub socket_timeout_secs: u64,
    /// 캐시 커넥션 풀 최대 크기
    pub max_connections: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 6379,
            db: 0,
            password: None,
            socket_timeout_secs: 5,
            max_connections: 50,
        }
    }
}

impl RedisConfig {
    /// Redis 연결 URL을 구성합니다.
    pub fn url(&self) -> String {
        match &self.password {
            Some(pw) => format!("redis://:{}@{}:{}/{}", pw, self.host, self.port, self.db),
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// API 클라이언트 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// 기본 URL (후행 슬래시는 요청 시 정규화)
    pub base_url: String,
    /// 시도당 타임아웃 (초)
    pub timeout_secs: u64,
    /// 최대 시도 횟수 (1 = 재시도 없음)
    pub max_attempts: u32,
    /// 재시도 백오프 기본 간격 (밀리초)
    pub retry_backoff_base_ms: u64,
    /// 분당 요청 상한 (0 = 제한 없음)
    pub rate_limit_per_minute: u32,
    /// Bearer 인증 토큰 (있으면 `Authorization` 헤더로 전송)
    pub auth_token: Option<String>,
    /// API 키 (auth_token이 없을 때 `X-Api-Key` 헤더로 전송)
    pub api_key: Option<String>,
    /// TLS 인증서 검증 여부
    pub verify_ssl: bool,
}

impl Default for ApiConfig {
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
        }
    }
}

/// 컨테이너 오케스트레이션 설정
///
/// 단일 호스트 런타임과 클러스터 스케줄러 모두 동일한 백엔드 계약
/// 뒤에 있으므로, 두 경우의 연결 정보를 함께 담습니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Docker 소켓 경로
    pub docker_socket: String,
    /// kubeconfig 경로 (클러스터 백엔드 사용 시)
    pub kubeconfig: Option<String>,
    /// 네임스페이스
    pub namespace: String,
    /// 이미지 레지스트리
    pub registry_url: String,
    /// 이미지 풀 정책 (Always, IfNotPresent, Never)
    pub pull_policy: String,
    /// 컨테이너당 CPU 상한 (쿠버네티스 표기, 예: "500m")
    pub cpu_limit: String,
    /// 컨테이너당 메모리 상한 (쿠버네티스 표기, 예: "512Mi")
    pub memory_limit: String,
    /// 백엔드 호출 실패 시 최대 시도 횟수 (1 = 재시도 없음)
    pub retry_max_attempts: u32,
    /// 재시도 백오프 기본 간격 (밀리초)
    pub retry_backoff_base_ms: u64,
    /// 시도당 백엔드 호출 타임아웃 (초)
    pub action_timeout_secs: u64,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            docker_socket: "/var/run/docker.sock".to_owned(),
            kubeconfig: None,
            namespace: "default".to_owned(),
            registry_url: "docker.io".to_owned(),
            pull_policy: "IfNotPresent".to_owned(),
            cpu_limit: "500m".to_owned(),
            memory_limit: "512Mi".to_owned(),
            retry_max_attempts: 3,
            retry_backoff_base_ms: 500,
            action_timeout_secs: 30,
        }
    }
}

/// 모니터링/로깅 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 메트릭 수집 여부
    pub metrics_enabled: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "json".to_owned(),
            metrics_enabled: true,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_opt_string(target: &mut Option<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = Some(val);
    }
}

fn override_port(target: &mut u16, env_key: &str) -> Result<(), ConfigError> {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<u16>() {
            Ok(parsed) if parsed > 0 => *target = parsed,
            _ => {
                return Err(ConfigError::InvalidValue {
                    field: env_key.to_owned(),
                    reason: format!("'{val}' is not a valid port (1-65535)"),
                });
            }
        }
    }
    Ok(())
}
