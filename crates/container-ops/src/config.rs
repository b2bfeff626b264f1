//! 컨테이너 관리 설정
//!
//! [`ContainerOpsConfig`]는 플랫폼 스냅샷의 `container` 섹션에서
//! 파생됩니다.

use serde::{Deserialize, Serialize};

use drydock_core::RetryPolicy;
use drydock_core::config::ContainerConfig;
use drydock_core::error::ContainerError;

/// 설정 상한값 상수
const MAX_RETRY_ATTEMPTS: u32 = 10;
const MAX_RETRY_BACKOFF_BASE_MS: u64 = 30_000;
const MAX_ACTION_TIMEOUT_SECS: u64 = 300;

/// 컨테이너 관리 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerOpsConfig {
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
    /// 컨테이너당 CPU 상한 (쿠버네티스 표기)
    pub cpu_limit: String,
    /// 컨테이너당 메모리 상한 (쿠버네티스 표기)
    pub memory_limit: String,
    /// 백엔드 호출 최대 시도 횟수 (1 = 재시도 없음)
    pub retry_max_attempts: u32,
    /// 재시도 백오프 기본 간격 (밀리초)
    pub retry_backoff_base_ms: u64,
    /// 시도당 백엔드 호출 타임아웃 (초)
    pub action_timeout_secs: u64,
}

impl Default for ContainerOpsConfig {
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

impl ContainerOpsConfig {
    /// 플랫폼 스냅샷의 `container` 섹션에서 설정을 생성합니다.
    pub fn from_core(container: &ContainerConfig) -> Self {
        Self {
            docker_socket: container.docker_socket.clone(),
            kubeconfig: container.kubeconfig.clone(),
            namespace: container.namespace.clone(),
            registry_url: container.registry_url.clone(),
            pull_policy: container.pull_policy.clone(),
            cpu_limit: container.cpu_limit.clone(),
            memory_limit: container.memory_limit.clone(),
            retry_max_attempts: container.retry_max_attempts,
            retry_backoff_base_ms: container.retry_backoff_base_ms,
            action_timeout_secs: container.action_timeout_secs,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ContainerError> {
        if self.docker_socket.is_empty() {
            return Err(ContainerError::Config {
                field: "docker_socket".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.namespace.is_empty() {
            return Err(ContainerError::Config {
                field: "namespace".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        let valid_policies = ["Always", "IfNotPresent", "Never"];
        if !valid_policies.contains(&self.pull_policy.as_str()) {
            return Err(ContainerError::Config {
                field: "pull_policy".to_owned(),
                reason: format!("must be one of: {}", valid_policies.join(", ")),
            });
        }

        // 리소스 상한은 파싱 가능해야 함
        crate::spec::parse_cpu(&self.cpu_limit).map_err(|_| ContainerError::Config {
            field: "cpu_limit".to_owned(),
            reason: format!("'{}' is not a valid cpu quantity", self.cpu_limit),
        })?;
        crate::spec::parse_memory(&self.memory_limit).map_err(|_| ContainerError::Config {
            field: "memory_limit".to_owned(),
            reason: format!("'{}' is not a valid memory quantity", self.memory_limit),
        })?;

        if self.retry_max_attempts == 0 || self.retry_max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ContainerError::Config {
                field: "retry_max_attempts".to_owned(),
                reason: format!("must be 1-{MAX_RETRY_ATTEMPTS}"),
            });
        }

        if self.retry_backoff_base_ms > MAX_RETRY_BACKOFF_BASE_MS {
            return Err(ContainerError::Config {
                field: "retry_backoff_base_ms".to_owned(),
                reason: format!("must be 0-{MAX_RETRY_BACKOFF_BASE_MS}"),
            });
        }

        if self.action_timeout_secs == 0 || self.action_timeout_secs > MAX_ACTION_TIMEOUT_SECS {
            return Err(ContainerError::Config {
                field: "action_timeout_secs".to_owned(),
                reason: format!("must be 1-{MAX_ACTION_TIMEOUT_SECS}"),
            });
        }

        Ok(())
    }

    /// 이 설정의 재시도 정책을 만듭니다.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            std::time::Duration::from_millis(self.retry_backoff_base_ms),
        )
    }

    /// 시도당 백엔드 호출 타임아웃
    pub fn action_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.action_timeout_secs)
    }
}

/// 컨테이너 관리 설정 빌더
#[derive(Default)]
pub struct ContainerOpsConfigBuilder {
    config: ContainerOpsConfig,
}

impl ContainerOpsConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// Docker 소켓 경로를 설정합니다.
    pub fn docker_socket(mut self, socket: impl Into<String>) -> Self {
        self.config.docker_socket = socket.into();
        self
    }

    /// 네임스페이스를 설정합니다.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    /// CPU 상한을 설정합니다.
    pub fn cpu_limit(mut self, limit: impl Into<String>) -> Self {
        self.config.cpu_limit = limit.into();
        self
    }

    /// 메모리 상한을 설정합니다.
    pub fn memory_limit(mut self, limit: impl Into<String>) -> Self {
        self.config.memory_limit = limit.into();
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

    /// 시도당 백엔드 호출 타임아웃(초)을 설정합니다.
    pub fn action_timeout_secs(mut self, secs: u64) -> Self {
        self.config.action_timeout_secs = secs;
        self
    }

    /// 설정을 검증하고 `ContainerOpsConfig`를 생성합니다.
    pub fn build(self) -> Result<ContainerOpsConfig, ContainerError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ContainerOpsConfig::default().validate().unwrap();
    }

    #[test]
    fn from_core_preserves_values() {
        let core = ContainerConfig {
            docker_socket: "/run/docker.sock".to_owned(),
            kubeconfig: Some("/home/ci/.kube/config".to_owned()),
            namespace: "ci-jobs".to_owned(),
            registry_url: "registry.internal".to_owned(),
            pull_policy: "Always".to_owned(),
            cpu_limit: "2000m".to_owned(),
            memory_limit: "2Gi".to_owned(),
            retry_max_attempts: 5,
            retry_backoff_base_ms: 100,
            action_timeout_secs: 60,
        };
        let config = ContainerOpsConfig::from_core(&core);
        assert_eq!(config.docker_socket, "/run/docker.sock");
        assert_eq!(config.namespace, "ci-jobs");
        assert_eq!(config.cpu_limit, "2000m");
        assert_eq!(config.retry_max_attempts, 5);
        config.validate().unwrap();
    }

    #[test]
    fn validate_rejects_empty_socket() {
        let config = ContainerOpsConfig {
            docker_socket: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_pull_policy() {
        let config = ContainerOpsConfig {
            pull_policy: "Sometimes".to_owned(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unparseable_limits() {
        let config = ContainerOpsConfig {
            cpu_limit: "fast".to_owned(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ContainerOpsConfig {
            memory_limit: "lots".to_owned(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_retry_attempts() {
        let config = ContainerOpsConfig {
            retry_max_attempts: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_action_timeout() {
        let config = ContainerOpsConfig {
            action_timeout_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn builder_creates_valid_config() {
        let config = ContainerOpsConfigBuilder::new()
            .namespace("ci")
            .cpu_limit("1")
            .memory_limit("1Gi")
            .retry_max_attempts(2)
            .retry_backoff_base_ms(50)
            .action_timeout_secs(10)
            .build()
            .unwrap();
        assert_eq!(config.namespace, "ci");
        assert_eq!(config.cpu_limit, "1");
        assert_eq!(config.retry_max_attempts, 2);
    }

    #[test]
    fn builder_rejects_invalid_config() {
        let result = ContainerOpsConfigBuilder::new().cpu_limit("fast").build();
        assert!(result.is_err());
    }

    #[test]
    fn retry_policy_uses_configured_budget() {
        let config = ContainerOpsConfig {
            retry_max_attempts: 7,
            ..Default::default()
        };
        assert_eq!(config.retry_policy().max_attempts(), 7);
    }
}
