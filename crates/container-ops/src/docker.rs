//! Docker 백엔드 — bollard 기반 [`ContainerBackend`] 구현
//!
//! Unix 소켓 또는 TCP로 Docker 데몬과 통신합니다. 에러 분류:
//!
//! - **404**: [`BackendFailure::NotFound`]
//! - **그 외 4xx**: [`BackendFailure::Api`] (permanent)
//! - **5xx / 연결 실패**: [`BackendFailure::Unavailable`] (transient)

use std::sync::Arc;

use tracing::debug;

use crate::backend::{BackendFailure, ContainerBackend, RuntimeStatus};
use crate::spec::{ContainerSpec, parse_cpu, parse_memory};
use crate::state::ContainerState;

/// 컨테이너 ID를 검증하여 주입 공격을 방지합니다.
///
/// Docker 컨테이너 ID는 64자 16진수 문자열(또는 그 접두어)입니다.
fn validate_container_id(id: &str) -> Result<(), BackendFailure> {
    if id.is_empty() || id.len() > 64 {
        return Err(BackendFailure::Api(format!(
            "invalid container ID: length {} (must be 1-64)",
            id.len()
        )));
    }
    if !id.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(BackendFailure::Api(
            "invalid container ID: contains non-hex characters".to_owned(),
        ));
    }
    Ok(())
}

/// bollard 에러를 백엔드 실패로 분류합니다.
fn classify_bollard(id: &str, e: bollard::errors::Error) -> BackendFailure {
    match e {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => BackendFailure::NotFound(id.to_owned()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if status_code < 500 => BackendFailure::Api(format!("{status_code}: {message}")),
        // 5xx와 연결 수준 실패는 재시도 대상
        other => BackendFailure::Unavailable(other.to_string()),
    }
}

/// bollard 기반 프로덕션 Docker 백엔드
///
/// 내부적으로 `Arc<bollard::Docker>`를 사용하여 비동기 태스크 간
/// 안전하게 공유됩니다.
pub struct DockerBackend {
    docker: Arc<bollard::Docker>,
}

impl DockerBackend {
    /// 플랫폼 기본 로컬 소켓으로 연결합니다.
    pub fn connect_local() -> Result<Self, BackendFailure> {
        let docker = bollard::Docker::connect_with_local_defaults().map_err(|e| {
            BackendFailure::Unavailable(format!("failed to connect to docker: {e}"))
        })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }

    /// 지정한 소켓 경로로 연결합니다.
    pub fn connect_with_socket(socket_path: &str) -> Result<Self, BackendFailure> {
        let docker =
            bollard::Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| {
                    BackendFailure::Unavailable(format!(
                        "failed to connect to docker at {socket_path}: {e}"
                    ))
                })?;
        Ok(Self {
            docker: Arc::new(docker),
        })
    }
}

/// bollard 상태 문자열을 상태 기계 값으로 변환합니다.
fn map_runtime_state(status: &str) -> ContainerState {
    match status {
        "created" => ContainerState::Created,
        "running" | "restarting" | "paused" => ContainerState::Running,
        "exited" | "dead" | "removing" => ContainerState::Stopped,
        _ => ContainerState::Error,
    }
}

impl ContainerBackend for DockerBackend {
    async fn create(&self, spec: &ContainerSpec) -> Result<String, BackendFailure> {
        use bollard::container::{Config, CreateContainerOptions};
        use bollard::models::HostConfig;

        let env: Vec<String> = spec
            .env
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();

        let host_config = HostConfig {
            nano_cpus: match &spec.cpu {
                Some(cpu) => Some(
                    i64::try_from(parse_cpu(cpu).map_err(|e| BackendFailure::Api(e.to_string()))?)
                        .unwrap_or(i64::MAX)
                        .saturating_mul(1_000_000),
                ),
                None => None,
            },
            memory: match &spec.memory {
                Some(memory) => Some(
                    i64::try_from(
                        parse_memory(memory).map_err(|e| BackendFailure::Api(e.to_string()))?,
                    )
                    .unwrap_or(i64::MAX),
                ),
                None => None,
            },
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            cmd: (!spec.command.is_empty()).then(|| spec.command.clone()),
            env: (!env.is_empty()).then_some(env),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptions {
            name: spec.name.clone(),
            platform: None,
        };

        let response = self
            .docker
            .create_container(Some(options), config)
            .await
            .map_err(|e| classify_bollard(&spec.name, e))?;

        debug!(id = response.id.as_str(), name = spec.name.as_str(), "container created");
        Ok(response.id)
    }

    async fn start(&self, id: &str) -> Result<(), BackendFailure> {
        use bollard::container::StartContainerOptions;

        validate_container_id(id)?;
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
            .map_err(|e| classify_bollard(id, e))
    }

    async fn stop(&self, id: &str) -> Result<(), BackendFailure> {
        use bollard::container::StopContainerOptions;

        validate_container_id(id)?;
        // SIGTERM 후 10초 유예, 그 다음 SIGKILL
        self.docker
            .stop_container(id, Some(StopContainerOptions { t: 10 }))
            .await
            .map_err(|e| classify_bollard(id, e))
    }

    async fn remove(&self, id: &str) -> Result<(), BackendFailure> {
        use bollard::container::RemoveContainerOptions;

        validate_container_id(id)?;
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| classify_bollard(id, e))
    }

    async fn inspect(&self, id: &str) -> Result<RuntimeStatus, BackendFailure> {
        validate_container_id(id)?;

        let details = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| classify_bollard(id, e))?;

        let (state, exit_code) = match details.state {
            Some(state) => {
                let status = state
                    .status
                    .map(|s| format!("{s:?}").to_lowercase())
                    .unwrap_or_else(|| "unknown".to_owned());
                (map_runtime_state(&status), state.exit_code)
            }
            None => (ContainerState::Error, None),
        };

        Ok(RuntimeStatus { state, exit_code })
    }

    async fn ping(&self) -> Result<(), BackendFailure> {
        self.docker
            .ping()
            .await
            .map_err(|e| BackendFailure::Unavailable(format!("ping failed: {e}")))?;
        Ok(())
    }
}
