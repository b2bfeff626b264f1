//! 플랫폼 조립 — 스냅샷 하나에서 세 매니저를 생성
//!
//! [`Platform`]은 검증된 설정 스냅샷과 주입된 백엔드로 스토어 매니저,
//! API 클라이언트, 컨테이너 매니저를 만듭니다. 스냅샷은 불변이고
//! 전역 상태가 없으므로, 독립적인 스냅샷으로 만든 플랫폼들은 병렬로
//! 실행해도 서로 간섭하지 않습니다.

use std::sync::Arc;

use tracing::info;

use drydock_api_client::{ApiClient, ApiClientConfig, HttpBackend, ReqwestBackend};
use drydock_container_ops::{
    ContainerBackend, ContainerManager, ContainerOpsConfig, DockerBackend,
};
use drydock_core::component::Component;
use drydock_core::config::PlatformConfig;
use drydock_core::error::{ContainerError, DrydockError};
use drydock_store::{ConnectionManager, NativeStoreBackend, StoreBackend, StoreConfig};

use crate::health::{ComponentHealth, PlatformHealth, aggregate_status};

/// 조립된 리소스 추상화 계층
pub struct Platform<S: StoreBackend, H: HttpBackend, C: ContainerBackend> {
    config: Arc<PlatformConfig>,
    store: ConnectionManager<S>,
    api: ApiClient<H>,
    containers: ContainerManager<C>,
}

impl<S: StoreBackend, H: HttpBackend, C: ContainerBackend> Platform<S, H, C> {
    /// 스냅샷과 주입된 백엔드로 플랫폼을 조립합니다.
    ///
    /// 각 컴포넌트는 스냅샷의 자기 섹션에서 파생된 설정을 받으며,
    /// 설정 검증 실패는 조립 시점에 표면화됩니다.
    pub fn from_snapshot(
        config: PlatformConfig,
        store_backend: S,
        http_backend: H,
        container_backend: C,
    ) -> Result<Self, DrydockError> {
        config.validate()?;

        let store = ConnectionManager::new(StoreConfig::from_core(&config), store_backend)?;
        let api = ApiClient::new(ApiClientConfig::from_core(&config.api), http_backend)?;
        let containers = ContainerManager::new(
            ContainerOpsConfig::from_core(&config.container),
            container_backend,
        )?;

        info!(
            database_pool = config.database.pool_size,
            cache_pool = config.redis.max_connections,
            api_base = config.api.base_url.as_str(),
            namespace = config.container.namespace.as_str(),
            "platform assembled from configuration snapshot"
        );

        Ok(Self {
            config: Arc::new(config),
            store,
            api,
            containers,
        })
    }

    /// 설정 스냅샷
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// 스토어 매니저
    pub fn store(&self) -> &ConnectionManager<S> {
        &self.store
    }

    /// API 클라이언트
    pub fn api(&self) -> &ApiClient<H> {
        &self.api
    }

    /// 컨테이너 매니저
    pub fn containers(&self) -> &ContainerManager<C> {
        &self.containers
    }

    /// 모든 컴포넌트의 헬스를 수집하고 worst-of 규칙으로 집계합니다.
    pub async fn health(&self) -> PlatformHealth {
        // store에는 커넥션 단위 헬스체크(inherent)가 따로 있으므로
        // trait 경로로 명시 호출
        let components = vec![
            ComponentHealth {
                name: self.store.name().to_owned(),
                status: Component::health_check(&self.store).await,
            },
            ComponentHealth {
                name: self.api.name().to_owned(),
                status: Component::health_check(&self.api).await,
            },
            ComponentHealth {
                name: self.containers.name().to_owned(),
                status: Component::health_check(&self.containers).await,
            },
        ];
        PlatformHealth {
            status: aggregate_status(&components),
            components,
        }
    }

    /// idle 스토어 커넥션을 닫습니다 (정상 종료 경로).
    pub async fn shutdown(&self) {
        self.store.shutdown().await;
        info!("platform shut down");
    }
}

impl Platform<NativeStoreBackend, ReqwestBackend, DockerBackend> {
    /// 프로덕션 백엔드(sqlx + redis, reqwest, bollard)로 플랫폼을
    /// 조립합니다.
    pub fn native(config: PlatformConfig) -> Result<Self, DrydockError> {
        let store_backend = NativeStoreBackend::from_config(&config.database, &config.redis);
        let http_backend = ReqwestBackend::new(config.api.verify_ssl)?;
        let container_backend = DockerBackend::connect_with_socket(&config.container.docker_socket)
            .map_err(|e| {
                DrydockError::Container(ContainerError::BackendUnavailable {
                    reason: e.to_string(),
                    attempts: 1,
                })
            })?;
        Self::from_snapshot(config, store_backend, http_backend, container_backend)
    }
}
