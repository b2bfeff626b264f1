#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`state`]: 상태 기계 (`ContainerState`, `ManagedContainer`)
//! - [`spec`]: 생성 스펙과 검증 (`ContainerSpec`, 리소스 수량 파싱)
//! - [`backend`]: 백엔드 계약 (`ContainerBackend`, `RuntimeStatus`)
//! - [`docker`]: bollard 기반 프로덕션 백엔드 (`DockerBackend`)
//! - [`manager`]: 매니저 (`ContainerManager`)
//! - [`config`]: 설정 (`ContainerOpsConfig`, 빌더)

pub mod backend;
pub mod config;
pub mod docker;
pub mod manager;
pub mod spec;
pub mod state;

pub use backend::{BackendFailure, ContainerBackend, RuntimeStatus};
pub use config::{ContainerOpsConfig, ContainerOpsConfigBuilder};
pub use docker::DockerBackend;
pub use manager::ContainerManager;
pub use spec::{ContainerSpec, parse_cpu, parse_memory, validate_image_reference};
pub use state::{ContainerState, ManagedContainer};
