#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`backend`]: 백엔드 능력 계약 (`StoreBackend`, `StoreOperation`, `StoreValue`)
//! - [`native`]: sqlx + redis 프로덕션 백엔드 (`NativeStoreBackend`)
//! - [`memory`]: 결정적 인메모리 백엔드 (`MemoryStoreBackend`)
//! - [`connection`]: 커넥션 라이프사이클 (`Connection`, `ConnectionState`)
//! - [`pool`]: 종류별 상한 풀 (`ConnectionPool`, `PooledConnection`)
//! - [`manager`]: 매니저 (`ConnectionManager`)
//! - [`config`]: 스토어 설정 (`StoreConfig`, 빌더)

pub mod backend;
pub mod config;
pub mod connection;
pub mod manager;
pub mod memory;
pub mod native;
pub mod pool;

pub use backend::{Row, StoreBackend, StoreKind, StoreOperation, StoreValue};
pub use config::{StoreConfig, StoreConfigBuilder};
pub use connection::{Connection, ConnectionState};
pub use manager::ConnectionManager;
pub use memory::{InjectedFailure, MemorySession, MemoryStoreBackend};
pub use native::{NativeSession, NativeStoreBackend};
pub use pool::{ConnectionPool, PooledConnection};
