#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`platform`]: 컴포넌트 조립 (`Platform`)
//! - [`logging`]: tracing 초기화 (`init_tracing`)
//! - [`health`]: 헬스 집계 (`PlatformHealth`, `aggregate_status`)

pub mod health;
pub mod logging;
pub mod platform;

pub use health::{ComponentHealth, PlatformHealth, aggregate_status};
pub use logging::init_tracing;
pub use platform::Platform;
