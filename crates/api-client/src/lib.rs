#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`request`]: 요청/응답 타입 (`ApiRequest`, `ApiResponse`, `HttpMethod`)
//! - [`backend`]: HTTP 백엔드 계약 (`HttpBackend`, `ReqwestBackend`)
//! - [`limiter`]: 슬라이딩 윈도우 레이트 리미터 (`RateLimiter`)
//! - [`client`]: 클라이언트 (`ApiClient`)
//! - [`config`]: 클라이언트 설정 (`ApiClientConfig`, 빌더)

pub mod backend;
pub mod client;
pub mod config;
pub mod limiter;
pub mod request;

pub use backend::{HttpBackend, PreparedRequest, RawResponse, ReqwestBackend, TransportFailure};
pub use client::ApiClient;
pub use config::{ApiClientConfig, ApiClientConfigBuilder};
pub use limiter::RateLimiter;
pub use request::{ApiRequest, ApiResponse, HttpMethod};
