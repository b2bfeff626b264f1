//! 에러 타입 — 도메인별 에러 정의
//!
//! 전파 정책: transient 계열(`StoreError::Transient`,
//! `StoreError::PoolExhausted`, `ApiError::Transport` 이전 단계,
//! `ContainerError::BackendUnavailable`)은 설정된 횟수까지 내부에서
//! 재시도한 뒤 표면화되고, permanent/validation 계열은 첫 발생 시
//! 즉시 표면화됩니다. 어떤 연산도 실패를 조용히 삼키지 않습니다.

/// Drydock 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DrydockError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 데이터베이스/캐시 스토어 에러
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// API 클라이언트 에러
    #[error("api error: {0}")]
    Api(#[from] ApiError),

    /// 컨테이너 관리 에러
    #[error("container error: {0}")]
    Container(#[from] ContainerError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
///
/// 모두 fatal — 재시도 대상이 아니며 즉시 표면화됩니다.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 모든 레이어 병합 후에도 필수 키가 비어 있음
    #[error("missing required config key: {key}")]
    MissingKey { key: String },

    /// 유효하지 않은 설정 값 (타입 강제 변환 실패 포함)
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 데이터베이스/캐시 스토어 에러
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 풀이 가득 차 획득 타임아웃 내에 커넥션을 얻지 못함
    ///
    /// Transient — 호출자가 작업 단위 전체를 재시도할 수 있습니다.
    #[error("connection pool exhausted for {kind} (waited {waited_ms}ms)")]
    PoolExhausted { kind: String, waited_ms: u64 },

    /// 일시적 실패 (네트워크 리셋, 타임아웃)
    ///
    /// 내부 재시도 예산을 소진한 뒤 표면화됩니다.
    #[error("transient store failure after {attempts} attempt(s): {reason}")]
    Transient { reason: String, attempts: u32 },

    /// 영구적 실패 (제약 조건 위반, 잘못된 쿼리)
    ///
    /// 재시도 없이 첫 발생 시 표면화됩니다.
    #[error("permanent store failure: {reason}")]
    Permanent { reason: String },

    /// 닫힌 커넥션/매니저에 대한 작업
    #[error("store connection closed")]
    Closed,

    /// 스토어 설정 에러
    #[error("store config error: {field}: {reason}")]
    Config { field: String, reason: String },
}

impl StoreError {
    /// 재시도 대상 여부를 반환합니다.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::Transient { .. } | StoreError::PoolExhausted { .. }
        )
    }
}

/// API 클라이언트 에러
///
/// 일반적인 HTTP 에러 상태(4xx/5xx)는 에러가 아니라 응답 데이터입니다.
/// 이 enum은 전송 계층 실패와 요청/응답 자체의 결함만 다룹니다.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 재시도 예산 소진 후에도 연결을 수립하지 못함
    #[error("transport failure after {attempts} attempt(s): {reason}")]
    Transport { reason: String, attempts: u32 },

    /// 응답 본문을 읽을 수 없음 — 재시도 대상 아님
    #[error("malformed response body: {reason}")]
    MalformedResponse { reason: String },

    /// 전송 전에 거부된 요청 (잘못된 URL 등)
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// API 클라이언트 설정 에러
    #[error("api config error: {field}: {reason}")]
    Config { field: String, reason: String },
}

/// 컨테이너 관리 에러
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// 컨테이너 스펙 검증 실패 — fatal, 재시도 없음
    #[error("invalid container spec: {field}: {reason}")]
    InvalidSpec { field: String, reason: String },

    /// 식별자를 찾을 수 없음 — permanent, 해당 엔트리는 error 상태로 전이
    #[error("container not found: {0}")]
    NotFound(String),

    /// 백엔드에 연결할 수 없음 — transient, 내부 재시도 후 표면화
    #[error("container backend unavailable after {attempts} attempt(s): {reason}")]
    BackendUnavailable { reason: String, attempts: u32 },

    /// 상태 기계가 허용하지 않는 전이
    #[error("invalid transition for container '{id}': {from} -> {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    /// 백엔드 API 에러 — permanent
    #[error("container backend error: {0}")]
    Backend(String),

    /// 컨테이너 관리 설정 에러
    #[error("container config error: {field}: {reason}")]
    Config { field: String, reason: String },
}
