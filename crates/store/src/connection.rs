//! 커넥션 라이프사이클 — 풀이 소유하는 커넥션 핸들

use std::fmt;
use std::time::{Instant, SystemTime};

use uuid::Uuid;

use crate::backend::StoreKind;

/// 커넥션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// 풀에서 대기 중
    Idle,
    /// 호출자가 빌려서 사용 중
    Active,
    /// 정상 종료됨
    Closed,
    /// 헬스체크/작업 실패로 오염됨 — 반환 시 폐기 대상
    Broken,
}

impl ConnectionState {
    /// 고정 상태명을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Active => "active",
            ConnectionState::Closed => "closed",
            ConnectionState::Broken => "broken",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 풀이 소유하는 커넥션
///
/// 백엔드 세션과 메타데이터(식별자, 상태, 생성/사용 시각)를 함께
/// 담습니다. 호출자는 풀에서 빌린 가드를 통해서만 접근합니다.
pub struct Connection<S> {
    id: Uuid,
    kind: StoreKind,
    state: ConnectionState,
    created_at: SystemTime,
    last_used: Instant,
    session: S,
}

impl<S> Connection<S> {
    /// 새로 연결된 세션을 감싸 Active 상태의 커넥션을 만듭니다.
    pub(crate) fn new(kind: StoreKind, session: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            state: ConnectionState::Active,
            created_at: SystemTime::now(),
            last_used: Instant::now(),
            session,
        }
    }

    /// 커넥션 식별자
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// 스토어 종류
    pub fn kind(&self) -> StoreKind {
        self.kind
    }

    /// 현재 상태
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// 생성 시각
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// 마지막 사용 후 경과 시간
    pub fn idle_for(&self) -> std::time::Duration {
        self.last_used.elapsed()
    }

    /// 마지막 사용 시각을 갱신합니다.
    pub(crate) fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    /// 커넥션을 broken으로 표시합니다. 반환 시 폐기됩니다.
    pub fn mark_broken(&mut self) {
        self.state = ConnectionState::Broken;
    }

    pub(crate) fn set_state(&mut self, state: ConnectionState) {
        self.state = state;
    }

    /// 백엔드 세션에 대한 가변 참조
    pub(crate) fn session_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// 세션 소유권을 꺼냅니다 (명시적 종료 경로).
    pub(crate) fn into_session(self) -> S {
        self.session
    }
}

impl<S> fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
