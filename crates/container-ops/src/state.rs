//! 컨테이너 상태 기계
//!
//! 전이는 식별자당 단조입니다: `created -> running -> stopped ->
//! removed` 순서에서 앞으로만 이동할 수 있습니다 (단계 건너뛰기는
//! 허용 — 예: 실행 중 컨테이너의 강제 제거). 예외는 `error`로,
//! 어느 상태에서든 도달 가능하고 `error`에서는 `removed`로만 나갈 수
//! 있습니다.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use drydock_core::error::ContainerError;

/// 컨테이너 관측 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerState {
    /// 등록됨, 아직 시작 전
    Created,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
    /// 제거됨 — 종결 상태
    Removed,
    /// 백엔드 불일치 등으로 오류 — `removed`로만 나갈 수 있음
    Error,
}

impl ContainerState {
    /// 고정 상태명을 반환합니다.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Stopped => "stopped",
            ContainerState::Removed => "removed",
            ContainerState::Error => "error",
        }
    }

    /// 단조 순서에서의 위치 (`Error`는 순서 밖)
    fn rank(self) -> Option<u8> {
        match self {
            ContainerState::Created => Some(0),
            ContainerState::Running => Some(1),
            ContainerState::Stopped => Some(2),
            ContainerState::Removed => Some(3),
            ContainerState::Error => None,
        }
    }

    /// `self`에서 `to`로의 전이가 허용되는지 반환합니다.
    pub fn can_transition(self, to: ContainerState) -> bool {
        match (self, to) {
            // error는 어느 상태에서든 도달 가능
            (_, ContainerState::Error) => true,
            // error에서는 removed만
            (ContainerState::Error, ContainerState::Removed) => true,
            (ContainerState::Error, _) => false,
            // 나머지는 단조 전진만
            (from, to) => match (from.rank(), to.rank()) {
                (Some(from_rank), Some(to_rank)) => to_rank > from_rank,
                _ => false,
            },
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 관리 중인 오케스트레이션 유닛 하나
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedContainer {
    /// 백엔드가 발급한 식별자
    pub id: String,
    /// 컨테이너 이름
    pub name: String,
    /// 이미지 참조
    pub image: String,
    /// 호출자가 의도한 상태
    pub desired: ContainerState,
    /// 마지막으로 관측된 상태
    pub observed: ContainerState,
    /// 마지막 전이 시각
    pub last_transition: SystemTime,
}

impl ManagedContainer {
    /// `created` 상태의 새 엔트리를 만듭니다.
    pub fn new(id: impl Into<String>, name: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: image.into(),
            desired: ContainerState::Created,
            observed: ContainerState::Created,
            last_transition: SystemTime::now(),
        }
    }

    /// 상태 기계 규칙에 따라 관측 상태를 전이합니다.
    ///
    /// 같은 상태로의 전이는 no-op 성공입니다 (멱등 연산 지원).
    pub fn transition(&mut self, to: ContainerState) -> Result<(), ContainerError> {
        if self.observed == to {
            return Ok(());
        }
        if !self.observed.can_transition(to) {
            return Err(ContainerError::InvalidTransition {
                id: self.id.clone(),
                from: self.observed.to_string(),
                to: to.to_string(),
            });
        }
        self.observed = to;
        self.last_transition = SystemTime::now();
        Ok(())
    }

    /// 백엔드가 보고한 상태를 무조건 반영합니다 (드리프트 조정).
    ///
    /// `transition`과 달리 단조 규칙을 묻지 않습니다 — 백엔드 관측이
    /// 진실입니다.
    pub fn reconcile(&mut self, observed: ContainerState) {
        if self.observed != observed {
            self.observed = observed;
            self.last_transition = SystemTime::now();
        }
    }
}

impl fmt::Display for ManagedContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) image={} observed={}",
            self.name,
            &self.id[..12.min(self.id.len())],
            self.image,
            self.observed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_transitions_are_allowed() {
        assert!(ContainerState::Created.can_transition(ContainerState::Running));
        assert!(ContainerState::Running.can_transition(ContainerState::Stopped));
        assert!(ContainerState::Stopped.can_transition(ContainerState::Removed));
        // 단계 건너뛰기도 전진이면 허용
        assert!(ContainerState::Created.can_transition(ContainerState::Removed));
        assert!(ContainerState::Running.can_transition(ContainerState::Removed));
    }

    #[test]
    fn backward_transitions_are_rejected() {
        assert!(!ContainerState::Running.can_transition(ContainerState::Created));
        assert!(!ContainerState::Stopped.can_transition(ContainerState::Running));
        assert!(!ContainerState::Removed.can_transition(ContainerState::Created));
        assert!(!ContainerState::Removed.can_transition(ContainerState::Running));
    }

    #[test]
    fn error_is_reachable_from_any_state() {
        for state in [
            ContainerState::Created,
            ContainerState::Running,
            ContainerState::Stopped,
            ContainerState::Removed,
            ContainerState::Error,
        ] {
            assert!(state.can_transition(ContainerState::Error));
        }
    }

    #[test]
    fn only_removed_is_reachable_from_error() {
        assert!(ContainerState::Error.can_transition(ContainerState::Removed));
        assert!(!ContainerState::Error.can_transition(ContainerState::Created));
        assert!(!ContainerState::Error.can_transition(ContainerState::Running));
        assert!(!ContainerState::Error.can_transition(ContainerState::Stopped));
    }

    #[test]
    fn new_container_is_created() {
        let container = ManagedContainer::new("abc123", "build-agent", "alpine:3.20");
        assert_eq!(container.observed, ContainerState::Created);
        assert_eq!(container.desired, ContainerState::Created);
    }

    #[test]
    fn transition_to_same_state_is_noop_success() {
        let mut container = ManagedContainer::new("abc123", "agent", "alpine:3.20");
        let before = container.last_transition;
        container.transition(ContainerState::Created).unwrap();
        assert_eq!(container.last_transition, before);
    }

    #[test]
    fn invalid_transition_carries_states() {
        let mut container = ManagedContainer::new("abc123", "agent", "alpine:3.20");
        container.transition(ContainerState::Running).unwrap();
        container.transition(ContainerState::Stopped).unwrap();
        let err = container.transition(ContainerState::Running).unwrap_err();
        match err {
            ContainerError::InvalidTransition { from, to, .. } => {
                assert_eq!(from, "stopped");
                assert_eq!(to, "running");
            }
            other => panic!("expected invalid transition, got {other:?}"),
        }
    }

    #[test]
    fn reconcile_accepts_any_observation() {
        let mut container = ManagedContainer::new("abc123", "agent", "alpine:3.20");
        container.transition(ContainerState::Running).unwrap();
        // 백엔드가 스스로 종료했다고 보고 — 드리프트 반영
        container.reconcile(ContainerState::Stopped);
        assert_eq!(container.observed, ContainerState::Stopped);
    }

    #[test]
    fn display_truncates_long_ids() {
        let container = ManagedContainer::new(
            "abc123def456abc123def456abc123def456",
            "agent",
            "alpine:3.20",
        );
        let display = container.to_string();
        assert!(display.contains("abc123def456"));
        assert!(!display.contains("abc123def456abc123def456"));
    }

    #[test]
    fn state_serialize_roundtrip() {
        let json = serde_json::to_string(&ContainerState::Running).unwrap();
        let parsed: ContainerState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ContainerState::Running);
    }
}
