//! 슬라이딩 윈도우 레이트 리미터
//!
//! 시도 단위로 적용됩니다: 윈도우 내 기록된 시도가 상한에 도달하면
//! 가장 오래된 기록이 만료될 때까지 대기합니다.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// 슬라이딩 윈도우 레이트 리미터
///
/// 윈도우당 최대 `max_requests`건을 허용합니다. 동시 호출에 안전하며,
/// 기록과 만료는 짧은 임계 구역 안에서만 수행됩니다.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// 새 리미터를 생성합니다. `max_requests`가 0이면 1로 올립니다.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    fn evict(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(front) = timestamps.front() {
            if now.duration_since(*front) >= window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// 슬롯이 비어 있으면 즉시 기록하고 true를 반환합니다.
    pub fn try_acquire(&self) -> bool {
        let mut timestamps = self.timestamps.lock().expect("rate limiter lock poisoned");
        let now = Instant::now();
        Self::evict(&mut timestamps, now, self.window);
        if timestamps.len() < self.max_requests {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }

    /// 다음 슬롯이 비기까지 남은 시간을 반환합니다.
    pub fn wait_time(&self) -> Duration {
        let mut timestamps = self.timestamps.lock().expect("rate limiter lock poisoned");
        let now = Instant::now();
        Self::evict(&mut timestamps, now, self.window);
        if timestamps.len() < self.max_requests {
            return Duration::ZERO;
        }
        timestamps
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(Duration::ZERO)
    }

    /// 슬롯이 빌 때까지 대기한 뒤 기록합니다.
    pub async fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }
            let wait = self.wait_time().max(Duration::from_millis(1));
            debug!(
                wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX),
                "rate limit reached, waiting for next slot"
            );
            tokio::time::sleep(wait).await;
        }
    }
}
