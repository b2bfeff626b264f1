//! 재시도 정책 — 지수 백오프 + 지터
//!
//! [`RetryPolicy`]는 store, api-client, container-ops가 공유하는
//! 단일 백오프 정책 객체입니다. 호출 지점마다 재시도 루프를 복제하는
//! 대신, 시도 예산과 기본 지연으로 파라미터화된 이 객체를 주입받아
//! 사용합니다.
//!
//! 분류는 정책이 아니라 호출자의 몫입니다. [`RetryPolicy::run`]은
//! transient 여부를 판정하는 클로저를 받아, transient 에러만 예산
//! 내에서 재시도하고 permanent 에러는 즉시 반환합니다.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// 지수 백오프 + 지터 재시도 정책
///
/// 지연 시간: `base_delay * multiplier^(attempt-1)`을 `max_delay`로
/// 상한한 뒤, `[0, jitter]` 비율의 무작위 지터를 더합니다.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 최대 시도 횟수 (1 = 재시도 없음)
    max_attempts: u32,
    /// 첫 재시도 전 기본 지연
    base_delay: Duration,
    /// 지연 상한
    max_delay: Duration,
    /// 지수 증가 배수
    multiplier: f64,
    /// 최대 지터 비율 (0.0 - 1.0)
    jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    /// 시도 예산과 기본 지연으로 정책을 생성합니다.
    ///
    /// `max_attempts`가 0이면 1로 올립니다 (모든 연산은 최소 한 번
    /// 시도됩니다).
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// 지연 상한을 설정합니다.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// 지수 배수를 설정합니다.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// 지터 비율을 설정합니다 (0.0 - 1.0 범위로 잘립니다).
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// 최대 시도 횟수를 반환합니다.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// `attempt`번째 시도 실패 후 다음 시도 전 지연을 계산합니다.
    ///
    /// `attempt`는 1부터 시작합니다. 지터가 0이면 결정적입니다.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(32);
        let raw_ms = self.base_delay.as_millis() as f64 * self.multiplier.powi(exp as i32);
        let capped_ms = raw_ms.min(self.max_delay.as_millis() as f64);

        let jittered_ms = if self.jitter > 0.0 {
            use rand::Rng;
            let factor = rand::thread_rng().gen_range(0.0..=self.jitter);
            capped_ms * (1.0 + factor)
        } else {
            capped_ms
        };

        Duration::from_millis(jittered_ms as u64)
    }

    /// 연산을 시도 예산 내에서 실행합니다.
    ///
    /// `op`은 현재 시도 번호(1부터)를 받아 future를 반환합니다.
    /// `is_transient`가 true를 반환하는 에러만 재시도하며, permanent
    /// 에러는 즉시 반환합니다. 반환값은 최종 결과와 실제 수행된 시도
    /// 횟수의 쌍입니다 (`attempts <= max_attempts` 불변식).
    pub async fn run<T, E, F, Fut>(
        &self,
        mut op: F,
        is_transient: impl Fn(&E) -> bool,
    ) -> (Result<T, E>, u32)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op(attempt).await {
                Ok(value) => return (Ok(value), attempt),
                Err(e) if attempt < self.max_attempts && is_transient(&e) => {
                    let delay = self.delay_for(attempt);
                    debug!(
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "transient failure, backing off before retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return (Err(e), attempt),
            }
        }
    }
}
