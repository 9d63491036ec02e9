//! 指数退避
//!
//! 状态回调的有限次重试与消费端的无限次重投共用同一套退避计算。
//! 是否值得重试由调用方判定（通常是 `is_retryable`），库存不足之类的业务结论从不重试。

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// 退避参数
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 首次执行之后最多再尝试的次数
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// 永不放弃的策略，只约束退避间隔
    pub fn unbounded(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries: u32::MAX,
            initial_delay,
            max_delay,
            multiplier: 2.0,
        }
    }

    /// 第 `attempt` 次失败（从 0 开始）之后的等待时间，不超过 `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let cap_ms = self.max_delay.as_millis() as f64;
        let grown_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt.min(63) as i32);

        Duration::from_millis(grown_ms.min(cap_ms) as u64)
    }

    /// 已失败 `attempt` 次后是否还能继续
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// 按策略执行异步操作
///
/// 返回最后一次的结果：成功、不可重试错误，或重试耗尽后的最后一个错误。
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut failures: u32 = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if failures > 0 {
                    debug!(operation = operation_name, failures, "重试后成功");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        let retryable = is_retryable(&err);
        if !retryable || !policy.should_retry(failures) {
            warn!(
                operation = operation_name,
                failures = failures + 1,
                retryable,
                error = %err,
                "放弃重试"
            );
            return Err(err);
        }

        let delay = policy.delay_for_attempt(failures);
        debug!(
            operation = operation_name,
            failures = failures + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "瞬时故障，退避后重试"
        );
        tokio::time::sleep(delay).await;
        failures += 1;
    }
}
