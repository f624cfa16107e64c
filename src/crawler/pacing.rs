//! Randomized inter-request delays

use std::time::Duration;

use rand::Rng;

use crate::config::DelayRange;

/// Draw a delay uniformly from `range`
pub fn sample(range: DelayRange) -> Duration {
    let ms = if range.max_ms > range.min_ms {
        rand::thread_rng().gen_range(range.min_ms..=range.max_ms)
    } else {
        range.min_ms
    };
    Duration::from_millis(ms)
}

/// Sleep for a delay drawn from `range`
pub async fn pause(range: DelayRange, reason: &str) {
    let delay = sample(range);
    if delay.is_zero() {
        return;
    }
    tracing::debug!(reason, delay_ms = delay.as_millis() as u64, "Pacing");
    tokio::time::sleep(delay).await;
}
