use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub(crate) const RATE_LIMIT_MAX_RETRIES: usize = 5;
pub(crate) const RATE_LIMIT_BASE_DELAY: Duration = Duration::from_secs(2);
pub(crate) const RATE_LIMIT_MAX_DELAY: Duration = Duration::from_secs(60);

/// 429 everywhere; DeepL also answers 529 under load and Ollama 503 while a
/// model is loading.
pub(crate) fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    if matches!(status.as_u16(), 503 | 529) {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("too many requests") || lower.contains("rate limit") || lower.contains("overloaded")
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    value.parse::<u64>().ok().map(Duration::from_secs)
}

/// Sleeps for `delay` (or the server's `retry-after`, when longer) and
/// returns the next delay.
pub(crate) async fn wait_with_backoff(
    backend: &str,
    attempt: usize,
    delay: Duration,
    retry_after: Option<Duration>,
) -> Duration {
    let wait = retry_after.map_or(delay, |hint| hint.max(delay));
    warn!(
        "{} rate limited; retrying in {:.1}s (attempt {}/{})",
        backend,
        wait.as_secs_f32(),
        attempt,
        RATE_LIMIT_MAX_RETRIES
    );
    sleep(wait).await;
    next_delay(delay)
}

pub(crate) fn next_delay(current: Duration) -> Duration {
    current
        .saturating_mul(2)
        .max(RATE_LIMIT_BASE_DELAY)
        .min(RATE_LIMIT_MAX_DELAY)
}
