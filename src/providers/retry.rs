use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Exponential backoff for throttled API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn allows_retry(&self, attempt: usize) -> bool {
        attempt < self.max_attempts
    }

    pub fn next_delay(&self, current: Duration) -> Duration {
        current
            .saturating_mul(2)
            .max(self.base_delay)
            .min(self.max_delay)
    }

    /// Sleeps for the backoff delay, or longer if the server asked for it,
    /// and returns the delay to use next time.
    pub async fn wait(
        &self,
        service: &str,
        attempt: usize,
        delay: Duration,
        retry_after: Option<Duration>,
    ) -> Duration {
        let wait = match retry_after {
            Some(requested) if requested > delay => requested.min(self.max_delay),
            _ => delay,
        };
        warn!(
            "{} rate limited; retrying in {:.1}s (attempt {}/{})",
            service,
            wait.as_secs_f32(),
            attempt,
            self.max_attempts
        );
        sleep(wait).await;
        self.next_delay(delay)
    }
}

pub(crate) fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("overloaded")
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    let secs = value.parse::<f64>().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn delay_doubles_up_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(Duration::ZERO), Duration::from_secs(2));
        assert_eq!(policy.next_delay(Duration::from_secs(2)), Duration::from_secs(4));
        assert_eq!(policy.next_delay(Duration::from_secs(40)), Duration::from_secs(60));
    }

    #[test]
    fn recognizes_throttling() {
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, ""));
        assert!(is_rate_limited(StatusCode::BAD_REQUEST, "Rate limit reached"));
        assert!(!is_rate_limited(StatusCode::UNAUTHORIZED, "invalid api key"));
    }

    #[test]
    fn parses_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);
        headers.insert("retry-after", HeaderValue::from_static("1.5"));
        assert_eq!(retry_after(&headers), Some(Duration::from_millis(1500)));
        headers.insert("retry-after", HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn out_of_range_retry_after_is_ignored() {
        let mut headers = HeaderMap::new();
        for value in ["1e20", "-3", "inf", "NaN"] {
            headers.insert("retry-after", HeaderValue::from_static(value));
            assert_eq!(retry_after(&headers), None, "{value}");
        }
    }

    #[test]
    fn attempts_are_bounded() {
        let policy = RetryPolicy::default();
        assert!(policy.allows_retry(4));
        assert!(!policy.allows_retry(5));
    }
}
