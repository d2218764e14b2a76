//! Retry classification and backoff

use std::time::Duration;

use http::HeaderMap;
use rand::Rng;
use switchboard_config::RetryConfig;

use crate::error::ClassifiedError;

/// Whether a failed attempt may be repeated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Try again after a backoff delay
    Retryable,
    /// Surface the failure
    Fatal,
}

/// Bounded exponential backoff with jitter
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: f64,
}

impl RetryPolicy {
    /// Build from validated configuration
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_delay: config.initial_delay,
            max_delay: config.max_delay,
            multiplier: config.multiplier.max(1.0),
            jitter: config.jitter.clamp(0.0, 1.0),
        }
    }

    /// Total attempts allowed, including the first
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Classify a failure
    pub const fn classify(error: &ClassifiedError) -> Disposition {
        if error.code.is_retryable() {
            Disposition::Retryable
        } else {
            Disposition::Fatal
        }
    }

    /// Whether another attempt may follow `attempts_made` attempts
    pub const fn allows_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Delay before retry number `retry` (0-based), without jitter
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let seconds = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(seconds).map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Delay before retry number `retry` (0-based), with jitter
    ///
    /// Jitter only ever adds to the base delay and the configured multiplier
    /// is at least `1 + jitter`, so delays never shrink as `retry` grows.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let base = self.base_delay(retry);
        if self.jitter <= 0.0 {
            return base;
        }
        let factor = 1.0 + rand::rng().random_range(0.0..=self.jitter);
        base.mul_f64(factor).min(self.max_delay)
    }

    /// Delay before retrying `error`, honoring any server hint
    pub fn delay_for(&self, error: &ClassifiedError, retry: u32) -> Duration {
        let backoff = self.backoff_delay(retry);
        error.retry_after.map_or(backoff, |hint| hint.max(backoff))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::from_config(config)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Server retry hint from response headers
///
/// Reads `retry-after-ms`, then `retry-after` as seconds or an HTTP date.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(ms) = header_str(headers, "retry-after-ms").and_then(|value| value.parse::<f64>().ok()) {
        return Duration::try_from_secs_f64(ms / 1000.0).ok();
    }

    let value = header_str(headers, "retry-after")?;
    if let Ok(seconds) = value.parse::<f64>() {
        return Duration::try_from_secs_f64(seconds).ok();
    }

    let at = jiff::fmt::rfc2822::parse(value).ok()?;
    let wait = jiff::Timestamp::now().duration_until(at.timestamp());
    // Dates in the past mean "now"
    Some(Duration::try_from(wait).unwrap_or(Duration::ZERO))
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok().map(str::trim)
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;
    use crate::error::ErrorCode;

    fn policy(jitter: f64) -> RetryPolicy {
        RetryPolicy::from_config(&RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
            jitter,
        })
    }

    #[test]
    fn base_delay_grows_and_caps() {
        let policy = policy(0.0);
        assert_eq!(policy.base_delay(0), Duration::from_secs(1));
        assert_eq!(policy.base_delay(1), Duration::from_secs(2));
        assert_eq!(policy.base_delay(4), Duration::from_secs(16));
        assert_eq!(policy.base_delay(5), Duration::from_secs(30));
        assert_eq!(policy.base_delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn backoff_is_non_decreasing_with_jitter() {
        let policy = policy(0.2);
        for _ in 0..200 {
            let delays: Vec<Duration> = (0..12).map(|n| policy.backoff_delay(n)).collect();
            for pair in delays.windows(2) {
                assert!(pair[0] <= pair[1], "{:?} > {:?}", pair[0], pair[1]);
            }
            assert!(delays.iter().all(|delay| *delay <= Duration::from_secs(30)));
        }
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = policy(0.2);
        for _ in 0..200 {
            let delay = policy.backoff_delay(1);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_millis(2400));
        }
    }

    #[test]
    fn classification_follows_error_code() {
        for code in [ErrorCode::Network, ErrorCode::RateLimited, ErrorCode::ServerError] {
            assert_eq!(RetryPolicy::classify(&ClassifiedError::new(code, "x")), Disposition::Retryable);
        }
        for code in [
            ErrorCode::Authentication,
            ErrorCode::InvalidRequest,
            ErrorCode::Configuration,
            ErrorCode::MalformedResponse,
            ErrorCode::DepthExceeded,
            ErrorCode::CircuitOpen,
        ] {
            assert_eq!(RetryPolicy::classify(&ClassifiedError::new(code, "x")), Disposition::Fatal);
        }
    }

    #[test]
    fn attempts_are_capped() {
        let policy = policy(0.0);
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(2));
        assert!(!policy.allows_retry(3));
    }

    #[test]
    fn rate_limit_hint_sets_a_floor() {
        let policy = policy(0.2);
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("2"));

        let mut error = ClassifiedError::new(ErrorCode::RateLimited, "429");
        error.retry_after = retry_after(&headers);

        assert_eq!(error.retry_after, Some(Duration::from_secs(2)));
        assert!(policy.delay_for(&error, 0) >= Duration::from_secs(2));
    }

    #[test]
    fn hint_longer_than_cap_is_honored() {
        let policy = policy(0.0);
        let mut error = ClassifiedError::new(ErrorCode::RateLimited, "429");
        error.retry_after = Some(Duration::from_secs(60));
        assert_eq!(policy.delay_for(&error, 0), Duration::from_secs(60));
    }

    #[test]
    fn retry_after_formats() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after-ms", HeaderValue::from_static("1500"));
        headers.insert("retry-after", HeaderValue::from_static("9"));
        assert_eq!(retry_after(&headers), Some(Duration::from_millis(1500)));

        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("0.5"));
        assert_eq!(retry_after(&headers), Some(Duration::from_millis(500)));

        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("soon"));
        assert_eq!(retry_after(&headers), None);

        assert_eq!(retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn retry_after_http_date() {
        let at = jiff::Timestamp::now() + jiff::SignedDuration::from_secs(120);
        let formatted = jiff::fmt::rfc2822::to_string(&at.to_zoned(jiff::tz::TimeZone::UTC)).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_str(&formatted).unwrap());

        let wait = retry_after(&headers).unwrap();
        assert!(wait > Duration::from_secs(100) && wait <= Duration::from_secs(120));

        let past = jiff::fmt::rfc2822::to_string(&jiff::Timestamp::UNIX_EPOCH.to_zoned(jiff::tz::TimeZone::UTC)).unwrap();
        headers.insert("retry-after", HeaderValue::from_str(&past).unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::ZERO));
    }
}
