//! Expiry Policy
//!
//! Decides whether an access token must be refreshed before use.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::types::DEFAULT_EXPIRY_BUFFER;

/// Returns true iff `now + buffer >= expires_at`.
///
/// A buffer too large to add to `now` counts as expiring.
pub fn is_expiring_soon(expires_at: DateTime<Utc>, now: DateTime<Utc>, buffer: Duration) -> bool {
    match chrono::Duration::from_std(buffer)
        .ok()
        .and_then(|buffer| now.checked_add_signed(buffer))
    {
        Some(deadline) => deadline >= expires_at,
        None => true,
    }
}

/// Staleness policy with a fixed safety buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    buffer: Duration,
}

impl ExpiryPolicy {
    pub fn new(buffer: Duration) -> Self {
        Self { buffer }
    }

    pub fn buffer(&self) -> Duration {
        self.buffer
    }

    /// See [`is_expiring_soon`].
    pub fn is_expiring_soon(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        is_expiring_soon(expires_at, now, self.buffer)
    }

    /// Time left before `expires_at`, zero once it has passed.
    pub fn remaining(&self, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        (expires_at - now).to_std().unwrap_or(Duration::ZERO)
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRY_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const FIVE_MINUTES: Duration = Duration::from_secs(300);

    #[test]
    fn test_boundary_is_expiring() {
        let now = Utc::now();
        let expires_at = now + ChronoDuration::seconds(300);
        assert!(is_expiring_soon(expires_at, now, FIVE_MINUTES));
    }

    #[test]
    fn test_just_outside_buffer_is_not_expiring() {
        let now = Utc::now();
        let expires_at = now + ChronoDuration::seconds(300) + ChronoDuration::milliseconds(1);
        assert!(!is_expiring_soon(expires_at, now, FIVE_MINUTES));
    }

    #[test]
    fn test_property_over_offsets() {
        let now = Utc::now();
        for offset in (-7200i64..=7200).step_by(37) {
            let expires_at = now + ChronoDuration::seconds(offset);
            assert_eq!(
                is_expiring_soon(expires_at, now, FIVE_MINUTES),
                offset <= 300,
                "offset {}",
                offset
            );
        }
    }

    #[test]
    fn test_already_expired() {
        let now = Utc::now();
        assert!(is_expiring_soon(
            now - ChronoDuration::seconds(10),
            now,
            Duration::ZERO
        ));
    }

    #[test]
    fn test_zero_buffer_at_expiry() {
        let now = Utc::now();
        assert!(is_expiring_soon(now, now, Duration::ZERO));
        assert!(!is_expiring_soon(
            now + ChronoDuration::seconds(1),
            now,
            Duration::ZERO
        ));
    }

    #[test]
    fn test_overflowing_buffer_counts_as_expiring() {
        let now = Utc::now();
        let far_future = now + ChronoDuration::days(365 * 100);
        assert!(is_expiring_soon(far_future, now, Duration::MAX));
    }

    #[test]
    fn test_policy_defaults_and_remaining() {
        let policy = ExpiryPolicy::default();
        assert_eq!(policy.buffer(), FIVE_MINUTES);

        let now = Utc::now();
        let expires_at = now + ChronoDuration::hours(1);
        assert!(!policy.is_expiring_soon(expires_at, now));
        assert_eq!(policy.remaining(expires_at, now), Duration::from_secs(3600));
        assert_eq!(
            policy.remaining(now - ChronoDuration::seconds(5), now),
            Duration::ZERO
        );
    }
}
