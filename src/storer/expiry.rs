//! Expiry policy shared by the in-process storers.

use std::time::{Duration, SystemTime};

use crate::error::OverseerError;
use crate::Result;

/// Default session lifetime: two days.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(2 * 24 * 60 * 60);

/// Default sweep interval: one hour.
pub const DEFAULT_CLEAN_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Longest accepted max-age: one hundred years.
pub const MAX_AGE_LIMIT: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Reject a max-age too large to turn into an absolute expiry.
pub(crate) fn check_max_age(what: &str, max_age: Duration) -> Result<()> {
    if max_age > MAX_AGE_LIMIT {
        return Err(OverseerError::Config(format!(
            "{what} max age ({max_age:?}) exceeds the limit of {MAX_AGE_LIMIT:?}"
        )));
    }
    Ok(())
}

/// How long entries live and how often expired ones are swept.
///
/// A zero max-age together with a zero clean interval means entries never
/// expire. Setting only one of the two is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    max_age: Duration,
    clean_interval: Duration,
}

impl ExpiryPolicy {
    /// Create a policy, rejecting a max-age without a clean interval and
    /// vice versa.
    pub fn new(max_age: Duration, clean_interval: Duration) -> Result<Self> {
        if max_age.is_zero() != clean_interval.is_zero() {
            return Err(OverseerError::Config(format!(
                "max age ({max_age:?}) and clean interval ({clean_interval:?}) must both be zero or both be non-zero"
            )));
        }
        check_max_age("session", max_age)?;
        Ok(Self {
            max_age,
            clean_interval,
        })
    }

    /// A policy under which nothing ever expires.
    pub fn persistent() -> Self {
        Self {
            max_age: Duration::ZERO,
            clean_interval: Duration::ZERO,
        }
    }

    pub fn is_persistent(&self) -> bool {
        self.max_age.is_zero()
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    pub fn clean_interval(&self) -> Duration {
        self.clean_interval
    }

    /// Absolute expiry for an entry written at `now`. Saturates at `now`
    /// plus [`MAX_AGE_LIMIT`] if the clock is near the end of its range.
    pub fn expires_at(&self, now: SystemTime) -> Option<SystemTime> {
        if self.is_persistent() {
            return None;
        }
        Some(
            now.checked_add(self.max_age)
                .or_else(|| now.checked_add(MAX_AGE_LIMIT))
                .unwrap_or(now),
        )
    }

    /// Whether an entry last touched at `touched` has outlived max-age.
    pub fn is_expired(&self, touched: SystemTime, now: SystemTime) -> bool {
        if self.is_persistent() {
            return false;
        }
        match now.duration_since(touched) {
            Ok(age) => age > self.max_age,
            // touched in the future
            Err(_) => false,
        }
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            clean_interval: DEFAULT_CLEAN_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn test_mismatched_pairing_rejected() {
        assert!(ExpiryPolicy::new(Duration::from_secs(10), Duration::ZERO).is_err());
        assert!(ExpiryPolicy::new(Duration::ZERO, Duration::from_secs(10)).is_err());
    }

    #[test]
    fn test_both_zero_is_persistent() {
        let policy = ExpiryPolicy::new(Duration::ZERO, Duration::ZERO).unwrap();
        assert!(policy.is_persistent());
        assert_eq!(policy, ExpiryPolicy::persistent());
        assert!(policy.expires_at(at(0)).is_none());
        assert!(!policy.is_expired(at(0), at(u32::MAX as u64)));
    }

    #[test]
    fn test_oversized_max_age_rejected() {
        let err = ExpiryPolicy::new(Duration::from_secs(u64::MAX), Duration::from_secs(60))
            .unwrap_err();
        assert!(matches!(err, OverseerError::Config(_)));
        assert!(ExpiryPolicy::new(MAX_AGE_LIMIT + Duration::from_secs(1), Duration::from_secs(60))
            .is_err());

        let policy = ExpiryPolicy::new(MAX_AGE_LIMIT, Duration::from_secs(60)).unwrap();
        assert_eq!(policy.expires_at(at(0)), Some(at(0) + MAX_AGE_LIMIT));
    }

    #[test]
    fn test_defaults() {
        let policy = ExpiryPolicy::default();
        assert_eq!(policy.max_age(), DEFAULT_MAX_AGE);
        assert_eq!(policy.clean_interval(), DEFAULT_CLEAN_INTERVAL);
    }

    #[test]
    fn test_is_expired() {
        let policy = ExpiryPolicy::new(Duration::from_secs(60), Duration::from_secs(5)).unwrap();
        assert!(!policy.is_expired(at(100), at(130)));
        assert!(!policy.is_expired(at(100), at(160)));
        assert!(policy.is_expired(at(100), at(161)));
        assert!(!policy.is_expired(at(200), at(100)));
        assert_eq!(policy.expires_at(at(100)), Some(at(160)));
    }
}
