//! Expirable Values
//!
//! Every payload stored in the cache is wrapped in an [`Expirable`], which
//! carries an absolute expiry instant next to the value.
//!
//! An entry is *alive* at time `now` when its deadline is set and lies
//! strictly after `now`. An entry without a deadline is never alive, so a
//! value that was built without one is swept on first inspection rather
//! than living forever.

use std::time::{Duration, Instant};

/// `now + ttl`, saturating to a far-future instant when the sum
/// overflows.
fn deadline_after(now: Instant, mut ttl: Duration) -> Instant {
    loop {
        if let Some(deadline) = now.checked_add(ttl) {
            return deadline;
        }
        ttl /= 2;
    }
}

/// A payload paired with the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expirable<V> {
    /// The caller's payload
    value: V,
    /// When this entry expires (None = never valid)
    expires_at: Option<Instant>,
}

impl<V> Expirable<V> {
    /// Creates an entry that expires `seconds` after `now`.
    pub fn new(value: V, now: Instant, seconds: u64) -> Self {
        Self::with_ttl(value, now, Duration::from_secs(seconds))
    }

    /// Creates an entry that expires `ttl` after `now`.
    pub fn with_ttl(value: V, now: Instant, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Some(deadline_after(now, ttl)),
        }
    }

    /// Creates an entry with an absolute deadline.
    pub fn with_deadline(value: V, deadline: Instant) -> Self {
        Self {
            value,
            expires_at: Some(deadline),
        }
    }

    /// Creates an entry with no deadline. It is never alive.
    pub fn unset(value: V) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Returns the payload if the entry is alive at `now`.
    #[inline]
    pub fn get(&self, now: Instant) -> Option<&V> {
        if self.is_alive(now) {
            Some(&self.value)
        } else {
            None
        }
    }

    /// Checks whether this entry is alive at `now`.
    #[inline]
    pub fn is_alive(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| exp > now)
    }

    /// Returns the payload without checking liveness.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Consumes the entry, returning the payload regardless of liveness.
    pub fn into_value(self) -> V {
        self.value
    }

    /// Returns the deadline, if one is set.
    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Replaces the payload, keeping the deadline.
    pub fn replace(&mut self, value: V) {
        self.value = value;
    }

    /// Replaces both the payload and the deadline.
    pub fn replace_with_deadline(&mut self, value: V, deadline: Instant) {
        self.value = value;
        self.expires_at = Some(deadline);
    }

    /// Replaces the payload and moves the deadline to `now + seconds`.
    pub fn replace_with_ttl(&mut self, value: V, now: Instant, seconds: u64) {
        self.value = value;
        self.expires_at = Some(deadline_after(now, Duration::from_secs(seconds)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alive_before_deadline() {
        let now = Instant::now();
        let entry = Expirable::new(100, now, 1);

        assert_eq!(entry.get(now), Some(&100));
        assert!(entry.is_alive(now + Duration::from_millis(999)));
    }

    #[test]
    fn test_dead_at_and_after_deadline() {
        let now = Instant::now();
        let entry = Expirable::new(100, now, 1);

        assert_eq!(entry.get(now + Duration::from_secs(1)), None);
        assert_eq!(entry.get(now + Duration::from_secs(5)), None);
    }

    #[test]
    fn test_zero_ttl_is_immediately_dead() {
        let now = Instant::now();
        let entry = Expirable::new("x", now, 0);
        assert!(!entry.is_alive(now));
    }

    #[test]
    fn test_huge_ttl_saturates_instead_of_unset() {
        let now = Instant::now();
        let entry = Expirable::new(7, now, u64::MAX);

        assert!(entry.expires_at().is_some());
        assert_eq!(entry.get(now), Some(&7));
        assert!(entry.is_alive(now + Duration::from_secs(365 * 24 * 60 * 60)));

        let mut entry = Expirable::new(1, now, 1);
        entry.replace_with_ttl(8, now, u64::MAX);
        assert_eq!(entry.get(now + Duration::from_secs(60)), Some(&8));
    }

    #[test]
    fn test_unset_is_never_alive() {
        let entry = Expirable::unset(7);

        assert!(entry.expires_at().is_none());
        assert!(!entry.is_alive(Instant::now()));
        assert_eq!(*entry.value(), 7);
    }

    #[test]
    fn test_replace_keeps_deadline() {
        let now = Instant::now();
        let mut entry = Expirable::new(1, now, 10);
        let deadline = entry.expires_at();

        entry.replace(2);

        assert_eq!(entry.get(now), Some(&2));
        assert_eq!(entry.expires_at(), deadline);
    }

    #[test]
    fn test_replace_with_deadline() {
        let now = Instant::now();
        let mut entry = Expirable::unset(1);

        entry.replace_with_deadline(2, now + Duration::from_secs(3));

        assert_eq!(entry.get(now + Duration::from_secs(2)), Some(&2));
        assert_eq!(entry.get(now + Duration::from_secs(3)), None);
    }

    #[test]
    fn test_replace_with_ttl_extends() {
        let now = Instant::now();
        let mut entry = Expirable::new(1, now, 1);

        let later = now + Duration::from_secs(5);
        entry.replace_with_ttl(2, later, 10);

        assert_eq!(entry.get(later + Duration::from_secs(9)), Some(&2));
        assert_eq!(entry.into_value(), 2);
    }
}
