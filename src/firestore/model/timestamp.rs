use std::cmp::Ordering;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::firestore::error::{invalid_argument, FirestoreResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    /// Seconds of 0001-01-01T00:00:00Z, the earliest instant the backend accepts.
    pub const MIN_SECONDS: i64 = -62_135_596_800;
    /// Seconds of 9999-12-31T23:59:59Z, the latest whole second the backend accepts.
    pub const MAX_SECONDS: i64 = 253_402_300_799;

    pub fn new(seconds: i64, nanos: i32) -> Self {
        let mut timestamp = Self { seconds, nanos };
        timestamp.normalize();
        timestamp
    }

    /// Like [`Timestamp::new`], but rejects instants outside 0001-01-01 to
    /// 9999-12-31 with `InvalidArgument`.
    pub fn try_new(seconds: i64, nanos: i32) -> FirestoreResult<Self> {
        let timestamp = Self::new(seconds, nanos);
        timestamp.validate()?;
        Ok(timestamp)
    }

    /// Checks that the instant is one the backend can store.
    pub fn validate(&self) -> FirestoreResult<()> {
        if !(0..1_000_000_000).contains(&self.nanos) {
            return Err(invalid_argument(format!(
                "Timestamp nanoseconds out of range: {}",
                self.nanos
            )));
        }
        if !(Self::MIN_SECONDS..=Self::MAX_SECONDS).contains(&self.seconds) {
            return Err(invalid_argument(format!(
                "Timestamp seconds out of range: {}",
                self.seconds
            )));
        }
        Ok(())
    }

    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        match time.duration_since(UNIX_EPOCH) {
            Ok(duration) => Self::new(duration.as_secs() as i64, duration.subsec_nanos() as i32),
            Err(err) => {
                let duration = err.duration();
                Self::new(
                    -(duration.as_secs() as i64),
                    -(duration.subsec_nanos() as i32),
                )
            }
        }
    }

    pub fn to_system_time(&self) -> SystemTime {
        if self.seconds >= 0 {
            UNIX_EPOCH
                + Duration::from_secs(self.seconds as u64)
                + Duration::from_nanos(self.nanos as u64)
        } else {
            UNIX_EPOCH - Duration::from_secs(self.seconds.unsigned_abs())
                + Duration::from_nanos(self.nanos as u64)
        }
    }

    /// Drops sub-microsecond precision; the backend stores microseconds only.
    pub fn truncated_to_micros(&self) -> Self {
        Self {
            seconds: self.seconds,
            nanos: (self.nanos / 1_000) * 1_000,
        }
    }

    fn normalize(&mut self) {
        let extra_seconds = self.nanos.div_euclid(1_000_000_000);
        self.seconds = self.seconds.saturating_add(extra_seconds as i64);
        self.nanos = self.nanos.rem_euclid(1_000_000_000);
    }
}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        match self.seconds.cmp(&other.seconds) {
            Ordering::Equal => self.nanos.cmp(&other.nanos),
            ordering => ordering,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_nanoseconds() {
        let timestamp = Timestamp::new(1, 1_500_000_000);
        assert_eq!(timestamp.seconds, 2);
        assert_eq!(timestamp.nanos, 500_000_000);
    }

    #[test]
    fn normalize_negative_nanoseconds() {
        let timestamp = Timestamp::new(0, -1);
        assert_eq!(timestamp.seconds, -1);
        assert_eq!(timestamp.nanos, 999_999_999);
    }

    #[test]
    fn normalize_saturates_instead_of_overflowing() {
        let timestamp = Timestamp::new(i64::MAX, 1_999_999_999);
        assert_eq!(timestamp.seconds, i64::MAX);
        assert_eq!(timestamp.nanos, 999_999_999);
        assert!(timestamp.validate().is_err());
    }

    #[test]
    fn validates_supported_range() {
        assert!(Timestamp::try_new(Timestamp::MIN_SECONDS, 0).is_ok());
        assert!(Timestamp::try_new(Timestamp::MAX_SECONDS, 999_999_999).is_ok());

        let err = Timestamp::try_new(Timestamp::MIN_SECONDS, -1).unwrap_err();
        assert_eq!(err.code_str(), "firestore/invalid-argument");
        assert!(err.message().contains("Timestamp seconds out of range"));

        let err = Timestamp::try_new(Timestamp::MAX_SECONDS + 1, 0).unwrap_err();
        assert!(err.message().contains(&(Timestamp::MAX_SECONDS + 1).to_string()));

        let raw = Timestamp {
            seconds: 0,
            nanos: -5,
        };
        assert!(raw
            .validate()
            .unwrap_err()
            .message()
            .contains("nanoseconds out of range"));
    }

    #[test]
    fn ordering() {
        let earlier = Timestamp::new(1, 0);
        let later = Timestamp::new(2, 0);
        assert!(earlier < later);
    }

    #[test]
    fn truncates_to_micros() {
        let timestamp = Timestamp::new(5, 123_456_789).truncated_to_micros();
        assert_eq!(timestamp, Timestamp::new(5, 123_456_000));
    }

    #[test]
    fn system_time_roundtrip() {
        let timestamp = Timestamp::new(-3, 250);
        assert_eq!(Timestamp::from_system_time(timestamp.to_system_time()), timestamp);
    }
}
