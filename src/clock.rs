use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> PrimitiveDateTime;
}

/// Current UTC shifted by a fixed offset, with the offset then dropped.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: UtcOffset,
}

impl SystemClock {
    pub fn new(offset: UtcOffset) -> Self {
        Self { offset }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new(UtcOffset::UTC)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> PrimitiveDateTime {
        let local = OffsetDateTime::now_utc().to_offset(self.offset);
        PrimitiveDateTime::new(local.date(), local.time())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub PrimitiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> PrimitiveDateTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset};

    #[test]
    fn system_clock_applies_offset() {
        let utc = SystemClock::default().now();
        let ahead = SystemClock::new(offset!(+2)).now();
        let diff = ahead - utc;
        assert!(diff >= time::Duration::minutes(119) && diff <= time::Duration::minutes(121));
    }

    #[test]
    fn fixed_clock_is_fixed() {
        let clock = FixedClock(datetime!(2025-01-01 12:00));
        assert_eq!(clock.now(), clock.now());
    }
}
