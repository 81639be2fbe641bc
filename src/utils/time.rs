use chrono::{FixedOffset, NaiveTime, Utc};
use rand::Rng;
use std::time::Duration;

/// Source of the wall-clock time of day campaign windows are checked against.
pub trait Clock: Send + Sync {
    fn time_of_day(&self) -> NaiveTime;
}

#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    offset: FixedOffset,
}

impl LocalClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for LocalClock {
    fn time_of_day(&self) -> NaiveTime {
        Utc::now().with_timezone(&self.offset).time()
    }
}

/// A clock stuck at one time of day.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveTime);

impl Clock for FixedClock {
    fn time_of_day(&self) -> NaiveTime {
        self.0
    }
}

/// Inclusive on both ends. A window whose start is after its end wraps midnight.
pub fn within_window(now: NaiveTime, start: NaiveTime, end: NaiveTime) -> bool {
    if start <= end {
        start <= now && now <= end
    } else {
        now >= start || now <= end
    }
}

/// Uniformly random pause between `min_secs` and `max_secs`, both inclusive.
pub fn random_delay(min_secs: i32, max_secs: i32) -> Duration {
    let low = min_secs.max(0) as u64;
    let high = (max_secs.max(0) as u64).max(low);
    if low == high {
        return Duration::from_secs(low);
    }
    let millis = rand::thread_rng().gen_range(low * 1000..=high * 1000);
    Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn business_hours_window() {
        assert!(within_window(t(9, 0), t(9, 0), t(18, 0)));
        assert!(within_window(t(12, 30), t(9, 0), t(18, 0)));
        assert!(within_window(t(18, 0), t(9, 0), t(18, 0)));
        assert!(!within_window(t(20, 0), t(9, 0), t(18, 0)));
        assert!(!within_window(t(8, 59), t(9, 0), t(18, 0)));
    }

    #[test]
    fn overnight_window_wraps() {
        assert!(within_window(t(23, 0), t(22, 0), t(6, 0)));
        assert!(within_window(t(5, 0), t(22, 0), t(6, 0)));
        assert!(!within_window(t(12, 0), t(22, 0), t(6, 0)));
    }

    #[test]
    fn delay_stays_in_bounds() {
        assert_eq!(random_delay(0, 0), Duration::ZERO);
        assert_eq!(random_delay(7, 3), Duration::from_secs(7));
        for _ in 0..50 {
            let d = random_delay(2, 5);
            assert!(d >= Duration::from_secs(2) && d <= Duration::from_secs(5));
        }
    }
}
