//! Clock abstraction.
//!
//! The rotation loop reads time through [`Clock`] so that cycle deadlines and
//! file suffixes can be driven deterministically in tests. Deadlines use the
//! monotonic [`Instant`]; wall-clock time only names files.

use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Instant;

/// Source of wall-clock and monotonic time.
pub trait Clock: Send + Sync {
    /// Current local wall-clock time.
    fn now(&self) -> DateTime<Local>;

    /// Current monotonic time, unaffected by wall-clock steps.
    fn instant(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> DateTime<Local> {
        (**self).now()
    }

    fn instant(&self) -> Instant {
        (**self).instant()
    }
}

/// Real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
pub(crate) use mock::MockClock;

#[cfg(test)]
mod mock {
    use super::*;
    use chrono::TimeDelta;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct State {
        wall: DateTime<Local>,
        mono: Instant,
    }

    /// Clock that only moves when told to.
    #[derive(Debug)]
    pub struct MockClock {
        state: Mutex<State>,
    }

    impl MockClock {
        pub fn new(start: DateTime<Local>) -> Self {
            Self {
                state: Mutex::new(State {
                    wall: start,
                    mono: Instant::now(),
                }),
            }
        }

        /// Let `delta` pass on both the wall clock and the monotonic clock.
        pub fn advance(&self, delta: TimeDelta) {
            let mut state = self.state.lock().unwrap();
            state.wall += delta;
            state.mono += delta.to_std().unwrap();
        }

        /// Step the wall clock only, as an NTP or manual adjustment would.
        pub fn step_wall(&self, delta: TimeDelta) {
            self.state.lock().unwrap().wall += delta;
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> DateTime<Local> {
            self.state.lock().unwrap().wall
        }

        fn instant(&self) -> Instant {
            self.state.lock().unwrap().mono
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use std::time::Duration;

    fn fixed() -> DateTime<Local> {
        Local.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_mock_clock_is_frozen_until_advanced() {
        let clock = MockClock::new(fixed());
        let mono = clock.instant();
        assert_eq!(clock.now(), fixed());
        assert_eq!(clock.instant(), mono);

        clock.advance(TimeDelta::seconds(61));
        assert_eq!(clock.now(), fixed() + TimeDelta::seconds(61));
        assert_eq!(clock.instant() - mono, Duration::from_secs(61));
    }

    #[test]
    fn test_wall_step_leaves_monotonic_time_alone() {
        let clock = MockClock::new(fixed());
        let mono = clock.instant();

        clock.step_wall(TimeDelta::hours(1));
        clock.step_wall(TimeDelta::hours(-3));
        assert_eq!(clock.now(), fixed() - TimeDelta::hours(2));
        assert_eq!(clock.instant(), mono);
    }

    #[test]
    fn test_shared_mock_clock_sees_advances() {
        let clock = Arc::new(MockClock::new(fixed()));
        let other = Arc::clone(&clock);
        other.advance(TimeDelta::minutes(2));
        assert_eq!(clock.now() - fixed(), TimeDelta::minutes(2));
    }

    #[test]
    fn test_system_clock_returns_reasonable_time() {
        let now = SystemClock.now().timestamp();
        // 2020-01-01 .. 2100-01-01
        assert!(now > 1_577_836_800);
        assert!(now < 4_102_444_800);
    }

    #[test]
    fn test_system_clock_instant_is_monotonic() {
        let t1 = SystemClock.instant();
        let t2 = SystemClock.instant();
        assert!(t2 >= t1);
    }
}
