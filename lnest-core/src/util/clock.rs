use crate::SendSync;
use core::time::Duration;

/// A clock provider, used for handshake deadlines
///
/// On std platforms, use the StandardClock implementation
pub trait Clock: SendSync {
    /// A duration since the UNIX epoch
    fn now(&self) -> Duration;
}

mod standard {
    use super::SendSync;
    use core::time::Duration;
    use std::time::SystemTime;

    /// A clock provider using the std::time::SystemTime
    pub struct StandardClock();

    impl SendSync for StandardClock {}

    impl super::Clock for StandardClock {
        fn now(&self) -> Duration {
            // a system clock before the epoch reads as the epoch
            SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap_or_default()
        }
    }
}

pub use standard::*;

mod manual {
    use crate::prelude::*;
    use alloc::sync::Arc;
    use core::time::Duration;

    /// A clock provider with manually updated notion of "now"
    #[derive(Clone)]
    pub struct ManualClock(Arc<Mutex<Duration>>);

    impl SendSync for ManualClock {}

    impl super::Clock for ManualClock {
        fn now(&self) -> Duration {
            *self.0.lock().unwrap_or_else(|e| e.into_inner())
        }
    }

    impl ManualClock {
        /// Create a manual clock
        pub fn new(now: Duration) -> Self {
            ManualClock(Arc::new(Mutex::new(now)))
        }

        /// Set the current time as duration since the UNIX epoch
        pub fn set(&self, now: Duration) {
            *self.0.lock().unwrap_or_else(|e| e.into_inner()) = now;
        }

        /// Move the current time forward
        pub fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap_or_else(|e| e.into_inner());
            *now += by;
        }
    }
}

pub use manual::*;

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::SystemTime;

    #[test]
    fn std_test() {
        let clock = StandardClock();
        assert!(clock.now() > Duration::ZERO);
    }

    #[test]
    fn manual_test() {
        let now1 = now();
        let clock = ManualClock::new(now1);
        let dur1 = clock.now();
        sleep(Duration::from_millis(1));
        let now2 = now();
        assert_ne!(now1, now2);
        clock.set(now2);
        let dur2 = clock.now();
        assert_ne!(dur1, dur2);
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), now2 + Duration::from_secs(5));
    }

    fn now() -> Duration {
        SystemTime::now().duration_since(SystemTime::UNIX_EPOCH).unwrap()
    }
}
