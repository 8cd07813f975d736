use std::time::{Duration, Instant};

use winit::dpi::PhysicalSize;

/// Trailing-edge debounce for viewport resizes: only the last size reported
/// within a quiet window triggers a rebuild.
#[derive(Debug, Clone)]
pub struct ResizeDebouncer {
    quiet: Duration,
    pending: Option<(PhysicalSize<u32>, Instant)>,
}

impl ResizeDebouncer {
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    /// Record a resize, pushing the deadline out by the quiet window.
    pub fn note(&mut self, size: PhysicalSize<u32>, now: Instant) {
        self.pending = Some((size, now + self.quiet));
    }

    /// Take the settled size once its deadline has passed.
    pub fn due(&mut self, now: Instant) -> Option<PhysicalSize<u32>> {
        match self.pending {
            Some((size, deadline)) if now >= deadline => {
                self.pending = None;
                Some(size)
            }
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|(_, deadline)| deadline)
    }

    #[cfg(test)]
    fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Outcome of one attempt to find a usable container height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupCheck {
    Ready,
    Retry,
    GaveUp,
}

/// Bounded per-frame retry waiting for the container to get a height.
#[derive(Debug, Clone)]
pub struct StartupWait {
    attempts: u32,
    max_attempts: u32,
    finished: bool,
}

impl StartupWait {
    pub const DEFAULT_ATTEMPTS: u32 = 20;

    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            finished: false,
        }
    }

    pub fn check(&mut self, height: u32) -> StartupCheck {
        if self.finished {
            return StartupCheck::GaveUp;
        }
        if height > 0 {
            return StartupCheck::Ready;
        }
        if self.attempts < self.max_attempts {
            self.attempts += 1;
            StartupCheck::Retry
        } else {
            self.finished = true;
            StartupCheck::GaveUp
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl Default for StartupWait {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_of_resizes_yields_one_rebuild() {
        let quiet = Duration::from_millis(100);
        let mut debounce = ResizeDebouncer::new(quiet);
        let t0 = Instant::now();
        for step in 0..10u32 {
            let now = t0 + Duration::from_millis(u64::from(step) * 20);
            debounce.note(PhysicalSize::new(800 + step, 600), now);
            assert!(debounce.due(now).is_none());
        }
        let last = t0 + Duration::from_millis(180);
        assert!(debounce.due(last + Duration::from_millis(99)).is_none());
        assert_eq!(
            debounce.due(last + quiet),
            Some(PhysicalSize::new(809, 600))
        );
        assert!(debounce.due(last + quiet * 2).is_none());
        assert!(!debounce.is_pending());
    }

    #[test]
    fn separate_windows_rebuild_separately() {
        let quiet = Duration::from_millis(100);
        let mut debounce = ResizeDebouncer::new(quiet);
        let t0 = Instant::now();
        debounce.note(PhysicalSize::new(100, 100), t0);
        assert!(debounce.due(t0 + quiet).is_some());
        debounce.note(PhysicalSize::new(200, 100), t0 + quiet * 3);
        assert_eq!(debounce.deadline(), Some(t0 + quiet * 4));
        assert_eq!(
            debounce.due(t0 + quiet * 4),
            Some(PhysicalSize::new(200, 100))
        );
    }

    #[test]
    fn startup_wait_gives_up_after_max_attempts() {
        let mut startup = StartupWait::new(3);
        assert_eq!(startup.check(0), StartupCheck::Retry);
        assert_eq!(startup.check(0), StartupCheck::Retry);
        assert_eq!(startup.check(0), StartupCheck::Retry);
        assert_eq!(startup.check(0), StartupCheck::GaveUp);
        assert_eq!(startup.check(480), StartupCheck::GaveUp);
        assert_eq!(startup.attempts(), 3);
    }

    #[test]
    fn startup_wait_is_ready_once_height_appears() {
        let mut startup = StartupWait::default();
        assert_eq!(startup.check(0), StartupCheck::Retry);
        assert_eq!(startup.check(720), StartupCheck::Ready);
    }
}
