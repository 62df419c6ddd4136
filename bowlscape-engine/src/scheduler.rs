//! Evolution timer: a single-slot timer in context time.
//!
//! The engine checks it while rendering and, when it comes due, retunes the
//! pad, maybe strikes an accent, and re-arms it with a fresh random delay.
//! The timer cannot overlap itself because firing always goes through
//! `disarm` → work → `arm`.

use rand::Rng;

use crate::scenes::Mode;

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum SchedulerState {
    #[default]
    Idle,
    Armed { fire_at: f64 },
}

#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    state: SchedulerState,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Random delay before the next fire for `mode`, in seconds.
    pub fn next_delay<R: Rng + ?Sized>(rng: &mut R, mode: Mode) -> f64 {
        let (lo, hi) = mode.profile().retune_delay_s;
        f64::from(rng.gen_range(lo..=hi))
    }

    /// Arm (or re-arm) the timer to fire `delay` seconds after `now`.
    pub fn arm(&mut self, now: f64, delay: f64) {
        self.state = SchedulerState::Armed { fire_at: now + delay.max(0.0) };
    }

    pub fn disarm(&mut self) {
        self.state = SchedulerState::Idle;
    }

    #[inline] pub fn state(&self) -> SchedulerState { self.state }
    #[inline] pub fn is_armed(&self) -> bool { matches!(self.state, SchedulerState::Armed { .. }) }

    #[inline]
    pub fn fire_at(&self) -> Option<f64> {
        match self.state {
            SchedulerState::Armed { fire_at } => Some(fire_at),
            SchedulerState::Idle => None,
        }
    }

    /// True once the armed deadline has been reached.
    #[inline]
    pub fn due(&self, now: f64) -> bool {
        self.fire_at().is_some_and(|t| now >= t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn arm_disarm_cycle() {
        let mut s = Scheduler::new();
        assert_eq!(s.state(), SchedulerState::Idle);
        assert!(!s.due(1e9));
        s.arm(2.0, 14.0);
        assert_eq!(s.fire_at(), Some(16.0));
        assert!(!s.due(15.9));
        assert!(s.due(16.0));
        s.disarm();
        assert!(!s.is_armed());
        assert!(!s.due(100.0));
    }

    #[test]
    fn rearming_replaces_the_deadline() {
        let mut s = Scheduler::new();
        s.arm(0.0, 30.0);
        s.arm(1.0, 14.0);
        assert_eq!(s.fire_at(), Some(15.0));
    }

    #[test]
    fn delays_follow_mode_ranges() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..200 {
            let p = Scheduler::next_delay(&mut rng, Mode::Practice);
            assert!((14.0..=22.0).contains(&p));
            let m = Scheduler::next_delay(&mut rng, Mode::Menu);
            assert!((18.0..=30.0).contains(&m));
        }
    }
}
