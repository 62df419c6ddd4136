//! Sample-accurate parameter automation.
//!
//! `AudioParam` is a timeline of future-timestamped events in the style of the
//! Web Audio API: the control side schedules `set`, linear-ramp and
//! exponential-ramp events ahead of time, and the render side evaluates the
//! curve with `value_at(t)` once per sample. A ramp always runs from the
//! previous event (its time and value) to its own time and value.
//!
//! Times are seconds on the owning context's clock (`f64` so long sessions do
//! not drift); values are `f32`.

use alloc::vec::Vec;
use core::fmt;

use crate::dsp::{exp, ln};

/// Kind of a scheduled automation event.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    /// Jump to `value` at `time`, hold afterwards.
    SetValue,
    /// Linear interpolation from the previous event, reaching `value` at `time`.
    LinearRamp,
    /// Exponential interpolation from the previous event, reaching `value` at `time`.
    ExponentialRamp,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AutomationEvent {
    pub kind: EventKind,
    pub time: f64,
    pub value: f32,
}

/// Rejected automation writes.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum AutomationError {
    /// Value was NaN or infinite.
    NonFiniteValue(f32),
    /// Time was NaN, infinite or negative.
    InvalidTime(f64),
    /// Exponential ramps can only target strictly positive values.
    NonPositiveExponentialTarget(f32),
}

impl fmt::Display for AutomationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonFiniteValue(v) => write!(f, "automation value is not finite: {v}"),
            Self::InvalidTime(t) => write!(f, "automation time is invalid: {t}"),
            Self::NonPositiveExponentialTarget(v) => {
                write!(f, "exponential ramp target must be > 0, got {v}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AutomationError {}

/// An automatable parameter: a default value plus a time-sorted event list.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioParam {
    default: f32,
    events: Vec<AutomationEvent>,
}

impl AudioParam {
    #[inline]
    pub fn new(value: f32) -> Self {
        Self { default: value, events: Vec::new() }
    }

    /// Drop all automation and hold `value` from now on.
    pub fn set_value(&mut self, value: f32) {
        self.events.clear();
        self.default = value;
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) -> Result<&mut Self, AutomationError> {
        self.insert(EventKind::SetValue, value, time)
    }

    pub fn linear_ramp_to_value_at_time(
        &mut self,
        value: f32,
        time: f64,
    ) -> Result<&mut Self, AutomationError> {
        self.insert(EventKind::LinearRamp, value, time)
    }

    pub fn exponential_ramp_to_value_at_time(
        &mut self,
        value: f32,
        time: f64,
    ) -> Result<&mut Self, AutomationError> {
        if value.is_finite() && value <= 0.0 {
            return Err(AutomationError::NonPositiveExponentialTarget(value));
        }
        self.insert(EventKind::ExponentialRamp, value, time)
    }

    /// Remove every event scheduled at or after `time`.
    pub fn cancel_scheduled_values(&mut self, time: f64) {
        self.events.retain(|e| e.time < time);
    }

    /// Cancel everything from `time` on and pin the curve's value at `time`,
    /// so a following ramp starts from where the parameter actually is.
    pub fn hold_at(&mut self, time: f64) -> Result<f32, AutomationError> {
        let v = self.value_at(time);
        self.cancel_scheduled_values(time);
        self.set_value_at_time(v, time)?;
        Ok(v)
    }

    /// Evaluate the automation curve at `t`.
    pub fn value_at(&self, t: f64) -> f32 {
        let idx = self.events.partition_point(|e| e.time <= t);
        let (t0, v0) = match idx.checked_sub(1) {
            Some(i) => (self.events[i].time, self.events[i].value),
            None => (0.0, self.default),
        };

        let Some(next) = self.events.get(idx) else {
            return v0;
        };

        let span = next.time - t0;
        let frac = if span > 0.0 { ((t - t0) / span).clamp(0.0, 1.0) as f32 } else { 1.0 };

        match next.kind {
            EventKind::SetValue => v0,
            EventKind::LinearRamp => v0 + (next.value - v0) * frac,
            EventKind::ExponentialRamp => {
                // Same contract as Web Audio: a ramp out of a non-positive value holds.
                if v0 > 0.0 {
                    v0 * exp(ln(next.value / v0) * frac)
                } else {
                    v0
                }
            }
        }
    }

    /// Forget events that can no longer influence values at or after `t`.
    /// The last event at or before `t` is kept as the curve's anchor.
    pub fn prune_before(&mut self, t: f64) {
        let idx = self.events.partition_point(|e| e.time <= t);
        if idx > 1 {
            self.events.drain(..idx - 1);
        }
    }

    /// Value the curve settles on once all scheduled events have run.
    #[inline]
    pub fn final_value(&self) -> f32 {
        self.events.last().map_or(self.default, |e| e.value)
    }

    #[inline] pub fn default_value(&self) -> f32 { self.default }
    #[inline] pub fn events(&self) -> &[AutomationEvent] { &self.events }

    fn insert(&mut self, kind: EventKind, value: f32, time: f64) -> Result<&mut Self, AutomationError> {
        if !value.is_finite() {
            return Err(AutomationError::NonFiniteValue(value));
        }
        if !time.is_finite() || time < 0.0 {
            return Err(AutomationError::InvalidTime(time));
        }
        // Events at the same time keep insertion order.
        let idx = self.events.partition_point(|e| e.time <= time);
        self.events.insert(idx, AutomationEvent { kind, time, value });
        Ok(self)
    }
}

impl Default for AudioParam {
    fn default() -> Self {
        Self::new(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_holds_without_events() {
        let p = AudioParam::new(0.9);
        assert_eq!(p.value_at(0.0), 0.9);
        assert_eq!(p.value_at(100.0), 0.9);
    }

    #[test]
    fn linear_ramp_interpolates() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 1.0).unwrap()
            .linear_ramp_to_value_at_time(1.0, 3.0).unwrap();
        assert_eq!(p.value_at(0.5), 0.0);
        assert!((p.value_at(2.0) - 0.5).abs() < 1e-6);
        assert_eq!(p.value_at(3.0), 1.0);
        assert_eq!(p.value_at(10.0), 1.0);
    }

    #[test]
    fn exponential_ramp_is_geometric() {
        let mut p = AudioParam::new(0.0001);
        p.set_value_at_time(0.0001, 0.0).unwrap()
            .exponential_ramp_to_value_at_time(0.01, 2.0).unwrap();
        // halfway in time is the geometric mean
        assert!((p.value_at(1.0) - 0.001).abs() < 1e-6, "v={}", p.value_at(1.0));
        assert!((p.value_at(2.0) - 0.01).abs() < 1e-7);
    }

    #[test]
    fn exponential_ramp_rejects_zero_target() {
        let mut p = AudioParam::new(1.0);
        let err = p.exponential_ramp_to_value_at_time(0.0, 1.0).unwrap_err();
        assert_eq!(err, AutomationError::NonPositiveExponentialTarget(0.0));
        assert!(p.events().is_empty());
    }

    #[test]
    fn exponential_ramp_from_zero_holds() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 0.0).unwrap()
            .exponential_ramp_to_value_at_time(1.0, 1.0).unwrap();
        assert_eq!(p.value_at(0.5), 0.0);
        assert_eq!(p.value_at(1.0), 1.0);
    }

    #[test]
    fn rejects_non_finite_and_negative_times() {
        let mut p = AudioParam::new(0.0);
        assert!(matches!(p.set_value_at_time(f32::NAN, 0.0), Err(AutomationError::NonFiniteValue(_))));
        assert_eq!(p.set_value_at_time(1.0, -1.0).unwrap_err(), AutomationError::InvalidTime(-1.0));
    }

    #[test]
    fn hold_at_pins_value_mid_ramp() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.0, 0.0).unwrap()
            .linear_ramp_to_value_at_time(1.0, 2.0).unwrap();
        let held = p.hold_at(1.0).unwrap();
        assert!((held - 0.5).abs() < 1e-6);
        // the old ramp end is gone; value stays pinned
        assert!((p.value_at(5.0) - 0.5).abs() < 1e-6);
        p.linear_ramp_to_value_at_time(0.0, 2.0).unwrap();
        assert!((p.value_at(1.5) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn cancel_removes_future_events() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(1.0, 1.0).unwrap().set_value_at_time(2.0, 2.0).unwrap();
        p.cancel_scheduled_values(1.5);
        assert_eq!(p.events().len(), 1);
        assert_eq!(p.value_at(3.0), 1.0);
        assert_eq!(p.final_value(), 1.0);
    }

    #[test]
    fn prune_keeps_curve_identical() {
        let mut p = AudioParam::new(0.0);
        p.set_value_at_time(0.2, 0.0).unwrap()
            .linear_ramp_to_value_at_time(0.4, 1.0).unwrap()
            .linear_ramp_to_value_at_time(0.8, 3.0).unwrap();
        let before = p.value_at(2.0);
        p.prune_before(2.0);
        assert_eq!(p.events().len(), 2);
        assert!((p.value_at(2.0) - before).abs() < 1e-6);
    }
}
