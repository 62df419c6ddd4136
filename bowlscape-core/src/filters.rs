//! Filters: a TPT state-variable lowpass.
//!
//! Goals
//! - `no_std`-friendly, allocation free
//! - Safe under per-sample cutoff modulation (the pad LFO sweeps the mix lowpass)
//!
//! Notes
//! - `SvfTpt` uses the “g = tan(π fc / sr)” formulation with `R = 1/(2Q)`.
//!   It is robust to high resonance and parameter modulation.

use crate::dsp::{kill_denormals, tpt_g};

/// Topology-Preserving Transform SVF (State-Variable Filter), lowpass tap.
///
/// Parameters:
/// - `cut_hz`  : cutoff frequency in Hz
/// - `q`       : quality factor (>= ~0.5 typical; lower increases damping)
#[derive(Copy, Clone, Debug)]
pub struct SvfTpt {
    sr: f32,
    cut: f32,
    q: f32,
    // derived
    g: f32,
    k: f32,
    // states
    ic1eq: f32,
    ic2eq: f32,
}

impl SvfTpt {
    #[inline]
    pub fn lowpass(cut_hz: f32, q: f32, sr: f32) -> Self {
        let q = q.max(1e-4);
        let mut s = Self {
            sr: sr.max(1.0),
            cut: cut_hz.max(0.0),
            q,
            g: 0.0,
            k: 1.0 / q,
            ic1eq: 0.0,
            ic2eq: 0.0,
        };
        s.g = tpt_g(s.cut, s.sr);
        s
    }

    /// Update the cutoff. Skips the `tan` when the change is below 0.01 Hz,
    /// which keeps slow LFO sweeps cheap.
    #[inline]
    pub fn set_cutoff_hz(&mut self, cut_hz: f32) {
        let cut = cut_hz.max(0.0);
        if (cut - self.cut).abs() < 0.01 {
            return;
        }
        self.cut = cut;
        self.g = tpt_g(cut, self.sr); // tan(π fc / sr)
    }

    #[inline] pub fn cutoff_hz(&self) -> f32 { self.cut }
    #[inline] pub fn q(&self) -> f32 { self.q }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        // Trapezoidal SVF (Zavalishin / Simper), k = 1/Q.
        let a1 = 1.0 / (1.0 + self.g * (self.g + self.k));
        let a2 = self.g * a1;
        let a3 = self.g * a2;

        let v3 = x - self.ic2eq;
        let v1 = a1 * self.ic1eq + a2 * v3;
        let v2 = self.ic2eq + a2 * self.ic1eq + a3 * v3;

        self.ic1eq = kill_denormals(2.0 * v1 - self.ic1eq);
        self.ic2eq = kill_denormals(2.0 * v2 - self.ic2eq);
        v2
    }
}

// ------------------------------------ Tests --------------------------------------
