//! One-shot bowl/bell strikes.
//!
//! Two voicings share one renderer: every partial is its own oscillator and
//! gain pair with an exponential attack and exponential decay, and every
//! oscillator is scheduled to stop itself shortly after its decay, so a
//! strike never needs cleanup.

use bowlscape_core::filters::SvfTpt;
use bowlscape_core::param::{AudioParam, AutomationError};
use log::debug;
use rand::Rng;

use crate::graph::{Bus, MixGraph, GAIN_FLOOR};
use crate::nodes::{Osc, Route, SourceId};
use crate::scenes::Mode;

/// Oscillators keep running this long past their decay before stopping.
pub const STOP_TAIL_S: f64 = 0.3;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Voicing {
    /// Soft, muted bell that opens a session.
    Welcome,
    /// Brighter, quieter accent struck now and then while practicing.
    Accent,
}

struct Timbre {
    fundamental_hz: (f32, f32),
    ratios: &'static [f32],
    amplitudes: &'static [f32],
    attack_s: f64,
    /// Per-partial lowpass cutoff.
    lowpass_hz: Option<f32>,
    /// Random detune range per partial, ± cents.
    detune_cents: f32,
}

const WELCOME: Timbre = Timbre {
    fundamental_hz: (100.0, 140.0),
    ratios: &[1.0, 2.0, 3.0, 4.0],
    amplitudes: &[1.0, 0.5, 0.25, 0.12],
    attack_s: 0.04,
    lowpass_hz: Some(2000.0),
    detune_cents: 0.0,
};

const ACCENT: Timbre = Timbre {
    fundamental_hz: (120.0, 200.0),
    ratios: &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
    amplitudes: &[1.0, 0.7, 0.5, 0.3, 0.2, 0.15],
    attack_s: 0.015,
    lowpass_hz: None,
    detune_cents: 7.0,
};

const WELCOME_DECAY_S: (f32, f32) = (10.0, 14.0);
const WELCOME_LEVEL: f32 = 0.22;
const PARTIAL_LOWPASS_Q: f32 = 0.707;

impl Voicing {
    fn timbre(self) -> &'static Timbre {
        match self {
            Voicing::Welcome => &WELCOME,
            Voicing::Accent => &ACCENT,
        }
    }

    /// Number of oscillators one strike of this voicing schedules.
    pub fn partial_count(self) -> usize {
        self.timbre().ratios.len()
    }
}

/// What a strike scheduled.
#[derive(Clone, Debug, PartialEq)]
pub struct StrikeReport {
    pub voicing: Voicing,
    pub when: f64,
    pub fundamental: f32,
    pub decay_s: f32,
    pub level: f32,
    pub sources: Vec<SourceId>,
}

impl StrikeReport {
    /// When the last oscillator of this strike stops.
    pub fn ends_at(&self) -> f64 {
        self.when + f64::from(self.decay_s) + STOP_TAIL_S
    }
}

/// Schedule a strike at `when` on the strike bus.
pub fn strike<R: Rng + ?Sized>(
    graph: &mut MixGraph,
    rng: &mut R,
    voicing: Voicing,
    mode: Mode,
    when: f64,
) -> Result<StrikeReport, AutomationError> {
    let timbre = voicing.timbre();
    let sr = graph.sample_rate();
    let fundamental = rng.gen_range(timbre.fundamental_hz.0..=timbre.fundamental_hz.1);

    let (decay_s, level) = match voicing {
        Voicing::Welcome => (rng.gen_range(WELCOME_DECAY_S.0..=WELCOME_DECAY_S.1), WELCOME_LEVEL),
        Voicing::Accent => {
            let p = mode.profile();
            (
                rng.gen_range(p.accent_decay_s.0..=p.accent_decay_s.1),
                rng.gen_range(p.accent_level.0..=p.accent_level.1),
            )
        }
    };
    let decay = f64::from(decay_s);

    let mut sources = Vec::with_capacity(timbre.ratios.len());
    for (ratio, amp) in timbre.ratios.iter().zip(timbre.amplitudes) {
        let detune = if timbre.detune_cents > 0.0 {
            rng.gen_range(-timbre.detune_cents..=timbre.detune_cents)
        } else {
            0.0
        };
        let osc = Osc::sine(fundamental * ratio, detune);

        let peak = (level * amp).max(GAIN_FLOOR);
        let mut gain = AudioParam::new(GAIN_FLOOR);
        gain.set_value_at_time(GAIN_FLOOR, when)?
            .exponential_ramp_to_value_at_time(peak, when + timbre.attack_s)?
            .exponential_ramp_to_value_at_time(GAIN_FLOOR, when + decay)?;

        let route = Route::Bus(Bus::Strike);
        let id = match timbre.lowpass_hz {
            Some(cut) => {
                let filter = SvfTpt::lowpass(cut, PARTIAL_LOWPASS_Q, sr);
                graph.add_filtered_source(osc, gain, filter, route, when)
            }
            None => graph.add_source(osc, gain, route, when),
        };
        graph.stop_source(id, when + decay + STOP_TAIL_S);
        sources.push(id);
    }

    debug!("{voicing:?} strike at {when:.3}s: {fundamental:.1} Hz, decay {decay_s:.2}s, level {level:.3}");
    Ok(StrikeReport { voicing, when, fundamental, decay_s, level, sources })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn welcome_schedules_four_filtered_partials() {
        let mut g = MixGraph::new(8000.0);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..20 {
            let r = strike(&mut g, &mut rng, Voicing::Welcome, Mode::Menu, 0.02).unwrap();
            assert_eq!(r.sources.len(), 4);
            assert!((100.0..=140.0).contains(&r.fundamental));
            assert!((10.0..=14.0).contains(&r.decay_s));
            assert_eq!(r.level, 0.22);
            assert!(r.sources.iter().all(|id| g.source(*id).unwrap().has_filter()));
        }
    }

    #[test]
    fn accent_schedules_six_partials() {
        let mut g = MixGraph::new(8000.0);
        let mut rng = StdRng::seed_from_u64(12);
        for mode in Mode::ALL {
            let r = strike(&mut g, &mut rng, Voicing::Accent, mode, 1.0).unwrap();
            assert_eq!(r.sources.len(), 6);
            assert_eq!(Voicing::Accent.partial_count(), 6);
            assert!((120.0..=200.0).contains(&r.fundamental));
            assert!((4.5..=8.5).contains(&r.decay_s));
            assert!((0.04..=0.08).contains(&r.level));
            assert!(r.sources.iter().all(|id| !g.source(*id).unwrap().has_filter()));
        }
    }

    #[test]
    fn partials_stop_themselves() {
        let mut g = MixGraph::new(8000.0);
        let mut rng = StdRng::seed_from_u64(13);
        let r = strike(&mut g, &mut rng, Voicing::Accent, Mode::Practice, 0.0).unwrap();
        for id in &r.sources {
            let s = g.source(*id).unwrap();
            assert_eq!(s.stop_time(), Some(r.ends_at()));
            assert_eq!(s.start_time(), 0.0);
        }
    }

    #[test]
    fn envelope_attacks_then_decays() {
        let mut g = MixGraph::new(8000.0);
        let mut rng = StdRng::seed_from_u64(14);
        let r = strike(&mut g, &mut rng, Voicing::Welcome, Mode::Menu, 0.02).unwrap();
        let gain = &g.source(r.sources[0]).unwrap().gain;
        assert_eq!(gain.value_at(0.02), GAIN_FLOOR);
        assert!((gain.value_at(0.06) - 0.22).abs() < 1e-4);
        assert!(gain.value_at(5.0) < 0.22 && gain.value_at(5.0) > GAIN_FLOOR);
        assert!((gain.value_at(0.02 + f64::from(r.decay_s)) - GAIN_FLOOR).abs() < 1e-6);
    }

    #[test]
    fn strike_sounds_and_then_clears_itself() {
        let mut g = MixGraph::new(8000.0);
        g.set_master(1.0);
        let mut rng = StdRng::seed_from_u64(15);
        let r = strike(&mut g, &mut rng, Voicing::Accent, Mode::Practice, 0.0).unwrap();
        let mut out = vec![0.0; 4000];
        g.render(&mut out);
        assert!(out.iter().any(|y| y.abs() > 1e-3));
        let total = (r.ends_at() * 8000.0) as usize + 8000;
        let mut rest = vec![0.0; total];
        g.render(&mut rest);
        assert_eq!(g.live_source_count(), 0);
    }
}
