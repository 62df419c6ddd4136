//! The bowl voice bank: three detuned harmonic stacks forming the drone pad.
//!
//! Each bowl is a fundamental plus up to six partials. The partials get small,
//! increasing detune offsets (plus jitter) so neighbouring harmonics beat
//! slowly against each other; that beating is the "singing" quality. All
//! bowls share one LFO which breathes their gains and the mix lowpass.

use bowlscape_core::param::{AudioParam, AutomationError};
use log::debug;
use rand::Rng;

use crate::graph::{Bus, MixGraph};
use crate::nodes::{GroupId, Lfo, Osc, Route, SourceId};
use crate::scenes::Mode;

/// Bowl fundamentals relative to the root: unison, golden ratio, octave.
pub const BOWL_RATIOS: [f32; 3] = [1.0, 1.618, 2.0];
pub const PARTIAL_RATIOS: [f32; 6] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
pub const PARTIAL_WEIGHTS: [f32; 6] = [1.0, 0.65, 0.4, 0.25, 0.15, 0.1];
pub const PARTIAL_DETUNE_CENTS: [f32; 6] = [0.0, 0.3, 0.6, 0.9, 1.2, 1.5];
pub const DETUNE_JITTER_CENTS: f32 = 0.5;
/// Higher bowls carry fewer partials so the top end stays soft.
pub const PARTIALS_PER_BOWL: [usize; 3] = [6, 5, 4];

pub const ROOT_RANGE_HZ: (f32, f32) = (120.0, 160.0);
pub const RETUNE_FACTOR: (f32, f32) = (0.94, 1.06);
pub const RETUNE_RANGE_HZ: (f32, f32) = (110.0, 140.0);
pub const RETUNE_GLIDE_S: f64 = 7.0;

#[derive(Clone, Debug, PartialEq)]
pub struct Partial {
    pub source: SourceId,
    pub ratio: f32,
    pub amplitude: f32,
    pub detune_cents: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BowlVoice {
    pub fundamental: f32,
    pub group: GroupId,
    /// Steady-state gain the bowl fades to (before LFO swing).
    pub target_gain: f32,
    pub partials: Vec<Partial>,
}

/// Live pad nodes: three bowls plus the shared LFO (held by the graph).
#[derive(Clone, Debug)]
pub struct Pad {
    root: f32,
    mode: Mode,
    bowls: Vec<BowlVoice>,
}

impl Pad {
    /// Build the three bowls and the LFO. Partial and bowl gains start
    /// silent at `fade_start` and ramp linearly to their targets over
    /// `fade_s` seconds.
    pub fn ensure<R: Rng + ?Sized>(
        graph: &mut MixGraph,
        rng: &mut R,
        mode: Mode,
        fade_start: f64,
        fade_s: f64,
    ) -> Result<Self, AutomationError> {
        let profile = mode.profile();
        let root = rng.gen_range(ROOT_RANGE_HZ.0..=ROOT_RANGE_HZ.1);
        let now = graph.current_time();
        let fade_end = fade_start + fade_s;

        graph.set_lfo(Lfo::sine(profile.lfo_rate_hz), profile.lfo_cutoff_swing_hz);

        let mut bowls = Vec::with_capacity(BOWL_RATIOS.len());
        for (b, bowl_ratio) in BOWL_RATIOS.iter().enumerate() {
            let fundamental = root * bowl_ratio;
            let target_gain = profile.bowl_targets[b];

            let mut gain = AudioParam::new(0.0);
            gain.set_value_at_time(0.0, fade_start)?
                .linear_ramp_to_value_at_time(target_gain, fade_end)?;
            let group = graph.add_group(gain, profile.lfo_gain_swing, Bus::Pad);

            let mut partials = Vec::with_capacity(PARTIALS_PER_BOWL[b]);
            for p in 0..PARTIALS_PER_BOWL[b] {
                let detune_cents = PARTIAL_DETUNE_CENTS[p]
                    + rng.gen_range(-DETUNE_JITTER_CENTS..=DETUNE_JITTER_CENTS);
                let osc = Osc::sine(fundamental * PARTIAL_RATIOS[p], detune_cents);

                let mut pg = AudioParam::new(0.0);
                pg.set_value_at_time(0.0, fade_start)?
                    .linear_ramp_to_value_at_time(PARTIAL_WEIGHTS[p], fade_end)?;

                let source = graph.add_source(osc, pg, Route::Group(group), now);
                partials.push(Partial {
                    source,
                    ratio: PARTIAL_RATIOS[p],
                    amplitude: PARTIAL_WEIGHTS[p],
                    detune_cents,
                });
            }

            bowls.push(BowlVoice { fundamental, group, target_gain, partials });
        }

        debug!("pad built: root {root:.2} Hz, mode {mode}, fade {fade_start:.2}s..{fade_end:.2}s");
        Ok(Self { root, mode, bowls })
    }

    /// Drift the root by a random factor, clamp it, and glide every live
    /// partial to its new frequency. Returns the new root.
    pub fn retune<R: Rng + ?Sized>(&mut self, graph: &mut MixGraph, rng: &mut R) -> Result<f32, AutomationError> {
        let factor = rng.gen_range(RETUNE_FACTOR.0..=RETUNE_FACTOR.1);
        self.root = (self.root * factor).clamp(RETUNE_RANGE_HZ.0, RETUNE_RANGE_HZ.1);

        let now = graph.current_time();
        let end = now + RETUNE_GLIDE_S;
        for (bowl, bowl_ratio) in self.bowls.iter_mut().zip(BOWL_RATIOS) {
            bowl.fundamental = self.root * bowl_ratio;
            for partial in &bowl.partials {
                let Some(src) = graph.source_mut(partial.source) else {
                    continue;
                };
                let freq = &mut src.osc.frequency;
                freq.hold_at(now)?;
                freq.linear_ramp_to_value_at_time(bowl.fundamental * partial.ratio, end)?;
            }
        }

        debug!("pad retune: root {:.2} Hz over {RETUNE_GLIDE_S}s", self.root);
        Ok(self.root)
    }

    /// Stop the LFO and every partial, and drop the bowl gain stages.
    pub fn destroy(self, graph: &mut MixGraph) {
        let now = graph.current_time();
        graph.clear_lfo();
        for bowl in &self.bowls {
            for partial in &bowl.partials {
                graph.stop_source(partial.source, now);
            }
            graph.remove_group(bowl.group);
        }
        debug!("pad destroyed at {now:.3}s");
    }

    #[inline] pub fn root(&self) -> f32 { self.root }
    #[inline] pub fn mode(&self) -> Mode { self.mode }
    #[inline] pub fn bowls(&self) -> &[BowlVoice] { &self.bowls }

    /// Steady-state gains of the three bowls.
    pub fn targets(&self) -> [f32; 3] {
        let mut out = [0.0; 3];
        for (slot, bowl) in out.iter_mut().zip(&self.bowls) {
            *slot = bowl.target_gain;
        }
        out
    }

    pub fn source_ids(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.bowls.iter().flat_map(|b| b.partials.iter().map(|p| p.source))
    }
}
