//! Gentle rain: a looped pink-noise buffer behind a soft lowpass.

use bowlscape_core::filters::SvfTpt;
use bowlscape_core::noise::PinkNoise;
use bowlscape_core::param::{AudioParam, AutomationError};
use log::debug;
use rand::Rng;

use crate::graph::{Bus, MixGraph};
use crate::nodes::{LoopBuffer, SourceId};
use crate::scenes::Mode;

pub const RAIN_BUFFER_S: f32 = 2.0;
pub const RAIN_CUTOFF_HZ: f32 = 2500.0;
pub const RAIN_Q: f32 = 0.5;

/// `seconds` of pink noise at `sr`, driven by uniform white noise from `rng`.
pub fn pink_buffer<R: Rng + ?Sized>(rng: &mut R, sr: f32, seconds: f32) -> Vec<f32> {
    let len = (sr * seconds).round().max(1.0) as usize;
    let mut pink = PinkNoise::new();
    (0..len).map(|_| pink.next(rng.gen_range(-1.0_f32..=1.0))).collect()
}

/// Live rain nodes: one looping buffer source in the graph.
#[derive(Clone, Debug)]
pub struct Rain {
    source: SourceId,
    target: f32,
}

impl Rain {
    /// Build the rain layer; its gain ramps linearly from silence at
    /// `fade_start` to the mode's target over `fade_s` seconds.
    pub fn ensure<R: Rng + ?Sized>(
        graph: &mut MixGraph,
        rng: &mut R,
        mode: Mode,
        fade_start: f64,
        fade_s: f64,
    ) -> Result<Self, AutomationError> {
        let sr = graph.sample_rate();
        let target = mode.profile().rain_target;

        let mut gain = AudioParam::new(0.0);
        gain.set_value_at_time(0.0, fade_start)?
            .linear_ramp_to_value_at_time(target, fade_start + fade_s)?;

        let buffer = LoopBuffer::new(pink_buffer(rng, sr, RAIN_BUFFER_S));
        let filter = SvfTpt::lowpass(RAIN_CUTOFF_HZ, RAIN_Q, sr);
        let source = graph.add_buffer(buffer, filter, gain, Bus::Rain);

        debug!("rain built: target {target}, mode {mode}");
        Ok(Self { source, target })
    }

    pub fn destroy(self, graph: &mut MixGraph) {
        let now = graph.current_time();
        graph.stop_source(self.source, now);
        debug!("rain destroyed at {now:.3}s");
    }

    #[inline] pub fn source(&self) -> SourceId { self.source }
    #[inline] pub fn target(&self) -> f32 { self.target }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn buffer_is_two_seconds_at_context_rate() {
        let mut rng = StdRng::seed_from_u64(1);
        let buf = pink_buffer(&mut rng, 8000.0, RAIN_BUFFER_S);
        assert_eq!(buf.len(), 16_000);
        assert!(buf.iter().all(|y| y.is_finite() && y.abs() < 1.5));
        assert!(buf.iter().any(|y| *y != 0.0));
    }

    #[test]
    fn ensure_wires_filter_and_fade() {
        let mut g = MixGraph::new(8000.0);
        let mut rng = StdRng::seed_from_u64(2);
        let rain = Rain::ensure(&mut g, &mut rng, Mode::Practice, 0.32, 1.2).unwrap();
        assert_eq!(rain.target(), 0.08);
        let node = g.buffer(rain.source()).unwrap();
        assert_eq!(node.filter().cutoff_hz(), RAIN_CUTOFF_HZ);
        assert_eq!(node.filter().q(), RAIN_Q);
        assert_eq!(node.buffer_len(), 16_000);
        assert_eq!(node.gain.value_at(0.3), 0.0);
        assert!((node.gain.value_at(0.92) - 0.04).abs() < 1e-6);
        assert_eq!(node.gain.value_at(2.0), 0.08);
    }

    #[test]
    fn menu_rain_is_quieter() {
        let mut g = MixGraph::new(8000.0);
        let mut rng = StdRng::seed_from_u64(3);
        let rain = Rain::ensure(&mut g, &mut rng, Mode::Menu, 0.0, 1.2).unwrap();
        assert_eq!(rain.target(), 0.06);
        let id = rain.source();
        rain.destroy(&mut g);
        assert!(g.is_stopped(id));
    }
}
