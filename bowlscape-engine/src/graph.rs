//! The mix graph: buses, shared lowpass, master gain and the render clock.
//!
//! Routing is fixed:
//!
//! ```text
//! pad sources → bowl gain groups ─┐
//! strike sources ─────────────────┼→ pad / strike / rain buses → lowpass → master → out
//! rain buffer ────────────────────┘
//! ```
//!
//! The graph owns every live node in flat vectors and hands out ids. It is
//! built once per output and survives pause/resume; only the sources and
//! groups come and go. Rendering is mono, one sample at a time, with all
//! parameter automation evaluated at sample accuracy.

use bowlscape_core::filters::SvfTpt;
use bowlscape_core::param::{AudioParam, AutomationError};

use crate::nodes::{BufferSource, GainGroup, GroupId, Lfo, LoopBuffer, Osc, Route, Source, SourceId};

/// Master gain never goes below this (exponential ramps cannot touch 0).
pub const GAIN_FLOOR: f32 = 0.0001;

pub const PAD_BUS_GAIN: f32 = 0.9;
pub const STRIKE_BUS_GAIN: f32 = 0.9;
pub const RAIN_BUS_GAIN: f32 = 1.0;
pub const LOWPASS_CUTOFF_HZ: f32 = 1100.0;
pub const LOWPASS_Q: f32 = 0.7;
/// The LFO may never sweep the lowpass below this.
const MIN_CUTOFF_HZ: f32 = 40.0;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Bus {
    Pad,
    Strike,
    Rain,
}

impl Bus {
    #[inline]
    fn index(self) -> usize {
        match self {
            Bus::Pad => 0,
            Bus::Strike => 1,
            Bus::Rain => 2,
        }
    }
}

/// The breathing modulator: one LFO driving the bowl groups (each by its own
/// depth) and the lowpass cutoff.
#[derive(Copy, Clone, Debug)]
struct LfoSlot {
    lfo: Lfo,
    cutoff_depth_hz: f32,
}

pub struct MixGraph {
    sr: f32,
    frame: u64,
    next_id: u64,
    sources: Vec<Source>,
    groups: Vec<GainGroup>,
    buffers: Vec<BufferSource>,
    lfo: Option<LfoSlot>,
    bus_gains: [f32; 3],
    lowpass: SvfTpt,
    cutoff: AudioParam,
    master: AudioParam,
}

impl MixGraph {
    pub fn new(sr: f32) -> Self {
        let sr = sr.max(1.0);
        Self {
            sr,
            frame: 0,
            next_id: 1,
            sources: Vec::new(),
            groups: Vec::new(),
            buffers: Vec::new(),
            lfo: None,
            bus_gains: [PAD_BUS_GAIN, STRIKE_BUS_GAIN, RAIN_BUS_GAIN],
            lowpass: SvfTpt::lowpass(LOWPASS_CUTOFF_HZ, LOWPASS_Q, sr),
            cutoff: AudioParam::new(LOWPASS_CUTOFF_HZ),
            master: AudioParam::new(GAIN_FLOOR),
        }
    }

    #[inline] pub fn sample_rate(&self) -> f32 { self.sr }

    /// Seconds rendered so far.
    #[inline]
    pub fn current_time(&self) -> f64 {
        self.frame as f64 / f64::from(self.sr)
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    // ----------------------------- Nodes -------------------------------------

    pub fn add_source(&mut self, osc: Osc, gain: AudioParam, route: Route, start: f64) -> SourceId {
        let id = SourceId(self.alloc_id());
        self.sources.push(Source::new(id, osc, gain, route, start));
        id
    }

    /// Same as `add_source`, with a lowpass after the gain.
    pub fn add_filtered_source(
        &mut self,
        osc: Osc,
        gain: AudioParam,
        filter: SvfTpt,
        route: Route,
        start: f64,
    ) -> SourceId {
        let id = self.add_source(osc, gain, route, start);
        if let Some(s) = self.sources.last_mut() {
            s.set_filter(filter);
        }
        id
    }

    pub fn add_group(&mut self, gain: AudioParam, lfo_depth: f32, bus: Bus) -> GroupId {
        let id = GroupId(self.alloc_id());
        self.groups.push(GainGroup::new(id, gain, lfo_depth, bus));
        id
    }

    pub fn remove_group(&mut self, id: GroupId) {
        self.groups.retain(|g| g.id() != id);
    }

    pub fn add_buffer(&mut self, buffer: LoopBuffer, filter: SvfTpt, gain: AudioParam, bus: Bus) -> SourceId {
        let id = SourceId(self.alloc_id());
        self.buffers.push(BufferSource::new(id, buffer, filter, gain, bus));
        id
    }

    pub fn source(&self, id: SourceId) -> Option<&Source> {
        self.sources.iter().find(|s| s.id() == id)
    }

    pub fn source_mut(&mut self, id: SourceId) -> Option<&mut Source> {
        self.sources.iter_mut().find(|s| s.id() == id)
    }

    pub fn group(&self, id: GroupId) -> Option<&GainGroup> {
        self.groups.iter().find(|g| g.id() == id)
    }

    pub fn buffer(&self, id: SourceId) -> Option<&BufferSource> {
        self.buffers.iter().find(|b| b.id() == id)
    }

    pub fn buffer_mut(&mut self, id: SourceId) -> Option<&mut BufferSource> {
        self.buffers.iter_mut().find(|b| b.id() == id)
    }

    /// Stop an oscillator or buffer source at `t`. Unknown ids are ignored.
    pub fn stop_source(&mut self, id: SourceId, t: f64) {
        if let Some(s) = self.source_mut(id) {
            s.stop_at(t);
        } else if let Some(b) = self.buffer_mut(id) {
            b.stop_at(t);
        }
    }

    /// True for sources that have stopped or were already collected.
    pub fn is_stopped(&self, id: SourceId) -> bool {
        let now = self.current_time();
        if let Some(s) = self.source(id) {
            return s.is_stopped(now);
        }
        self.buffer(id).map_or(true, |b| b.is_stopped(now))
    }

    /// Sources (oscillators and buffers) that have not stopped yet.
    pub fn live_source_count(&self) -> usize {
        let now = self.current_time();
        self.sources.iter().filter(|s| !s.is_stopped(now)).count()
            + self.buffers.iter().filter(|b| !b.is_stopped(now)).count()
    }

    pub fn group_count(&self) -> usize { self.groups.len() }

    // ----------------------------- Modulation --------------------------------

    pub fn set_lfo(&mut self, lfo: Lfo, cutoff_depth_hz: f32) {
        self.lfo = Some(LfoSlot { lfo, cutoff_depth_hz });
    }

    pub fn clear_lfo(&mut self) {
        self.lfo = None;
    }

    pub fn lfo(&self) -> Option<&Lfo> {
        self.lfo.as_ref().map(|s| &s.lfo)
    }

    /// How far the LFO swings the lowpass cutoff, in Hz.
    pub fn lfo_cutoff_depth(&self) -> Option<f32> {
        self.lfo.as_ref().map(|s| s.cutoff_depth_hz)
    }

    /// Cutoff the shared lowpass ran with on the last rendered sample.
    pub fn lowpass_cutoff_hz(&self) -> f32 {
        self.lowpass.cutoff_hz()
    }

    // ----------------------------- Master ------------------------------------
    //
    // All master writes go through these; targets are raised to GAIN_FLOOR.

    pub fn master(&self) -> &AudioParam { &self.master }
    pub fn cutoff(&self) -> &AudioParam { &self.cutoff }

    /// Drop all master automation and hold `value`.
    pub fn set_master(&mut self, value: f32) {
        self.master.set_value(value.max(GAIN_FLOOR));
    }

    pub fn set_master_at(&mut self, value: f32, t: f64) -> Result<&mut Self, AutomationError> {
        self.master.set_value_at_time(value.max(GAIN_FLOOR), t)?;
        Ok(self)
    }

    pub fn set_master_linear(&mut self, target: f32, end: f64) -> Result<&mut Self, AutomationError> {
        self.master.linear_ramp_to_value_at_time(target.max(GAIN_FLOOR), end)?;
        Ok(self)
    }

    pub fn set_master_exponential(&mut self, target: f32, end: f64) -> Result<&mut Self, AutomationError> {
        self.master.exponential_ramp_to_value_at_time(target.max(GAIN_FLOOR), end)?;
        Ok(self)
    }

    /// Cancel master automation from `now` and pin the value reached there.
    pub fn hold_master(&mut self, now: f64) -> Result<&mut Self, AutomationError> {
        self.master.hold_at(now)?;
        Ok(self)
    }

    pub fn cancel_master(&mut self, from: f64) {
        self.master.cancel_scheduled_values(from);
    }

    /// Master gain at the current time.
    #[inline]
    pub fn master_value(&self) -> f32 {
        self.master.value_at(self.current_time())
    }

    // ----------------------------- Render ------------------------------------

    /// Render one mono sample and advance the clock.
    pub fn next_sample(&mut self) -> f32 {
        let t = self.current_time();
        let sr = self.sr;
        let (lfo, cutoff_swing) = match self.lfo.as_mut() {
            Some(slot) => (slot.lfo.next_norm(sr), slot.cutoff_depth_hz),
            None => (0.0, 0.0),
        };

        for g in &mut self.groups {
            g.acc = 0.0;
        }

        let mut buses = [0.0_f32; 3];
        for s in &mut self.sources {
            let y = s.next(t, sr);
            if y == 0.0 {
                continue;
            }
            match s.route() {
                Route::Bus(bus) => buses[bus.index()] += y,
                Route::Group(id) => {
                    // Sources of a removed group are dropped.
                    if let Some(g) = self.groups.iter_mut().find(|g| g.id() == id) {
                        g.acc += y;
                    }
                }
            }
        }

        for g in &self.groups {
            buses[g.bus().index()] += g.acc * g.gain_at(t, lfo);
        }

        for b in &mut self.buffers {
            buses[b.bus().index()] += b.next(t);
        }

        let mix: f32 = buses.iter().zip(self.bus_gains).map(|(x, g)| x * g).sum();

        let cut = self.cutoff.value_at(t) + lfo * cutoff_swing;
        self.lowpass.set_cutoff_hz(cut.max(MIN_CUTOFF_HZ));
        let y = self.lowpass.process(mix) * self.master.value_at(t);

        self.frame += 1;
        y
    }

    /// Render a block, then drop nodes that finished during it.
    pub fn render(&mut self, out: &mut [f32]) {
        for y in out.iter_mut() {
            *y = self.next_sample();
        }
        self.collect_finished();
    }

    /// Remove stopped sources and buffers.
    pub fn collect_finished(&mut self) {
        let now = self.current_time();
        self.sources.retain(|s| !s.is_stopped(now));
        self.buffers.retain(|b| !b.is_stopped(now));
    }

    /// Forget automation events in the past on every parameter.
    pub fn prune_automation(&mut self, now: f64) {
        self.master.prune_before(now);
        self.cutoff.prune_before(now);
        for s in &mut self.sources {
            s.gain.prune_before(now);
            s.osc.frequency.prune_before(now);
        }
        for g in &mut self.groups {
            g.gain.prune_before(now);
        }
        for b in &mut self.buffers {
            b.gain.prune_before(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_graph_is_silent_and_floored() {
        let mut g = MixGraph::new(8000.0);
        let mut out = vec![1.0; 256];
        g.render(&mut out);
        assert!(out.iter().all(|y| *y == 0.0));
        assert_eq!(g.master_value(), GAIN_FLOOR);
        assert!((g.current_time() - 256.0 / 8000.0).abs() < 1e-12);
    }

    #[test]
    fn source_reaches_output_through_master() {
        let mut g = MixGraph::new(8000.0);
        g.set_master(1.0);
        g.add_source(Osc::sine(200.0, 0.0), AudioParam::new(0.5), Route::Bus(Bus::Strike), 0.0);
        let mut out = vec![0.0; 800];
        g.render(&mut out);
        let peak = out.iter().fold(0.0_f32, |m, y| m.max(y.abs()));
        assert!(peak > 0.3 && peak < 0.6, "peak={peak}");
    }

    #[test]
    fn group_gain_scales_its_sources() {
        let mut g = MixGraph::new(8000.0);
        g.set_master(1.0);
        let group = g.add_group(AudioParam::new(0.0), 0.0, Bus::Pad);
        g.add_source(Osc::sine(200.0, 0.0), AudioParam::new(1.0), Route::Group(group), 0.0);
        let mut out = vec![0.0; 400];
        g.render(&mut out);
        assert!(out.iter().all(|y| *y == 0.0));
        assert_eq!(g.group_count(), 1);
        g.remove_group(group);
        assert_eq!(g.group_count(), 0);
    }

    #[test]
    fn stopped_sources_are_collected() {
        let mut g = MixGraph::new(8000.0);
        let id = g.add_source(Osc::sine(200.0, 0.0), AudioParam::new(1.0), Route::Bus(Bus::Strike), 0.0);
        g.stop_source(id, 0.01);
        assert!(!g.is_stopped(id));
        assert_eq!(g.live_source_count(), 1);
        let mut out = vec![0.0; 160];
        g.render(&mut out);
        assert!(g.is_stopped(id));
        assert!(g.source(id).is_none());
        assert_eq!(g.live_source_count(), 0);
    }

    #[test]
    fn lfo_slot_is_replaceable() {
        let mut g = MixGraph::new(8000.0);
        assert!(g.lfo().is_none());
        g.set_lfo(Lfo::sine(0.025), 320.0);
        assert_eq!(g.lfo().map(Lfo::rate), Some(0.025));
        g.clear_lfo();
        assert!(g.lfo().is_none());
    }

    #[test]
    fn master_writes_are_floored() {
        let mut g = MixGraph::new(8000.0);
        g.set_master(0.0);
        assert_eq!(g.master_value(), GAIN_FLOOR);

        g.set_master_at(0.5, 0.0).unwrap()
            .set_master_linear(0.0, 0.1).unwrap()
            .set_master_at(-1.0, 0.2).unwrap()
            .set_master_exponential(0.0, 0.3).unwrap();
        for t in [0.1, 0.15, 0.2, 0.25, 0.3, 1.0] {
            assert!(g.master().value_at(t) >= GAIN_FLOOR, "t={t}");
        }
        assert_eq!(g.master().value_at(0.1), GAIN_FLOOR);
        assert_eq!(g.master().final_value(), GAIN_FLOOR);
    }

    #[test]
    fn hold_master_pins_mid_ramp() {
        let mut g = MixGraph::new(8000.0);
        g.set_master_at(0.0, 0.0).unwrap().set_master_linear(1.0, 1.0).unwrap();
        g.hold_master(0.5).unwrap().set_master_exponential(0.0, 0.7).unwrap();
        assert!((g.master().value_at(0.5) - 0.5).abs() < 1e-3);
        assert!(g.master().value_at(0.6) < 0.5);
        assert_eq!(g.master().value_at(0.7), GAIN_FLOOR);
        g.cancel_master(0.0);
        assert!(g.master().events().is_empty());
    }

    #[test]
    fn lfo_sweeps_lowpass_around_base() {
        let mut g = MixGraph::new(1000.0);
        g.set_lfo(Lfo::sine(1.0), 420.0);
        assert_eq!(g.lfo_cutoff_depth(), Some(420.0));
        let (mut lo, mut hi) = (f32::MAX, f32::MIN);
        for _ in 0..1000 {
            g.next_sample();
            lo = lo.min(g.lowpass_cutoff_hz());
            hi = hi.max(g.lowpass_cutoff_hz());
        }
        assert!((lo - 680.0).abs() < 1.0 && (hi - 1520.0).abs() < 1.0, "{lo}..{hi}");

        g.clear_lfo();
        assert_eq!(g.lfo_cutoff_depth(), None);
        g.next_sample();
        assert!((g.lowpass_cutoff_hz() - LOWPASS_CUTOFF_HZ).abs() < 0.01);
    }
}
