//! Building blocks (nodes) for the mix graph.
//!
//! Contents:
//! - `Osc`          : sine oscillator with an automatable frequency and fixed detune
//! - `Lfo`          : free-running sine LFO for the "breathing" modulation
//! - `Source`       : one-shot scheduled voice (oscillator → gain → optional lowpass)
//! - `GainGroup`    : sums a set of sources, applies gain + LFO swing, feeds a bus
//! - `LoopBuffer`   : looping sample player
//! - `BufferSource` : looping buffer → lowpass → gain, feeding a bus
//!
//! Notes:
//! - Frequency is **Hz**; time is the owning graph's clock in seconds.
//! - A source has one start and at most one stop. Once stopped it stays
//!   silent forever; playing again means creating a new source.

use bowlscape_core::dsp::{cents_to_ratio, fast_sin, wrap_phase01, TAU};
use bowlscape_core::filters::SvfTpt;
use bowlscape_core::param::AudioParam;

use crate::graph::Bus;

/// Identifies a source (oscillator or buffer) inside one graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(pub(crate) u64);

/// Identifies a gain group inside one graph.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub(crate) u64);

/// Where a source's output goes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Group(GroupId),
    Bus(Bus),
}

/// Sine oscillator. The frequency param is in Hz before detune.
#[derive(Clone, Debug)]
pub struct Osc {
    phase: f32, // [0,1)
    pub frequency: AudioParam,
    detune_cents: f32,
    detune_ratio: f32,
}

impl Osc {
    pub fn sine(freq_hz: f32, detune_cents: f32) -> Self {
        Self {
            phase: 0.0,
            frequency: AudioParam::new(freq_hz.max(0.0)),
            detune_cents,
            detune_ratio: cents_to_ratio(detune_cents),
        }
    }

    #[inline] pub fn detune_cents(&self) -> f32 { self.detune_cents }

    /// Effective frequency (detune applied) at time `t`.
    #[inline]
    pub fn frequency_at(&self, t: f64) -> f32 {
        self.frequency.value_at(t) * self.detune_ratio
    }

    /// Advance one sample and return the oscillator sample.
    #[inline]
    pub fn next(&mut self, t: f64, sr: f32) -> f32 {
        let s = fast_sin(TAU * self.phase);
        self.phase = wrap_phase01(self.phase + self.frequency_at(t) / sr);
        s
    }
}

/// Low-frequency sine oscillator.
#[derive(Copy, Clone, Debug)]
pub struct Lfo {
    phase: f32,
    rate: f32,
}

impl Lfo {
    #[inline] pub fn sine(rate_hz: f32) -> Self { Self { phase: 0.0, rate: rate_hz.max(0.0) } }
    #[inline] pub fn rate(&self) -> f32 { self.rate }

    /// Next LFO value in **[-1,1]**.
    #[inline]
    pub fn next_norm(&mut self, sr: f32) -> f32 {
        let s = fast_sin(TAU * self.phase);
        self.phase = wrap_phase01(self.phase + self.rate / sr);
        s
    }
}

/// One-shot scheduled voice.
#[derive(Clone, Debug)]
pub struct Source {
    id: SourceId,
    pub osc: Osc,
    pub gain: AudioParam,
    filter: Option<SvfTpt>,
    route: Route,
    start: f64,
    stop: Option<f64>,
}

impl Source {
    pub(crate) fn new(id: SourceId, osc: Osc, gain: AudioParam, route: Route, start: f64) -> Self {
        Self { id, osc, gain, filter: None, route, start, stop: None }
    }

    pub(crate) fn set_filter(&mut self, filter: SvfTpt) {
        self.filter = Some(filter);
    }

    #[inline] pub fn id(&self) -> SourceId { self.id }
    #[inline] pub fn route(&self) -> Route { self.route }
    #[inline] pub fn start_time(&self) -> f64 { self.start }
    #[inline] pub fn stop_time(&self) -> Option<f64> { self.stop }
    #[inline] pub fn has_filter(&self) -> bool { self.filter.is_some() }

    /// Schedule the stop. An earlier stop always wins; a stop can never be
    /// moved later or undone.
    pub fn stop_at(&mut self, t: f64) {
        self.stop = Some(self.stop.map_or(t, |s| s.min(t)));
    }

    #[inline]
    pub fn is_stopped(&self, now: f64) -> bool {
        self.stop.is_some_and(|s| now >= s)
    }

    #[inline]
    pub fn is_playing(&self, now: f64) -> bool {
        now >= self.start && !self.is_stopped(now)
    }

    #[inline]
    pub(crate) fn next(&mut self, t: f64, sr: f32) -> f32 {
        if !self.is_playing(t) {
            return 0.0;
        }
        let y = self.osc.next(t, sr) * self.gain.value_at(t);
        match self.filter.as_mut() {
            Some(f) => f.process(y),
            None => y,
        }
    }
}

/// Gain stage shared by several sources (one per bowl).
#[derive(Clone, Debug)]
pub struct GainGroup {
    id: GroupId,
    pub gain: AudioParam,
    lfo_depth: f32,
    bus: Bus,
    pub(crate) acc: f32,
}

impl GainGroup {
    pub(crate) fn new(id: GroupId, gain: AudioParam, lfo_depth: f32, bus: Bus) -> Self {
        Self { id, gain, lfo_depth, bus, acc: 0.0 }
    }

    #[inline] pub fn id(&self) -> GroupId { self.id }
    #[inline] pub fn bus(&self) -> Bus { self.bus }
    #[inline] pub fn lfo_depth(&self) -> f32 { self.lfo_depth }

    /// Effective gain at `t` for an LFO value in [-1, 1]. Never negative.
    #[inline]
    pub fn gain_at(&self, t: f64, lfo: f32) -> f32 {
        (self.gain.value_at(t) + lfo * self.lfo_depth).max(0.0)
    }
}

/// Looping sample player.
#[derive(Clone, Debug)]
pub struct LoopBuffer {
    data: Vec<f32>,
    pos: usize,
}

impl LoopBuffer {
    pub fn new(data: Vec<f32>) -> Self {
        Self { data, pos: 0 }
    }

    #[inline] pub fn len(&self) -> usize { self.data.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.data.is_empty() }

    #[inline]
    pub fn next(&mut self) -> f32 {
        let Some(&y) = self.data.get(self.pos) else {
            return 0.0;
        };
        self.pos += 1;
        if self.pos >= self.data.len() {
            self.pos = 0;
        }
        y
    }
}

/// Looping buffer → lowpass → gain, feeding a bus directly.
#[derive(Clone, Debug)]
pub struct BufferSource {
    id: SourceId,
    buffer: LoopBuffer,
    filter: SvfTpt,
    pub gain: AudioParam,
    bus: Bus,
    stop: Option<f64>,
}

impl BufferSource {
    pub(crate) fn new(id: SourceId, buffer: LoopBuffer, filter: SvfTpt, gain: AudioParam, bus: Bus) -> Self {
        Self { id, buffer, filter, gain, bus, stop: None }
    }

    #[inline] pub fn id(&self) -> SourceId { self.id }
    #[inline] pub fn bus(&self) -> Bus { self.bus }
    #[inline] pub fn filter(&self) -> &SvfTpt { &self.filter }
    #[inline] pub fn buffer_len(&self) -> usize { self.buffer.len() }

    pub fn stop_at(&mut self, t: f64) {
        self.stop = Some(self.stop.map_or(t, |s| s.min(t)));
    }

    #[inline]
    pub fn is_stopped(&self, now: f64) -> bool {
        self.stop.is_some_and(|s| now >= s)
    }

    #[inline]
    pub(crate) fn next(&mut self, t: f64) -> f32 {
        if self.is_stopped(t) {
            return 0.0;
        }
        self.filter.process(self.buffer.next()) * self.gain.value_at(t)
    }
}
