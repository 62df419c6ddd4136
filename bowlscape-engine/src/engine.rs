//! Transport and control surface.
//!
//! [`BowlsEngine`] owns the output backend, the mix graph and the transient
//! layers, and walks an explicit transport state machine:
//!
//! ```text
//! Uninitialized ─start→ Starting ─(fade settles)→ Playing ─pause→ Paused
//!                           ▲                          │            │
//!                           └─────────── start ────────┴────────────┘
//! any ─stop→ Stopped (terminal)
//! ```
//!
//! All control calls schedule parameter automation ahead of the render
//! clock; nothing is ever changed retroactively. The evolution timer runs
//! in context time and is serviced from [`BowlsEngine::render`].

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use bowlscape_core::param::AutomationError;

use crate::backend::{Backend, BackendConfig, Offline};
use crate::error::EngineError;
use crate::graph::{MixGraph, GAIN_FLOOR};
use crate::pad::Pad;
use crate::rain::Rain;
use crate::scenes::Mode;
use crate::scheduler::Scheduler;
use crate::strike::{self, StrikeReport, Voicing};

/// Welcome strike lands this long after `start`.
pub const WELCOME_OFFSET_S: f64 = 0.02;
/// Master stays at the floor this long after `start`.
pub const MASTER_HOLD_S: f64 = 0.3;
/// Master reaches the mode target this long after `start`.
pub const MASTER_RAMP_END_S: f64 = 1.0;
/// Pad and rain start fading in this long after the welcome strike.
pub const LAYER_DELAY_S: f64 = 0.3;
pub const LAYER_FADE_S: f64 = 1.2;
pub const PAUSE_FADE_S: f64 = 0.2;
pub const MODE_RAMP_S: f64 = 0.6;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Seed for every random choice; `None` draws one from the OS.
    pub seed: Option<u64>,
    /// Mode used by `resume()` before any `start`/`set_mode`.
    pub initial_mode: Mode,
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum Transport {
    #[default]
    Uninitialized,
    /// Welcome strike sounding, layers fading in.
    Starting { mode: Mode, settles_at: f64 },
    Playing(Mode),
    Paused,
    Stopped,
}

impl Transport {
    /// Starting or playing.
    #[inline]
    pub fn is_active(self) -> bool {
        matches!(self, Transport::Starting { .. } | Transport::Playing(_))
    }
}

/// The opened output plus the graph rendering into it.
struct LiveContext {
    graph: MixGraph,
    running: bool,
}

impl LiveContext {
    fn open<B: Backend>(backend: &mut B) -> Result<Self, EngineError> {
        let BackendConfig { sample_rate, starts_suspended } = backend.open()?;
        info!("audio output opened at {sample_rate} Hz{}", if starts_suspended { " (suspended)" } else { "" });
        Ok(Self { graph: MixGraph::new(sample_rate), running: !starts_suspended })
    }
}

/// Pad and rain only ever exist together.
struct Layers {
    pad: Pad,
    rain: Rain,
}

impl Layers {
    fn build(graph: &mut MixGraph, rng: &mut StdRng, mode: Mode, fade_start: f64) -> Result<Self, AutomationError> {
        let pad = Pad::ensure(graph, rng, mode, fade_start, LAYER_FADE_S)?;
        let rain = Rain::ensure(graph, rng, mode, fade_start, LAYER_FADE_S)?;
        Ok(Self { pad, rain })
    }

    fn destroy(self, graph: &mut MixGraph) {
        self.pad.destroy(graph);
        self.rain.destroy(graph);
    }
}

fn fade_out(graph: &mut MixGraph, now: f64) -> Result<(), AutomationError> {
    graph.hold_master(now)?.set_master_exponential(GAIN_FLOOR, now + PAUSE_FADE_S)?;
    Ok(())
}

pub struct BowlsEngine<B: Backend = Offline> {
    backend: B,
    rng: StdRng,
    mode: Mode,
    transport: Transport,
    ctx: Option<LiveContext>,
    layers: Option<Layers>,
    scheduler: Scheduler,
    last_strike: Option<StrikeReport>,
    timer_fires: u64,
}

impl<B: Backend> BowlsEngine<B> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        let rng = config.seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self {
            backend,
            rng,
            mode: config.initial_mode,
            transport: Transport::Uninitialized,
            ctx: None,
            layers: None,
            scheduler: Scheduler::new(),
            last_strike: None,
            timer_fires: 0,
        }
    }

    // ----------------------------- Control -----------------------------------

    /// Begin (or restart) playback in `mode`.
    ///
    /// Opens the output on first use and resumes it when suspended; a
    /// failure there leaves the transport untouched so the call can simply
    /// be retried later. Calling `start` while already playing rebuilds the
    /// layers from scratch.
    pub fn start(&mut self, mode: Mode) -> Result<(), EngineError> {
        if self.transport == Transport::Stopped {
            return Err(EngineError::Stopped);
        }
        self.mode = mode;

        let ctx = match self.ctx.take() {
            Some(ctx) => ctx,
            None => LiveContext::open(&mut self.backend)?,
        };
        let ctx = self.ctx.insert(ctx);
        if !ctx.running {
            self.backend.resume()?;
            ctx.running = true;
            debug!("audio output resumed");
        }

        let graph = &mut ctx.graph;
        if let Some(old) = self.layers.take() {
            old.destroy(graph);
        }

        let now = graph.current_time();
        let when = now + WELCOME_OFFSET_S;
        let welcome = strike::strike(graph, &mut self.rng, Voicing::Welcome, mode, when)?;

        graph.cancel_master(now);
        graph
            .set_master_at(GAIN_FLOOR, now)?
            .set_master_at(GAIN_FLOOR, now + MASTER_HOLD_S)?
            .set_master_exponential(mode.profile().master_target, now + MASTER_RAMP_END_S)?;

        let fade_start = when + LAYER_DELAY_S;
        self.layers = Some(Layers::build(graph, &mut self.rng, mode, fade_start)?);
        self.scheduler.arm(now, Scheduler::next_delay(&mut self.rng, mode));
        self.last_strike = Some(welcome);
        self.transport = Transport::Starting { mode, settles_at: fade_start + LAYER_FADE_S };

        info!("ambient started in {mode} mode at {now:.3}s");
        Ok(())
    }

    /// `start` with the last recorded mode.
    pub fn resume(&mut self) -> Result<(), EngineError> {
        self.start(self.mode)
    }

    /// Fade the master out, drop pad and rain, disarm the timer. The graph
    /// stays built. Does nothing unless starting or playing.
    pub fn pause(&mut self) {
        if !self.transport.is_active() {
            return;
        }
        if let Some(ctx) = self.ctx.as_mut() {
            let graph = &mut ctx.graph;
            let now = graph.current_time();
            if let Err(e) = fade_out(graph, now) {
                warn!("pause fade failed: {e}");
            }
            if let Some(layers) = self.layers.take() {
                layers.destroy(graph);
            }
            info!("ambient paused at {now:.3}s");
        }
        self.scheduler.disarm();
        self.transport = Transport::Paused;
    }

    /// Switch modes. While muted this only records the mode for the next
    /// `start`/`resume`; while playing it re-ramps the master and rebuilds
    /// the layers with the new profile.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), EngineError> {
        if self.transport == Transport::Stopped {
            return Err(EngineError::Stopped);
        }
        self.mode = mode;
        if !self.transport.is_active() {
            debug!("mode recorded: {mode}");
            return Ok(());
        }
        let Some(ctx) = self.ctx.as_mut() else {
            return Ok(());
        };

        let graph = &mut ctx.graph;
        let now = graph.current_time();
        graph
            .hold_master(now)?
            .set_master_linear(mode.profile().master_target, now + MODE_RAMP_S)?;

        if let Some(old) = self.layers.take() {
            old.destroy(graph);
        }
        self.layers = Some(Layers::build(graph, &mut self.rng, mode, now)?);
        self.scheduler.arm(now, Scheduler::next_delay(&mut self.rng, mode));

        self.transport = match self.transport {
            Transport::Starting { settles_at, .. } => Transport::Starting {
                mode,
                settles_at: settles_at.max(now + LAYER_FADE_S),
            },
            _ => Transport::Playing(mode),
        };
        info!("mode switched to {mode} at {now:.3}s");
        Ok(())
    }

    /// Pause, close the output and drop the graph. Terminal.
    pub fn stop(&mut self) {
        if self.transport == Transport::Stopped {
            return;
        }
        self.pause();
        if self.ctx.take().is_some() {
            self.backend.close();
        }
        self.layers = None;
        self.scheduler.disarm();
        self.transport = Transport::Stopped;
        info!("ambient stopped");
    }

    // ----------------------------- Render ------------------------------------

    /// Fill `out` with mono samples and advance the clock. Outputs silence
    /// (and keeps the clock still) without a running output.
    pub fn render(&mut self, out: &mut [f32]) {
        let mut done = 0;
        while done < out.len() {
            let Some(ctx) = self.ctx.as_mut().filter(|c| c.running) else {
                out[done..].fill(0.0);
                return;
            };
            let graph = &mut ctx.graph;
            let now = graph.current_time();
            if self.scheduler.due(now) {
                self.fire_timer();
                continue;
            }

            let remaining = out.len() - done;
            let n = match self.scheduler.fire_at() {
                Some(t) => frames_until(t - now, graph.sample_rate()).clamp(1, remaining),
                None => remaining,
            };
            graph.render(&mut out[done..done + n]);
            done += n;
        }
        self.settle();
    }

    /// Retune, maybe strike an accent, prune spent automation, re-arm.
    pub(crate) fn fire_timer(&mut self) {
        self.scheduler.disarm();
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        let graph = &mut ctx.graph;
        let now = graph.current_time();
        let mode = self.mode;

        if let Some(layers) = self.layers.as_mut() {
            if let Err(e) = layers.pad.retune(graph, &mut self.rng) {
                warn!("retune failed: {e}");
            }
        }

        let chance = mode.profile().accent_probability;
        if chance > 0.0 && self.rng.gen_bool(f64::from(chance)) {
            match strike::strike(graph, &mut self.rng, Voicing::Accent, mode, now) {
                Ok(report) => self.last_strike = Some(report),
                Err(e) => warn!("accent strike failed: {e}"),
            }
        }

        graph.prune_automation(now);
        self.scheduler.arm(now, Scheduler::next_delay(&mut self.rng, mode));
        self.timer_fires += 1;
    }

    fn settle(&mut self) {
        if let Transport::Starting { mode, settles_at } = self.transport {
            if self.current_time() >= settles_at {
                self.transport = Transport::Playing(mode);
                debug!("transport settled: playing {mode}");
            }
        }
    }

    // ----------------------------- Inspection --------------------------------

    #[inline] pub fn transport(&self) -> Transport { self.transport }
    #[inline] pub fn mode(&self) -> Mode { self.mode }
    #[inline] pub fn is_playing(&self) -> bool { self.transport.is_active() }
    #[inline] pub fn scheduler(&self) -> &Scheduler { &self.scheduler }
    #[inline] pub fn last_strike(&self) -> Option<&StrikeReport> { self.last_strike.as_ref() }
    #[inline] pub fn timer_fires(&self) -> u64 { self.timer_fires }
    #[inline] pub fn backend(&self) -> &B { &self.backend }
    #[inline] pub fn backend_mut(&mut self) -> &mut B { &mut self.backend }

    pub fn graph(&self) -> Option<&MixGraph> {
        self.ctx.as_ref().map(|c| &c.graph)
    }

    pub fn sample_rate(&self) -> Option<f32> {
        self.graph().map(MixGraph::sample_rate)
    }

    /// Context time in seconds; 0 before the output is opened.
    pub fn current_time(&self) -> f64 {
        self.graph().map_or(0.0, MixGraph::current_time)
    }

    /// Master gain right now, if a graph exists.
    pub fn master_gain(&self) -> Option<f32> {
        self.graph().map(MixGraph::master_value)
    }

    #[inline] pub fn has_layers(&self) -> bool { self.layers.is_some() }
    pub fn pad(&self) -> Option<&Pad> { self.layers.as_ref().map(|l| &l.pad) }
    pub fn rain(&self) -> Option<&Rain> { self.layers.as_ref().map(|l| &l.rain) }

    /// Steady-state gains of the three bowls, when the pad exists.
    pub fn pad_targets(&self) -> Option<[f32; 3]> {
        self.pad().map(Pad::targets)
    }
}

fn frames_until(dt: f64, sr: f32) -> usize {
    (dt * f64::from(sr)).ceil().max(1.0) as usize
}
