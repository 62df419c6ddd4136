//! Application-lifetime owner of one engine.
//!
//! An [`AmbientHost`] is created once by whatever scope lives as long as the
//! application and is shared by reference (or `Arc`) with everything that
//! wants to control or render audio. It adds the policy the raw engine
//! leaves to its caller:
//!
//! - overlapping `start_ambient` calls are rejected with a compare-and-swap
//!   on a single in-flight slot instead of building the graph twice;
//! - audio failures are logged and reported, never propagated as panics;
//!   the application just stays muted;
//! - `unlock` retries the last requested start after a user interaction,
//!   for outputs that refuse to resume before one.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard};

use log::{debug, warn};

use crate::backend::Backend;
use crate::engine::{BowlsEngine, EngineConfig};
use crate::error::EngineError;
use crate::scenes::Mode;

const IDLE: u8 = 0;
const STARTING: u8 = 1;

/// Result of a start request.
#[derive(Debug)]
pub enum StartOutcome {
    Started,
    /// Another start was already in flight; this one did nothing.
    AlreadyStarting,
    /// Nothing to do (already playing, or no start was ever requested).
    Noop,
    /// The engine refused; the host stays muted.
    Failed(EngineError),
}

impl StartOutcome {
    #[inline]
    pub fn is_started(&self) -> bool {
        matches!(self, StartOutcome::Started)
    }
}

fn mode_to_u8(mode: Mode) -> u8 {
    match mode {
        Mode::Menu => 0,
        Mode::Practice => 1,
    }
}

fn mode_from_u8(v: u8) -> Mode {
    if v == 1 { Mode::Practice } else { Mode::Menu }
}

pub struct AmbientHost<B: Backend> {
    engine: Mutex<BowlsEngine<B>>,
    in_flight: AtomicU8,
    playing: AtomicBool,
    has_started: AtomicBool,
    wants_playing: AtomicBool,
    requested: AtomicU8,
}

impl<B: Backend> AmbientHost<B> {
    pub fn new(backend: B, config: EngineConfig) -> Self {
        Self {
            requested: AtomicU8::new(mode_to_u8(config.initial_mode)),
            engine: Mutex::new(BowlsEngine::new(backend, config)),
            in_flight: AtomicU8::new(IDLE),
            playing: AtomicBool::new(false),
            has_started: AtomicBool::new(false),
            wants_playing: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, BowlsEngine<B>>, EngineError> {
        self.engine.lock().map_err(|_| EngineError::Poisoned)
    }

    /// Start (or restart) playback in `mode`.
    pub fn start_ambient(&self, mode: Mode) -> StartOutcome {
        self.requested.store(mode_to_u8(mode), Ordering::Release);
        self.wants_playing.store(true, Ordering::Release);

        if self
            .in_flight
            .compare_exchange(IDLE, STARTING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("start_ambient({mode}) ignored: a start is already in flight");
            return StartOutcome::AlreadyStarting;
        }

        // Set on every attempt, successful or not.
        self.has_started.store(true, Ordering::Release);
        let result = self.lock().and_then(|mut engine| {
            engine.start(mode)?;
            self.playing.store(true, Ordering::Release);
            Ok(())
        });
        let outcome = match result {
            Ok(()) => StartOutcome::Started,
            Err(e) => {
                warn!("failed to start audio: {e}");
                StartOutcome::Failed(e)
            }
        };
        self.in_flight.store(IDLE, Ordering::Release);
        outcome
    }

    pub fn pause_ambient(&self) {
        self.wants_playing.store(false, Ordering::Release);
        // The guard stays held until the flag is updated.
        let mut engine = self.lock();
        match engine.as_deref_mut() {
            Ok(engine) => engine.pause(),
            Err(e) => warn!("pause failed: {e}"),
        }
        self.playing.store(false, Ordering::Release);
    }

    /// Switch modes (or record the mode for the next start). Failures are
    /// logged and returned; they never leave the host in a broken state.
    pub fn set_ambient_mode(&self, mode: Mode) -> Result<(), EngineError> {
        self.requested.store(mode_to_u8(mode), Ordering::Release);
        self.lock().and_then(|mut engine| engine.set_mode(mode)).map_err(|e| {
            warn!("mode switch to {mode} failed: {e}");
            e
        })
    }

    /// Retry the last requested start, if one is wanted and not playing.
    /// Meant to be wired to the first user interaction.
    pub fn unlock(&self) -> StartOutcome {
        if !self.wants_playing.load(Ordering::Acquire) || self.is_playing() {
            return StartOutcome::Noop;
        }
        self.start_ambient(self.requested_mode())
    }

    /// Stop for good; later starts fail with `EngineError::Stopped`.
    pub fn shutdown(&self) {
        self.wants_playing.store(false, Ordering::Release);
        // The guard stays held until the flag is updated.
        let mut engine = self.lock();
        match engine.as_deref_mut() {
            Ok(engine) => engine.stop(),
            Err(e) => warn!("shutdown failed: {e}"),
        }
        self.playing.store(false, Ordering::Release);
    }

    /// Render from an audio callback. Outputs silence if the lock is poisoned.
    pub fn render(&self, out: &mut [f32]) {
        match self.engine.lock() {
            Ok(mut engine) => engine.render(out),
            Err(_) => out.fill(0.0),
        }
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut BowlsEngine<B>) -> R) -> Result<R, EngineError> {
        let mut engine = self.lock()?;
        Ok(f(&mut engine))
    }

    #[inline] pub fn is_playing(&self) -> bool { self.playing.load(Ordering::Acquire) }
    #[inline] pub fn has_started(&self) -> bool { self.has_started.load(Ordering::Acquire) }
    #[inline] pub fn is_starting(&self) -> bool { self.in_flight.load(Ordering::Acquire) == STARTING }
    #[inline] pub fn requested_mode(&self) -> Mode { mode_from_u8(self.requested.load(Ordering::Acquire)) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendConfig, Offline, Unavailable};
    use crate::engine::Transport;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn config() -> EngineConfig {
        EngineConfig { seed: Some(9), ..EngineConfig::default() }
    }

    /// Output whose resume parks until the test lets it through.
    struct Gated {
        entered: Arc<Barrier>,
        release: Arc<Barrier>,
    }

    impl Backend for Gated {
        fn open(&mut self) -> Result<BackendConfig, EngineError> {
            Ok(BackendConfig { sample_rate: 8000.0, starts_suspended: true })
        }

        fn resume(&mut self) -> Result<(), EngineError> {
            self.entered.wait();
            self.release.wait();
            Ok(())
        }
    }

    #[test]
    fn overlapping_start_is_rejected() {
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let host = Arc::new(AmbientHost::new(
            Gated { entered: Arc::clone(&entered), release: Arc::clone(&release) },
            config(),
        ));

        let first = {
            let host = Arc::clone(&host);
            thread::spawn(move || host.start_ambient(Mode::Menu))
        };
        entered.wait();
        assert!(host.is_starting());
        assert!(matches!(host.start_ambient(Mode::Practice), StartOutcome::AlreadyStarting));
        release.wait();

        assert!(first.join().unwrap().is_started());
        assert!(host.is_playing());
        assert!(!host.is_starting());
        let groups = host.with_engine(|e| e.graph().map(|g| g.group_count())).unwrap();
        assert_eq!(groups, Some(3));
    }

    #[test]
    fn missing_backend_is_non_fatal() {
        let host = AmbientHost::new(Unavailable, config());
        let outcome = host.start_ambient(Mode::Practice);
        assert!(matches!(outcome, StartOutcome::Failed(EngineError::NoAudioBackend(_))));
        assert!(!host.is_playing());
        assert!(host.has_started());
        host.pause_ambient();
        host.set_ambient_mode(Mode::Menu).unwrap();
        let mut out = vec![1.0; 32];
        host.render(&mut out);
        assert!(out.iter().all(|y| *y == 0.0));
    }

    #[test]
    fn unlock_retries_blocked_start() {
        let host = AmbientHost::new(Offline::new(8000.0).blocking_resume(), config());
        assert!(matches!(host.unlock(), StartOutcome::Noop));
        assert!(!host.has_started());
        assert!(matches!(host.start_ambient(Mode::Practice), StartOutcome::Failed(EngineError::Resume(_))));
        assert!(!host.is_playing());
        assert!(host.has_started());

        host.with_engine(|e| e.backend_mut().allow_resume()).unwrap();
        assert!(host.unlock().is_started());
        assert!(host.is_playing());
        assert!(host.has_started());
        assert_eq!(host.with_engine(|e| e.mode()).unwrap(), Mode::Practice);
        assert!(matches!(host.unlock(), StartOutcome::Noop));
    }

    #[test]
    fn unlock_does_not_undo_a_pause() {
        let host = AmbientHost::new(Offline::new(8000.0), config());
        assert!(host.start_ambient(Mode::Menu).is_started());
        host.pause_ambient();
        assert!(!host.is_playing());
        assert!(matches!(host.unlock(), StartOutcome::Noop));
        assert_eq!(host.with_engine(|e| e.transport()).unwrap(), Transport::Paused);
    }

    #[test]
    fn set_mode_is_remembered_for_unlock() {
        let host = AmbientHost::new(Offline::new(8000.0).blocking_resume(), config());
        host.start_ambient(Mode::Menu);
        host.set_ambient_mode(Mode::Practice).unwrap();
        assert_eq!(host.requested_mode(), Mode::Practice);
        host.with_engine(|e| e.backend_mut().allow_resume()).unwrap();
        assert!(host.unlock().is_started());
        assert_eq!(host.with_engine(|e| e.mode()).unwrap(), Mode::Practice);
    }

    #[test]
    fn shutdown_is_final() {
        let host = AmbientHost::new(Offline::new(8000.0), config());
        assert!(host.start_ambient(Mode::Menu).is_started());
        let mut out = vec![0.0; 800];
        host.render(&mut out);
        host.shutdown();
        assert!(!host.is_playing());
        assert!(matches!(host.start_ambient(Mode::Menu), StartOutcome::Failed(EngineError::Stopped)));
        assert!(matches!(host.set_ambient_mode(Mode::Practice), Err(EngineError::Stopped)));
    }

    #[test]
    fn pause_racing_a_start_leaves_flags_consistent() {
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));
        let host = Arc::new(AmbientHost::new(
            Gated { entered: Arc::clone(&entered), release: Arc::clone(&release) },
            config(),
        ));

        let starter = {
            let host = Arc::clone(&host);
            thread::spawn(move || host.start_ambient(Mode::Practice))
        };
        entered.wait();
        let pauser = {
            let host = Arc::clone(&host);
            thread::spawn(move || host.pause_ambient())
        };
        release.wait();
        assert!(starter.join().unwrap().is_started());
        pauser.join().unwrap();

        let engine_playing = host.with_engine(|e| e.is_playing()).unwrap();
        assert_eq!(host.is_playing(), engine_playing);
        assert!(!engine_playing);
        assert_eq!(host.with_engine(|e| e.transport()).unwrap(), Transport::Paused);
    }
}
