//! Audio output seam.
//!
//! The engine never talks to a sound card directly. It asks a [`Backend`] to
//! open an output (which yields the sample rate and whether the output starts
//! suspended), to resume a suspended output, and to close it. Rendering is
//! pulled by whoever owns the output: a `cpal` callback, an FFI host, or an
//! offline loop writing a WAV file.

use crate::error::EngineError;

/// What an opened output looks like.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BackendConfig {
    pub sample_rate: f32,
    /// Outputs that start suspended must be resumed before the clock runs.
    pub starts_suspended: bool,
}

pub trait Backend {
    /// Open the output. Failing here means there is no audio at all.
    fn open(&mut self) -> Result<BackendConfig, EngineError>;

    /// Bring a suspended output to the running state.
    fn resume(&mut self) -> Result<(), EngineError>;

    /// Release the output. Called once, from `stop()`.
    fn close(&mut self) {}
}

/// Caller-driven output: the clock advances only when `render` is called.
///
/// Used for offline rendering, the C ABI and tests. It can simulate an
/// output that starts suspended and one whose resume is refused until
/// [`Offline::allow_resume`] is called (an autoplay gate).
#[derive(Clone, Debug)]
pub struct Offline {
    sample_rate: f32,
    starts_suspended: bool,
    resume_blocked: bool,
    opened: u32,
    closed: bool,
}

impl Offline {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate: sample_rate.max(1.0),
            starts_suspended: false,
            resume_blocked: false,
            opened: 0,
            closed: false,
        }
    }

    /// Start in the suspended state, like a browser context before a gesture.
    pub fn suspended(mut self) -> Self {
        self.starts_suspended = true;
        self
    }

    /// Refuse `resume` until `allow_resume` is called.
    pub fn blocking_resume(mut self) -> Self {
        self.starts_suspended = true;
        self.resume_blocked = true;
        self
    }

    pub fn allow_resume(&mut self) {
        self.resume_blocked = false;
    }

    /// How many times the output was opened.
    pub fn open_count(&self) -> u32 { self.opened }
    pub fn is_closed(&self) -> bool { self.closed }
}

impl Backend for Offline {
    fn open(&mut self) -> Result<BackendConfig, EngineError> {
        self.opened += 1;
        self.closed = false;
        Ok(BackendConfig {
            sample_rate: self.sample_rate,
            starts_suspended: self.starts_suspended,
        })
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        if self.resume_blocked {
            return Err(EngineError::Resume("playback not allowed before a user gesture".into()));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// A host without any audio output.
#[derive(Copy, Clone, Debug, Default)]
pub struct Unavailable;

impl Backend for Unavailable {
    fn open(&mut self) -> Result<BackendConfig, EngineError> {
        Err(EngineError::NoAudioBackend("no output device on this host".into()))
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        Err(EngineError::NoAudioBackend("no output device on this host".into()))
    }
}
