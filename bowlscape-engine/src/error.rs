//! Engine error types.

use bowlscape_core::param::AutomationError;

/// Everything the control surface can fail with. None of these are fatal to
/// a hosting application: the usual reaction is to log and stay muted.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The host has no usable audio output (the "no audio API" case).
    #[error("no audio backend available: {0}")]
    NoAudioBackend(String),

    /// The output exists but refused to leave the suspended state
    /// (e.g. an autoplay policy waiting for a user gesture).
    #[error("failed to resume audio output: {0}")]
    Resume(String),

    /// `stop()` is terminal; a fresh engine is needed to play again.
    #[error("engine is stopped")]
    Stopped,

    #[error("invalid automation: {0}")]
    Automation(#[from] AutomationError),

    /// A thread panicked while holding the host's engine lock.
    #[error("engine lock poisoned")]
    Poisoned,
}

/// Returned by `Mode::from_str` for anything but `menu` / `practice`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode `{0}` (expected `menu` or `practice`)")]
pub struct ParseModeError(pub String);
