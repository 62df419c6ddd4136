//! Bowlscape Engine: singing-bowl ambience graph, layers and transport.
//!
//! Crate layout:
//! - [`nodes`]     : oscillators, LFO, scheduled sources, gain groups, loop buffers
//! - [`graph`]     : `MixGraph` (buses → lowpass → master) and the render clock
//! - [`scenes`]    : `Mode` and the per-mode sound-design profiles
//! - [`pad`]       : three detuned bowl voices with slow retuning
//! - [`rain`]      : looped, filtered pink-noise bed
//! - [`strike`]    : welcome and accent bell strikes
//! - [`scheduler`] : the evolution timer
//! - [`engine`]    : `BowlsEngine`, the transport state machine
//! - [`backend`]   : the audio-output seam (`Offline`, `Unavailable`)
//! - [`host`]      : `AmbientHost`, an application-lifetime owner
//!
//! Rendering is mono `f32`. The engine allocates when layers are built or
//! torn down (control calls and timer fires), never per sample.

pub mod backend;
pub mod engine;
pub mod error;
pub mod graph;
pub mod host;
pub mod nodes;
pub mod pad;
pub mod rain;
pub mod scenes;
pub mod scheduler;
pub mod strike;

pub use backend::{Backend, BackendConfig, Offline, Unavailable};
pub use engine::{BowlsEngine, EngineConfig, Transport};
pub use error::{EngineError, ParseModeError};
pub use graph::{Bus, MixGraph, GAIN_FLOOR};
pub use host::{AmbientHost, StartOutcome};
pub use scenes::{Mode, ModeProfile};
pub use strike::{StrikeReport, Voicing};
