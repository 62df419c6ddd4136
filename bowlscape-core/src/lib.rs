#![cfg_attr(not(feature = "std"), no_std)]
//! Bowlscape Core: no_std-ready DSP primitives for the singing-bowl engine.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` (+ `alloc`) and use `libm`
//! - `micromath`: use `micromath` as the math backend instead
//! - `fast-math`: polynomial sine for oscillators
//!
//! Modules
//! - [`dsp`]     : math backend, utils (clamp, cents, fast sine, TPT helper)
//! - [`filters`] : TPT state-variable lowpass
//! - [`param`]   : Web-Audio-style parameter automation timeline
//! - [`noise`]   : Paul Kellet pink-noise filter
//!
//! Design
//! - Sample-by-sample primitives; `AudioParam` is the only type that allocates
//!   (its event list), and only on the control side when events are scheduled
//! - Friendly to embedded / real-time targets

extern crate alloc;

pub mod dsp;
pub mod filters;
pub mod noise;
pub mod param;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{cents_to_ratio, clamp, fast_sin, kill_denormals, tpt_g, TAU};
    pub use crate::filters::SvfTpt;
    pub use crate::noise::PinkNoise;
    pub use crate::param::{AudioParam, AutomationError, AutomationEvent, EventKind};
}
