//! Playback modes and the sound-design profile each one selects.
//!
//! A mode is the engine's "scene": `Menu` is the quiet, slow background bed
//! behind navigation screens, `Practice` is louder and breathes faster during
//! an active session. Every number in the profiles below is part of the sound
//! design and is kept exactly as tuned.

use core::fmt;
use core::str::FromStr;

use crate::error::ParseModeError;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Menu,
    Practice,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Menu, Mode::Practice];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Menu => "menu",
            Mode::Practice => "practice",
        }
    }

    #[inline]
    pub fn profile(self) -> &'static ModeProfile {
        match self {
            Mode::Menu => &MENU,
            Mode::Practice => &PRACTICE,
        }
    }

    /// Anything that is not `practice` means `menu` (the host's behavior
    /// for unknown mode strings).
    pub fn from_lenient(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("practice") {
            Mode::Practice
        } else {
            Mode::Menu
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "menu" => Ok(Mode::Menu),
            "practice" => Ok(Mode::Practice),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

/// Per-mode targets for every layer of the engine.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ModeProfile {
    /// Master gain once the start ramp completes.
    pub master_target: f32,
    /// Steady-state gain of the three bowl voices.
    pub bowl_targets: [f32; 3],
    /// Breathing LFO rate.
    pub lfo_rate_hz: f32,
    /// LFO swing added to each bowl's gain.
    pub lfo_gain_swing: f32,
    /// LFO swing added to the shared lowpass cutoff.
    pub lfo_cutoff_swing_hz: f32,
    /// Rain bed gain after its fade-in.
    pub rain_target: f32,
    /// Scheduler re-arm delay range, seconds.
    pub retune_delay_s: (f32, f32),
    /// Chance of an accent strike per scheduler fire.
    pub accent_probability: f32,
    /// Accent strike decay range, seconds.
    pub accent_decay_s: (f32, f32),
    /// Accent strike overall level range.
    pub accent_level: (f32, f32),
}

pub const MENU: ModeProfile = ModeProfile {
    master_target: 0.065,
    bowl_targets: [0.05, 0.038, 0.03],
    lfo_rate_hz: 0.025,
    lfo_gain_swing: 0.009,
    lfo_cutoff_swing_hz: 320.0,
    rain_target: 0.06,
    retune_delay_s: (18.0, 30.0),
    accent_probability: 0.0,
    accent_decay_s: (4.5, 6.5),
    accent_level: (0.04, 0.06),
};

pub const PRACTICE: ModeProfile = ModeProfile {
    master_target: 0.085,
    bowl_targets: [0.06, 0.045, 0.035],
    lfo_rate_hz: 0.035,
    lfo_gain_swing: 0.012,
    lfo_cutoff_swing_hz: 420.0,
    rain_target: 0.08,
    retune_delay_s: (14.0, 22.0),
    accent_probability: 0.22,
    accent_decay_s: (6.0, 8.5),
    accent_level: (0.06, 0.08),
};
