//! C ABI wrapper for the Bowlscape engine.
//!
//! Exposes a small set of functions to create/destroy an engine, drive its
//! transport, and render interleaved f32 samples.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle type: `BowlscapeEngine` (heap-allocated; you own/delete it).
//! - Modes: `0` = menu, `1` = practice. Anything else is rejected.
//!   The `*_named` variants take a C string instead; any name other than
//!   `"practice"` means menu.
//! - Control functions return a status code (`BOWLSCAPE_OK` or a negative
//!   `BOWLSCAPE_ERR_*`). Audio failures are never fatal: log, stay muted.
//! - Render path produces **mono** internally and duplicates to N channels.
//!
//! Threading
//! - Control calls and the render call may come from different threads
//!   (UI thread and audio thread). `bowlscape_destroy` must not race any
//!   other call on the same handle.

use std::ffi::{c_char, CStr};

use bowlscape_engine::{AmbientHost, EngineConfig, EngineError, Mode, Offline, StartOutcome};

pub const BOWLSCAPE_OK: i32 = 0;
pub const BOWLSCAPE_ERR_NULL: i32 = -1;
pub const BOWLSCAPE_ERR_NO_BACKEND: i32 = -2;
pub const BOWLSCAPE_ERR_RESUME: i32 = -3;
pub const BOWLSCAPE_ERR_STOPPED: i32 = -4;
pub const BOWLSCAPE_ERR_AUTOMATION: i32 = -5;
pub const BOWLSCAPE_ERR_POISONED: i32 = -6;
pub const BOWLSCAPE_ERR_BAD_MODE: i32 = -7;
/// Another start is in flight on this handle.
pub const BOWLSCAPE_ERR_BUSY: i32 = -8;

/// Opaque engine wrapper we hand to C.
pub struct BowlscapeEngine {
    host: AmbientHost<Offline>,
}

fn status(err: &EngineError) -> i32 {
    match err {
        EngineError::NoAudioBackend(_) => BOWLSCAPE_ERR_NO_BACKEND,
        EngineError::Resume(_) => BOWLSCAPE_ERR_RESUME,
        EngineError::Stopped => BOWLSCAPE_ERR_STOPPED,
        EngineError::Automation(_) => BOWLSCAPE_ERR_AUTOMATION,
        EngineError::Poisoned => BOWLSCAPE_ERR_POISONED,
    }
}

fn outcome_status(outcome: StartOutcome) -> i32 {
    match outcome {
        StartOutcome::Started | StartOutcome::Noop => BOWLSCAPE_OK,
        StartOutcome::AlreadyStarting => BOWLSCAPE_ERR_BUSY,
        StartOutcome::Failed(e) => status(&e),
    }
}

fn mode_from_c(mode: u32) -> Option<Mode> {
    match mode {
        0 => Some(Mode::Menu),
        1 => Some(Mode::Practice),
        _ => None,
    }
}

/// # Safety
/// `name` must be null or a valid NUL-terminated string.
unsafe fn mode_from_name(name: *const c_char) -> Option<Mode> {
    if name.is_null() {
        return None;
    }
    // SAFETY: upheld by the caller.
    let name = unsafe { CStr::from_ptr(name) };
    Some(Mode::from_lenient(&name.to_string_lossy()))
}

/// # Safety
/// `engine` must be null or a live pointer from `bowlscape_create`.
unsafe fn handle<'a>(engine: *const BowlscapeEngine) -> Option<&'a BowlscapeEngine> {
    // SAFETY: upheld by the caller.
    unsafe { engine.as_ref() }
}

// --- Creation / destruction -------------------------------------------------------

/// Create an engine rendering at `sample_rate`. A `seed` of 0 picks a
/// random seed; any other value makes the output reproducible.
#[no_mangle]
pub extern "C" fn bowlscape_create(sample_rate: f32, seed: u64) -> *mut BowlscapeEngine {
    let config = EngineConfig {
        seed: (seed != 0).then_some(seed),
        ..EngineConfig::default()
    };
    let sr = if sample_rate.is_finite() { sample_rate.max(1.0) } else { 48_000.0 };
    let eng = BowlscapeEngine { host: AmbientHost::new(Offline::new(sr), config) };
    Box::into_raw(Box::new(eng))
}

/// Destroy an engine previously returned by `bowlscape_create`.
///
/// # Safety
/// `engine` must be null or a pointer from `bowlscape_create` that has not
/// been destroyed yet.
#[no_mangle]
pub unsafe extern "C" fn bowlscape_destroy(engine: *mut BowlscapeEngine) {
    if !engine.is_null() {
        // SAFETY: the pointer came from `Box::into_raw` in `bowlscape_create`.
        let e = unsafe { Box::from_raw(engine) };
        e.host.shutdown();
    }
}

// --- Transport -------------------------------------------------------------------

/// Start (or restart) playback in `mode`.
///
/// # Safety
/// `engine` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn bowlscape_start(engine: *const BowlscapeEngine, mode: u32) -> i32 {
    let Some(e) = (unsafe { handle(engine) }) else { return BOWLSCAPE_ERR_NULL };
    let Some(mode) = mode_from_c(mode) else { return BOWLSCAPE_ERR_BAD_MODE };
    outcome_status(e.host.start_ambient(mode))
}

/// `bowlscape_start` with the mode given by name.
///
/// # Safety
/// `engine` must be null or a live handle; `mode` must be null or a valid
/// NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn bowlscape_start_named(engine: *const BowlscapeEngine, mode: *const c_char) -> i32 {
    let Some(e) = (unsafe { handle(engine) }) else { return BOWLSCAPE_ERR_NULL };
    let Some(mode) = (unsafe { mode_from_name(mode) }) else { return BOWLSCAPE_ERR_NULL };
    outcome_status(e.host.start_ambient(mode))
}

/// Retry the last requested start after a user interaction.
///
/// # Safety
/// `engine` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn bowlscape_unlock(engine: *const BowlscapeEngine) -> i32 {
    let Some(e) = (unsafe { handle(engine) }) else { return BOWLSCAPE_ERR_NULL };
    outcome_status(e.host.unlock())
}

/// # Safety
/// `engine` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn bowlscape_pause(engine: *const BowlscapeEngine) -> i32 {
    let Some(e) = (unsafe { handle(engine) }) else { return BOWLSCAPE_ERR_NULL };
    e.host.pause_ambient();
    BOWLSCAPE_OK
}

/// # Safety
/// `engine` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn bowlscape_set_mode(engine: *const BowlscapeEngine, mode: u32) -> i32 {
    let Some(e) = (unsafe { handle(engine) }) else { return BOWLSCAPE_ERR_NULL };
    let Some(mode) = mode_from_c(mode) else { return BOWLSCAPE_ERR_BAD_MODE };
    match e.host.set_ambient_mode(mode) {
        Ok(()) => BOWLSCAPE_OK,
        Err(err) => status(&err),
    }
}

/// `bowlscape_set_mode` with the mode given by name.
///
/// # Safety
/// `engine` must be null or a live handle; `mode` must be null or a valid
/// NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn bowlscape_set_mode_named(engine: *const BowlscapeEngine, mode: *const c_char) -> i32 {
    let Some(e) = (unsafe { handle(engine) }) else { return BOWLSCAPE_ERR_NULL };
    let Some(mode) = (unsafe { mode_from_name(mode) }) else { return BOWLSCAPE_ERR_NULL };
    match e.host.set_ambient_mode(mode) {
        Ok(()) => BOWLSCAPE_OK,
        Err(err) => status(&err),
    }
}

/// Terminal: later starts return `BOWLSCAPE_ERR_STOPPED`. The handle still
/// has to be destroyed.
///
/// # Safety
/// `engine` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn bowlscape_stop(engine: *const BowlscapeEngine) -> i32 {
    let Some(e) = (unsafe { handle(engine) }) else { return BOWLSCAPE_ERR_NULL };
    e.host.shutdown();
    BOWLSCAPE_OK
}

/// 1 while starting/playing, 0 otherwise (or for a null handle).
///
/// # Safety
/// `engine` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn bowlscape_is_playing(engine: *const BowlscapeEngine) -> i32 {
    unsafe { handle(engine) }.map_or(0, |e| i32::from(e.host.is_playing()))
}

// --- Rendering -------------------------------------------------------------------

/// Render `frames` of audio into an interleaved f32 buffer with `channels` channels.
/// The engine is mono; the sample is duplicated to all channels.
///
/// Returns the number of frames rendered (0 on error).
///
/// # Safety
/// `engine` must be null or a live handle; `out_interleaved` must be null or
/// point to at least `frames * channels` writable floats.
#[no_mangle]
pub unsafe extern "C" fn bowlscape_render_interleaved_f32(
    engine: *const BowlscapeEngine,
    out_interleaved: *mut f32,
    frames: u32,
    channels: u32,
) -> u32 {
    let Some(e) = (unsafe { handle(engine) }) else { return 0 };
    if out_interleaved.is_null() || frames == 0 || channels == 0 {
        return 0;
    }
    let frames_n = frames as usize;
    let ch = channels as usize;
    let Some(len) = frames_n.checked_mul(ch) else { return 0 };
    // SAFETY: the caller guarantees `frames * channels` writable floats.
    let out = unsafe { std::slice::from_raw_parts_mut(out_interleaved, len) };

    // Mono into the head of the buffer, then spread backwards in place.
    e.host.render(&mut out[..frames_n]);
    if ch > 1 {
        for i in (0..frames_n).rev() {
            let s = out[i];
            out[i * ch..(i + 1) * ch].fill(s);
        }
    }
    frames
}

// --- Inspection ------------------------------------------------------------------

/// Current master gain, or 0 for a null/stopped handle.
///
/// # Safety
/// `engine` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn bowlscape_master_gain(engine: *const BowlscapeEngine) -> f32 {
    let Some(e) = (unsafe { handle(engine) }) else { return 0.0 };
    e.host.with_engine(|eng| eng.master_gain()).ok().flatten().unwrap_or(0.0)
}

/// Seconds rendered so far.
///
/// # Safety
/// `engine` must be null or a live handle.
#[no_mangle]
pub unsafe extern "C" fn bowlscape_current_time(engine: *const BowlscapeEngine) -> f64 {
    let Some(e) = (unsafe { handle(engine) }) else { return 0.0 };
    e.host.with_engine(|eng| eng.current_time()).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;
    use std::ptr;

    #[test]
    fn null_handles_are_rejected() {
        unsafe {
            assert_eq!(bowlscape_start(ptr::null(), 0), BOWLSCAPE_ERR_NULL);
            assert_eq!(bowlscape_pause(ptr::null()), BOWLSCAPE_ERR_NULL);
            assert_eq!(bowlscape_is_playing(ptr::null()), 0);
            assert_eq!(bowlscape_render_interleaved_f32(ptr::null(), ptr::null_mut(), 16, 2), 0);
            bowlscape_destroy(ptr::null_mut());
        }
    }

    #[test]
    fn transport_round_trip() {
        let e = bowlscape_create(8000.0, 3);
        unsafe {
            assert_eq!(bowlscape_start(e, 7), BOWLSCAPE_ERR_BAD_MODE);
            assert_eq!(bowlscape_start(e, 1), BOWLSCAPE_OK);
            assert_eq!(bowlscape_is_playing(e), 1);
            assert_eq!(bowlscape_set_mode(e, 0), BOWLSCAPE_OK);
            assert_eq!(bowlscape_pause(e), BOWLSCAPE_OK);
            assert_eq!(bowlscape_pause(e), BOWLSCAPE_OK);
            assert_eq!(bowlscape_is_playing(e), 0);
            assert_eq!(bowlscape_stop(e), BOWLSCAPE_OK);
            assert_eq!(bowlscape_start(e, 0), BOWLSCAPE_ERR_STOPPED);
            bowlscape_destroy(e);
        }
    }

    #[test]
    fn render_duplicates_mono_across_channels() {
        let e = bowlscape_create(8000.0, 5);
        let mut buf = vec![0.0f32; 4000 * 2];
        unsafe {
            assert_eq!(bowlscape_start(e, 0), BOWLSCAPE_OK);
            let n = bowlscape_render_interleaved_f32(e, buf.as_mut_ptr(), 4000, 2);
            assert_eq!(n, 4000);
            assert!((bowlscape_current_time(e) - 0.5).abs() < 1e-9);
            assert!(bowlscape_master_gain(e) > 0.0);
            bowlscape_destroy(e);
        }
        assert!(buf.chunks(2).all(|f| f[0] == f[1]));
        assert!(buf.iter().any(|y| *y != 0.0));
    }

    #[test]
    fn named_modes_fall_back_to_menu() {
        let e = bowlscape_create(8000.0, 4);
        let practice = CString::new("practice").unwrap();
        let unknown = CString::new("zen").unwrap();
        unsafe {
            assert_eq!(bowlscape_start_named(e, ptr::null()), BOWLSCAPE_ERR_NULL);
            assert_eq!(bowlscape_start_named(e, practice.as_ptr()), BOWLSCAPE_OK);
            assert_eq!((*e).host.requested_mode(), Mode::Practice);
            assert_eq!(bowlscape_set_mode_named(e, unknown.as_ptr()), BOWLSCAPE_OK);
            assert_eq!((*e).host.requested_mode(), Mode::Menu);
            assert_eq!(bowlscape_is_playing(e), 1);
            bowlscape_destroy(e);
        }
    }
}
