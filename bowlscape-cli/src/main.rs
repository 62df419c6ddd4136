//! Bowlscape CLI: real-time player and offline renderer for the bowl ambience.
//!
//! Plays through the default (or a named) output device with `cpal`, or
//! renders to a WAV file with `--render`. Either way the same timeline cues
//! apply: `--switch-mode-at` flips menu/practice, `--pause-at` pauses.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use bowlscape_engine::{
    AmbientHost, Backend, BackendConfig, BowlsEngine, EngineConfig, EngineError, Mode, Offline, StartOutcome,
};
use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, info, warn};

/// Offline renders without `--duration` run this long.
const DEFAULT_RENDER_SECS: f64 = 30.0;
const RENDER_BLOCK: usize = 1024;

#[derive(Debug, Parser)]
#[command(name = "bowlscape", version, about = "Singing-bowl ambience: play live or render to WAV")]
struct Args {
    /// List output devices and exit.
    #[arg(long)]
    list_devices: bool,

    /// Output device name (default device otherwise).
    #[arg(long)]
    device: Option<String>,

    #[arg(long)]
    sample_rate: Option<u32>,

    #[arg(long)]
    channels: Option<u16>,

    /// Stop after this many seconds.
    #[arg(long, value_name = "SECONDS")]
    duration: Option<f64>,

    /// `menu` or `practice`.
    #[arg(long, default_value_t = Mode::Menu)]
    mode: Mode,

    /// Output gain applied after the engine's master.
    #[arg(long, default_value_t = 1.0)]
    gain: f32,

    /// Seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,

    /// Render offline to this WAV file instead of playing.
    #[arg(long, value_name = "PATH")]
    render: Option<PathBuf>,

    /// Switch to the other mode at this time.
    #[arg(long, value_name = "SECONDS")]
    switch_mode_at: Option<f64>,

    /// Pause at this time.
    #[arg(long, value_name = "SECONDS")]
    pause_at: Option<f64>,
}

// ----------------------------- Timeline -------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Cue {
    SwitchMode,
    Pause,
}

/// One-shot cues in engine time.
#[derive(Debug, Default)]
struct Timeline {
    switch_at: Option<f64>,
    pause_at: Option<f64>,
}

impl Timeline {
    fn from_args(args: &Args) -> Self {
        Self { switch_at: args.switch_mode_at, pause_at: args.pause_at }
    }

    /// Next cue due at `t`, consuming it.
    fn take_due(&mut self, t: f64) -> Option<Cue> {
        if self.switch_at.is_some_and(|at| t >= at) {
            self.switch_at = None;
            return Some(Cue::SwitchMode);
        }
        if self.pause_at.is_some_and(|at| t >= at) {
            self.pause_at = None;
            return Some(Cue::Pause);
        }
        None
    }
}

fn toggled(mode: Mode) -> Mode {
    match mode {
        Mode::Menu => Mode::Practice,
        Mode::Practice => Mode::Menu,
    }
}

// ----------------------------- Devices --------------------------------------

fn list_output_devices() -> Result<()> {
    let host = cpal::default_host();
    println!("Available output devices:");
    for dev in host.output_devices()? {
        println!("- {}", dev.name()?);
    }
    Ok(())
}

fn pick_device(args: &Args) -> Result<cpal::Device> {
    let host = cpal::default_host();
    if let Some(name) = &args.device {
        for d in host.output_devices()? {
            if d.name()? == *name {
                return Ok(d);
            }
        }
        bail!("requested device not found: {name}");
    }
    host.default_output_device().ok_or_else(|| anyhow!("no default output device"))
}

fn choose_config(
    device: &cpal::Device,
    req_sr: Option<u32>,
    req_ch: Option<u16>,
) -> Result<cpal::SupportedStreamConfig> {
    if req_sr.is_none() && req_ch.is_none() {
        return Ok(device.default_output_config()?);
    }

    let mut best: Option<(u64, cpal::SupportedStreamConfigRange)> = None;
    for range in device.supported_output_configs()? {
        let ch = range.channels();
        let sr_min = range.min_sample_rate().0;
        let sr_max = range.max_sample_rate().0;

        let ch_pen = req_ch.map_or(0, |c| u64::from(ch.abs_diff(c)));
        let sr_pen = match req_sr {
            Some(sr) if !(sr_min..=sr_max).contains(&sr) => u64::from(sr_min.abs_diff(sr).min(sr_max.abs_diff(sr))),
            _ => 0,
        };

        let score = sr_pen.saturating_mul(1000) + ch_pen;
        if best.as_ref().map_or(true, |(s, _)| score < *s) {
            best = Some((score, range));
        }
    }

    let (_, range) = best.ok_or_else(|| anyhow!("no supported output configs"))?;
    let pick_sr = match req_sr {
        Some(sr) => cpal::SampleRate(sr.clamp(range.min_sample_rate().0, range.max_sample_rate().0)),
        None => range.max_sample_rate(),
    };
    Ok(range.with_sample_rate(pick_sr))
}

/// A `cpal` output seen through the engine's backend seam. The stream itself
/// is owned by `main`; the engine only learns the rate.
struct DeviceBackend {
    name: String,
    sample_rate: f32,
}

impl Backend for DeviceBackend {
    fn open(&mut self) -> Result<BackendConfig, EngineError> {
        info!("opening output '{}' at {} Hz", self.name, self.sample_rate);
        Ok(BackendConfig { sample_rate: self.sample_rate, starts_suspended: false })
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    fn close(&mut self) {
        debug!("output '{}' released", self.name);
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    host: Arc<AmbientHost<DeviceBackend>>,
    gain: f32,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
{
    let channels = usize::from(cfg.channels).max(1);

    // ~1 second meter at the stream rate
    let meter_interval = (cfg.sample_rate.0).max(1) as usize;
    let mut meter_count: usize = 0;
    let mut meter_peak: f32 = 0.0;
    let mut mono: Vec<f32> = vec![0.0; 4096];

    let stream = device.build_output_stream(
        cfg,
        move |output: &mut [T], _| {
            let frames = output.len() / channels;
            if mono.len() < frames {
                mono.resize(frames, 0.0);
            }
            let block = &mut mono[..frames];
            host.render(block);

            for (frame, s) in output.chunks_mut(channels).zip(block.iter()) {
                let s = (s * gain).clamp(-1.0, 1.0);
                frame.fill(T::from_sample(s));

                meter_peak = meter_peak.max(s.abs());
                meter_count += 1;
                if meter_count >= meter_interval {
                    debug!("peak ~ {meter_peak:.4}");
                    meter_peak = 0.0;
                    meter_count = 0;
                }
            }
        },
        |e| warn!("stream error: {e}"),
        None,
    )?;

    Ok(stream)
}

fn play(args: &Args) -> Result<()> {
    let device = pick_device(args)?;
    let sup_cfg = choose_config(&device, args.sample_rate, args.channels)?;
    let sample_format = sup_cfg.sample_format();
    let mut cfg = sup_cfg.config();
    if let Some(ch) = args.channels {
        cfg.channels = ch;
    }

    let name = device.name()?;
    let backend = DeviceBackend { name: name.clone(), sample_rate: cfg.sample_rate.0 as f32 };
    let host = Arc::new(AmbientHost::new(backend, EngineConfig { seed: args.seed, initial_mode: args.mode }));

    info!("device: {name}, config: {cfg:?} ({sample_format:?}), mode: {}, gain: {:.2}", args.mode, args.gain);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, Arc::clone(&host), args.gain)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, Arc::clone(&host), args.gain)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, Arc::clone(&host), args.gain)?,
        other => bail!("unsupported device sample format: {other:?}"),
    };
    stream.play()?;

    if let StartOutcome::Failed(e) = host.start_ambient(args.mode) {
        return Err(e).context("failed to start audio");
    }
    match args.duration {
        Some(d) => info!("auto-stop after {d} seconds"),
        None => info!("press Ctrl+C to stop"),
    }

    let mut timeline = Timeline::from_args(args);
    loop {
        std::thread::sleep(Duration::from_millis(50));
        let t = host.with_engine(|e| e.current_time())?;
        while let Some(cue) = timeline.take_due(t) {
            match cue {
                Cue::SwitchMode => {
                    let next = toggled(host.requested_mode());
                    host.set_ambient_mode(next)?;
                }
                Cue::Pause => host.pause_ambient(),
            }
        }
        if args.duration.is_some_and(|d| t >= d) {
            break;
        }
    }

    host.shutdown();
    drop(stream);
    Ok(())
}

// ----------------------------- Offline --------------------------------------

fn render_to_wav(args: &Args, path: &Path) -> Result<()> {
    let sr = args.sample_rate.unwrap_or(48_000);
    let channels = args.channels.unwrap_or(2).max(1);
    let seconds = args.duration.unwrap_or(DEFAULT_RENDER_SECS);
    let total = (seconds * f64::from(sr)).round() as usize;

    let mut engine = BowlsEngine::new(Offline::new(sr as f32), EngineConfig { seed: args.seed, initial_mode: args.mode });
    engine.start(args.mode).context("failed to start offline engine")?;

    let spec = hound::WavSpec {
        channels,
        sample_rate: sr,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create {}", path.display()))?;

    info!("rendering {seconds:.1}s of {} at {sr} Hz to {}", args.mode, path.display());

    let mut timeline = Timeline::from_args(args);
    let mut block = vec![0.0f32; RENDER_BLOCK];
    let mut peak = 0.0f32;
    let mut done = 0;
    while done < total {
        while let Some(cue) = timeline.take_due(engine.current_time()) {
            match cue {
                Cue::SwitchMode => engine.set_mode(toggled(engine.mode()))?,
                Cue::Pause => engine.pause(),
            }
        }

        let n = RENDER_BLOCK.min(total - done);
        engine.render(&mut block[..n]);
        for s in &block[..n] {
            let s = (s * args.gain).clamp(-1.0, 1.0);
            peak = peak.max(s.abs());
            for _ in 0..channels {
                writer.write_sample(s)?;
            }
        }
        done += n;
    }
    writer.finalize()?;
    engine.stop();

    info!("wrote {} ({total} frames, peak {peak:.4})", path.display());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.list_devices {
        return list_output_devices();
    }
    if let Some(d) = args.duration {
        if !(d.is_finite() && d > 0.0) {
            bail!("--duration must be a positive number of seconds");
        }
    }

    match &args.render {
        Some(path) => render_to_wav(&args, path),
        None => play(&args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeline_fires_each_cue_once() {
        let mut t = Timeline { switch_at: Some(2.0), pause_at: Some(1.0) };
        assert_eq!(t.take_due(0.5), None);
        assert_eq!(t.take_due(1.0), Some(Cue::Pause));
        assert_eq!(t.take_due(1.5), None);
        assert_eq!(t.take_due(3.0), Some(Cue::SwitchMode));
        assert_eq!(t.take_due(9.0), None);
    }

    #[test]
    fn args_parse_mode_and_cues() {
        let args = Args::parse_from(["bowlscape", "--mode", "practice", "--render", "out.wav", "--pause-at", "5"]);
        assert_eq!(args.mode, Mode::Practice);
        assert_eq!(args.pause_at, Some(5.0));
        assert_eq!(args.render.as_deref(), Some(Path::new("out.wav")));
        assert!(Args::try_parse_from(["bowlscape", "--mode", "zen"]).is_err());
    }

    #[test]
    fn toggles_between_modes() {
        assert_eq!(toggled(Mode::Menu), Mode::Practice);
        assert_eq!(toggled(toggled(Mode::Menu)), Mode::Menu);
    }
}
