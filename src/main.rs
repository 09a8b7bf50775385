//! u64stream - headless streaming client for the Ultimate 64
//!
//! Connects the streaming core to real sockets and, optionally, to a raw
//! audio/video recorder. Rendering and playback are left to embedders of the
//! library; this binary is the reference wiring:
//!
//! - loads TOML configuration (path from `--config`, `-c` or positional),
//! - optionally commands the device to start streaming,
//! - optionally uploads and runs a program image (`--run FILE`),
//! - records raw RGBA frames and PCM samples (`--record NAME` writes
//!   `NAME.rgb` and `NAME.pcm`),
//! - stops the device stream again on exit.

use crossbeam_channel::{unbounded, Sender};
use log::{error, info};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::env;
use std::fs::File;
use std::io::Write;
use u64stream::command::{CommandChannel, DeviceCommand};
use u64stream::config::AppConfig;
use u64stream::error::Result;
use u64stream::framebuffer::{
    AudioSink, DrawPoint, FrameBuffer, NullAudioSink, NullPresenter, Presenter,
};
use u64stream::stream::{ControlEvent, PacketSource, StreamRunner, UdpPacketSource};

/// Command line options on top of the config file
struct CliOptions {
    config_path: Option<String>,
    host_override: Option<String>,
    record_base: Option<String>,
    run_program: Option<String>,
}

/// Parse command line arguments.
///
/// Supports:
/// - `u64stream <config.toml>` (positional)
/// - `u64stream --config <path>` / `-c <path>`
/// - `--host <ip>` overriding the configured device host
/// - `--record <name>` raw A/V capture
/// - `--run <file>` upload and run a program image
fn parse_args() -> CliOptions {
    let args: Vec<String> = env::args().collect();
    let mut opts = CliOptions {
        config_path: None,
        host_override: None,
        record_base: None,
        run_program: None,
    };

    let mut i = 1;
    while i < args.len() {
        let value = |i: usize| args.get(i + 1).cloned();
        match args[i].as_str() {
            "--config" | "-c" => {
                opts.config_path = value(i);
                i += 2;
            }
            "--host" | "-u" => {
                opts.host_override = value(i);
                i += 2;
            }
            "--record" | "-o" => {
                opts.record_base = value(i);
                i += 2;
            }
            "--run" | "-x" => {
                opts.run_program = value(i);
                i += 2;
            }
            arg if !arg.starts_with('-') && opts.config_path.is_none() => {
                opts.config_path = Some(arg.to_string());
                i += 1;
            }
            arg => {
                eprintln!("Ignoring unknown argument '{}'", arg);
                i += 1;
            }
        }
    }

    opts
}

/// Presenter/sink pair writing raw RGBA frames and PCM samples to disk.
///
/// The output is encoder-friendly:
/// `ffmpeg -vcodec rawvideo -pix_fmt abgr -s 384x272 -r 50 -i NAME.rgb \
///  -f s16le -ar 48000 -ac 2 -i NAME.pcm out.avi`
struct RawRecorder {
    video: File,
    audio: File,
}

impl RawRecorder {
    fn create(base: &str) -> Result<Self> {
        info!("Recording raw video to {}.rgb and audio to {}.pcm", base, base);
        Ok(Self {
            video: File::create(format!("{}.rgb", base))?,
            audio: File::create(format!("{}.pcm", base))?,
        })
    }
}

impl Presenter for RawRecorder {
    fn present(&mut self, frame: &FrameBuffer) -> Result<()> {
        self.video.write_all(&frame.as_bytes())?;
        Ok(())
    }
}

impl DrawPoint for RawRecorder {
    fn draw_point(&mut self, _x: usize, _y: usize, _r: u8, _g: u8, _b: u8) {
        // Precise mode targets an interactive canvas; nothing to record here
    }
}

/// PCM sample writer sharing the recorder's audio file
struct PcmSink(File);

impl AudioSink for PcmSink {
    fn queue(&mut self, samples: &[i16]) -> Result<()> {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for s in samples {
            bytes.extend_from_slice(&s.to_le_bytes());
        }
        self.0.write_all(&bytes)?;
        Ok(())
    }
}

/// Forward SIGINT/SIGTERM to the streaming loop as quit events
fn spawn_signal_handler(events: Sender<ControlEvent>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    std::thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!("Received signal {}, shutting down", signal);
            let _ = events.send(ControlEvent::Quit);
        }
    });
    Ok(())
}

fn main() -> Result<()> {
    let opts = parse_args();

    let config = match &opts.config_path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::u64_defaults(),
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.logging.level),
    )
    .init();

    info!("u64stream v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &opts.config_path {
        info!("Using config: {}", path);
    }

    let host = opts
        .host_override
        .clone()
        .unwrap_or_else(|| config.device.host.clone());

    // Command channel, and the device-side stream start
    let mut command = if host.is_empty() {
        info!("No device host configured; expecting an already-running stream");
        None
    } else {
        info!("Ultimate 64 command interface at {}", host);
        let mut channel = CommandChannel::new(host, config.logging.diagnostics);
        if config.device.start_stream_on_start {
            channel.execute(DeviceCommand::StartStream)?;
        }
        Some(channel)
    };

    // Program upload happens before the streaming loop starts
    if let Some(path) = &opts.run_program {
        let Some(channel) = command.as_mut() else {
            error!("--run requires a device host");
            return Err(u64stream::Error::NoHost);
        };
        let program = std::fs::read(path)?;
        channel.upload_and_run(&program)?;
    }

    let video_source = UdpPacketSource::bind("video", config.streaming.video_port)?;
    let audio_source = if config.streaming.audio_enabled {
        Some(UdpPacketSource::bind(
            "audio",
            config.streaming.audio_port,
        )?)
    } else {
        info!("Audio is off.");
        None
    };

    let (event_tx, event_rx) = unbounded();
    spawn_signal_handler(event_tx)?;

    let mut runner = StreamRunner::new(
        &config,
        Box::new(video_source),
        audio_source.map(|s| Box::new(s) as Box<dyn PacketSource>),
        event_rx,
        command,
    )?;

    info!("Running... press Ctrl-C to stop.");
    let result = match &opts.record_base {
        Some(base) => {
            let mut recorder = RawRecorder::create(base)?;
            // run() borrows the presenter and the sink separately, so the
            // PCM side writes through its own handle to the same file
            let mut sink = PcmSink(recorder.audio.try_clone()?);
            runner.run(&mut recorder, &mut sink)
        }
        None => runner.run(&mut NullPresenter, &mut NullAudioSink),
    };

    if let Err(e) = &result {
        error!("Streaming loop failed: {}", e);
    }

    let (video_bytes, audio_bytes) = runner.totals();
    info!(
        "Received video data: {} bytes. Received audio data: {} bytes.",
        video_bytes, audio_bytes
    );
    info!("Shutdown complete");

    result
}
