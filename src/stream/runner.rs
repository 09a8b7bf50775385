//! Single-threaded streaming loop
//!
//! One poll iteration, in order:
//!
//! 1. drain pending control events,
//! 2. one non-blocking audio read,
//! 3. one non-blocking video read,
//! 4. present the frame buffer if a present is pending,
//! 5. sleep briefly when nothing arrived, bounding the iteration rate.
//!
//! Audio is polled strictly before video within an iteration. All mutable
//! stream state (session counters, palette set, lookup table, frame buffer)
//! is owned by this loop; the buffer is only handed out through the
//! presenter after decoding for the iteration is finished, so there is no
//! write/read race to guard.
//!
//! A quit event (or an unrecoverable command-channel failure) clears the run
//! flag, which is observed at the top of the next iteration; reads are
//! single non-blocking attempts, so nothing is in flight to cancel.

use crate::command::{CommandChannel, DeviceCommand};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::framebuffer::{AudioSink, DrawPoint, FrameBuffer, Presenter};
use crate::palette::{ColorTable, Palette, PaletteScheme, PaletteSet};
use crate::protocol::{AudioPacket, VideoPacket};
use crate::stream::audio::AudioStreamBuffer;
use crate::stream::session::StreamSession;
use crate::stream::source::PacketSource;
use crate::stream::sync::{StaleAction, SyncController};
use crate::stream::video::{DecodeMode, VideoFrameDecoder};
use crossbeam_channel::Receiver;
use std::time::Duration;

/// Control events injected by the embedder (keyboard, signals)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Quit,
    /// Switch to the next palette scheme and rebuild the lookup table
    CyclePalette,
    /// Start or stop the device stream, depending on current state
    ToggleStream,
    ResetDevice,
    PowerOff,
}

/// Idle sleep bounding the poll rate when no data is pending
const IDLE_WAIT: Duration = Duration::from_millis(5);

/// Receive buffer sized for the largest datagram either stream produces
const RECV_BUFFER_SIZE: usize = 2048;

/// The decode/present loop and the state it owns
pub struct StreamRunner {
    video_source: Box<dyn PacketSource>,
    audio_source: Option<Box<dyn PacketSource>>,
    events: Receiver<ControlEvent>,
    command: Option<CommandChannel>,

    palettes: PaletteSet,
    table: ColorTable,
    frame: FrameBuffer,
    session: StreamSession,
    sync: SyncController,
    video_decoder: VideoFrameDecoder,
    audio_buffer: AudioStreamBuffer,
    mode: DecodeMode,

    stop_stream_on_exit: bool,
    diagnostics: bool,
    idle_wait: Duration,
    running: bool,
}

impl StreamRunner {
    /// Build a runner from configuration and transports.
    ///
    /// Fails if the configured palette selection is invalid, including a
    /// missing or malformed user palette string.
    pub fn new(
        config: &AppConfig,
        video_source: Box<dyn PacketSource>,
        audio_source: Option<Box<dyn PacketSource>>,
        events: Receiver<ControlEvent>,
        command: Option<CommandChannel>,
    ) -> Result<Self> {
        let scheme = PaletteScheme::from_name(&config.display.palette)?;
        let mut palettes = PaletteSet::default();
        match (&config.display.user_palette, scheme) {
            (Some(text), _) => {
                let user = Palette::parse_user(text)?;
                log::info!("Using user-provided colors: {}", user.format());
                palettes.set_user(user);
            }
            (None, PaletteScheme::User) => {
                return Err(Error::InvalidParameter(
                    "palette = \"user\" requires display.user_palette".to_string(),
                ));
            }
            _ => {}
        }

        let table = ColorTable::new(scheme, &palettes);
        let diagnostics = config.logging.diagnostics;
        let mode = if config.display.precise {
            DecodeMode::Precise
        } else {
            DecodeMode::Fast
        };

        Ok(Self {
            video_source,
            audio_source,
            events,
            command,
            palettes,
            table,
            frame: FrameBuffer::new(),
            session: StreamSession::new(),
            sync: SyncController::new(),
            video_decoder: VideoFrameDecoder::new(diagnostics),
            audio_buffer: AudioStreamBuffer::new(diagnostics),
            mode,
            stop_stream_on_exit: config.device.stop_stream_on_exit,
            diagnostics,
            idle_wait: IDLE_WAIT,
            running: true,
        })
    }

    /// Shrink the idle wait (tests drive the loop with scripted sources)
    #[cfg(test)]
    pub(crate) fn set_idle_wait(&mut self, wait: Duration) {
        self.idle_wait = wait;
    }

    /// Cumulative stream byte counters (for the exit report)
    pub fn totals(&self) -> (u64, u64) {
        (self.session.video_bytes, self.session.audio_bytes)
    }

    /// Run until a quit event or an unrecoverable failure.
    ///
    /// The presenter receives the frame buffer on every present request; the
    /// sink receives decoded audio samples. The presenter doubles as the
    /// draw-point target for the precise decode mode.
    ///
    /// Shutdown (including the best-effort stop-stream command) runs whether
    /// the loop ended on a quit event or on a failure.
    pub fn run<P, A>(&mut self, presenter: &mut P, audio_sink: &mut A) -> Result<()>
    where
        P: Presenter + DrawPoint,
        A: AudioSink,
    {
        let result = self.run_loop(presenter, audio_sink);
        self.shutdown();
        result
    }

    fn run_loop<P, A>(&mut self, presenter: &mut P, audio_sink: &mut A) -> Result<()>
    where
        P: Presenter + DrawPoint,
        A: AudioSink,
    {
        // Show the placeholder until the stream delivers a frame
        self.frame
            .draw_placeholder(self.palettes.get(self.table.scheme()));
        self.sync.request_present();

        while self.running {
            self.drain_events();
            if !self.running {
                break;
            }

            let got_audio = self.poll_audio(audio_sink)?;
            let got_video = self.poll_video(presenter)?;

            if self.sync.take_present() {
                presenter.present(&self.frame)?;
            }

            if !got_audio && !got_video {
                std::thread::sleep(self.idle_wait);
            }
        }

        Ok(())
    }

    /// Attempt one audio datagram; malformed datagrams are dropped with a log
    fn poll_audio<A: AudioSink>(&mut self, sink: &mut A) -> Result<bool> {
        let Some(source) = self.audio_source.as_mut() else {
            return Ok(false);
        };

        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let Some(len) = source.try_recv(&mut buf)? else {
            return Ok(false);
        };

        match AudioPacket::decode(&buf[..len]) {
            Ok(packet) => {
                self.audio_buffer
                    .decode(&packet, &mut self.session, sink)?;
            }
            Err(e) => log::warn!("Dropping audio datagram: {}", e),
        }
        Ok(true)
    }

    /// Attempt one video datagram and update presentation state
    fn poll_video<P: Presenter + DrawPoint>(&mut self, presenter: &mut P) -> Result<bool> {
        let mut buf = [0u8; RECV_BUFFER_SIZE];
        let received = self.video_source.try_recv(&mut buf)?;

        let Some(len) = received else {
            match self.sync.on_idle_iteration() {
                StaleAction::RedrawPlaceholder => {
                    log::warn!("No video data, showing connection-lost screen");
                    self.frame
                        .draw_placeholder(self.palettes.get(self.table.scheme()));
                }
                StaleAction::HeartbeatPresent | StaleAction::None => {}
            }
            return Ok(false);
        };

        match VideoPacket::decode(&buf[..len]) {
            Ok(packet) => {
                let decoded = match self.mode {
                    DecodeMode::Fast => self.video_decoder.decode(
                        &packet,
                        &mut self.session,
                        &self.table,
                        &mut self.frame,
                    ),
                    DecodeMode::Precise => self.video_decoder.decode_precise(
                        &packet,
                        &mut self.session,
                        self.palettes.get(self.table.scheme()),
                        presenter,
                    ),
                };
                match decoded {
                    Ok(frame_end) => self.sync.on_video_packet(frame_end),
                    Err(e) => log::warn!("Dropping video packet: {}", e),
                }
            }
            Err(e) => log::warn!("Dropping video datagram: {}", e),
        }
        Ok(true)
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                ControlEvent::Quit => {
                    log::info!("Quit requested");
                    self.running = false;
                }
                ControlEvent::CyclePalette => {
                    let next = self.table.scheme().next();
                    log::info!("Switching palette to {:?}", next);
                    self.table.select(next, &self.palettes);
                }
                ControlEvent::ToggleStream => self.toggle_stream(),
                ControlEvent::ResetDevice => {
                    self.run_device_command(DeviceCommand::Reset);
                }
                ControlEvent::PowerOff => {
                    // The device is gone after this; never try to stop the
                    // stream against a powered-off box.
                    self.stop_stream_on_exit = false;
                    self.run_device_command(DeviceCommand::PowerOff);
                    self.command = None;
                }
            }
        }
    }

    fn toggle_stream(&mut self) {
        let Some(channel) = self.command.as_ref() else {
            log::warn!("Can only start/stop the stream when a device host is configured");
            return;
        };
        let cmd = if channel.is_streaming() {
            DeviceCommand::StopStream
        } else {
            DeviceCommand::StartStream
        };
        self.run_device_command(cmd);
    }

    /// Run a command; a channel failure is unrecoverable and stops the loop
    fn run_device_command(&mut self, cmd: DeviceCommand) {
        let Some(channel) = self.command.as_mut() else {
            log::warn!("No device host configured, ignoring {:?}", cmd);
            return;
        };
        if let Err(e) = channel.execute(cmd) {
            log::error!("Command channel failure: {}", e);
            self.running = false;
        }
    }

    /// Best-effort stop-stream before the embedder tears everything down
    fn shutdown(&mut self) {
        if let Some(channel) = self.command.as_mut() {
            if channel.is_streaming() && self.stop_stream_on_exit {
                if let Err(e) = channel.execute(DeviceCommand::StopStream) {
                    log::warn!("Failed to stop stream on exit: {}", e);
                }
            }
        }
        if self.diagnostics {
            log::info!(
                "Received video data: {} bytes. Received audio data: {} bytes.",
                self.session.video_bytes,
                self.session.audio_bytes
            );
        }
    }
}
