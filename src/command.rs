//! TCP command channel to the Ultimate 64 control interface
//!
//! The device exposes two TCP ports: the command socket (port 64) accepting
//! little-endian 16-bit word commands, and the telnet menu (port 23) driven
//! by raw key bytes. Three message framings cover everything the client
//! needs:
//!
//! - **Word command**: `[opcode][args...]`, each word sent as two
//!   little-endian bytes. A short settle delay before the burst and 1 ms
//!   between words are required; the device processes its input slower than
//!   a tight send loop would deliver it.
//! - **Raw byte sequence**: bytes sent one at a time with 1 ms pacing. The
//!   telnet menu echoes input, and an undrained echo buffer corrupts the
//!   next exchange, so after each byte any echoed bytes are read and
//!   discarded until a bounded timeout expires.
//! - **Bulk upload**: a word command `[0xFF02][len]` followed by the raw
//!   payload bytes on the same connection.
//!
//! Connections are short-lived: open, send one command, close. Any send or
//! receive failure tears the connection down and propagates; retry policy
//! belongs to the caller.

use crate::error::{Error, Result};
use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Device command opcodes, all little-endian 16-bit words on the wire
pub mod opcodes {
    pub const DMA: u16 = 0xFF01;
    pub const DMA_RUN: u16 = 0xFF02;
    pub const KEYB: u16 = 0xFF03;
    pub const RESET: u16 = 0xFF04;
    pub const WAIT: u16 = 0xFF05;
    pub const DMA_WRITE: u16 = 0xFF06;
    pub const REU_WRITE: u16 = 0xFF07;
    pub const KERNAL_WRITE: u16 = 0xFF08;
    pub const DMA_JUMP: u16 = 0xFF09;
    pub const MOUNT_IMG: u16 = 0xFF0A;
    pub const RUN_IMG: u16 = 0xFF0B;

    // Stream control, Ultimate 64 only
    pub const VICSTREAM_ON: u16 = 0xFF20;
    pub const AUDIOSTREAM_ON: u16 = 0xFF21;
    pub const DEBUGSTREAM_ON: u16 = 0xFF22;
    pub const VICSTREAM_OFF: u16 = 0xFF30;
    pub const AUDIOSTREAM_OFF: u16 = 0xFF31;
    pub const DEBUGSTREAM_OFF: u16 = 0xFF32;
}

/// Default command socket port
pub const COMMAND_PORT: u16 = 64;
/// Default telnet menu port
pub const TELNET_PORT: u16 = 23;

/// Key bytes driving the telnet menu to the power-off entry:
/// F5, arrow down, enter, arrow down, arrow down, enter.
const POWER_OFF_SEQUENCE: &[u8] = &[
    0x1b, 0x5b, 0x31, 0x35, 0x7e, // F5
    0x1b, 0x5b, 0x42, // arrow down
    0x0d, 0x00, // enter
    0x1b, 0x5b, 0x42, // arrow down
    0x1b, 0x5b, 0x42, // arrow down
    0x0d, 0x00, // enter
];

/// Software pacing for the device's input processing speed.
///
/// These are correctness requirements for the target hardware, not tuning
/// knobs; they are grouped in a value so tests can shrink them.
#[derive(Debug, Clone)]
pub struct Pacing {
    /// Delay after connect before the first byte of a command
    pub settle: Duration,
    /// Delay between consecutive 16-bit words
    pub word_gap: Duration,
    /// Delay before each byte of a raw sequence
    pub byte_gap: Duration,
    /// How long to wait for echoed bytes after each raw byte
    pub echo_drain: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(10),
            word_gap: Duration::from_millis(1),
            byte_gap: Duration::from_millis(1),
            echo_drain: Duration::from_millis(30),
        }
    }
}

/// High-level device commands carried over the channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    StartStream,
    StopStream,
    Reset,
    PowerOff,
}

/// Echo-drain phases for one raw byte (send, then bounded drain)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SendPhase {
    Sending,
    Draining,
}

/// Client side of the device's TCP control interface
pub struct CommandChannel {
    host: String,
    command_port: u16,
    telnet_port: u16,
    pacing: Pacing,
    diagnostics: bool,
    streaming: bool,
}

impl CommandChannel {
    /// Channel for a device at `host`, using the standard ports
    pub fn new(host: impl Into<String>, diagnostics: bool) -> Self {
        Self {
            host: host.into(),
            command_port: COMMAND_PORT,
            telnet_port: TELNET_PORT,
            pacing: Pacing::default(),
            diagnostics,
            streaming: false,
        }
    }

    /// Override ports and pacing (loopback tests)
    pub fn with_ports(mut self, command_port: u16, telnet_port: u16, pacing: Pacing) -> Self {
        self.command_port = command_port;
        self.telnet_port = telnet_port;
        self.pacing = pacing;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether a start-stream command succeeded more recently than a
    /// stop-stream or power-off. Gates the automatic stop at shutdown.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Force the streaming flag (tests drive the shutdown path directly)
    #[cfg(test)]
    pub(crate) fn set_streaming(&mut self, streaming: bool) {
        self.streaming = streaming;
    }

    /// Execute a high-level command, updating the streaming flag on success
    pub fn execute(&mut self, cmd: DeviceCommand) -> Result<()> {
        match cmd {
            DeviceCommand::StartStream => {
                log::info!("Sending start stream command to {}...", self.host);
                self.send_word_command(&[
                    opcodes::VICSTREAM_ON,
                    0x0000,
                    opcodes::AUDIOSTREAM_ON,
                    0x0000,
                ])?;
                self.streaming = true;
            }
            DeviceCommand::StopStream => {
                log::info!("Sending stop stream command to {}...", self.host);
                self.send_word_command(&[
                    opcodes::VICSTREAM_OFF,
                    0x0000,
                    opcodes::AUDIOSTREAM_OFF,
                    0x0000,
                ])?;
                self.streaming = false;
            }
            DeviceCommand::Reset => {
                log::info!("Sending reset command to {}...", self.host);
                self.send_word_command(&[opcodes::RESET, 0x0000])?;
            }
            DeviceCommand::PowerOff => {
                log::info!("Sending power-off sequence to {}...", self.host);
                self.send_byte_sequence(POWER_OFF_SEQUENCE)?;
                self.streaming = false;
            }
        }
        log::info!("  * done.");
        Ok(())
    }

    /// Send a word command on its own short-lived connection
    pub fn send_word_command(&mut self, words: &[u16]) -> Result<()> {
        let mut stream = self.connect(self.command_port)?;
        self.send_words_on(&mut stream, words)
        // Stream drops here, closing the connection
    }

    /// Upload a binary payload and run it: `[DMA_RUN][len]` words, then the
    /// raw bytes on the same already-open connection.
    pub fn upload_and_run(&mut self, payload: &[u8]) -> Result<()> {
        let len = u16::try_from(payload.len()).map_err(|_| {
            Error::InvalidParameter(format!("program too large: {} bytes", payload.len()))
        })?;

        log::info!("Uploading {} byte program to {}...", payload.len(), self.host);
        let mut stream = self.connect(self.command_port)?;
        self.send_words_on(&mut stream, &[opcodes::DMA_RUN, len])?;

        if self.diagnostics {
            log::debug!("sending {} payload bytes", payload.len());
        }
        stream
            .write_all(payload)
            .map_err(|e| Error::CommandFailed(format!("upload payload: {}", e)))?;
        log::info!("  * done.");
        Ok(())
    }

    /// Send a raw byte sequence to the telnet menu on its own connection
    pub fn send_byte_sequence(&mut self, bytes: &[u8]) -> Result<()> {
        let mut stream = self.connect(self.telnet_port)?;
        stream.set_read_timeout(Some(self.pacing.echo_drain))?;
        std::thread::sleep(self.pacing.settle);

        let mut echo = [0u8; 1024];
        for &byte in bytes {
            let mut phase = SendPhase::Sending;
            loop {
                match phase {
                    SendPhase::Sending => {
                        std::thread::sleep(self.pacing.byte_gap);
                        if self.diagnostics {
                            log::debug!("{:02x} ", byte);
                        }
                        stream.write_all(&[byte]).map_err(|e| {
                            Error::CommandFailed(format!("send sequence byte: {}", e))
                        })?;
                        phase = SendPhase::Draining;
                    }
                    SendPhase::Draining => {
                        // Discard echoed bytes until the bounded timeout fires
                        match stream.read(&mut echo) {
                            Ok(0) => {
                                return Err(Error::CommandFailed(
                                    "connection closed during echo drain".to_string(),
                                ))
                            }
                            Ok(_) => {}
                            Err(e)
                                if e.kind() == std::io::ErrorKind::WouldBlock
                                    || e.kind() == std::io::ErrorKind::TimedOut =>
                            {
                                break;
                            }
                            Err(e) => {
                                return Err(Error::CommandFailed(format!("echo drain: {}", e)))
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Send little-endian words with settle and inter-word pacing
    fn send_words_on(&self, stream: &mut TcpStream, words: &[u16]) -> Result<()> {
        std::thread::sleep(self.pacing.settle);
        for &word in words {
            if self.diagnostics {
                log::debug!("sending: {:04x}", word);
            }
            stream
                .write_all(&word.to_le_bytes())
                .map_err(|e| Error::CommandFailed(format!("send command word: {}", e)))?;
            std::thread::sleep(self.pacing.word_gap);
        }
        Ok(())
    }

    fn connect(&self, port: u16) -> Result<TcpStream> {
        if self.host.is_empty() {
            return Err(Error::NoHost);
        }
        let addr = (self.host.as_str(), port)
            .to_socket_addrs()
            .map_err(|_| Error::HostResolution(self.host.clone()))?
            .next()
            .ok_or_else(|| Error::HostResolution(self.host.clone()))?;
        let stream = TcpStream::connect(addr)
            .map_err(|e| Error::CommandFailed(format!("connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}
