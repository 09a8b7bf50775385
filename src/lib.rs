//! u64stream - streaming and control client core for the Ultimate 64
//!
//! The device streams 4-bit indexed-color video and PCM audio over UDP and
//! takes control commands over TCP. This crate provides the protocol
//! decoders, the palette/lookup-table machinery, the presentation policy and
//! the command channel; window creation, rendering and audio playback stay
//! with the embedder behind the `Presenter`, `AudioSink` and `DrawPoint`
//! traits.

pub mod command;
pub mod config;
pub mod error;
pub mod framebuffer;
pub mod palette;
pub mod protocol;
pub mod stream;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{Error, Result};
