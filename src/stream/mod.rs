//! Frame reconstruction and the streaming loop

pub mod audio;
pub mod runner;
pub mod session;
pub mod source;
pub mod sync;
pub mod video;

pub use audio::AudioStreamBuffer;
pub use runner::{ControlEvent, StreamRunner};
pub use session::{SeqGap, StreamSession};
pub use source::{PacketSource, UdpPacketSource};
pub use sync::{StaleAction, SyncController, SyncState};
pub use video::{DecodeMode, VideoFrameDecoder};
