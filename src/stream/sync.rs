//! Presentation timing and staleness recovery
//!
//! The device marks the packet that completes a frame; presenting on that
//! marker keeps display latency at one packet rather than one frame clock.
//! When the stream goes quiet the controller degrades gracefully:
//!
//! - 6 consecutive poll iterations without video: the frame buffer is
//!   replaced with the connection-lost placeholder and presented once,
//! - every 10th iteration after that: a heartbeat present, so the embedder
//!   keeps refreshing (window expose, recording cadence) during silence.
//!
//! Recovery only affects presentation cadence. Decoding resumes the instant
//! a valid packet arrives; the stale counter just resets.

/// Number of video-less iterations before the placeholder is shown
const STALE_ITERATIONS: u32 = 6;
/// Heartbeat period while the stream stays silent
const HEARTBEAT_PERIOD: u32 = 10;

/// Presentation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No video data yet
    Idle,
    /// Receiving packets, frame buffer being written
    Accumulating,
    /// A present has been requested and not yet consumed
    PresentReady,
}

/// Action the loop must take after an iteration without video data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleAction {
    None,
    /// Overwrite the frame buffer with the placeholder and present
    RedrawPlaceholder,
    /// Forced present with unchanged buffer contents
    HeartbeatPresent,
}

/// Decides when the frame buffer is handed to the external presenter
#[derive(Debug)]
pub struct SyncController {
    state: SyncState,
    stale_iterations: u32,
    seen_video: bool,
}

impl SyncController {
    pub fn new() -> Self {
        Self {
            state: SyncState::Idle,
            stale_iterations: 0,
            seen_video: false,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Record a decoded video packet. A frame-boundary marker requests an
    /// immediate present; any packet ends the stale period.
    pub fn on_video_packet(&mut self, frame_end: bool) {
        self.seen_video = true;
        self.stale_iterations = 0;
        if frame_end {
            self.state = SyncState::PresentReady;
        } else if self.state != SyncState::PresentReady {
            self.state = SyncState::Accumulating;
        }
    }

    /// Record a poll iteration that saw no video data
    pub fn on_idle_iteration(&mut self) -> StaleAction {
        self.stale_iterations += 1;
        if self.stale_iterations == STALE_ITERATIONS {
            self.state = SyncState::PresentReady;
            StaleAction::RedrawPlaceholder
        } else if self.stale_iterations > STALE_ITERATIONS
            && self.stale_iterations % HEARTBEAT_PERIOD == STALE_ITERATIONS % HEARTBEAT_PERIOD
        {
            self.state = SyncState::PresentReady;
            StaleAction::HeartbeatPresent
        } else {
            StaleAction::None
        }
    }

    /// Request a present outside the normal policy (startup splash)
    pub fn request_present(&mut self) {
        self.state = SyncState::PresentReady;
    }

    /// Consume a pending present request. Returns true at most once per
    /// request; the state falls back to Accumulating (or Idle before any
    /// video has been seen).
    pub fn take_present(&mut self) -> bool {
        if self.state == SyncState::PresentReady {
            self.state = if self.seen_video {
                SyncState::Accumulating
            } else {
                SyncState::Idle
            };
            true
        } else {
            false
        }
    }
}

impl Default for SyncController {
    fn default() -> Self {
        Self::new()
    }
}
