//! Per-session stream accounting
//!
//! Tracks the last-seen sequence number and cumulative byte counter for each
//! UDP stream. Sequence gaps are detected but never corrected; the device
//! retransmits nothing and a dropped packet is just a transient artifact.
//!
//! Gap detection is suppressed until both streams have moved a minimum amount
//! of data. During connection startup the two streams come up at different
//! times and in bursts, which would otherwise produce a stream of spurious
//! gap reports.

use crate::protocol::{AUDIO_PACKET_SIZE, VIDEO_PACKET_SIZE};

/// Video bytes required before gap reports become meaningful
pub const VIDEO_WARMUP_BYTES: u64 = 1024 * 1024;
/// Audio bytes required before gap reports become meaningful
pub const AUDIO_WARMUP_BYTES: u64 = 1024 * 10;

/// A detected discontinuity in a stream's sequence numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqGap {
    pub last: u16,
    pub current: u16,
}

/// Mutable state for one streaming session.
///
/// Owned exclusively by the decode/present loop and mutated once per poll
/// iteration; there is no cross-thread sharing.
#[derive(Debug, Default)]
pub struct StreamSession {
    last_video_seq: Option<u16>,
    last_audio_seq: Option<u16>,
    /// Cumulative video bytes received
    pub video_bytes: u64,
    /// Cumulative audio bytes received
    pub audio_bytes: u64,
}

impl StreamSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one received video packet and check its sequence number.
    ///
    /// Returns the gap when the packet does not directly follow the previous
    /// one (mod 65536) and both warm-up thresholds are already exceeded.
    /// The last-seen sequence is always updated.
    pub fn record_video_packet(&mut self, seq: u16) -> Option<SeqGap> {
        self.video_bytes += VIDEO_PACKET_SIZE as u64;
        let warmed = self.warmed_up();
        Self::check_seq(&mut self.last_video_seq, seq, warmed)
    }

    /// Account for one received audio packet and check its sequence number
    pub fn record_audio_packet(&mut self, seq: u16) -> Option<SeqGap> {
        self.audio_bytes += AUDIO_PACKET_SIZE as u64;
        let warmed = self.warmed_up();
        Self::check_seq(&mut self.last_audio_seq, seq, warmed)
    }

    /// True once both streams have delivered at least one packet
    pub fn both_streams_started(&self) -> bool {
        self.video_bytes > 0 && self.audio_bytes > 0
    }

    /// True once both warm-up thresholds are exceeded
    pub fn warmed_up(&self) -> bool {
        self.audio_bytes > AUDIO_WARMUP_BYTES && self.video_bytes > VIDEO_WARMUP_BYTES
    }

    fn check_seq(last: &mut Option<u16>, current: u16, warmed: bool) -> Option<SeqGap> {
        let gap = match *last {
            Some(prev) if warmed && prev.wrapping_add(1) != current => Some(SeqGap {
                last: prev,
                current,
            }),
            _ => None,
        };
        *last = Some(current);
        gap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Push the session past both warm-up thresholds
    fn warm_up(session: &mut StreamSession) {
        session.video_bytes = VIDEO_WARMUP_BYTES + 1;
        session.audio_bytes = AUDIO_WARMUP_BYTES + 1;
    }

    #[test]
    fn test_no_gap_for_consecutive_sequences() {
        let mut session = StreamSession::new();
        warm_up(&mut session);
        assert_eq!(session.record_video_packet(10), None);
        assert_eq!(session.record_video_packet(11), None);
        assert_eq!(session.record_video_packet(12), None);
    }

    #[test]
    fn test_gap_detected_after_warmup() {
        let mut session = StreamSession::new();
        warm_up(&mut session);
        assert_eq!(session.record_video_packet(10), None);
        assert_eq!(session.record_video_packet(11), None);
        // Skip 12: exactly one report naming last 11, current 13
        assert_eq!(
            session.record_video_packet(13),
            Some(SeqGap {
                last: 11,
                current: 13
            })
        );
        // Stream continues from the new position without further reports
        assert_eq!(session.record_video_packet(14), None);
    }

    #[test]
    fn test_no_gap_below_threshold() {
        let mut session = StreamSession::new();
        // Far below warm-up: no gap regardless of the jump
        assert_eq!(session.record_video_packet(10), None);
        assert_eq!(session.record_video_packet(500), None);
        assert_eq!(session.record_video_packet(3), None);
    }

    #[test]
    fn test_wraparound_is_not_a_gap() {
        let mut session = StreamSession::new();
        warm_up(&mut session);
        assert_eq!(session.record_video_packet(65535), None);
        assert_eq!(session.record_video_packet(0), None);
    }

    #[test]
    fn test_wraparound_gap_detected() {
        let mut session = StreamSession::new();
        warm_up(&mut session);
        assert_eq!(session.record_video_packet(65535), None);
        assert_eq!(
            session.record_video_packet(1),
            Some(SeqGap {
                last: 65535,
                current: 1
            })
        );
    }

    #[test]
    fn test_audio_and_video_tracked_independently() {
        let mut session = StreamSession::new();
        warm_up(&mut session);
        assert_eq!(session.record_video_packet(100), None);
        // Audio at a different position is not a gap against video
        assert_eq!(session.record_audio_packet(7000), None);
        assert_eq!(session.record_audio_packet(7001), None);
        assert_eq!(session.record_video_packet(101), None);
    }

    #[test]
    fn test_first_packet_never_reports() {
        let mut session = StreamSession::new();
        warm_up(&mut session);
        assert_eq!(session.record_audio_packet(42), None);
    }

    #[test]
    fn test_byte_counters_accumulate() {
        let mut session = StreamSession::new();
        session.record_video_packet(0);
        session.record_audio_packet(0);
        assert_eq!(session.video_bytes, VIDEO_PACKET_SIZE as u64);
        assert_eq!(session.audio_bytes, AUDIO_PACKET_SIZE as u64);
        assert!(session.both_streams_started());
        assert!(!session.warmed_up());
    }

    #[test]
    fn test_warmup_requires_both_streams() {
        let mut session = StreamSession::new();
        session.video_bytes = VIDEO_WARMUP_BYTES + 1;
        // Video alone is not enough
        assert!(!session.warmed_up());
        session.record_video_packet(1);
        assert_eq!(session.record_video_packet(9), None);
    }
}
