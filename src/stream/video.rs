//! Video packet decoding into the frame buffer
//!
//! Two decode modes, selected at startup:
//!
//! - **Packed (fast)**: each payload byte indexes the precomputed
//!   [`ColorTable`] and the resulting pixel pair is written straight into the
//!   frame buffer. This is the latency-critical path.
//! - **Precise**: each nibble is expanded individually and forwarded to the
//!   external [`DrawPoint`] primitive. Slower, but usable when scaling is
//!   handled externally per pixel.
//!
//! Packet geometry is validated against the frame dimensions before any
//! pixel is written; a packet whose row range or line width falls outside
//! the frame is rejected as malformed.

use crate::error::{Error, Result};
use crate::framebuffer::{DrawPoint, FrameBuffer};
use crate::palette::{ColorTable, Palette};
use crate::protocol::VideoPacket;
use crate::stream::session::StreamSession;

/// Decode mode for the video path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Packed pixel-pair writes through the lookup table
    #[default]
    Fast,
    /// Per-pixel expansion through the external draw primitive
    Precise,
}

/// Stateless decoder for video packets
pub struct VideoFrameDecoder {
    diagnostics: bool,
}

impl VideoFrameDecoder {
    pub fn new(diagnostics: bool) -> Self {
        Self { diagnostics }
    }

    /// Decode one packet in packed mode, writing pixel pairs into `frame`.
    ///
    /// Returns true when the packet carries the frame-boundary marker, i.e.
    /// the frame buffer now holds a complete frame.
    pub fn decode(
        &self,
        packet: &VideoPacket,
        session: &mut StreamSession,
        table: &ColorTable,
        frame: &mut FrameBuffer,
    ) -> Result<bool> {
        self.track_sequence(packet, session);
        let (row, lines, pairs_per_line) = self.validate_geometry(packet, frame)?;

        for l in 0..lines {
            let y = row + l;
            for x in 0..pairs_per_line {
                let byte = packet.payload[x + l * pairs_per_line];
                let entry = table.entry(byte);
                frame.write_pair(
                    x * 2,
                    y,
                    ColorTable::left_pixel(entry),
                    ColorTable::right_pixel(entry),
                );
            }
        }

        Ok(packet.is_frame_end())
    }

    /// Decode one packet in precise mode, expanding every nibble through the
    /// external draw-point primitive instead of direct buffer writes.
    pub fn decode_precise(
        &self,
        packet: &VideoPacket,
        session: &mut StreamSession,
        palette: &Palette,
        target: &mut dyn DrawPoint,
    ) -> Result<bool> {
        self.track_sequence(packet, session);
        let (row, lines, pairs_per_line) = self.validate_geometry_unsized(packet)?;

        for l in 0..lines {
            let y = row + l;
            for x in 0..pairs_per_line {
                let byte = packet.payload[x + l * pairs_per_line];
                let low = (byte & 0x0f) as usize;
                let high = (byte >> 4) as usize;
                target.draw_point(
                    x * 2,
                    y,
                    palette.red[low],
                    palette.green[low],
                    palette.blue[low],
                );
                target.draw_point(
                    x * 2 + 1,
                    y,
                    palette.red[high],
                    palette.green[high],
                    palette.blue[high],
                );
            }
        }

        Ok(packet.is_frame_end())
    }

    fn track_sequence(&self, packet: &VideoPacket, session: &mut StreamSession) {
        if let Some(gap) = session.record_video_packet(packet.seq) {
            if self.diagnostics {
                log::warn!(
                    "UDP video packet missed or out of order, last received: {} current {}",
                    gap.last,
                    gap.current
                );
            }
        }
    }

    /// Check the packet's row range and width against the frame buffer
    fn validate_geometry(
        &self,
        packet: &VideoPacket,
        frame: &FrameBuffer,
    ) -> Result<(usize, usize, usize)> {
        let (row, lines, pairs) = self.validate_geometry_unsized(packet)?;
        if row + lines > frame.height() || packet.pixels_in_line as usize > frame.width() {
            return Err(Error::MalformedPacket(format!(
                "packet rows {}..{} x {} px outside {}x{} frame",
                row,
                row + lines,
                packet.pixels_in_line,
                frame.width(),
                frame.height()
            )));
        }
        Ok((row, lines, pairs))
    }

    /// Geometry checks that do not depend on a frame buffer (precise mode
    /// draws through an external target with its own clipping).
    fn validate_geometry_unsized(&self, packet: &VideoPacket) -> Result<(usize, usize, usize)> {
        let row = packet.row();
        let lines = packet.lines_in_packet as usize;
        let pairs_per_line = packet.pixels_in_line as usize / 2;

        if packet.pixels_in_line % 2 != 0 {
            return Err(Error::MalformedPacket(format!(
                "odd pixels_in_line {} in packed stream",
                packet.pixels_in_line
            )));
        }
        if lines * pairs_per_line > packet.payload.len() {
            return Err(Error::MalformedPacket(format!(
                "{} lines x {} pixels exceeds payload size",
                lines, packet.pixels_in_line
            )));
        }
        if row >= crate::protocol::FRAME_HEIGHT {
            return Err(Error::MalformedPacket(format!(
                "row {} outside frame height {}",
                row,
                crate::protocol::FRAME_HEIGHT
            )));
        }
        Ok((row, lines, pairs_per_line))
    }
}
