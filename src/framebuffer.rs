//! Frame buffer and the presentation/audio boundary traits
//!
//! The decode path only fills a pixel buffer; putting it on screen (or on
//! disk, or nowhere) is the embedder's job via the [`Presenter`] trait.
//! Likewise decoded audio samples are handed to an [`AudioSink`] and the
//! precise per-pixel decode path draws through [`DrawPoint`].

use crate::error::Result;
use crate::palette::Palette;
use crate::protocol::{FRAME_HEIGHT, FRAME_WIDTH};

/// RGBA pixel buffer the video decoder writes into.
///
/// Pixels are `R<<24 | G<<16 | B<<8 | A`; the row stride equals the width.
pub struct FrameBuffer {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl FrameBuffer {
    /// Create a black frame buffer at the stream's native size
    pub fn new() -> Self {
        Self::with_size(FRAME_WIDTH, FRAME_HEIGHT)
    }

    /// Create a black frame buffer with explicit dimensions
    pub fn with_size(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row stride in pixels
    pub fn stride(&self) -> usize {
        self.width
    }

    /// Raw pixel data, row-major
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Pixel bytes for raw-file output (native pixel layout)
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 4);
        for px in &self.pixels {
            bytes.extend_from_slice(&px.to_le_bytes());
        }
        bytes
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u32 {
        self.pixels[y * self.width + x]
    }

    /// Write two adjacent pixels starting at an even x position.
    /// Callers guarantee bounds; the decoder validates packet geometry first.
    #[inline]
    pub fn write_pair(&mut self, x: usize, y: usize, left: u32, right: u32) {
        let base = y * self.width + x;
        self.pixels[base] = left;
        self.pixels[base + 1] = right;
    }

    /// Overwrite the buffer with the connection-lost indicator: the 16
    /// palette colors as vertical bars with a one-pixel border of color 0.
    pub fn draw_placeholder(&mut self, palette: &Palette) {
        // Buffers narrower than 16 pixels get one-pixel bars
        let bar_width = (self.width / 16).max(1);
        let border = palette.rgba(0);
        for y in 0..self.height {
            for x in 0..self.width {
                let edge = x == 0 || y == 0 || x == self.width - 1 || y == self.height - 1;
                let color = if edge {
                    border
                } else {
                    palette.rgba((x / bar_width).min(15))
                };
                self.pixels[y * self.width + x] = color;
            }
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// External presenter: receives the finished frame buffer on each present
/// request (frame boundary or staleness heartbeat).
pub trait Presenter {
    fn present(&mut self, frame: &FrameBuffer) -> Result<()>;
}

/// External audio sink: receives interleaved stereo samples as they arrive
pub trait AudioSink {
    fn queue(&mut self, samples: &[i16]) -> Result<()>;
}

/// External per-pixel draw primitive used by the precise decode mode
pub trait DrawPoint {
    fn draw_point(&mut self, x: usize, y: usize, r: u8, g: u8, b: u8);
}

/// Presenter that discards frames (headless operation)
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn present(&mut self, _frame: &FrameBuffer) -> Result<()> {
        Ok(())
    }
}

impl DrawPoint for NullPresenter {
    fn draw_point(&mut self, _x: usize, _y: usize, _r: u8, _g: u8, _b: u8) {}
}

/// Audio sink that discards samples (audio disabled)
pub struct NullAudioSink;

impl AudioSink for NullAudioSink {
    fn queue(&mut self, _samples: &[i16]) -> Result<()> {
        Ok(())
    }
}
