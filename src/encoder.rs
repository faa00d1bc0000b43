//! LED command encoder
//!
//! Pure, stateless transform from a readback pixel buffer to the serial
//! command stream the LED controller consumes. The output is a
//! pre-serialized MPSSE command sequence: for every panel row the encoder
//! emits a fixed front porch (chip-select assert plus data-out header and
//! payload marker), the row's raw little-endian pixel bytes, and a fixed
//! back porch (chip-select release, then a second chip-select-wrapped
//! two-byte packet carrying the row index so the device can re-synchronize
//! on row boundaries).
//!
//! The 7-byte front porch / `2 * width` payload / 14-byte back porch split
//! is device framing: any reordering or byte-count change desynchronizes the
//! controller. The per-row layout, byte for byte:
//!
//! ```text
//! 80 00 2B            chip select low
//! 11 LL HH            data out, payload length (2W + 1) - 1, little-endian
//! 80                  payload marker
//! <2W pixel bytes>    row pixels, u16 little-endian
//! 80 28 2B            chip select high
//! 80 00 2B            chip select low
//! 11 01 00            data out, payload length 2 - 1
//! 03 RR               row-index tag, row number
//! 80 28 2B            chip select high
//! ```
//!
//! Geometry mismatches are programming errors: callers validate their
//! [`PipelineConfig`](crate::config::PipelineConfig) up front, and `encode`
//! asserts rather than returning a runtime error.

use crate::config::{PanelGeometry, SurfaceGeometry};
use crate::transport::{GPIO_CS_HIGH, GPIO_CS_LOW, GPIO_DIRECTION};
use crate::types::Pixel;

/// Framing bytes emitted before each row's pixel payload
pub const FRONT_PORCH_BYTES: usize = 7; // could be 8
/// Framing bytes emitted after each row's pixel payload
pub const BACK_PORCH_BYTES: usize = 14;

/// MPSSE opcode: set GPIO levels on the low byte bank
const OP_SET_GPIO_LOW: u8 = 0x80;
/// MPSSE opcode: clock data bytes out on negative edge
const OP_DATA_OUT: u8 = 0x11;
/// First payload byte of every pixel packet
const PAYLOAD_MARKER: u8 = 0x80;
/// Tag byte introducing the row-index packet
const ROW_INDEX_TAG: u8 = 0x03;

/// Offsets and sizes for reading panel pixels back out of a command buffer
///
/// These are computed at construction for external consumers that want to
/// locate pixel data inside an encoded frame; nothing in this crate reads
/// them back. `row_pitch` and `buffer_size` are in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadbackLayout {
    /// Byte offset of the first pixel byte within a row's command bytes
    pub offset: usize,
    /// Row stride in pixels, porch bytes included
    pub row_pitch: usize,
    /// Total pixel capacity implied by `row_pitch` over all rows
    pub buffer_size: usize,
}

/// Encodes readback pixel buffers into device command streams
///
/// Construction precomputes every size; `encode` allocates nothing.
#[derive(Debug, Clone)]
pub struct CommandEncoder {
    panel: PanelGeometry,
    surface: SurfaceGeometry,
    command_len: usize,
    readback: ReadbackLayout,
}

impl CommandEncoder {
    /// Create an encoder for the given panel window into the given surface
    ///
    /// Callers are expected to have validated the geometry (see
    /// [`PipelineConfig::validate`](crate::config::PipelineConfig::validate)).
    pub fn new(panel: PanelGeometry, surface: SurfaceGeometry) -> Self {
        let row_pix_bytes = panel.width * std::mem::size_of::<Pixel>();
        let row_bytes = FRONT_PORCH_BYTES + row_pix_bytes + BACK_PORCH_BYTES;
        let row_pitch = FRONT_PORCH_BYTES / std::mem::size_of::<Pixel>()
            + panel.width
            + BACK_PORCH_BYTES / std::mem::size_of::<Pixel>();
        Self {
            panel,
            surface,
            command_len: panel.height * row_bytes,
            readback: ReadbackLayout {
                offset: FRONT_PORCH_BYTES,
                row_pitch,
                buffer_size: panel.height * row_pitch,
            },
        }
    }

    /// Panel geometry this encoder was built for
    pub fn panel(&self) -> PanelGeometry {
        self.panel
    }

    /// Exact size in bytes of every encoded frame
    pub fn command_len(&self) -> usize {
        self.command_len
    }

    /// Bytes emitted per panel row, porches included
    pub fn bytes_per_row(&self) -> usize {
        FRONT_PORCH_BYTES + 2 * self.panel.width + BACK_PORCH_BYTES
    }

    /// Layout for locating pixel data within an encoded frame
    pub fn readback_layout(&self) -> ReadbackLayout {
        self.readback
    }

    /// Encode one frame of pixels into `out`
    ///
    /// Reads the panel window (`surface.offset` plus `surface.width` row
    /// pitch) out of `pixels` and writes exactly
    /// [`command_len`](Self::command_len) bytes. Deterministic: identical
    /// input produces identical output.
    ///
    /// # Panics
    ///
    /// Panics if `out` is not exactly `command_len` bytes or if `pixels` is
    /// too small for the panel window. Both are precondition violations, not
    /// recoverable conditions.
    pub fn encode(&self, pixels: &[Pixel], out: &mut [u8]) {
        assert_eq!(
            out.len(),
            self.command_len,
            "command buffer size mismatch: got {}, encoder produces {}",
            out.len(),
            self.command_len
        );
        let last_row_start = self.surface.offset + (self.panel.height - 1) * self.surface.width;
        assert!(
            pixels.len() >= last_row_start + self.panel.width,
            "pixel buffer too small: got {}, panel window needs {}",
            pixels.len(),
            last_row_start + self.panel.width
        );

        let row_bytes = 2 * self.panel.width;
        // Length fields are payload-length-minus-one, little-endian.
        let pixel_packet_len = row_bytes + 1 - 1;
        let mut at = 0;
        for row in 0..self.panel.height {
            // Chip select low
            out[at] = OP_SET_GPIO_LOW;
            out[at + 1] = GPIO_CS_LOW;
            out[at + 2] = GPIO_DIRECTION;
            at += 3;

            // Pixel packet header
            out[at] = OP_DATA_OUT;
            out[at + 1] = (pixel_packet_len & 0xFF) as u8;
            out[at + 2] = (pixel_packet_len >> 8) as u8;
            at += 3;

            // Pixel packet payload
            out[at] = PAYLOAD_MARKER;
            at += 1;
            let start = self.surface.offset + row * self.surface.width;
            for &pixel in &pixels[start..start + self.panel.width] {
                let [lo, hi] = pixel.to_le_bytes();
                out[at] = lo;
                out[at + 1] = hi;
                at += 2;
            }

            // Chip select high
            out[at] = OP_SET_GPIO_LOW;
            out[at + 1] = GPIO_CS_HIGH;
            out[at + 2] = GPIO_DIRECTION;
            at += 3;

            // Chip select low
            out[at] = OP_SET_GPIO_LOW;
            out[at + 1] = GPIO_CS_LOW;
            out[at + 2] = GPIO_DIRECTION;
            at += 3;

            // Row-index packet header
            out[at] = OP_DATA_OUT;
            out[at + 1] = 2 - 1;
            out[at + 2] = 0;
            at += 3;

            // Row-index packet payload
            out[at] = ROW_INDEX_TAG;
            out[at + 1] = row as u8;
            at += 2;

            // Chip select high
            out[at] = OP_SET_GPIO_LOW;
            out[at + 1] = GPIO_CS_HIGH;
            out[at + 2] = GPIO_DIRECTION;
            at += 3;
        }
        debug_assert_eq!(at, self.command_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder(panel_w: usize, panel_h: usize) -> CommandEncoder {
        let panel = PanelGeometry::new(panel_w, panel_h);
        CommandEncoder::new(panel, SurfaceGeometry::tight(panel))
    }

    #[test]
    fn test_command_len_matches_porch_arithmetic() {
        let enc = encoder(768, 128);
        assert_eq!(enc.bytes_per_row(), 7 + 2 * 768 + 14);
        assert_eq!(enc.command_len(), 128 * (7 + 2 * 768 + 14));
    }

    #[test]
    fn test_exact_row_framing() {
        // Two-pixel row: every byte of the 25-byte row is pinned down.
        let enc = encoder(2, 2);
        assert_eq!(enc.bytes_per_row(), 25);
        let pixels: Vec<Pixel> = vec![0x1234, 0x5678, 0xAABB, 0xCCDD];
        let mut out = vec![0u8; enc.command_len()];
        enc.encode(&pixels, &mut out);

        #[rustfmt::skip]
        let expected_row0: [u8; 25] = [
            0x80, 0x00, 0x2B,             // chip select low
            0x11, 0x04, 0x00,             // data out, payload len (2*2+1)-1
            0x80, 0x34, 0x12, 0x78, 0x56, // marker + pixels, little-endian
            0x80, 0x28, 0x2B,             // chip select high
            0x80, 0x00, 0x2B,             // chip select low
            0x11, 0x01, 0x00,             // data out, payload len 2-1
            0x03, 0x00,                   // row-index tag, row 0
            0x80, 0x28, 0x2B,             // chip select high
        ];
        assert_eq!(&out[..25], &expected_row0);

        // Second row differs only in pixel bytes and the row index.
        assert_eq!(&out[25 + 7..25 + 11], &[0xBB, 0xAA, 0xDD, 0xCC]);
        assert_eq!(out[25 + 21], 0x01);
    }

    #[test]
    fn test_row_indices_cover_panel_height() {
        let enc = encoder(1, 5);
        let pixels: Vec<Pixel> = vec![0; 5];
        let mut out = vec![0u8; enc.command_len()];
        enc.encode(&pixels, &mut out);
        let row_bytes = enc.bytes_per_row();
        for row in 0..5 {
            let tag_at = row * row_bytes + 7 + 2 + 9;
            assert_eq!(out[tag_at], 0x03);
            assert_eq!(out[tag_at + 1], row as u8);
        }
    }

    #[test]
    fn test_offset_and_pitch_select_panel_window() {
        // 2x2 panel in the bottom-right corner of a 4x3 surface.
        let panel = PanelGeometry::new(2, 2);
        let surface = SurfaceGeometry::new(4, 3, 1 * 4 + 2);
        let enc = CommandEncoder::new(panel, surface);
        #[rustfmt::skip]
        let pixels: Vec<Pixel> = vec![
            0x0000, 0x0001, 0x0002, 0x0003,
            0x0010, 0x0011, 0x1111, 0x2222,
            0x0020, 0x0021, 0x3333, 0x4444,
        ];
        let mut out = vec![0u8; enc.command_len()];
        enc.encode(&pixels, &mut out);
        assert_eq!(&out[7..11], &[0x11, 0x11, 0x22, 0x22]);
        let row1 = enc.bytes_per_row();
        assert_eq!(&out[row1 + 7..row1 + 11], &[0x33, 0x33, 0x44, 0x44]);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let enc = encoder(16, 4);
        let pixels: Vec<Pixel> = (0..64).map(|i| (i * 257) as Pixel).collect();
        let mut first = vec![0u8; enc.command_len()];
        let mut second = vec![0u8; enc.command_len()];
        enc.encode(&pixels, &mut first);
        enc.encode(&pixels, &mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn test_readback_layout_values() {
        let enc = encoder(768, 128);
        let layout = enc.readback_layout();
        assert_eq!(layout.offset, 7);
        assert_eq!(layout.row_pitch, 7 / 2 + 768 + 14 / 2);
        assert_eq!(layout.buffer_size, 128 * layout.row_pitch);
    }

    #[test]
    #[should_panic(expected = "command buffer size mismatch")]
    fn test_wrong_output_size_panics() {
        let enc = encoder(2, 2);
        let pixels: Vec<Pixel> = vec![0; 4];
        let mut out = vec![0u8; enc.command_len() - 1];
        enc.encode(&pixels, &mut out);
    }

    #[test]
    #[should_panic(expected = "pixel buffer too small")]
    fn test_short_pixel_buffer_panics() {
        let enc = encoder(2, 2);
        let pixels: Vec<Pixel> = vec![0; 3];
        let mut out = vec![0u8; enc.command_len()];
        enc.encode(&pixels, &mut out);
    }
}
