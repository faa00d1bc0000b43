//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod stubs;

use std::time::{Duration, Instant};

/// Install a tracing subscriber honoring `RUST_LOG`, once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds, failing the test on timeout
pub fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("timed out waiting for {what}");
}

/// Check one encoded frame against the device framing, byte for byte
///
/// Returns the pixel payloads, one `Vec<u16>` per row, for content checks.
pub fn assert_frame_framing(frame: &[u8], width: usize, height: usize) -> Vec<Vec<u16>> {
    let row_bytes = 7 + 2 * width + 14;
    assert_eq!(
        frame.len(),
        height * row_bytes,
        "frame size does not match panel geometry"
    );

    let payload_len = 2 * width; // length field is (payload + marker) - 1
    let mut rows = Vec::with_capacity(height);
    for row in 0..height {
        let bytes = &frame[row * row_bytes..(row + 1) * row_bytes];
        assert_eq!(&bytes[0..3], &[0x80, 0x00, 0x2B], "row {row}: CS-low porch");
        assert_eq!(
            &bytes[3..6],
            &[0x11, (payload_len & 0xFF) as u8, (payload_len >> 8) as u8],
            "row {row}: pixel packet header"
        );
        assert_eq!(bytes[6], 0x80, "row {row}: payload marker");

        let payload = &bytes[7..7 + payload_len];
        let back = &bytes[7 + payload_len..];
        assert_eq!(&back[0..3], &[0x80, 0x28, 0x2B], "row {row}: CS-high porch");
        assert_eq!(&back[3..6], &[0x80, 0x00, 0x2B], "row {row}: CS-low porch");
        assert_eq!(&back[6..9], &[0x11, 0x01, 0x00], "row {row}: index header");
        assert_eq!(back[9], 0x03, "row {row}: row-index tag");
        assert_eq!(back[10], row as u8, "row {row}: row index");
        assert_eq!(&back[11..14], &[0x80, 0x28, 0x2B], "row {row}: CS-high porch");

        rows.push(
            payload
                .chunks_exact(2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
                .collect(),
        );
    }
    rows
}
