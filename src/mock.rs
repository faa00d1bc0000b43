//! Mock collaborators for testing without real hardware
//!
//! This module provides in-memory stand-ins for the two collaborator seams:
//! a [`MockFrameSource`] that fills readback buffers from configurable
//! patterns, and a [`MockTransport`] that records everything the pipeline
//! sends instead of driving a device.
//!
//! # Frame Patterns
//!
//! - [`MockFramePattern::Solid`] - every pixel the same value
//! - [`MockFramePattern::Gradient`] - pixel value derived from its index
//! - [`MockFramePattern::RowIndex`] - every pixel carries its row number
//! - [`MockFramePattern::FrameCounter`] - every pixel carries the frame
//!   number, letting tests assert frame ordering end to end
//!
//! Both mocks support failure injection so the drop-and-continue error path
//! can be exercised.
//!
//! # Enabling
//!
//! Available to this crate's own tests unconditionally, and to integrators
//! via the `mock-device` feature:
//!
//! ```bash
//! cargo test --features mock-device
//! ```

use crate::error::{LedVisError, Result};
use crate::source::FrameSource;
use crate::transport::{Transport, VSYNC_PROBE, VSYNC_READY_MASK};
use crate::types::{Pixel, ProgramHandle};

/// Pattern used to fill mock readback buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFramePattern {
    /// Every pixel has the same value
    Solid(Pixel),
    /// Pixel value is its buffer index, truncated
    Gradient,
    /// Pixel value is its row number
    RowIndex,
    /// Pixel value is the frame number at render time
    FrameCounter,
}

impl Default for MockFramePattern {
    fn default() -> Self {
        MockFramePattern::Solid(0xFFFF)
    }
}

/// Frame source that synthesizes frames instead of rendering
#[derive(Debug, Default)]
pub struct MockFrameSource {
    pattern: MockFramePattern,
    bound_program: Option<ProgramHandle>,
    bind_calls: u64,
    render_calls: u64,
    readback_calls: u64,
    fail_readbacks: u64,
}

impl MockFrameSource {
    /// Create a source producing the default solid pattern
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the frame pattern
    pub fn with_pattern(mut self, pattern: MockFramePattern) -> Self {
        self.pattern = pattern;
        self
    }

    /// Make the next `count` readbacks fail
    pub fn fail_next_readbacks(&mut self, count: u64) {
        self.fail_readbacks = count;
    }

    /// Program installed by the last bind, if any
    pub fn bound_program(&self) -> Option<ProgramHandle> {
        self.bound_program
    }

    /// Number of bind calls observed
    pub fn bind_calls(&self) -> u64 {
        self.bind_calls
    }

    /// Number of render calls observed
    pub fn render_calls(&self) -> u64 {
        self.render_calls
    }

    /// Number of successful readbacks observed
    pub fn readback_calls(&self) -> u64 {
        self.readback_calls
    }
}

impl FrameSource for MockFrameSource {
    fn bind_program(&mut self, program: ProgramHandle) -> Result<()> {
        self.bind_calls += 1;
        self.bound_program = Some(program);
        Ok(())
    }

    fn render_frame(&mut self) -> Result<()> {
        self.render_calls += 1;
        Ok(())
    }

    fn read_pixels(&mut self, dest: &mut [Pixel], row_pitch: usize) -> Result<()> {
        if self.fail_readbacks > 0 {
            self.fail_readbacks -= 1;
            return Err(LedVisError::frame_source("injected readback failure"));
        }
        for (i, pixel) in dest.iter_mut().enumerate() {
            *pixel = match self.pattern {
                MockFramePattern::Solid(value) => value,
                MockFramePattern::Gradient => i as Pixel,
                MockFramePattern::RowIndex => (i / row_pitch.max(1)) as Pixel,
                MockFramePattern::FrameCounter => self.render_calls as Pixel,
            };
        }
        self.readback_calls += 1;
        Ok(())
    }
}

/// Transport that records traffic instead of driving a device
///
/// Raw command streams, SPI packets, and GPIO writes are each kept in
/// arrival order. The vsync probe responds "not ready" a configurable
/// number of times before reporting ready, so pacing loops can be tested.
#[derive(Debug, Default)]
pub struct MockTransport {
    raw_frames: Vec<Vec<u8>>,
    spi_packets: Vec<Vec<u8>>,
    gpio_writes: Vec<(u8, u8)>,
    vsync_probes: u64,
    vsync_delay: u64,
    fail_sends: u64,
}

impl MockTransport {
    /// Create a transport that accepts everything and is always ready
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond "not ready" to the first `probes` vsync exchanges
    pub fn with_vsync_delay(mut self, probes: u64) -> Self {
        self.vsync_delay = probes;
        self
    }

    /// Make the next `count` raw sends fail
    pub fn fail_next_sends(&mut self, count: u64) {
        self.fail_sends = count;
    }

    /// Every raw command stream received, in order
    pub fn raw_frames(&self) -> &[Vec<u8>] {
        &self.raw_frames
    }

    /// Every SPI packet received, in order
    pub fn spi_packets(&self) -> &[Vec<u8>] {
        &self.spi_packets
    }

    /// Every GPIO write received, in order, as `(levels, direction)`
    pub fn gpio_writes(&self) -> &[(u8, u8)] {
        &self.gpio_writes
    }

    /// Number of vsync probe exchanges observed
    pub fn vsync_probes(&self) -> u64 {
        self.vsync_probes
    }
}

impl Transport for MockTransport {
    fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        if self.fail_sends > 0 {
            self.fail_sends -= 1;
            return Err(LedVisError::transport("injected send failure"));
        }
        self.raw_frames.push(bytes.to_vec());
        Ok(())
    }

    fn send_spi(&mut self, bytes: &[u8]) -> Result<()> {
        self.spi_packets.push(bytes.to_vec());
        Ok(())
    }

    fn exchange_spi(&mut self, bytes: &mut [u8]) -> Result<()> {
        if bytes == VSYNC_PROBE {
            self.vsync_probes += 1;
            let ready = self.vsync_probes > self.vsync_delay;
            bytes[0] = 0x00;
            bytes[1] = if ready { VSYNC_READY_MASK } else { 0x00 };
        }
        Ok(())
    }

    fn set_gpio(&mut self, levels: u8, direction: u8) -> Result<()> {
        self.gpio_writes.push((levels, direction));
        Ok(())
    }
}

// The pipeline takes ownership of its collaborators; tests usually want to
// inspect them afterwards. An `Arc<Mutex<_>>` wrapper is itself a valid
// collaborator, so a test can hand the pipeline one handle and keep another.

impl<T: FrameSource> FrameSource for std::sync::Arc<std::sync::Mutex<T>> {
    fn bind_program(&mut self, program: ProgramHandle) -> Result<()> {
        self.lock().expect("mock source lock poisoned").bind_program(program)
    }

    fn render_frame(&mut self) -> Result<()> {
        self.lock().expect("mock source lock poisoned").render_frame()
    }

    fn read_pixels(&mut self, dest: &mut [Pixel], row_pitch: usize) -> Result<()> {
        self.lock()
            .expect("mock source lock poisoned")
            .read_pixels(dest, row_pitch)
    }
}

impl<T: Transport> Transport for std::sync::Arc<std::sync::Mutex<T>> {
    fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.lock().expect("mock transport lock poisoned").send_raw(bytes)
    }

    fn send_spi(&mut self, bytes: &[u8]) -> Result<()> {
        self.lock().expect("mock transport lock poisoned").send_spi(bytes)
    }

    fn exchange_spi(&mut self, bytes: &mut [u8]) -> Result<()> {
        self.lock()
            .expect("mock transport lock poisoned")
            .exchange_spi(bytes)
    }

    fn set_gpio(&mut self, levels: u8, direction: u8) -> Result<()> {
        self.lock()
            .expect("mock transport lock poisoned")
            .set_gpio(levels, direction)
    }
}
