//! Stub collaborators for integration tests
//!
//! These are deliberately minimal; the feature-gated `ledvis_rs::mock`
//! module carries the richer configurable versions. The stubs here run
//! without any cargo features so the integration suite always executes.

use ledvis_rs::error::{LedVisError, Result};
use ledvis_rs::source::FrameSource;
use ledvis_rs::transport::Transport;
use ledvis_rs::types::{Pixel, ProgramHandle};
use std::sync::{Arc, Mutex};

/// Frame source that stamps every pixel with the frame number
///
/// Frame numbers start at 1 and increment per rendered frame, so a test can
/// assert both content and ordering of what reaches the transport.
#[derive(Debug, Default)]
pub struct CountingSource {
    frames_rendered: u64,
    bound: Option<ProgramHandle>,
}

impl CountingSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSource for CountingSource {
    fn bind_program(&mut self, program: ProgramHandle) -> Result<()> {
        self.bound = Some(program);
        Ok(())
    }

    fn render_frame(&mut self) -> Result<()> {
        self.frames_rendered += 1;
        Ok(())
    }

    fn read_pixels(&mut self, dest: &mut [Pixel], _row_pitch: usize) -> Result<()> {
        dest.fill(self.frames_rendered as Pixel);
        Ok(())
    }
}

/// Frame source producing a single solid color
#[derive(Debug)]
pub struct SolidSource {
    color: Pixel,
}

impl SolidSource {
    pub fn new(color: Pixel) -> Self {
        Self { color }
    }
}

impl FrameSource for SolidSource {
    fn bind_program(&mut self, _program: ProgramHandle) -> Result<()> {
        Ok(())
    }

    fn render_frame(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_pixels(&mut self, dest: &mut [Pixel], _row_pitch: usize) -> Result<()> {
        dest.fill(self.color);
        Ok(())
    }
}

/// Transport that appends every raw frame to a shared log
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for reading the recorded frames from the test thread
    pub fn log(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.frames)
    }
}

impl Transport for RecordingTransport {
    fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.frames
            .lock()
            .map_err(|_| LedVisError::transport("recording log poisoned"))?
            .push(bytes.to_vec());
        Ok(())
    }

    fn send_spi(&mut self, _bytes: &[u8]) -> Result<()> {
        Ok(())
    }

    fn exchange_spi(&mut self, _bytes: &mut [u8]) -> Result<()> {
        Ok(())
    }

    fn set_gpio(&mut self, _levels: u8, _direction: u8) -> Result<()> {
        Ok(())
    }
}
