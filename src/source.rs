//! Frame source collaborator interface
//!
//! The pipeline never talks to a GPU, a display surface, or a shader
//! compiler directly; all of that sits behind [`FrameSource`], implemented
//! by the embedding application. The render worker owns the source for the
//! life of the pipeline and is the only thread that ever calls it, so
//! implementations need `Send` but not `Sync`.

use crate::error::Result;
use crate::types::{Pixel, ProgramHandle};

/// Produces rendered frames and reads them back as packed 16-bit pixels
///
/// Call sequence, per frame, from the dedicated render thread:
///
/// 1. [`bind_program`](Self::bind_program) - only when the active program
///    id changed since the previous frame (recompile/rebind is expensive;
///    the pipeline caches the id and skips redundant binds)
/// 2. [`render_frame`](Self::render_frame) - render into the internal target
/// 3. [`read_pixels`](Self::read_pixels) - copy the target into a pipeline
///    pixel buffer
///
/// An error from any operation drops the current frame; the pipeline logs
/// it and keeps running.
pub trait FrameSource: Send {
    /// Make `program` the active program, recompiling/rebinding as needed
    fn bind_program(&mut self, program: ProgramHandle) -> Result<()>;

    /// Render the next frame of the active program into the internal target
    fn render_frame(&mut self) -> Result<()>;

    /// Read the rendered target back into `dest`
    ///
    /// `dest` holds an entire captured surface: `row_pitch` pixels per row,
    /// of which only the configured panel window is transmitted downstream.
    fn read_pixels(&mut self, dest: &mut [Pixel], row_pitch: usize) -> Result<()>;
}

#[cfg(test)]
mockall::mock! {
    /// Mockall-generated frame source for orchestration tests
    pub Source {}

    impl FrameSource for Source {
        fn bind_program(&mut self, program: ProgramHandle) -> Result<()>;
        fn render_frame(&mut self) -> Result<()>;
        fn read_pixels(&mut self, dest: &mut [Pixel], row_pitch: usize) -> Result<()>;
    }
}
