//! Core data types for LedVis-RS
//!
//! This module contains the fundamental data structures shared across the
//! pipeline stages: the pixel and command buffer representations, the opaque
//! shader program handle, and the pipeline statistics snapshot.
//!
//! # Buffers
//!
//! Pixel and command buffers are allocated once when the pipeline is built
//! and reused cyclically for the life of the pipeline. They are never
//! resized. The slot queues own them; a worker only ever touches the buffer
//! whose slot lease it currently holds.

use serde::{Deserialize, Serialize};

/// A single packed 16-bit LED color value, as produced by the frame source.
pub type Pixel = u16;

/// A frame of pixels read back from the frame source.
///
/// Row-major, `surface.width` pixels per row (the row pitch), of which only
/// the panel region starting at the surface offset is ever transmitted.
pub type PixelBuffer = Box<[Pixel]>;

/// A fully encoded device command stream for one frame.
pub type CommandBuffer = Box<[u8]>;

/// Opaque identifier for a compiled shader program.
///
/// The pipeline never interprets program contents; it only compares ids to
/// detect that the active program changed, which makes the render worker
/// rebind before its next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProgramHandle(u32);

impl ProgramHandle {
    /// Wrap a raw program id issued by the shader collaborator
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// The raw program id
    pub fn id(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ProgramHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "program#{}", self.0)
    }
}

/// Snapshot of pipeline counters
///
/// Taken atomically counter-by-counter, so totals may be off by a frame that
/// is in flight while the snapshot is read.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStats {
    /// Frames handed to the transport successfully
    pub frames_transmitted: u64,
    /// Frames abandoned because the frame source failed render or readback
    pub render_errors: u64,
    /// Frames abandoned because the transport rejected them
    pub transmit_errors: u64,
    /// Pipeline events dropped because the event channel was full
    pub dropped_events: u64,
}

impl PipelineStats {
    /// Total frames lost to collaborator failures
    pub fn frames_dropped(&self) -> u64 {
        self.render_errors + self.transmit_errors
    }
}
