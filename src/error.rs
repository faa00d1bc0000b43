//! Error handling for the LedVis-RS crate
//!
//! This module defines the crate error type and a Result alias used
//! throughout the pipeline.
//!
//! Note that not every failure surfaces here: geometry mismatches inside the
//! encoder are programming errors and fail fast with a panic rather than an
//! error value, and a collaborator failure on a single frame is logged and
//! the frame dropped without unwinding the pipeline.

use thiserror::Error;

/// Main error type for LedVis-RS operations
#[derive(Error, Debug)]
pub enum LedVisError {
    /// Errors reported by the frame source collaborator (render/readback)
    #[error("Frame source error: {0}")]
    FrameSource(String),

    /// Errors reported by the transport collaborator (serial/GPIO device)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Invalid panel/surface geometry detected at construction
    #[error("Geometry error: {0}")]
    Geometry(String),

    /// Errors related to the pipeline event channel
    #[error("Channel error: {0}")]
    Channel(String),

    /// Worker thread creation failed during pipeline construction
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl LedVisError {
    /// Create a frame source error from any displayable cause
    pub fn frame_source(err: impl std::fmt::Display) -> Self {
        LedVisError::FrameSource(err.to_string())
    }

    /// Create a transport error from any displayable cause
    pub fn transport(err: impl std::fmt::Display) -> Self {
        LedVisError::Transport(err.to_string())
    }
}

/// Result type alias for LedVis-RS operations
pub type Result<T> = std::result::Result<T, LedVisError>;
