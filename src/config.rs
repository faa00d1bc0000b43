//! Pipeline construction parameters
//!
//! This module contains the geometry and sizing configuration a pipeline is
//! built from. The crate owns no persistence format; all types derive serde
//! so the embedding application can store them however it likes.
//!
//! # Geometry Model
//!
//! The frame source renders into a surface that may be larger than the
//! visible LED region, so the panel is addressed as a window into the
//! captured surface:
//!
//! - [`PanelGeometry`] - The physical LED matrix (width x height in pixels)
//! - [`SurfaceGeometry`] - The captured surface (row pitch, height, and the
//!   pixel offset of the panel region within it)
//! - [`PipelineConfig`] - Geometry plus buffer pool sizing
//!
//! Geometry is validated once, when the pipeline is constructed. Downstream
//! code (the encoder in particular) treats mismatched buffers as programming
//! errors and fails fast rather than returning a runtime error.

use crate::error::{LedVisError, Result};
use serde::{Deserialize, Serialize};

/// Number of pixel and command buffers preallocated per queue
pub const DEFAULT_POOL_SIZE: usize = 200;

/// Capacity of the pipeline event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Physical dimensions of the LED matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelGeometry {
    /// Panel width in pixels
    pub width: usize,
    /// Panel height in pixels (rows emitted per frame)
    pub height: usize,
}

impl PanelGeometry {
    /// Create a panel geometry
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Number of pixels on the panel
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// Dimensions of the captured surface the frame source reads back
///
/// `width` doubles as the row pitch of every pixel buffer: row `r` of the
/// readback starts at `r * width`. `offset` is the index of the first panel
/// pixel within the buffer, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceGeometry {
    /// Surface width in pixels (also the pixel-buffer row pitch)
    pub width: usize,
    /// Surface height in pixels
    pub height: usize,
    /// Pixel offset of the panel region within the surface
    pub offset: usize,
}

impl SurfaceGeometry {
    /// Create a surface geometry
    pub fn new(width: usize, height: usize, offset: usize) -> Self {
        Self {
            width,
            height,
            offset,
        }
    }

    /// A surface exactly covering the panel, no offset
    ///
    /// Useful when the frame source renders the panel region directly.
    pub fn tight(panel: PanelGeometry) -> Self {
        Self {
            width: panel.width,
            height: panel.height,
            offset: 0,
        }
    }

    /// Total pixels in one readback buffer
    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// Everything needed to build a [`Pipeline`](crate::pipeline::Pipeline)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// LED matrix dimensions
    pub panel: PanelGeometry,
    /// Captured surface dimensions and panel offset
    pub surface: SurfaceGeometry,
    /// Buffers preallocated per queue (frames in flight are bounded by this)
    pub pool_size: usize,
    /// Event channel capacity; events beyond this are dropped, not blocked on
    pub event_capacity: usize,
}

impl PipelineConfig {
    /// Create a config with default pool sizing
    pub fn new(panel: PanelGeometry, surface: SurfaceGeometry) -> Self {
        Self {
            panel,
            surface,
            pool_size: DEFAULT_POOL_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Override the buffer pool depth
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Override the event channel capacity
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Check that the panel region fits inside the surface
    ///
    /// Every row the encoder will read must lie within a readback buffer:
    /// the last byte read is at
    /// `offset + (panel.height - 1) * surface.width + panel.width`.
    pub fn validate(&self) -> Result<()> {
        if self.panel.width == 0 || self.panel.height == 0 {
            return Err(LedVisError::Geometry(format!(
                "panel must be non-empty, got {}x{}",
                self.panel.width, self.panel.height
            )));
        }
        if self.panel.height > 256 {
            // The device self-synchronizes on a single-byte row index.
            return Err(LedVisError::Geometry(format!(
                "panel height {} exceeds the 256 rows addressable by the row-index tag",
                self.panel.height
            )));
        }
        if self.pool_size == 0 {
            return Err(LedVisError::Geometry(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.panel.width > self.surface.width {
            return Err(LedVisError::Geometry(format!(
                "panel width {} exceeds surface width {}",
                self.panel.width, self.surface.width
            )));
        }
        let last_row_end =
            self.surface.offset + (self.panel.height - 1) * self.surface.width + self.panel.width;
        if last_row_end > self.surface.pixel_count() {
            return Err(LedVisError::Geometry(format!(
                "panel region [offset {}, {} rows] overruns surface of {} pixels",
                self.surface.offset,
                self.panel.height,
                self.surface.pixel_count()
            )));
        }
        Ok(())
    }
}
