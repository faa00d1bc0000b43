//! # LedVis-RS: LED matrix display pipeline
//!
//! A real-time staged pipeline that drives an SPI-attached LED matrix from
//! continuously rendered frames. Rendering, command encoding, and
//! transmission each run on their own worker thread, connected by bounded
//! slot queues over preallocated buffer pools, so a sustained frame rate
//! never costs steady-state allocations.
//!
//! ## Architecture
//!
//! - **Pipeline**: owns the three workers (render, encode, transmit), the
//!   two slot queues between them, and the lifecycle API
//! - **Queue**: fixed-capacity SPSC slot hand-off with blocking
//!   backpressure in both directions
//! - **Encoder**: bit-exact translation of a pixel buffer into the
//!   controller's serial command framing
//! - **Run state**: cooperative start/stop controller; `stop()` returns
//!   only once every worker is parked, never mid-operation
//! - **Collaborators**: GPU capture and the serial/GPIO device stay outside
//!   the crate, behind the [`FrameSource`] and [`Transport`] traits
//!
//! ## Example
//!
//! ```ignore
//! use ledvis_rs::{
//!     config::{PanelGeometry, PipelineConfig, SurfaceGeometry},
//!     pipeline::Pipeline,
//!     types::ProgramHandle,
//! };
//!
//! fn main() -> ledvis_rs::Result<()> {
//!     // 768x128 panel window at the bottom of the captured surface.
//!     let panel = PanelGeometry::new(768, 128);
//!     let surface = SurfaceGeometry::new(960, 540, (540 - 128) * 960);
//!     let config = PipelineConfig::new(panel, surface);
//!
//!     // The application provides the GPU capture and the serial device.
//!     let source = Box::new(my_egl_source()?);
//!     let transport = Box::new(my_mpsse_device()?);
//!
//!     let pipeline = Pipeline::new(config, source, transport)?;
//!     pipeline.switch_program(ProgramHandle::new(1));
//!     pipeline.start();
//!
//!     std::thread::sleep(std::time::Duration::from_secs(10));
//!     println!("fps: {:.1}", pipeline.fps());
//!
//!     pipeline.stop();
//!     Ok(()) // dropping the pipeline joins the workers
//! }
//! ```

pub mod config;
pub mod encoder;
pub mod error;
pub mod fps;
#[cfg(any(test, feature = "mock-device"))]
pub mod mock;
pub mod pipeline;
pub mod queue;
pub mod run_state;
pub mod source;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use config::{PanelGeometry, PipelineConfig, SurfaceGeometry};
pub use encoder::CommandEncoder;
pub use error::{LedVisError, Result};
pub use fps::FpsMeter;
pub use pipeline::{Pipeline, PipelineEvent, Stage};
pub use source::FrameSource;
pub use transport::Transport;
pub use types::{Pixel, PipelineStats, ProgramHandle};
