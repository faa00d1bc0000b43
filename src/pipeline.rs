//! Pipeline orchestrator
//!
//! Owns the full frame path from the frame source to the transport: three
//! worker threads connected by two bounded slot queues, plus the run-state
//! controller, the FPS meter, and the event stream.
//!
//! # Architecture
//!
//! ```text
//! render worker -> [frame queue] -> encode worker -> [command queue] -> transmit worker
//!   FrameSource       pixel              |              command            Transport
//!                     buffers       CommandEncoder      buffers
//! ```
//!
//! - **Render** pulls frames out of the [`FrameSource`] collaborator into
//!   leased pixel buffers.
//! - **Encode** turns each pixel buffer into a device command stream.
//! - **Transmit** hands command streams to the [`Transport`] collaborator
//!   and counts frames for the FPS meter.
//!
//! All buffers are preallocated at construction (`pool_size` per queue,
//! default 200) and reused cyclically; the steady state allocates nothing.
//! Frames flow strictly in order - render(i), encode(i), transmit(i) - with
//! up to `pool_size` frames in flight per stage boundary.
//!
//! # Lifecycle
//!
//! A new pipeline is parked. [`Pipeline::start`] begins producing frames;
//! [`Pipeline::stop`] returns only once every worker is parked again, never
//! mid-step, so a stopped pipeline can be reconfigured or dropped safely.
//! Dropping the pipeline shuts the workers down and joins them.
//!
//! # Events
//!
//! Noteworthy occurrences (start, stop, program switches, dropped frames)
//! are published on a bounded [`crossbeam_channel`] the embedding
//! application can poll via [`Pipeline::events`]. Sends never block: if the
//! application falls behind, events are counted as dropped rather than
//! stalling a worker.

use crate::config::PipelineConfig;
use crate::encoder::CommandEncoder;
use crate::error::Result;
use crate::fps::FpsMeter;
use crate::queue::SlotQueue;
use crate::run_state::RunState;
use crate::source::FrameSource;
use crate::transport::{self, Transport};
use crate::types::{CommandBuffer, Pixel, PipelineStats, PixelBuffer, ProgramHandle};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Pipeline stage names, used for events and worker thread labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Frame source to pixel buffer
    Render,
    /// Pixel buffer to command buffer
    Encode,
    /// Command buffer to transport
    Transmit,
}

impl Stage {
    fn thread_name(self) -> &'static str {
        match self {
            Stage::Render => "led-render",
            Stage::Encode => "led-encode",
            Stage::Transmit => "led-output",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Render => write!(f, "render"),
            Stage::Encode => write!(f, "encode"),
            Stage::Transmit => write!(f, "transmit"),
        }
    }
}

/// Message published on the pipeline event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Playback started
    Started,
    /// Playback stopped; all workers parked
    Stopped,
    /// The active program changed
    ProgramChanged(ProgramHandle),
    /// A single frame was lost to a collaborator failure
    FrameDropped {
        /// Stage that lost the frame
        stage: Stage,
        /// Collaborator error text
        error: String,
    },
}

/// Worker-visible pipeline internals
struct Shared {
    run_state: RunState,
    fps: FpsMeter,
    frame_queue: SlotQueue<PixelBuffer>,
    command_queue: SlotQueue<CommandBuffer>,
    encoder: CommandEncoder,
    /// Pixel-buffer row pitch handed to the frame source on every readback
    readback_pitch: usize,
    current_program: Mutex<Option<ProgramHandle>>,
    events: Sender<PipelineEvent>,
    frames_transmitted: AtomicU64,
    render_errors: AtomicU64,
    transmit_errors: AtomicU64,
    dropped_events: AtomicU64,
}

impl Shared {
    /// Publish an event without ever blocking a worker
    fn emit(&self, event: PipelineEvent) {
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Log and account a frame lost at `stage`
    fn drop_frame(&self, stage: Stage, error: &crate::error::LedVisError) {
        tracing::warn!(%stage, %error, "dropping frame");
        let counter = match stage {
            Stage::Render | Stage::Encode => &self.render_errors,
            Stage::Transmit => &self.transmit_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.emit(PipelineEvent::FrameDropped {
            stage,
            error: error.to_string(),
        });
    }
}

/// Handle to a running LED pipeline
///
/// Construction spawns the worker threads parked; drop shuts them down and
/// joins them. All lifecycle methods are safe to call from any thread.
pub struct Pipeline {
    shared: Arc<Shared>,
    events: Receiver<PipelineEvent>,
    workers: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Build a pipeline from validated geometry and the two collaborators
    ///
    /// Allocates both buffer pools and spawns the three workers. If any
    /// spawn fails, the already-spawned workers are shut down and joined
    /// before the error is returned; there is no half-initialized state.
    pub fn new(
        config: PipelineConfig,
        frame_source: Box<dyn FrameSource>,
        transport: Box<dyn Transport>,
    ) -> Result<Self> {
        config.validate()?;

        let encoder = CommandEncoder::new(config.panel, config.surface);
        tracing::debug!(
            panel_width = config.panel.width,
            panel_height = config.panel.height,
            command_len = encoder.command_len(),
            pool_size = config.pool_size,
            "building pipeline"
        );

        let frame_pool: Vec<PixelBuffer> = (0..config.pool_size)
            .map(|_| vec![0 as Pixel; config.surface.pixel_count()].into_boxed_slice())
            .collect();
        let command_pool: Vec<CommandBuffer> = (0..config.pool_size)
            .map(|_| vec![0u8; encoder.command_len()].into_boxed_slice())
            .collect();

        let (event_tx, event_rx) = bounded(config.event_capacity);
        let shared = Arc::new(Shared {
            run_state: RunState::new(),
            fps: FpsMeter::new(),
            frame_queue: SlotQueue::new(frame_pool),
            command_queue: SlotQueue::new(command_pool),
            encoder,
            readback_pitch: config.surface.width,
            current_program: Mutex::new(None),
            events: event_tx,
            frames_transmitted: AtomicU64::new(0),
            render_errors: AtomicU64::new(0),
            transmit_errors: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
        });

        let mut workers = Vec::with_capacity(3);
        let spawns: [(Stage, Box<dyn FnOnce() + Send>); 3] = [
            (Stage::Render, {
                let shared = Arc::clone(&shared);
                Box::new(move || render_worker(shared, frame_source))
            }),
            (Stage::Encode, {
                let shared = Arc::clone(&shared);
                Box::new(move || encode_worker(shared))
            }),
            (Stage::Transmit, {
                let shared = Arc::clone(&shared);
                Box::new(move || transmit_worker(shared, transport))
            }),
        ];
        for (stage, body) in spawns {
            let builder = std::thread::Builder::new().name(stage.thread_name().to_string());
            match builder.spawn(body) {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    tracing::error!(%stage, %err, "worker spawn failed, rolling back");
                    Self::teardown(&shared, &mut workers);
                    return Err(err.into());
                }
            }
        }

        Ok(Self {
            shared,
            events: event_rx,
            workers,
        })
    }

    /// Begin (or resume) producing frames
    ///
    /// Wakes all parked workers and resets the FPS meter.
    pub fn start(&self) {
        self.shared.frame_queue.resume();
        self.shared.command_queue.resume();
        self.shared.run_state.start();
        self.shared.fps.reset();
        self.shared.emit(PipelineEvent::Started);
        tracing::info!("pipeline started");
    }

    /// Stop producing frames; returns once every worker is parked
    ///
    /// No worker is mid-step or holding a queue lease after this returns.
    /// Frames already committed to a queue stay there and resume flowing on
    /// the next [`start`](Self::start).
    pub fn stop(&self) {
        self.shared.run_state.begin_stop();
        // Unblock workers waiting on a full or empty queue so they can
        // reach the park point; committed slots are preserved.
        self.shared.frame_queue.suspend();
        self.shared.command_queue.suspend();
        self.shared.run_state.await_quiescence();
        self.shared.emit(PipelineEvent::Stopped);
        tracing::info!("pipeline stopped");
    }

    /// Make `program` the active program
    ///
    /// The render worker rebinds before its next frame; the FPS meter
    /// restarts so the reported rate describes the new program.
    pub fn switch_program(&self, program: ProgramHandle) {
        *self
            .shared
            .current_program
            .lock()
            .expect("program slot poisoned") = Some(program);
        self.shared.fps.reset();
        self.shared.emit(PipelineEvent::ProgramChanged(program));
        tracing::info!(%program, "program switched");
    }

    /// Frames per second since the last start or program switch
    ///
    /// Non-finite means not enough samples yet.
    pub fn fps(&self) -> f64 {
        self.shared.fps.fps()
    }

    /// Snapshot of the pipeline counters
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            frames_transmitted: self.shared.frames_transmitted.load(Ordering::Relaxed),
            render_errors: self.shared.render_errors.load(Ordering::Relaxed),
            transmit_errors: self.shared.transmit_errors.load(Ordering::Relaxed),
            dropped_events: self.shared.dropped_events.load(Ordering::Relaxed),
        }
    }

    /// The pipeline event stream
    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    /// Drain all pending events without blocking
    pub fn drain_events(&self) -> Vec<PipelineEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Sizes computed by the encoder, for external consumers
    pub fn encoder(&self) -> &CommandEncoder {
        &self.shared.encoder
    }

    /// Shut down workers and join them; used by Drop and spawn rollback
    fn teardown(shared: &Shared, workers: &mut Vec<JoinHandle<()>>) {
        shared.run_state.request_shutdown();
        shared.frame_queue.suspend();
        shared.command_queue.suspend();
        for handle in workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("pipeline worker panicked during shutdown");
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        Self::teardown(&self.shared, &mut self.workers);
    }
}

/// Render worker: frame source -> pixel buffers
fn render_worker(shared: Arc<Shared>, mut source: Box<dyn FrameSource>) {
    shared.run_state.worker_started();
    tracing::info!("render worker started");
    let mut bound: Option<ProgramHandle> = None;

    while shared.run_state.wait_running() {
        let current = *shared
            .current_program
            .lock()
            .expect("program slot poisoned");
        if let Some(program) = current {
            if bound != Some(program) {
                match source.bind_program(program) {
                    Ok(()) => bound = Some(program),
                    Err(err) => {
                        shared.drop_frame(Stage::Render, &err);
                        continue;
                    }
                }
            }
        }

        if let Err(err) = source.render_frame() {
            shared.drop_frame(Stage::Render, &err);
            continue;
        }

        let Some(mut lease) = shared.frame_queue.acquire_empty() else {
            continue;
        };
        match source.read_pixels(&mut lease[..], shared.readback_pitch) {
            Ok(()) => lease.commit(),
            Err(err) => {
                // Lease dropped uncommitted: the slot stays empty and the
                // frame is simply lost.
                shared.drop_frame(Stage::Render, &err);
            }
        }
    }

    shared.run_state.worker_finished();
    tracing::info!("render worker stopped");
}

/// Encode worker: pixel buffers -> command buffers
fn encode_worker(shared: Arc<Shared>) {
    shared.run_state.worker_started();
    tracing::info!("encode worker started");

    while shared.run_state.wait_running() {
        let Some(mut commands) = shared.command_queue.acquire_empty() else {
            continue;
        };
        let Some(frame) = shared.frame_queue.acquire_full() else {
            continue;
        };

        shared.encoder.encode(&frame[..], &mut commands[..]);

        commands.commit();
        frame.release();
    }

    shared.run_state.worker_finished();
    tracing::info!("encode worker stopped");
}

/// Transmit worker: command buffers -> transport
fn transmit_worker(shared: Arc<Shared>, mut transport: Box<dyn Transport>) {
    shared.run_state.worker_started();
    tracing::info!("transmit worker started");

    while shared.run_state.wait_running() {
        let Some(commands) = shared.command_queue.acquire_full() else {
            continue;
        };
        match transport::write_frame(&mut *transport, &commands[..]) {
            Ok(()) => {
                shared.fps.count_frame();
                shared.frames_transmitted.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                // The slot is released either way; frame loss is acceptable,
                // a stalled pipeline is not.
                shared.drop_frame(Stage::Transmit, &err);
            }
        }
        commands.release();
    }

    shared.run_state.worker_finished();
    tracing::info!("transmit worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PanelGeometry, PipelineConfig, SurfaceGeometry};
    use crate::mock::{MockFramePattern, MockFrameSource, MockTransport};
    use std::time::{Duration, Instant};

    type SharedMock<T> = Arc<Mutex<T>>;

    fn small_config() -> PipelineConfig {
        let panel = PanelGeometry::new(4, 2);
        PipelineConfig::new(panel, SurfaceGeometry::tight(panel)).with_pool_size(8)
    }

    fn build_pipeline(
        config: PipelineConfig,
        source: MockFrameSource,
    ) -> (Pipeline, SharedMock<MockFrameSource>, SharedMock<MockTransport>) {
        let source = Arc::new(Mutex::new(source));
        let transport = Arc::new(Mutex::new(MockTransport::new()));
        let pipeline = Pipeline::new(
            config,
            Box::new(Arc::clone(&source)),
            Box::new(Arc::clone(&transport)),
        )
        .expect("pipeline construction failed");
        (pipeline, source, transport)
    }

    /// Poll `condition` until it holds or the deadline passes
    fn wait_for(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn frames_received(transport: &SharedMock<MockTransport>) -> usize {
        transport.lock().unwrap().raw_frames().len()
    }

    #[test]
    fn test_invalid_geometry_is_rejected() {
        let config = PipelineConfig::new(
            PanelGeometry::new(100, 2),
            SurfaceGeometry::new(10, 10, 0),
        );
        let result = Pipeline::new(
            config,
            Box::new(MockFrameSource::new()),
            Box::new(MockTransport::new()),
        );
        assert!(matches!(
            result,
            Err(crate::error::LedVisError::Geometry(_))
        ));
    }

    #[test]
    fn test_parked_until_started() {
        let (pipeline, _source, transport) = build_pipeline(small_config(), MockFrameSource::new());
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(frames_received(&transport), 0);
        assert_eq!(pipeline.stats().frames_transmitted, 0);
    }

    #[test]
    fn test_frames_flow_after_start() {
        let (pipeline, _source, transport) = build_pipeline(small_config(), MockFrameSource::new());
        pipeline.start();
        assert!(wait_for(|| frames_received(&transport) >= 10));
        pipeline.stop();

        let expected_len = pipeline.encoder().command_len();
        let transport = transport.lock().unwrap();
        for frame in transport.raw_frames() {
            assert_eq!(frame.len(), expected_len);
        }
        // Each frame is followed by exactly one latch packet.
        assert_eq!(transport.spi_packets().len(), transport.raw_frames().len());
    }

    #[test]
    fn test_stop_quiesces_transmission() {
        let (pipeline, _source, transport) = build_pipeline(small_config(), MockFrameSource::new());
        pipeline.start();
        assert!(wait_for(|| frames_received(&transport) >= 5));
        pipeline.stop();

        let at_stop = frames_received(&transport);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(
            frames_received(&transport),
            at_stop,
            "frames transmitted after stop() returned"
        );
    }

    #[test]
    fn test_restart_resumes_flow() {
        let (pipeline, _source, transport) = build_pipeline(small_config(), MockFrameSource::new());
        pipeline.start();
        assert!(wait_for(|| frames_received(&transport) >= 3));
        pipeline.stop();
        let at_stop = frames_received(&transport);

        pipeline.start();
        assert!(wait_for(|| frames_received(&transport) > at_stop + 3));
        pipeline.stop();
    }

    #[test]
    fn test_program_switch_rebinds_once() {
        let (pipeline, source, transport) = build_pipeline(small_config(), MockFrameSource::new());
        let program = ProgramHandle::new(42);
        pipeline.switch_program(program);
        pipeline.start();
        assert!(wait_for(|| frames_received(&transport) >= 10));
        pipeline.stop();

        let source = source.lock().unwrap();
        assert_eq!(source.bound_program(), Some(program));
        assert_eq!(
            source.bind_calls(),
            1,
            "unchanged program must not be rebound"
        );
    }

    #[test]
    fn test_program_switch_while_running() {
        let (pipeline, source, transport) = build_pipeline(small_config(), MockFrameSource::new());
        pipeline.start();
        assert!(wait_for(|| frames_received(&transport) >= 2));

        pipeline.switch_program(ProgramHandle::new(1));
        assert!(wait_for(|| {
            source.lock().unwrap().bound_program() == Some(ProgramHandle::new(1))
        }));
        pipeline.switch_program(ProgramHandle::new(2));
        assert!(wait_for(|| {
            source.lock().unwrap().bound_program() == Some(ProgramHandle::new(2))
        }));
        pipeline.stop();
        assert_eq!(source.lock().unwrap().bind_calls(), 2);
    }

    #[test]
    fn test_readback_failure_drops_frame_and_continues() {
        let mut source = MockFrameSource::new();
        source.fail_next_readbacks(3);
        let (pipeline, _source, transport) = build_pipeline(small_config(), source);
        pipeline.start();
        assert!(wait_for(|| frames_received(&transport) >= 5));
        pipeline.stop();

        let stats = pipeline.stats();
        assert_eq!(stats.render_errors, 3);
        assert!(stats.frames_transmitted >= 5);
        let events = pipeline.drain_events();
        assert!(events.iter().any(|e| matches!(
            e,
            PipelineEvent::FrameDropped {
                stage: Stage::Render,
                ..
            }
        )));
    }

    #[test]
    fn test_transmit_failure_drops_frame_and_continues() {
        let (pipeline, _source, transport) = build_pipeline(small_config(), MockFrameSource::new());
        transport.lock().unwrap().fail_next_sends(2);
        pipeline.start();
        assert!(wait_for(|| frames_received(&transport) >= 5));
        pipeline.stop();

        let stats = pipeline.stats();
        assert_eq!(stats.transmit_errors, 2);
        assert!(stats.frames_transmitted >= 5);
    }

    #[test]
    fn test_render_failure_never_reaches_transport() {
        let mut source = crate::source::MockSource::new();
        source
            .expect_render_frame()
            .returning(|| Err(crate::error::LedVisError::frame_source("context lost")));
        let transport = Arc::new(Mutex::new(MockTransport::new()));
        let pipeline = Pipeline::new(
            small_config(),
            Box::new(source),
            Box::new(Arc::clone(&transport)),
        )
        .unwrap();

        pipeline.start();
        assert!(wait_for(|| pipeline.stats().render_errors >= 3));
        pipeline.stop();

        assert_eq!(pipeline.stats().frames_transmitted, 0);
        assert_eq!(frames_received(&transport), 0);
    }

    #[test]
    fn test_lifecycle_events_published() {
        let (pipeline, _source, transport) = build_pipeline(small_config(), MockFrameSource::new());
        let program = ProgramHandle::new(9);
        pipeline.switch_program(program);
        pipeline.start();
        assert!(wait_for(|| frames_received(&transport) >= 1));
        pipeline.stop();

        let events = pipeline.drain_events();
        assert!(events.contains(&PipelineEvent::ProgramChanged(program)));
        assert!(events.contains(&PipelineEvent::Started));
        assert!(events.contains(&PipelineEvent::Stopped));
    }

    #[test]
    fn test_fps_counts_transmitted_frames() {
        let (pipeline, _source, transport) = build_pipeline(small_config(), MockFrameSource::new());
        pipeline.start();
        assert!(wait_for(|| frames_received(&transport) >= 20));
        let fps = pipeline.fps();
        pipeline.stop();
        assert!(fps > 0.0, "expected positive fps after 20 frames, got {fps}");
    }

    #[test]
    fn test_drop_while_running_joins_cleanly() {
        let (pipeline, _source, transport) = build_pipeline(small_config(), MockFrameSource::new());
        pipeline.start();
        assert!(wait_for(|| frames_received(&transport) >= 1));
        drop(pipeline);
    }

    #[test]
    fn test_solid_frame_reaches_transport_verbatim() {
        let source = MockFrameSource::new().with_pattern(MockFramePattern::Solid(0xABCD));
        let (pipeline, _source, transport) = build_pipeline(small_config(), source);
        pipeline.start();
        assert!(wait_for(|| frames_received(&transport) >= 1));
        pipeline.stop();

        let transport = transport.lock().unwrap();
        let frame = &transport.raw_frames()[0];
        // First row payload: marker then 4 pixels of 0xABCD little-endian.
        assert_eq!(frame[6], 0x80);
        assert_eq!(&frame[7..15], &[0xCD, 0xAB, 0xCD, 0xAB, 0xCD, 0xAB, 0xCD, 0xAB]);
    }
}
