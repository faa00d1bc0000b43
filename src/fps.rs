//! Frame-rate estimation
//!
//! Counts transmitted frames against a monotonic time origin. The meter is
//! reset whenever playback starts or the active program changes, so the
//! reported rate always describes the current program's run.

use std::sync::Mutex;
use std::time::Instant;

/// Frame counter with a resettable monotonic time origin
///
/// The transmit worker calls [`count_frame`](Self::count_frame) once per
/// frame handed to the transport; the lifecycle API calls
/// [`reset`](Self::reset). Both sides take the meter's own narrow lock and
/// never hold it across a blocking call.
#[derive(Debug)]
pub struct FpsMeter {
    sample: Mutex<Sample>,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    frame_count: u64,
    time_zero: Instant,
}

impl FpsMeter {
    /// Create a meter with the origin at now
    pub fn new() -> Self {
        Self {
            sample: Mutex::new(Sample {
                frame_count: 0,
                time_zero: Instant::now(),
            }),
        }
    }

    /// Restart the count with the origin at now
    pub fn reset(&self) {
        let mut sample = self.lock();
        sample.frame_count = 0;
        sample.time_zero = Instant::now();
    }

    /// Record one transmitted frame
    pub fn count_frame(&self) {
        self.lock().frame_count += 1;
    }

    /// Frames counted since the last reset
    pub fn frame_count(&self) -> u64 {
        self.lock().frame_count
    }

    /// Frames per second since the last reset
    ///
    /// Uses monotonic time, so wall-clock adjustments never skew the rate.
    /// Immediately after a reset the elapsed time is near zero and the
    /// result may be non-finite; treat that as "insufficient samples".
    pub fn fps(&self) -> f64 {
        let sample = self.lock();
        let seconds = sample.time_zero.elapsed().as_secs_f64();
        sample.frame_count as f64 / seconds
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Sample> {
        self.sample.lock().expect("fps sample mutex poisoned")
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new()
    }
}
