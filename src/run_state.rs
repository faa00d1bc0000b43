//! Run-state controller shared by every pipeline worker
//!
//! Three states govern the worker threads:
//!
//! - **Stopped** - workers are parked at their wait point
//! - **Running** - workers execute pipeline steps
//! - **ShuttingDown** - terminal; parked workers wake and exit their loops
//!
//! The controller's correctness property is *quiescence*: [`RunState::stop`]
//! returns only once every worker has observed the stop, finished the step
//! it was executing, and parked. A stopped pipeline therefore never has a
//! worker mid-operation or holding a queue lease. Workers cooperate through
//! [`RunState::wait_running`], which maintains the active-worker count and
//! wakes a blocked `stop()` every time a worker parks.
//!
//! An earlier design cancelled worker threads asynchronously to stop them;
//! cancellation landing between a queue acquire and its release leaves the
//! ring permanently short one slot. The counted park protocol replaces that.

use std::sync::{Condvar, Mutex};

/// Shared start/stop/shutdown state machine
///
/// One instance is shared (via `Arc`) between the pipeline handle and its
/// workers. All transitions broadcast on a single condvar; both directions
/// (workers waiting to run, `stop()` waiting for quiescence) wait on it.
#[derive(Debug)]
pub struct RunState {
    inner: Mutex<Inner>,
    changed: Condvar,
}

#[derive(Debug)]
struct Inner {
    running: bool,
    shutdown: bool,
    /// Workers currently executing a pipeline step (not parked)
    active_workers: usize,
}

impl RunState {
    /// Create a controller in the Stopped state
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                running: false,
                shutdown: false,
                active_workers: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// Stopped -> Running; wakes every parked worker
    pub fn start(&self) {
        let mut inner = self.lock();
        inner.running = true;
        drop(inner);
        self.changed.notify_all();
    }

    /// Running -> Stopped; blocks until every worker has parked
    ///
    /// On return no worker is executing a pipeline step. Callers must make
    /// sure nothing keeps a worker from reaching its park point (the
    /// pipeline suspends its queues between the two phases); a worker that
    /// never parks keeps `stop()` blocked, surfacing the bug as a hang
    /// rather than corruption.
    pub fn stop(&self) {
        self.begin_stop();
        self.await_quiescence();
    }

    /// First phase of `stop()`: leave Running and wake every worker
    pub fn begin_stop(&self) {
        let mut inner = self.lock();
        inner.running = false;
        drop(inner);
        self.changed.notify_all();
    }

    /// Second phase of `stop()`: block until every worker has parked
    pub fn await_quiescence(&self) {
        let mut inner = self.lock();
        while inner.active_workers > 0 {
            inner = self
                .changed
                .wait(inner)
                .expect("run state mutex poisoned");
        }
    }

    /// Any state -> ShuttingDown (terminal); wakes everyone
    pub fn request_shutdown(&self) {
        let mut inner = self.lock();
        inner.shutdown = true;
        drop(inner);
        self.changed.notify_all();
    }

    /// True while in the Running state
    pub fn is_running(&self) -> bool {
        let inner = self.lock();
        inner.running && !inner.shutdown
    }

    /// True once shutdown has been requested
    pub fn is_shutting_down(&self) -> bool {
        self.lock().shutdown
    }

    /// Count this thread as an active worker
    ///
    /// Call once at worker-thread startup, before the first
    /// [`wait_running`](Self::wait_running).
    pub fn worker_started(&self) {
        self.lock().active_workers += 1;
    }

    /// Remove this thread from the active count, waking a pending `stop()`
    ///
    /// Call once, just before the worker thread returns.
    pub fn worker_finished(&self) {
        let mut inner = self.lock();
        inner.active_workers -= 1;
        drop(inner);
        self.changed.notify_all();
    }

    /// Worker park point; call at the top of every loop iteration
    ///
    /// While stopped, the calling worker leaves the active count (letting a
    /// concurrent [`stop`](Self::stop) complete), sleeps until the state
    /// changes, and rejoins the count before re-checking. Returns `true` to
    /// execute a pipeline step, `false` when the worker must exit its loop
    /// because shutdown was requested.
    pub fn wait_running(&self) -> bool {
        let mut inner = self.lock();
        while !inner.running && !inner.shutdown {
            inner.active_workers -= 1;
            self.changed.notify_all();
            inner = self
                .changed
                .wait(inner)
                .expect("run state mutex poisoned");
            inner.active_workers += 1;
        }
        !inner.shutdown
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("run state mutex poisoned")
    }
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}
