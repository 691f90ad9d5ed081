// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Lifecycle coordination between a worker thread and its controlling thread.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use parking_lot::{Condvar, Mutex};

/// Liveness phase of the worker loop.
///
/// `alive` is `true` only in [`Phase::Alive`]. Each transition happens at most
/// once, so a late `start()` cannot bring a finished worker back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pending,
    Alive,
    Finished,
}

#[derive(Debug)]
struct Liveness {
    phase:        Phase,
    /// Coalesced wake request, consumed by the next sleep.
    wake_pending: bool,
}

impl Liveness {
    const fn is_alive(&self) -> bool { matches!(self.phase, Phase::Alive) }
}

/// Coordinates start, periodic sleep/wake, progress reporting and bounded
/// shutdown of one worker thread.
///
/// Two independent mutex/condvar pairs are used: one for liveness and one for
/// the busy flag. No method ever holds both locks at the same time:
/// [`await_next_cycle`](Self::await_next_cycle) releases the busy lock before
/// taking the liveness lock and [`request_finish`](Self::request_finish)
/// releases the liveness lock before taking the busy lock.
///
/// # Example
///
/// ```rust
/// use std::{sync::Arc, thread, time::Duration};
///
/// use sleepy_common_worker::Controller;
///
/// let controller = Arc::new(Controller::new());
/// let worker = {
///     let controller = Arc::clone(&controller);
///     thread::spawn(move || {
///         controller.start();
///         loop {
///             controller.mark_busy();
///             controller.set_progress(1);
///             if !controller.await_next_cycle(Duration::from_secs(30)) {
///                 break;
///             }
///         }
///     })
/// };
///
/// if controller.request_finish(Duration::from_secs(5)) {
///     worker.join().unwrap();
/// }
/// ```
#[derive(Debug)]
pub struct Controller {
    liveness:    Mutex<Liveness>,
    liveness_cv: Condvar,
    busy:        Mutex<bool>,
    busy_cv:     Condvar,
    progress:    AtomicU64,
}

impl Default for Controller {
    fn default() -> Self { Self::new() }
}

impl Controller {
    #[must_use]
    pub fn new() -> Self {
        Self {
            liveness:    Mutex::new(Liveness {
                phase:        Phase::Pending,
                wake_pending: false,
            }),
            liveness_cv: Condvar::new(),
            busy:        Mutex::new(false),
            busy_cv:     Condvar::new(),
            progress:    AtomicU64::new(0),
        }
    }

    /// Marks the worker loop as alive.
    ///
    /// Called once by the worker before its first iteration. Repeated calls
    /// are harmless, and a call after [`request_finish`](Self::request_finish)
    /// leaves the controller finished.
    pub fn start(&self) {
        let mut liveness = self.liveness.lock();
        if liveness.phase == Phase::Pending {
            liveness.phase = Phase::Alive;
        }
        self.liveness_cv.notify_all();
    }

    /// Flags the start of a job iteration and resets progress to zero.
    pub fn mark_busy(&self) {
        let mut busy = self.busy.lock();
        *busy = true;
        self.progress.store(0, Ordering::Release);
        self.busy_cv.notify_all();
    }

    /// Clears the busy flag without sleeping.
    ///
    /// Used when the worker leaves its loop outside of
    /// [`await_next_cycle`](Self::await_next_cycle), e.g. on a fatal job error
    /// or while unwinding from a panic.
    pub(crate) fn mark_idle(&self) {
        let mut busy = self.busy.lock();
        *busy = false;
        self.busy_cv.notify_all();
    }

    /// Wakes a worker sleeping in [`await_next_cycle`](Self::await_next_cycle).
    ///
    /// If the worker is not sleeping yet, the wake is kept and the next sleep
    /// returns immediately. Several wakes before the next sleep collapse into
    /// one. Returns `false` and does nothing when the worker is not alive.
    pub fn wake_up(&self) -> bool {
        let mut liveness = self.liveness.lock();
        if !liveness.is_alive() {
            return false;
        }
        liveness.wake_pending = true;
        self.liveness_cv.notify_all();
        true
    }

    /// Ends a job iteration and sleeps for up to `interval`.
    ///
    /// Returns `true` if the worker should run another iteration, i.e. the
    /// sleep ended by timeout or by [`wake_up`](Self::wake_up) and the worker
    /// is still alive. Returns `false` without sleeping when the worker is no
    /// longer alive, and `false` as soon as a finish is requested mid-sleep.
    pub fn await_next_cycle(&self, interval: Duration) -> bool {
        {
            let mut busy = self.busy.lock();
            *busy = false;
            self.busy_cv.notify_all();
        }

        let mut liveness = self.liveness.lock();
        if !liveness.is_alive() {
            return false;
        }
        self.liveness_cv.wait_while_for(
            &mut liveness,
            |liveness| liveness.is_alive() && !liveness.wake_pending,
            interval,
        );
        liveness.wake_pending = false;
        liveness.is_alive()
    }

    /// Asks the worker to stop and waits up to `timeout` for the running
    /// iteration, if any, to complete.
    ///
    /// Returns `true` when the worker is not busy (immediately, or once the
    /// current iteration finished within `timeout`). In that case the worker
    /// thread exits at its sleep boundary and can be joined. Returns `false`
    /// if it is still busy after `timeout`; the caller must then detach the
    /// thread instead of joining it.
    pub fn request_finish(&self, timeout: Duration) -> bool {
        {
            let mut liveness = self.liveness.lock();
            liveness.phase = Phase::Finished;
            liveness.wake_pending = false;
            self.liveness_cv.notify_all();
        }

        let mut busy = self.busy.lock();
        if !*busy {
            return true;
        }
        self.busy_cv.wait_while_for(&mut busy, |busy| *busy, timeout);
        !*busy
    }

    /// Publishes the progress of the current iteration. Lock free.
    pub fn set_progress(&self, progress: u64) { self.progress.store(progress, Ordering::Release); }

    /// Progress of the current (or last) iteration. Lock free.
    pub fn progress(&self) -> u64 { self.progress.load(Ordering::Acquire) }

    pub fn is_alive(&self) -> bool { self.liveness.lock().is_alive() }

    pub fn is_busy(&self) -> bool { *self.busy.lock() }
}
