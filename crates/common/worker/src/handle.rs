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

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use snafu::ResultExt;
use tracing::{info, warn};

use crate::{
    config::WorkerConfig,
    controller::Controller,
    driver::{WorkerExit, run_worker},
    err::{SpawnError, SpawnThreadSnafu, WorkResult},
    metrics::WorkerMetrics,
    worker::Job,
};

/// How a worker thread was released by [`WorkerThread::finish`] or
/// [`WorkerThread::abandon`].
#[derive(Debug)]
pub enum Shutdown {
    /// The worker left its loop in time and the thread was joined.
    Joined(WorkResult<WorkerExit>),
    /// The thread was joined but the job panicked.
    Panicked,
    /// The worker was still busy; the thread was detached and keeps running
    /// until its current iteration completes.
    Detached,
}

impl Shutdown {
    pub const fn is_joined(&self) -> bool { matches!(self, Self::Joined(_)) }

    pub const fn is_detached(&self) -> bool { matches!(self, Self::Detached) }
}

/// Owner of a worker thread running [`run_worker`].
///
/// Dropping a `WorkerThread` without calling [`finish`](Self::finish) or
/// [`abandon`](Self::abandon) behaves like `abandon`: the worker is asked to
/// stop and the thread is detached.
///
/// # Example
///
/// ```rust,no_run
/// use std::time::Duration;
///
/// use sleepy_common_worker::{JobContext, Shutdown, WorkResult, WorkerConfig, WorkerThread};
///
/// let job = ("tick", |ctx: &JobContext| -> WorkResult {
///     ctx.report(1);
///     Ok(())
/// });
/// let config = WorkerConfig::builder()
///     .interval(Duration::from_secs(30))
///     .build();
/// let worker = WorkerThread::spawn(&config, job).unwrap();
///
/// worker.wake_up();
/// match worker.finish(Duration::from_secs(15)) {
///     Shutdown::Joined(exit) => println!("joined: {exit:?}"),
///     Shutdown::Panicked => println!("job panicked"),
///     Shutdown::Detached => println!("still running, detached"),
/// }
/// ```
#[derive(Debug)]
pub struct WorkerThread {
    name:       &'static str,
    controller: Arc<Controller>,
    join:       Option<JoinHandle<WorkResult<WorkerExit>>>,
    metrics:    WorkerMetrics,
}

impl WorkerThread {
    /// Spawns a named OS thread that runs `job` with a fresh [`Controller`].
    pub fn spawn<J: Job>(config: &WorkerConfig, job: J) -> Result<Self, SpawnError> {
        Self::spawn_with(config, job, Arc::new(Controller::new()))
    }

    /// Like [`spawn`](Self::spawn) but with a caller-provided controller.
    pub fn spawn_with<J: Job>(
        config: &WorkerConfig,
        mut job: J,
        controller: Arc<Controller>,
    ) -> Result<Self, SpawnError> {
        let name = job.name();
        let interval = config.interval();

        let mut builder = thread::Builder::new().name(name.to_string());
        if let Some(stack_size) = config.stack_size() {
            builder = builder.stack_size(stack_size);
        }

        let worker_controller = Arc::clone(&controller);
        let join = builder
            .spawn(move || run_worker(&worker_controller, &mut job, interval))
            .context(SpawnThreadSnafu { name })?;

        Ok(Self {
            name,
            controller,
            join: Some(join),
            metrics: WorkerMetrics::new(name),
        })
    }

    pub const fn name(&self) -> &'static str { self.name }

    pub const fn controller(&self) -> &Arc<Controller> { &self.controller }

    pub fn progress(&self) -> u64 { self.controller.progress() }

    pub fn is_busy(&self) -> bool { self.controller.is_busy() }

    /// Returns `true` once the thread has exited.
    pub fn is_finished(&self) -> bool { self.join.as_ref().is_none_or(JoinHandle::is_finished) }

    /// Cuts the current sleep short. Called while the job runs, it skips the
    /// next sleep instead. See [`Controller::wake_up`].
    pub fn wake_up(&self) -> bool {
        let delivered = self.controller.wake_up();
        if delivered {
            self.metrics.wakeups.inc();
        }
        delivered
    }

    /// Requests a finish and waits up to `timeout` for the current iteration.
    ///
    /// Joins the thread if the worker stopped being busy in time, otherwise
    /// detaches it.
    pub fn finish(mut self, timeout: Duration) -> Shutdown {
        info!(worker = self.name, timeout = ?timeout, "Requesting worker finish");
        if self.controller.request_finish(timeout) {
            self.join()
        } else {
            warn!(
                worker = self.name,
                progress = self.controller.progress(),
                "Worker still busy after timeout, detaching"
            );
            self.detach()
        }
    }

    /// Requests a finish without waiting and detaches the thread.
    ///
    /// The worker stops at its next sleep boundary on its own.
    pub fn abandon(mut self) -> Shutdown {
        if self.controller.request_finish(Duration::ZERO) && self.is_finished() {
            return self.join();
        }
        info!(
            worker = self.name,
            progress = self.controller.progress(),
            "Abandoning worker thread"
        );
        self.detach()
    }

    fn join(&mut self) -> Shutdown {
        let Some(join) = self.join.take() else {
            return Shutdown::Detached;
        };
        match join.join() {
            Ok(result) => Shutdown::Joined(result),
            Err(_) => {
                warn!(worker = self.name, "Worker thread panicked");
                Shutdown::Panicked
            }
        }
    }

    fn detach(&mut self) -> Shutdown {
        if self.join.take().is_some() {
            self.metrics.detached.inc();
        }
        Shutdown::Detached
    }
}

impl Drop for WorkerThread {
    fn drop(&mut self) {
        if self.join.is_some() {
            self.controller.request_finish(Duration::ZERO);
            self.detach();
        }
    }
}
