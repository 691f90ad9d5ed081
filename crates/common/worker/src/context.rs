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

use std::sync::Arc;

use prometheus::IntGauge;

use crate::controller::Controller;

/// Context passed to each job iteration.
///
/// While the iteration runs, a [`WorkerThread::wake_up`](crate::WorkerThread::wake_up)
/// does not interrupt it but cancels the interval that would follow it.
#[derive(Clone)]
pub struct JobContext {
    name:       &'static str,
    controller: Arc<Controller>,
    iteration:  u64,
    gauge:      IntGauge,
}

impl JobContext {
    pub(crate) const fn new(
        name: &'static str,
        controller: Arc<Controller>,
        gauge: IntGauge,
    ) -> Self {
        Self {
            name,
            controller,
            iteration: 0,
            gauge,
        }
    }

    pub(crate) const fn set_iteration(&mut self, iteration: u64) { self.iteration = iteration; }

    /// Name of the worker running this job.
    pub const fn name(&self) -> &'static str { self.name }

    /// 1-based number of the current iteration; 0 in `on_start`.
    pub const fn iteration(&self) -> u64 { self.iteration }

    /// Publish progress of the current iteration.
    pub fn report(&self, progress: u64) {
        self.controller.set_progress(progress);
        #[allow(clippy::cast_possible_wrap)]
        self.gauge.set(progress as i64);
    }

    pub fn progress(&self) -> u64 { self.controller.progress() }

    /// Check if a finish has been requested.
    ///
    /// Jobs are never interrupted by the worker loop. A job that can stop at
    /// a safe point may poll this to end its iteration early.
    pub fn is_finish_requested(&self) -> bool { !self.controller.is_alive() }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("name", &self.name)
            .field("iteration", &self.iteration)
            .field("progress", &self.progress())
            .finish()
    }
}
