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

use crate::{context::JobContext, err::WorkResult};

/// A repeatable unit of blocking work run by the worker thread.
///
/// Implementors only define one iteration in `run()`. The worker loop marks
/// the controller busy before each iteration and sleeps between iterations.
/// An iteration, once started, always runs to completion.
///
/// A wake-up that arrives while an iteration runs is kept: the sleep after
/// that iteration is skipped and the next one starts right away.
///
/// # Example
///
/// ```rust
/// use sleepy_common_worker::{Job, JobContext, WorkResult};
///
/// struct Compact {
///     segments: u64,
/// }
///
/// impl Job for Compact {
///     fn name(&self) -> &'static str { "compact" }
///
///     fn run(&mut self, ctx: &JobContext) -> WorkResult {
///         for segment in 0..=self.segments {
///             ctx.report(segment);
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Job: Send + 'static {
    /// Name used for the thread, log fields and metric labels.
    fn name(&self) -> &'static str;

    /// Called once before the first iteration. An error stops the worker
    /// before any iteration runs.
    fn on_start(&mut self, _ctx: &JobContext) -> WorkResult { Ok(()) }

    /// One iteration. Progress is reported through `ctx`.
    fn run(&mut self, ctx: &JobContext) -> WorkResult;

    /// Called once after the last iteration, including after a fatal error.
    fn on_shutdown(&mut self, _ctx: &JobContext) {}
}

impl<F> Job for (&'static str, F)
where
    F: FnMut(&JobContext) -> WorkResult + Send + 'static,
{
    fn name(&self) -> &'static str { self.0 }

    fn run(&mut self, ctx: &JobContext) -> WorkResult { (self.1)(ctx) }
}
