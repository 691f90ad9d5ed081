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

use std::{thread, time::Duration};

use bon::Builder;
use sleepy_common_worker::{Job, JobContext, WorkResult};

use crate::config::JobSettings;

/// Simulated long task: counts progress from `0` to `steps`, spending `step`
/// on each value.
#[derive(Debug, Clone, Builder)]
pub struct CountdownJob {
    #[builder(default = 60)]
    steps:         u64,
    #[builder(default = Duration::from_secs(1))]
    step:          Duration,
    #[builder(default)]
    interruptible: bool,
}

impl CountdownJob {
    pub const NAME: &'static str = "countdown";

    pub const fn steps(&self) -> u64 { self.steps }
}

impl From<&JobSettings> for CountdownJob {
    fn from(settings: &JobSettings) -> Self {
        Self::builder()
            .steps(settings.steps)
            .step(settings.step)
            .interruptible(settings.interruptible)
            .build()
    }
}

impl Job for CountdownJob {
    fn name(&self) -> &'static str { Self::NAME }

    fn run(&mut self, ctx: &JobContext) -> WorkResult {
        tracing::info!(iteration = ctx.iteration(), steps = self.steps, "Working");
        for i in 0..=self.steps {
            ctx.report(i);
            if self.interruptible && ctx.is_finish_requested() {
                tracing::info!(progress = i, "Finish requested, ending iteration early");
                return Ok(());
            }
            thread::sleep(self.step);
        }
        Ok(())
    }
}
