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

//! Decides, at exit time, whether the driver waits for a running iteration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use strum_macros::{Display, EnumString};

/// Configured shutdown behaviour.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShutdownStrategy {
    /// Always request a finish and wait up to the finish timeout.
    AlwaysWait,
    /// Never wait for a busy worker; detach it right away.
    NeverWait,
    /// Wait only when the current iteration is far enough along.
    #[default]
    WhenNearlyDone,
}

/// What the driver does with the worker once the user asked to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ShutdownAction {
    /// Request a finish and join, detaching only on timeout.
    RequestFinish,
    /// Request a finish without waiting and detach a busy worker.
    Abandon,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShutdownPolicy {
    strategy:          ShutdownStrategy,
    nearly_done_ratio: f64,
    finish_timeout:    Duration,
}

impl ShutdownPolicy {
    pub const fn new(
        strategy: ShutdownStrategy,
        nearly_done_ratio: f64,
        finish_timeout: Duration,
    ) -> Self {
        Self {
            strategy,
            nearly_done_ratio,
            finish_timeout,
        }
    }

    pub const fn strategy(&self) -> ShutdownStrategy { self.strategy }

    pub const fn finish_timeout(&self) -> Duration { self.finish_timeout }

    /// Progress from which a busy worker counts as nearly done: the ratio of
    /// `total_steps`, rounded up.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn threshold(&self, total_steps: u64) -> u64 {
        let ratio = self.nearly_done_ratio.clamp(0.0, 1.0);
        (ratio * total_steps as f64).ceil() as u64
    }

    /// An idle worker is always finished cleanly, since it leaves its sleep
    /// at once.
    pub fn decide(&self, busy: bool, progress: u64, total_steps: u64) -> ShutdownAction {
        if !busy {
            return ShutdownAction::RequestFinish;
        }
        match self.strategy {
            ShutdownStrategy::AlwaysWait => ShutdownAction::RequestFinish,
            ShutdownStrategy::NeverWait => ShutdownAction::Abandon,
            ShutdownStrategy::WhenNearlyDone if progress >= self.threshold(total_steps) => {
                ShutdownAction::RequestFinish
            }
            ShutdownStrategy::WhenNearlyDone => ShutdownAction::Abandon,
        }
    }
}
