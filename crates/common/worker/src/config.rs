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

use std::time::Duration;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

/// Settings for a [`WorkerThread`](crate::WorkerThread). The thread itself is
/// named after its [`Job`](crate::Job).
#[derive(Debug, Clone, bon::Builder)]
pub struct WorkerConfig {
    /// Sleep between two job iterations. Default: 30 seconds.
    #[builder(default = DEFAULT_INTERVAL, into)]
    interval: Duration,

    /// Stack size of the worker thread. Default: the platform default.
    stack_size: Option<usize>,
}

impl WorkerConfig {
    pub const fn interval(&self) -> Duration { self.interval }

    pub(crate) const fn stack_size(&self) -> Option<usize> { self.stack_size }
}

impl Default for WorkerConfig {
    fn default() -> Self { Self::builder().build() }
}
