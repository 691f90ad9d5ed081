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

//! Layered application configuration.
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. the file passed with `--config` (format picked from its extension)
//! 3. `SLEEPY__*` environment variables, e.g. `SLEEPY__JOB__STEPS=10` or
//!    `SLEEPY__SHUTDOWN__FINISH_TIMEOUT=5s`
//!
//! Command-line flags are applied on top by the binary.

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use sleepy_common_telemetry::LoggingOptions;
use sleepy_common_worker::{DEFAULT_INTERVAL, WorkerConfig};
use smart_default::SmartDefault;
use snafu::ResultExt;
use validator::{Validate, ValidationError};

use crate::{
    err::{ConfigError, InvalidSnafu, LoadSnafu},
    policy::{ShutdownPolicy, ShutdownStrategy},
};

pub const ENV_PREFIX: &str = "SLEEPY";
pub const ENV_SEPARATOR: &str = "__";

fn non_zero_duration(value: &Duration) -> Result<(), ValidationError> {
    if value.is_zero() {
        return Err(ValidationError::new("zero_duration"));
    }
    Ok(())
}

/// Top-level configuration of the `sleepy` application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SmartDefault, Validate)]
#[serde(default)]
pub struct AppConfig {
    #[validate(nested)]
    pub worker:   WorkerSettings,
    #[validate(nested)]
    pub job:      JobSettings,
    #[validate(nested)]
    pub shutdown: ShutdownSettings,
    pub logging:  LoggingOptions,
}

/// Scheduling of the background worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Validate)]
#[serde(default)]
pub struct WorkerSettings {
    /// Sleep between two job iterations.
    #[default(_code = "DEFAULT_INTERVAL")]
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

/// Shape of the simulated long-running job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Validate)]
#[serde(default)]
pub struct JobSettings {
    /// Number of progress steps per iteration. Progress runs `0..=steps`.
    #[default = 60]
    #[validate(range(min = 1))]
    pub steps: u64,

    /// Time spent on each step.
    #[default(_code = "Duration::from_secs(1)")]
    #[serde(with = "humantime_serde")]
    pub step: Duration,

    /// End an iteration early once a finish is requested. Off by default:
    /// an iteration that has started runs to completion.
    #[default = false]
    pub interruptible: bool,
}

/// How the driver releases the worker on exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, SmartDefault, Validate)]
#[serde(default)]
pub struct ShutdownSettings {
    pub strategy: ShutdownStrategy,

    /// Fraction of `job.steps` from which a busy worker is considered nearly
    /// done under the `when_nearly_done` strategy.
    #[default = 0.6]
    #[validate(range(min = 0.0, max = 1.0))]
    pub nearly_done_ratio: f64,

    /// Longest time to wait for a running iteration before detaching.
    #[default(_code = "Duration::from_secs(15)")]
    #[serde(with = "humantime_serde")]
    #[validate(custom(function = "non_zero_duration"))]
    pub finish_timeout: Duration,
}

impl ShutdownSettings {
    pub const fn policy(&self) -> ShutdownPolicy {
        ShutdownPolicy::new(self.strategy, self.nearly_done_ratio, self.finish_timeout)
    }
}

impl AppConfig {
    /// Load defaults, the optional file at `path`, then the process
    /// environment, and validate the result.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> { Self::load_with_env(path, None) }

    /// Like [`load`](Self::load), reading environment variables from `env`
    /// instead of the process environment when it is `Some`.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .try_parsing(true)
                .source(env),
        );

        let config: Self = builder
            .build()
            .and_then(config::Config::try_deserialize)
            .context(LoadSnafu {
                path: path.map(|p| p.display().to_string()),
            })?;
        config.validated()
    }

    /// Validate, e.g. after command-line overrides were applied.
    pub fn validated(self) -> Result<Self, ConfigError> {
        self.validate().context(InvalidSnafu)?;
        Ok(self)
    }

    /// Settings for [`sleepy_common_worker::WorkerThread`].
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig::builder()
            .interval(self.worker.interval)
            .build()
    }

    #[must_use]
    pub fn open(self) -> crate::App { crate::App::new(self) }
}
