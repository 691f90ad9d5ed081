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

use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    #[snafu(display("Failed to load configuration from {}", path.as_deref().unwrap_or("defaults and environment")))]
    Load {
        path:   Option<String>,
        #[snafu(source)]
        source: config::ConfigError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Invalid configuration"))]
    Invalid {
        #[snafu(source)]
        source: validator::ValidationErrors,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum AppError {
    #[snafu(transparent)]
    Spawn {
        source: sleepy_common_worker::SpawnError,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to spawn the command reader thread"))]
    SpawnInput {
        #[snafu(source)]
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },

    #[snafu(display("Failed to install the interrupt handler"))]
    InstallSignalHandler {
        #[snafu(source)]
        source: ctrlc::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}
