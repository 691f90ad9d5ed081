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

//! Version strings for `sleepy --version` and `sleepy --help`.

use shadow_rs::{formatcp, shadow};

shadow!(build);

pub const AUTHOR: &str = env!("CARGO_PKG_AUTHORS");

/// Set `SLEEPY_RELEASE` at build time to mark an official release.
const RELEASE: bool = option_env!("SLEEPY_RELEASE").is_some();

const COMMIT_SUFFIX: &str = if build::SHORT_COMMIT.is_empty() {
    ""
} else if build::GIT_CLEAN {
    formatcp!("+{}", build::SHORT_COMMIT)
} else {
    formatcp!("+{}-dirty", build::SHORT_COMMIT)
};

/// `0.1.0` for releases, `0.1.0-unofficial+abc1234[-dirty]` otherwise.
pub const FULL_VERSION: &str = if RELEASE {
    build::PKG_VERSION
} else {
    formatcp!("{}-unofficial{}", build::PKG_VERSION, COMMIT_SUFFIX)
};

/// Shown by `--version` together with the toolchain and build details.
pub const LONG_VERSION: &str = formatcp!(
    "{}\nbranch: {}\nbuilt: {}\nrustc: {}",
    FULL_VERSION,
    build::BRANCH,
    build::BUILD_TIME,
    build::RUST_VERSION,
);
