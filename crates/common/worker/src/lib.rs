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

//! Lifecycle control for a single long-running background worker thread.
//!
//! This crate provides:
//! - **Controller**: start, sleep between iterations, wake on demand and
//!   bounded graceful shutdown, built on two independent mutex/condvar pairs
//! - **Job trait**: one blocking iteration plus optional start/shutdown hooks
//! - **Worker loop**: runs a job until a finish is requested, observing
//!   termination only between iterations
//! - **WorkerThread**: owns the OS thread and joins or detaches it depending
//!   on whether the worker stopped in time
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use sleepy_common_worker::{Job, JobContext, WorkResult, WorkerConfig, WorkerThread};
//!
//! struct Reindex;
//!
//! impl Job for Reindex {
//!     fn name(&self) -> &'static str { "reindex" }
//!
//!     fn run(&mut self, ctx: &JobContext) -> WorkResult {
//!         for step in 0..=60 {
//!             ctx.report(step);
//!             std::thread::sleep(Duration::from_millis(10));
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let config = WorkerConfig::builder()
//!     .interval(Duration::from_secs(30))
//!     .build();
//! let worker = WorkerThread::spawn(&config, Reindex).unwrap();
//!
//! // Skip the rest of the current sleep.
//! worker.wake_up();
//!
//! // Wait at most 15s for the running iteration, then join or detach.
//! let shutdown = worker.finish(Duration::from_secs(15));
//! println!("{shutdown:?}");
//! ```
//!
//! # Architecture
//!
//! - [`Controller`]: shared liveness/busy/progress state
//! - [`Job`] and [`JobContext`]: the repeatable unit of work
//! - [`run_worker`]: the worker loop
//! - [`WorkerThread`] and [`Shutdown`]: thread ownership and release

mod config;
mod context;
mod controller;
mod driver;
mod err;
mod handle;
mod metrics;
mod worker;

// Public API
pub use config::{DEFAULT_INTERVAL, WorkerConfig};
pub use context::JobContext;
pub use controller::Controller;
pub use driver::{WorkerExit, run_worker};
pub use err::{ErrorSeverity, SpawnError, WorkError, WorkResult, WorkResultExt};
pub use handle::{Shutdown, WorkerThread};
pub use worker::Job;
