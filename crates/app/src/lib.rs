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

//! The `sleepy` application: one countdown worker driven by line commands.
//!
//! [`App::run`] spawns the worker thread, serves [`Command`]s until a finish
//! is asked for (or the worker stops by itself), then applies the configured
//! [`ShutdownPolicy`] to either wait for the running iteration or detach it.

pub mod config;
pub mod err;
pub mod input;
pub mod job;
pub mod policy;

use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

pub use config::AppConfig;
pub use err::{AppError, ConfigError};
pub use input::{Command, CommandSender, Commands};
pub use job::CountdownJob;
pub use policy::{ShutdownAction, ShutdownPolicy, ShutdownStrategy};
use sleepy_common_worker::{Shutdown, WorkerThread};
use tracing::{error, info, warn};

/// How often the driver checks whether the worker stopped on its own while
/// no command arrives.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Represents the main application with lifecycle management
#[derive(Debug)]
pub struct App {
    /// Application configuration
    pub config: AppConfig,
    /// Set while [`App::run`] serves commands
    running:    AtomicBool,
}

/// Outcome of one [`App::run`].
#[derive(Debug)]
pub struct AppReport {
    /// What the shutdown policy chose.
    pub action:   ShutdownAction,
    /// Worker progress when the decision was made.
    pub progress: u64,
    /// Whether the worker thread was joined or detached.
    pub shutdown: Shutdown,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            running: AtomicBool::new(false),
        }
    }

    /// Check if the application is serving commands
    #[must_use]
    pub fn is_running(&self) -> bool { self.running.load(Ordering::SeqCst) }

    /// Run until `commands` yields [`Command::Finish`], then release the
    /// worker according to the shutdown policy.
    pub fn run(&self, commands: &Commands) -> Result<AppReport, AppError> {
        let job = CountdownJob::from(&self.config.job);
        let total_steps = job.steps();
        let worker = WorkerThread::spawn(&self.config.worker_config(), job)?;
        info!(
            worker = worker.name(),
            interval = ?self.config.worker.interval,
            steps = total_steps,
            "Application started, commands: wake | status | anything else to exit"
        );

        self.running.store(true, Ordering::SeqCst);
        serve(&worker, commands);
        self.running.store(false, Ordering::SeqCst);

        let policy = self.config.shutdown.policy();
        let busy = worker.is_busy();
        let progress = worker.progress();
        let action = policy.decide(busy, progress, total_steps);
        info!(
            worker = worker.name(),
            busy,
            progress,
            strategy = %policy.strategy(),
            %action,
            "Shutting down"
        );

        let shutdown = match action {
            ShutdownAction::RequestFinish => worker.finish(policy.finish_timeout()),
            ShutdownAction::Abandon => worker.abandon(),
        };
        log_shutdown(&shutdown);

        Ok(AppReport {
            action,
            progress,
            shutdown,
        })
    }
}

fn serve(worker: &WorkerThread, commands: &Commands) {
    loop {
        match commands.recv_timeout(POLL_INTERVAL) {
            Some(Command::Wake) => {
                if worker.wake_up() {
                    info!(worker = worker.name(), "Woke up worker");
                } else {
                    warn!(worker = worker.name(), "Worker is not alive, nothing to wake");
                }
            }
            Some(Command::Status) => info!(
                worker = worker.name(),
                busy = worker.is_busy(),
                progress = worker.progress(),
                "Status"
            ),
            Some(Command::Finish) => return,
            None if worker.is_finished() => {
                warn!(worker = worker.name(), "Worker stopped on its own");
                return;
            }
            None => {}
        }
    }
}

fn log_shutdown(shutdown: &Shutdown) {
    match shutdown {
        Shutdown::Joined(Ok(exit)) => info!(
            iterations = exit.iterations,
            failures = exit.failures,
            "Worker joined"
        ),
        Shutdown::Joined(Err(e)) => error!(error = %e, "Worker joined after a fatal error"),
        Shutdown::Panicked => error!("Worker thread panicked"),
        Shutdown::Detached => warn!("Worker did not finish in time, detached"),
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use sleepy_common_telemetry::logging::init_default_ut_logging;

    use super::*;

    fn config(steps: u64, step: Duration, strategy: ShutdownStrategy) -> AppConfig {
        let mut config = AppConfig::default();
        config.worker.interval = Duration::from_secs(60);
        config.job.steps = steps;
        config.job.step = step;
        config.shutdown.strategy = strategy;
        config.shutdown.finish_timeout = Duration::from_secs(5);
        config
    }

    fn run_with(app: &App, script: impl FnOnce(&CommandSender) + Send + 'static) -> AppReport {
        let (tx, commands) = input::channel();
        let driver = thread::spawn(move || script(&tx));
        let report = app.run(&commands).unwrap();
        driver.join().unwrap();
        report
    }

    #[test]
    fn test_finish_while_idle_joins() {
        init_default_ut_logging();
        let app = config(2, Duration::from_millis(1), ShutdownStrategy::NeverWait).open();

        let report = run_with(&app, |tx| {
            thread::sleep(Duration::from_millis(100));
            tx.send(Command::Status).unwrap();
            tx.send(Command::Wake).unwrap();
            thread::sleep(Duration::from_millis(200));
            tx.send(Command::Finish).unwrap();
        });

        assert_eq!(report.action, ShutdownAction::RequestFinish);
        match report.shutdown {
            Shutdown::Joined(Ok(exit)) => assert_eq!(exit.iterations, 2),
            other => panic!("expected a clean join, got {other:?}"),
        }
        assert!(!app.is_running());
    }

    #[test]
    fn test_never_wait_detaches_busy_worker() {
        init_default_ut_logging();
        let app = config(1_000, Duration::from_millis(2), ShutdownStrategy::NeverWait).open();

        let report = run_with(&app, |tx| {
            thread::sleep(Duration::from_millis(50));
            tx.send(Command::Finish).unwrap();
        });

        assert_eq!(report.action, ShutdownAction::Abandon);
        assert!(report.shutdown.is_detached());
        assert!(report.progress < 1_000);
    }

    #[test]
    fn test_always_wait_joins_busy_worker() {
        init_default_ut_logging();
        let app = config(10, Duration::from_millis(10), ShutdownStrategy::AlwaysWait).open();

        let report = run_with(&app, |tx| {
            thread::sleep(Duration::from_millis(30));
            tx.send(Command::Finish).unwrap();
        });

        assert_eq!(report.action, ShutdownAction::RequestFinish);
        assert!(report.shutdown.is_joined());
    }

    #[test]
    fn test_disconnected_input_finishes() {
        init_default_ut_logging();
        let app = config(1, Duration::from_millis(1), ShutdownStrategy::WhenNearlyDone).open();

        let report = run_with(&app, |_tx| {
            thread::sleep(Duration::from_millis(100));
        });

        assert_eq!(report.action, ShutdownAction::RequestFinish);
        assert!(report.shutdown.is_joined());
    }
}
