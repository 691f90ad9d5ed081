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

//! The loop executed on the worker thread.
//!
//! ```text
//! STARTING --start()--> RUNNING_JOB --await_next_cycle()--> SLEEPING
//!                          ^                                  |
//!                          +---- timeout / wake_up, alive ----+
//!                                                             |
//!                                  not alive --> TERMINATED <-+
//! ```

use std::{sync::Arc, thread, time::Duration};

use prometheus::IntGauge;
use tracing::{debug, error, info, warn};

use crate::{
    context::JobContext,
    controller::Controller,
    err::WorkResult,
    metrics::WorkerMetrics,
    worker::Job,
};

/// Summary of a worker loop that terminated normally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerExit {
    /// Job iterations started, including failed ones.
    pub iterations: u64,
    /// Iterations that ended with a transient error.
    pub failures:   u64,
}

/// Clears the busy flag and gauge if the job unwinds, so a pending
/// [`Controller::request_finish`] does not wait on an iteration that will
/// never complete.
struct BusyGuard<'a> {
    controller: &'a Controller,
    gauge:      &'a IntGauge,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.controller.mark_idle();
            self.gauge.set(0);
        }
    }
}

/// Runs `job` until a finish is requested through `controller`.
///
/// Calls [`Controller::start`] once, then alternates between one job
/// iteration and a sleep of `interval`. Termination is observed while
/// sleeping and right before an iteration starts; an iteration that has
/// started always runs to completion.
///
/// Returns `Err` if `on_start` fails or an iteration fails with a fatal
/// error. Transient iteration errors are logged and counted in
/// [`WorkerExit::failures`].
pub fn run_worker<J: Job>(
    controller: &Arc<Controller>,
    job: &mut J,
    interval: Duration,
) -> WorkResult<WorkerExit> {
    let name = job.name();
    let metrics = WorkerMetrics::new(name);
    let mut ctx = JobContext::new(name, Arc::clone(controller), metrics.progress.clone());

    controller.start();
    if !controller.is_alive() {
        info!(worker = name, "Finish requested before the worker started");
        return Ok(WorkerExit::default());
    }

    info!(worker = name, interval = ?interval, "Worker starting");
    metrics.started.inc();

    if let Err(e) = job.on_start(&ctx) {
        error!(worker = name, error = %e, "Worker failed during on_start");
        metrics.execution_errors.inc();
        metrics.stopped.inc();
        return Err(e);
    }

    let result = run_loop(controller, job, &mut ctx, &metrics, interval);

    job.on_shutdown(&ctx);

    match &result {
        Ok(exit) => info!(
            worker = name,
            iterations = exit.iterations,
            failures = exit.failures,
            "Worker stopped gracefully"
        ),
        Err(e) => error!(worker = name, error = %e, "Worker stopped on fatal error"),
    }
    metrics.stopped.inc();
    result
}

fn run_loop<J: Job>(
    controller: &Controller,
    job: &mut J,
    ctx: &mut JobContext,
    metrics: &WorkerMetrics,
    interval: Duration,
) -> WorkResult<WorkerExit> {
    let name = job.name();
    let mut exit = WorkerExit::default();

    loop {
        controller.mark_busy();
        // A finish that arrived while idle (during on_start or right after a
        // wake) already reported "not busy" to its caller.
        if !controller.is_alive() {
            controller.mark_idle();
            break;
        }
        exit.iterations += 1;
        ctx.set_iteration(exit.iterations);
        metrics.busy.set(1);
        debug!(worker = name, iteration = exit.iterations, "Job iteration starting");

        let start = std::time::Instant::now();
        let outcome = {
            let _guard = BusyGuard {
                controller,
                gauge: &metrics.busy,
            };
            job.run(ctx)
        };
        metrics.busy.set(0);
        metrics
            .execution_duration
            .observe(start.elapsed().as_secs_f64());

        match outcome {
            Ok(()) => {
                metrics.executions.inc();
            }
            Err(e) if e.is_transient() => {
                warn!(worker = name, iteration = exit.iterations, error = %e, "Job iteration failed");
                metrics.execution_errors.inc();
                exit.failures += 1;
            }
            Err(e) => {
                metrics.execution_errors.inc();
                controller.mark_idle();
                return Err(e);
            }
        }

        debug!(
            worker = name,
            iteration = exit.iterations,
            progress = controller.progress(),
            "Going to sleep"
        );
        if !controller.await_next_cycle(interval) {
            break;
        }
    }

    Ok(exit)
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicU64, Ordering},
        time::Instant,
    };

    use super::*;
    use crate::err::WorkError;

    #[test]
    fn test_finish_before_start_runs_nothing() {
        let controller = Arc::new(Controller::new());
        controller.request_finish(Duration::ZERO);

        let runs = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&runs);
        let mut job = ("never", move |_: &JobContext| -> WorkResult {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let exit = run_worker(&controller, &mut job, Duration::from_millis(1)).unwrap();
        assert_eq!(exit.iterations, 0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_loop_stops_at_sleep_boundary() {
        let controller = Arc::new(Controller::new());
        let finisher = Arc::clone(&controller);
        let mut job = ("self-finishing", move |ctx: &JobContext| -> WorkResult {
            if ctx.iteration() == 3 {
                // A finish requested mid-iteration is only honoured after it.
                assert!(!finisher.request_finish(Duration::ZERO));
                ctx.report(7);
            }
            Ok(())
        });

        let exit = run_worker(&controller, &mut job, Duration::from_millis(1)).unwrap();
        assert_eq!(exit.iterations, 3);
        assert_eq!(controller.progress(), 7);
        assert!(!controller.is_busy());
    }

    #[test]
    fn test_transient_errors_do_not_stop_the_loop() {
        let controller = Arc::new(Controller::new());
        let finisher = Arc::clone(&controller);
        let mut job = ("flaky", move |ctx: &JobContext| -> WorkResult {
            if ctx.iteration() == 4 {
                finisher.request_finish(Duration::ZERO);
            }
            if ctx.iteration() % 2 == 1 {
                return Err(WorkError::transient("try again"));
            }
            Ok(())
        });

        let exit = run_worker(&controller, &mut job, Duration::from_millis(1)).unwrap();
        assert_eq!(exit, WorkerExit {
            iterations: 4,
            failures:   2,
        });
    }

    #[test]
    fn test_fatal_error_stops_and_clears_busy() {
        let controller = Arc::new(Controller::new());
        let mut job = ("doomed", |ctx: &JobContext| -> WorkResult {
            if ctx.iteration() == 2 {
                return Err(WorkError::fatal("corrupt state"));
            }
            Ok(())
        });

        let err = run_worker(&controller, &mut job, Duration::from_millis(1)).unwrap_err();
        assert!(err.is_fatal());
        assert!(!controller.is_busy());

        let start = Instant::now();
        assert!(controller.request_finish(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_panic_clears_busy() {
        let controller = Arc::new(Controller::new());
        let worker = {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                let mut job = ("panicking", |_: &JobContext| -> WorkResult {
                    panic!("job exploded");
                });
                run_worker(&controller, &mut job, Duration::from_secs(30))
            })
        };

        assert!(worker.join().is_err());
        assert!(!controller.is_busy());
        assert_eq!(WorkerMetrics::new("panicking").busy.get(), 0);
        assert!(controller.request_finish(Duration::from_secs(10)));
    }

    #[test]
    fn test_finish_while_idle_before_iteration_is_honoured() {
        let controller = Arc::new(Controller::new());
        let runs = Arc::new(AtomicU64::new(0));

        struct LateFinish {
            controller: Arc<Controller>,
            runs:       Arc<AtomicU64>,
        }

        impl Job for LateFinish {
            fn name(&self) -> &'static str { "late-finish" }

            fn on_start(&mut self, _ctx: &JobContext) -> WorkResult {
                // Nothing is busy yet, so the caller is told it may join.
                assert!(self.controller.request_finish(Duration::ZERO));
                Ok(())
            }

            fn run(&mut self, _ctx: &JobContext) -> WorkResult {
                self.runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let mut job = LateFinish {
            controller: Arc::clone(&controller),
            runs:       Arc::clone(&runs),
        };
        let exit = run_worker(&controller, &mut job, Duration::from_secs(30)).unwrap();

        assert_eq!(exit.iterations, 0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!controller.is_busy());
    }

    struct Hooks {
        events: Vec<&'static str>,
    }

    impl Job for Hooks {
        fn name(&self) -> &'static str { "hooks" }

        fn on_start(&mut self, ctx: &JobContext) -> WorkResult {
            assert_eq!(ctx.iteration(), 0);
            self.events.push("start");
            Ok(())
        }

        fn run(&mut self, ctx: &JobContext) -> WorkResult {
            self.events.push("run");
            if ctx.iteration() == 2 {
                return Err(WorkError::fatal("stop"));
            }
            Ok(())
        }

        fn on_shutdown(&mut self, _ctx: &JobContext) { self.events.push("shutdown"); }
    }

    #[test]
    fn test_lifecycle_hooks_order() {
        let controller = Arc::new(Controller::new());
        let mut job = Hooks { events: Vec::new() };

        assert!(run_worker(&controller, &mut job, Duration::from_millis(1)).is_err());
        assert_eq!(job.events, vec!["start", "run", "run", "shutdown"]);
    }
}
