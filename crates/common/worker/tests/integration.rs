use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use sleepy_common_telemetry::logging::init_default_ut_logging;
use sleepy_common_worker::{
    Controller, Job, JobContext, Shutdown, WorkError, WorkResult, WorkerConfig, WorkerExit,
    WorkerThread,
};

/// One simulated time unit.
const UNIT: Duration = Duration::from_millis(20);

/// Reports progress 0..=steps, sleeping one unit per step.
struct Countdown {
    steps:      u64,
    iterations: Arc<AtomicU64>,
}

impl Job for Countdown {
    fn name(&self) -> &'static str { "countdown" }

    fn run(&mut self, ctx: &JobContext) -> WorkResult {
        self.iterations.fetch_add(1, Ordering::SeqCst);
        for step in 0..=self.steps {
            ctx.report(step);
            thread::sleep(UNIT);
        }
        Ok(())
    }
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

fn spawn_countdown(steps: u64, interval: Duration) -> (WorkerThread, Arc<AtomicU64>) {
    init_default_ut_logging();
    let iterations = Arc::new(AtomicU64::new(0));
    let job = Countdown {
        steps,
        iterations: Arc::clone(&iterations),
    };
    let config = WorkerConfig::builder().interval(interval).build();
    (WorkerThread::spawn(&config, job).unwrap(), iterations)
}

#[test]
fn test_wake_up_starts_next_iteration_early() {
    let (worker, iterations) = spawn_countdown(1, Duration::from_secs(30));

    assert!(wait_until(Duration::from_secs(5), || {
        iterations.load(Ordering::SeqCst) == 1 && !worker.is_busy()
    }));

    let woken_at = Instant::now();
    assert!(worker.wake_up());
    assert!(wait_until(Duration::from_secs(5), || {
        iterations.load(Ordering::SeqCst) == 2
    }));
    assert!(woken_at.elapsed() < Duration::from_secs(5));

    let shutdown = worker.finish(Duration::from_secs(5));
    assert!(matches!(
        shutdown,
        Shutdown::Joined(Ok(WorkerExit { iterations: 2, .. }))
    ));
}

#[test]
fn test_finish_early_in_iteration_detaches() {
    let (worker, _) = spawn_countdown(60, Duration::from_secs(30));
    let controller = Arc::clone(worker.controller());

    assert!(wait_until(Duration::from_secs(10), || worker.progress() >= 10));

    let start = Instant::now();
    let shutdown = worker.finish(UNIT * 15);
    let waited = start.elapsed();

    assert!(shutdown.is_detached());
    assert!(waited >= UNIT * 15);
    assert!(waited < UNIT * 45);

    // The detached worker completes its iteration and exits on its own.
    assert!(!controller.is_alive());
    assert!(wait_until(Duration::from_secs(10), || !controller.is_busy()));
    assert_eq!(controller.progress(), 60);
}

#[test]
fn test_finish_near_end_of_iteration_joins() {
    let (worker, iterations) = spawn_countdown(60, Duration::from_secs(30));

    assert!(wait_until(Duration::from_secs(10), || worker.progress() >= 59));

    let start = Instant::now();
    let shutdown = worker.finish(UNIT * 60);

    assert!(start.elapsed() < UNIT * 60);
    assert!(shutdown.is_joined());
    assert_eq!(iterations.load(Ordering::SeqCst), 1);
}

#[test]
fn test_finish_while_sleeping_joins_immediately() {
    let (worker, _) = spawn_countdown(1, Duration::from_secs(30));
    assert!(wait_until(Duration::from_secs(5), || {
        worker.progress() == 1 && !worker.is_busy()
    }));

    let start = Instant::now();
    let shutdown = worker.finish(Duration::from_secs(10));
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(matches!(
        shutdown,
        Shutdown::Joined(Ok(WorkerExit { iterations: 1, .. }))
    ));
}

/// Slow to start, slow to run.
struct SlowStart {
    runs: Arc<AtomicU64>,
}

impl Job for SlowStart {
    fn name(&self) -> &'static str { "slow-start" }

    fn on_start(&mut self, _ctx: &JobContext) -> WorkResult {
        thread::sleep(UNIT * 10);
        Ok(())
    }

    fn run(&mut self, ctx: &JobContext) -> WorkResult {
        self.runs.fetch_add(1, Ordering::SeqCst);
        ctx.report(1);
        thread::sleep(UNIT * 100);
        Ok(())
    }
}

#[test]
fn test_finish_during_start_runs_no_iteration() {
    init_default_ut_logging();
    let runs = Arc::new(AtomicU64::new(0));
    let job = SlowStart {
        runs: Arc::clone(&runs),
    };
    let config = WorkerConfig::builder().interval(Duration::from_secs(30)).build();
    let worker = WorkerThread::spawn(&config, job).unwrap();

    thread::sleep(UNIT * 2);
    assert!(!worker.is_busy());

    let start = Instant::now();
    let shutdown = worker.finish(Duration::from_millis(10));

    // Only the rest of on_start is waited for, never a full iteration.
    assert!(start.elapsed() < UNIT * 50);
    assert!(matches!(
        shutdown,
        Shutdown::Joined(Ok(WorkerExit { iterations: 0, .. }))
    ));
    assert_eq!(runs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_progress_resets_each_iteration() {
    let (worker, iterations) = spawn_countdown(5, Duration::from_millis(1));
    let controller = Arc::clone(worker.controller());

    let mut last = 0;
    let mut resets = 0;
    let observed = wait_until(Duration::from_secs(10), || {
        let progress = controller.progress();
        if progress < last {
            resets += 1;
        }
        last = progress;
        resets >= 2
    });
    assert!(observed);
    assert!(iterations.load(Ordering::SeqCst) >= 3);

    assert!(!worker.finish(Duration::from_secs(5)).is_detached());
}

#[test]
fn test_abandon_lets_worker_exit_by_itself() {
    let (worker, iterations) = spawn_countdown(10, Duration::from_secs(30));
    let controller = Arc::clone(worker.controller());

    assert!(wait_until(Duration::from_secs(5), || worker.is_busy()));
    assert!(worker.abandon().is_detached());

    assert!(wait_until(Duration::from_secs(5), || !controller.is_busy()));
    thread::sleep(UNIT * 2);
    assert_eq!(iterations.load(Ordering::SeqCst), 1);
    assert!(!controller.wake_up());
}

#[test]
fn test_panicking_job_is_reported() {
    init_default_ut_logging();
    let job = ("panics", |_: &JobContext| -> WorkResult { panic!("boom") });
    let worker = WorkerThread::spawn(&WorkerConfig::default(), job).unwrap();

    assert!(wait_until(Duration::from_secs(5), || worker.is_finished()));
    assert!(matches!(
        worker.finish(Duration::from_secs(5)),
        Shutdown::Panicked
    ));
}

#[test]
fn test_fatal_error_surfaces_through_join() {
    init_default_ut_logging();
    let job = ("fatal", |_: &JobContext| -> WorkResult {
        Err(WorkError::fatal("unrecoverable"))
    });
    let worker = WorkerThread::spawn(&WorkerConfig::default(), job).unwrap();
    assert!(wait_until(Duration::from_secs(5), || worker.is_finished()));

    match worker.finish(Duration::from_secs(5)) {
        Shutdown::Joined(Err(e)) => assert!(e.is_fatal()),
        other => panic!("unexpected shutdown: {other:?}"),
    }
}

#[test]
fn test_shared_controller_can_be_driven_externally() {
    init_default_ut_logging();
    let controller = Arc::new(Controller::new());
    let job = ("external", |ctx: &JobContext| -> WorkResult {
        ctx.report(ctx.iteration());
        Ok(())
    });
    let config = WorkerConfig::builder()
        .interval(Duration::from_secs(30))
        .build();
    let worker = WorkerThread::spawn_with(&config, job, Arc::clone(&controller)).unwrap();

    assert!(wait_until(Duration::from_secs(5), || controller.progress() == 1));
    for expected in 2..=4 {
        assert!(wait_until(Duration::from_secs(5), || !controller.is_busy()));
        controller.wake_up();
        assert!(wait_until(Duration::from_secs(5), || {
            controller.progress() == expected
        }));
    }

    assert!(controller.request_finish(Duration::from_secs(5)));
    assert!(worker.finish(Duration::ZERO).is_joined());
}
