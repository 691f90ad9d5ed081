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

//! Prometheus metrics of the worker loop, labelled by job name.

use std::{fmt, sync::LazyLock};

use prometheus::{
    Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
};

pub const WORKER_LABEL: &str = "worker";

static WORKER_STARTED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "worker_started_total",
        "Total number of worker threads started",
        &[WORKER_LABEL]
    )
    .unwrap()
});

static WORKER_STOPPED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "worker_stopped_total",
        "Total number of worker loops that terminated",
        &[WORKER_LABEL]
    )
    .unwrap()
});

static WORKER_EXECUTIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "worker_executions_total",
        "Total number of job iterations",
        &[WORKER_LABEL]
    )
    .unwrap()
});

static WORKER_EXECUTION_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "worker_execution_errors_total",
        "Total number of failed job iterations",
        &[WORKER_LABEL]
    )
    .unwrap()
});

static WORKER_WAKEUPS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "worker_wakeups_total",
        "Total number of wake-ups delivered to sleeping workers",
        &[WORKER_LABEL]
    )
    .unwrap()
});

static WORKER_DETACHED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "worker_detached_total",
        "Total number of worker threads released without joining",
        &[WORKER_LABEL]
    )
    .unwrap()
});

static WORKER_BUSY: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        "worker_busy",
        "Whether the worker is running a job iteration (1) or not (0)",
        &[WORKER_LABEL]
    )
    .unwrap()
});

static WORKER_PROGRESS: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    register_int_gauge_vec!(
        "worker_progress",
        "Last progress reported by the current job iteration",
        &[WORKER_LABEL]
    )
    .unwrap()
});

static WORKER_EXECUTION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "worker_execution_duration_seconds",
        "Job iteration duration in seconds",
        &[WORKER_LABEL]
    )
    .unwrap()
});

/// Metric handles bound to one worker's label.
#[derive(Clone)]
pub(crate) struct WorkerMetrics {
    pub started:            IntCounter,
    pub stopped:            IntCounter,
    pub executions:         IntCounter,
    pub execution_errors:   IntCounter,
    pub execution_duration: Histogram,
    pub wakeups:            IntCounter,
    pub detached:           IntCounter,
    pub busy:               IntGauge,
    pub progress:           IntGauge,
}

impl WorkerMetrics {
    pub(crate) fn new(worker: &str) -> Self {
        let labels = &[worker];
        Self {
            started:            WORKER_STARTED.with_label_values(labels),
            stopped:            WORKER_STOPPED.with_label_values(labels),
            executions:         WORKER_EXECUTIONS.with_label_values(labels),
            execution_errors:   WORKER_EXECUTION_ERRORS.with_label_values(labels),
            execution_duration: WORKER_EXECUTION_DURATION_SECONDS.with_label_values(labels),
            wakeups:            WORKER_WAKEUPS.with_label_values(labels),
            detached:           WORKER_DETACHED.with_label_values(labels),
            busy:               WORKER_BUSY.with_label_values(labels),
            progress:           WORKER_PROGRESS.with_label_values(labels),
        }
    }
}

impl fmt::Debug for WorkerMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerMetrics").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_share_the_labelled_series() {
        let a = WorkerMetrics::new("metrics-test");
        let b = WorkerMetrics::new("metrics-test");
        a.wakeups.inc();
        b.wakeups.inc();
        assert_eq!(
            WORKER_WAKEUPS.with_label_values(&["metrics-test"]).get(),
            2
        );

        a.progress.set(17);
        assert_eq!(b.progress.get(), 17);
    }
}
