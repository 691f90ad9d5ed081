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

//! # Panic Hook and Deadlock Detection
//!
//! Panics on any thread, including a worker thread that is about to be
//! detached, are logged as structured events with a backtrace. With the
//! `deadlock_detection` feature, a background thread periodically checks the
//! `parking_lot` locks (the worker controller's included) for cycles.

use std::{
    panic::{self, PanicHookInfo},
    sync::{LazyLock, Once},
    thread,
};

use backtrace::Backtrace;
use prometheus::{IntCounter, register_int_counter};

/// Prometheus counter for tracking application panics.
pub static PANIC_COUNTER: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!("sleepy_panic_counter", "Total number of panics").unwrap()
});

/// Install the logging panic hook. Only the first call has an effect.
///
/// The previous hook still runs afterwards, so the usual message on stderr
/// is kept.
pub fn set_panic_hook() {
    static INSTALL: Once = Once::new();

    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            log_panic(info);
            PANIC_COUNTER.inc();
            previous(info);
        }));

        #[cfg(feature = "deadlock_detection")]
        deadlock::spawn_detector();
    });
}

fn log_panic(info: &PanicHookInfo<'_>) {
    let backtrace = format!("{:?}", Backtrace::new());
    let current = thread::current();
    let thread = current.name().unwrap_or("<unnamed>");
    match info.location() {
        Some(location) => tracing::error!(
            message = %info,
            backtrace = %backtrace,
            thread,
            panic.file = location.file(),
            panic.line = location.line(),
            panic.column = location.column(),
        ),
        None => tracing::error!(message = %info, backtrace = %backtrace, thread),
    }
}

#[cfg(feature = "deadlock_detection")]
mod deadlock {
    use std::{thread, time::Duration};

    const CHECK_INTERVAL: Duration = Duration::from_secs(5);

    pub(super) fn spawn_detector() {
        let spawned = thread::Builder::new()
            .name("deadlock-detector".to_string())
            .spawn(|| {
                loop {
                    thread::sleep(CHECK_INTERVAL);
                    report(&parking_lot::deadlock::check_deadlock());
                }
            });
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "Deadlock detection disabled");
        }
    }

    fn report(cycles: &[Vec<parking_lot::deadlock::DeadlockedThread>]) {
        if cycles.is_empty() {
            return;
        }
        tracing::error!(cycles = cycles.len(), "Deadlocks detected");
        for (cycle, threads) in cycles.iter().enumerate() {
            for t in threads {
                tracing::error!(
                    cycle,
                    thread_id = t.thread_id(),
                    backtrace = ?t.backtrace(),
                    "Deadlocked thread"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panics_are_counted() {
        set_panic_hook();
        set_panic_hook();

        let before = PANIC_COUNTER.get();
        let joined = thread::Builder::new()
            .name("doomed".to_string())
            .spawn(|| panic!("boom"))
            .unwrap()
            .join();
        assert!(joined.is_err());
        assert!(PANIC_COUNTER.get() > before);
    }
}
