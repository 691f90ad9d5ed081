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

//! Line-oriented control of the running application.
//!
//! Producers (a reader thread over any [`BufRead`] and the Ctrl-C handler)
//! forward [`Command`]s over a crossbeam channel to the driver loop.

use std::{
    io::BufRead,
    sync::atomic::{AtomicU32, Ordering},
    thread,
    time::Duration,
};

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use snafu::ResultExt;
use strum_macros::Display;

use crate::err::{AppError, InstallSignalHandlerSnafu, SpawnInputSnafu};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Command {
    /// Skip the rest of the worker's current sleep.
    Wake,
    /// Log the worker's state.
    Status,
    /// Stop the application.
    Finish,
}

impl Command {
    /// `wake`/`w` and `status`/`s`, case-insensitive. Any other line,
    /// including an empty one, means finish.
    pub fn parse(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "wake" | "w" => Self::Wake,
            "status" | "s" => Self::Status,
            _ => Self::Finish,
        }
    }
}

/// Sending half, cloned into every command producer.
pub type CommandSender = Sender<Command>;

/// Receiving half, owned by the driver.
#[derive(Debug)]
pub struct Commands {
    rx: Receiver<Command>,
}

/// Creates a connected sender and receiver.
pub fn channel() -> (CommandSender, Commands) {
    let (tx, rx) = unbounded();
    (tx, Commands { rx })
}

impl Commands {
    /// Waits up to `timeout` for the next command. `None` on timeout; once
    /// every sender is gone this yields [`Command::Finish`].
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Command> {
        match self.rx.recv_timeout(timeout) {
            Ok(command) => Some(command),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Command::Finish),
        }
    }
}

/// Reads commands line by line from `reader` on a detached thread. End of
/// input or a read error sends [`Command::Finish`].
pub fn spawn_line_reader<R>(reader: R, tx: CommandSender) -> Result<(), AppError>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("command-reader".to_string())
        .spawn(move || read_lines(reader, &tx))
        .context(SpawnInputSnafu)?;
    Ok(())
}

fn read_lines<R: BufRead>(reader: R, tx: &CommandSender) {
    for line in reader.lines() {
        let command = match line {
            Ok(line) => Command::parse(&line),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read command input");
                Command::Finish
            }
        };
        if tx.send(command).is_err() || command == Command::Finish {
            return;
        }
    }
    let _ = tx.send(Command::Finish);
}

/// Exit status of a process killed by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Counts interrupts: the first asks for a graceful finish, any later one
/// means the user no longer wants to wait.
#[derive(Debug)]
struct Interrupts {
    tx:       CommandSender,
    received: AtomicU32,
}

impl Interrupts {
    /// Returns `true` when the process should exit immediately.
    fn on_interrupt(&self) -> bool {
        if self.received.fetch_add(1, Ordering::SeqCst) > 0 {
            return true;
        }
        let _ = self.tx.send(Command::Finish);
        false
    }
}

/// The first Ctrl-C sends [`Command::Finish`]; a second one exits the process
/// at once, even while the driver waits for the worker. Can only be installed
/// once per process.
pub fn install_ctrlc(tx: CommandSender) -> Result<(), AppError> {
    let interrupts = Interrupts {
        tx,
        received: AtomicU32::new(0),
    };
    ctrlc::set_handler(move || {
        if interrupts.on_interrupt() {
            tracing::warn!("Received Ctrl+C again, exiting without waiting");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
        tracing::info!("Received Ctrl+C signal, press again to exit immediately");
    })
    .context(InstallSignalHandlerSnafu)
}
