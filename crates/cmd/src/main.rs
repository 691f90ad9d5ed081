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

use std::{
    io::{self, BufReader},
    path::PathBuf,
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use prometheus::{Encoder, TextEncoder};
use sleepy_app::{AppConfig, ShutdownStrategy, input};
use sleepy_common_telemetry::{logging::init_global_logging, panic_hook::set_panic_hook};
use snafu::{ResultExt, Whatever};

mod build_info;

#[derive(Debug, Parser)]
#[clap(
name = "sleepy",
about = "Run a background job that sleeps between iterations",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION,
long_version = build_info::LONG_VERSION)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Run(RunArgs),
    Config(ConfigArgs),
}

/// Configuration sources shared by every subcommand. Flags win over the
/// environment, which wins over the file.
#[derive(Debug, Clone, Default, Args)]
struct ConfigArgs {
    /// TOML, YAML or JSON configuration file.
    #[arg(short, long, env = "SLEEPY_CONFIG")]
    config: Option<PathBuf>,

    /// Sleep between two iterations, e.g. `30s` or `2m`.
    #[arg(long, value_parser = humantime::parse_duration)]
    interval: Option<Duration>,

    /// Progress steps per iteration.
    #[arg(long)]
    steps: Option<u64>,

    /// Time spent on each step.
    #[arg(long, value_parser = humantime::parse_duration)]
    step: Option<Duration>,

    /// Let an iteration end early once a finish is requested.
    #[arg(long)]
    interruptible: bool,

    /// `always_wait`, `never_wait` or `when_nearly_done`.
    #[arg(long)]
    strategy: Option<ShutdownStrategy>,

    /// Fraction of the steps from which a busy worker is waited for.
    #[arg(long)]
    nearly_done_ratio: Option<f64>,

    /// Longest wait for a running iteration on exit.
    #[arg(long, value_parser = humantime::parse_duration)]
    finish_timeout: Option<Duration>,

    /// Log filter, e.g. `info` or `info,sleepy_common_worker=debug`.
    #[arg(long)]
    log_level: Option<String>,
}

impl ConfigArgs {
    fn load(&self) -> Result<AppConfig, Whatever> {
        let mut config = AppConfig::load(self.config.as_deref())
            .whatever_context("Failed to load configuration")?;
        self.apply(&mut config);
        config
            .validated()
            .whatever_context("Invalid command-line overrides")
    }

    fn apply(&self, config: &mut AppConfig) {
        if let Some(interval) = self.interval {
            config.worker.interval = interval;
        }
        if let Some(steps) = self.steps {
            config.job.steps = steps;
        }
        if let Some(step) = self.step {
            config.job.step = step;
        }
        if self.interruptible {
            config.job.interruptible = true;
        }
        if let Some(strategy) = self.strategy {
            config.shutdown.strategy = strategy;
        }
        if let Some(ratio) = self.nearly_done_ratio {
            config.shutdown.nearly_done_ratio = ratio;
        }
        if let Some(timeout) = self.finish_timeout {
            config.shutdown.finish_timeout = timeout;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = Some(level.clone());
        }
    }

    /// Print the effective configuration as JSON.
    fn run(&self) -> Result<(), Whatever> {
        let config = self.load()?;
        let json = serde_json::to_string_pretty(&config)
            .whatever_context("Failed to serialize configuration")?;
        println!("{json}");
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
#[command(long_about = r"

Starts the worker and reads commands from stdin, one per line:

  wake, w      skip the rest of the current sleep
  status, s    log progress
  (other)      exit; Ctrl-C and end of input do the same

Examples:

sleepy run
sleepy run --interval 5s --steps 10 --step 200ms --strategy always_wait

")]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Print the Prometheus metrics on exit.
    #[arg(long)]
    dump_metrics: bool,
}

impl RunArgs {
    fn run(&self) -> Result<(), Whatever> {
        let config = self.config.load()?;
        let _guards = init_global_logging("sleepy", &config.logging);
        set_panic_hook();

        let (tx, commands) = input::channel();
        input::install_ctrlc(tx.clone()).whatever_context("Failed to handle Ctrl-C")?;
        input::spawn_line_reader(BufReader::new(io::stdin()), tx)
            .whatever_context("Failed to read commands")?;

        let app = config.open();
        let report = app.run(&commands).whatever_context("Application failed")?;

        if self.dump_metrics {
            dump_metrics()?;
        }
        if report.shutdown.is_detached() {
            // A detached worker dies with the process.
            tracing::warn!(progress = report.progress, "Exiting with the worker still running");
        }
        Ok(())
    }
}

fn dump_metrics() -> Result<(), Whatever> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prometheus::gather(), &mut buffer)
        .whatever_context("Failed to encode metrics")?;
    let text = String::from_utf8(buffer).whatever_context("Metrics are not UTF-8")?;
    print!("{text}");
    Ok(())
}

fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    match cli.commands {
        Commands::Run(args) => args.run(),
        Commands::Config(args) => args.run(),
    }
}
