// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! weft CLI
//!
//! Demo harness for the weft cooperative scheduler. Each subcommand builds
//! a small task mix, runs it to completion, and leaves a `schedule_log.csv`
//! behind for inspection. The `SCHED` environment variable (`rr`, `prio`,
//! `priority`, `mlfq`) overrides the per-demo policy at startup.
//!
//! # Usage
//! ```text
//! weft [--log <path>] <round-robin|priority|sleep-io|mlfq [--config <json>]>
//! ```

#![deny(rust_2018_idioms)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro
)]
// The CLI is expected to print to stdout/stderr.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use weft_core::{api, MlfqConfig, Runtime, SchedPolicy};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path of the CSV schedule log (truncated at startup).
    #[clap(long, default_value = weft_core::LOG_FILE_NAME)]
    log: PathBuf,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Two tasks alternating work and yield under round-robin.
    RoundRobin,
    /// Three priority tiers; the highest runs to completion first.
    Priority,
    /// A blocked waiter, a sleeping signaler, and a CPU hog.
    SleepIo,
    /// A CPU hog, an interactive task, and a middle ground under MLFQ.
    Mlfq {
        /// JSON file holding an `MlfqConfig` (levels, quanta, aging).
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Burns a little real CPU so demo interleavings are visible in the log.
fn spin(units: u64) {
    for i in 0..units * 100_000 {
        std::hint::black_box(i);
    }
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let args = Args::parse();
    info!(log = %args.log.display(), "starting weft demo");

    match args.command {
        Command::RoundRobin => round_robin(&args.log),
        Command::Priority => priority(&args.log),
        Command::SleepIo => sleep_io(&args.log),
        Command::Mlfq { config } => mlfq(&args.log, config)?,
    }

    println!("Done. Log: {}", args.log.display());
    Ok(())
}

fn round_robin(log: &Path) {
    let rt = Runtime::builder()
        .policy(SchedPolicy::RoundRobin)
        .log_path(log.to_path_buf())
        .build();
    for name in ["A", "B"] {
        rt.spawn(name, 1, move || {
            for i in 0..5 {
                println!("[{name}] iteration {i}");
                api::work(2);
                api::yield_now();
            }
        });
    }
    rt.run();
}

fn priority(log: &Path) {
    let rt = Runtime::builder()
        .policy(SchedPolicy::Priority)
        .log_path(log.to_path_buf())
        .build();
    for (name, prio) in [("low", 1), ("mid", 5), ("high", 9)] {
        rt.spawn(name, prio, move || {
            for i in 0..6 {
                spin(3);
                println!("[{name}] step {i}");
                api::work(3);
                api::yield_now();
            }
        });
    }
    rt.run();
}

fn sleep_io(log: &Path) {
    let rt = Runtime::builder()
        .policy(SchedPolicy::RoundRobin)
        .log_path(log.to_path_buf())
        .build();

    rt.spawn("io_waiter", 5, || {
        println!("[IO] waiting for 'go'...");
        api::wait("go");
        println!("[IO] got 'go', working...");
        for i in 0..3 {
            println!("[IO] unit {i}");
            api::work(2);
            api::yield_now();
        }
    });

    rt.spawn("sleeper", 7, || {
        for i in 0..3 {
            println!("[SLEEP] tick {i} (sleep 200ms)");
            api::sleep(200);
        }
        println!("[SLEEP] signaling 'go'");
        api::signal("go");
    });

    rt.spawn("cpu", 3, || {
        for i in 0..6 {
            println!("[CPU] spin {i}");
            spin(6);
            api::work(4);
            api::yield_now();
        }
    });

    rt.run();
}

fn mlfq(log: &Path, config: Option<PathBuf>) -> Result<()> {
    let config = match config {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<MlfqConfig>(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => MlfqConfig {
            aging_interval_ms: 800,
            ..MlfqConfig::default()
        },
    };
    info!(?config, "mlfq demo configuration");

    let rt = Runtime::builder()
        .policy(SchedPolicy::Mlfq)
        .mlfq_config(config)
        .log_path(log.to_path_buf())
        .build();

    rt.spawn("hog", 3, || {
        for i in 0..12 {
            println!("[HOG] unit {i}");
            spin(8);
            api::work(2); // keeps expiring and gets demoted
            if i % 2 == 0 {
                api::yield_now();
            }
        }
    });

    rt.spawn("ui", 5, || {
        for i in 0..10 {
            println!("[UI] step {i} (sleep 150ms)");
            api::sleep(150); // promotes in MLFQ
            api::work(1);
            api::yield_now();
        }
    });

    rt.spawn("mid", 5, || {
        for i in 0..8 {
            println!("[MID] work {i}");
            spin(4);
            api::work(2);
            api::yield_now();
        }
    });

    rt.run();
    Ok(())
}
