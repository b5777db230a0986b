/*
 * Copyright 2024 Fluence Labs Limited
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

#![warn(rust_2018_idioms)]
#![warn(rust_2021_compatibility)]
#![deny(
    dead_code,
    nonstandard_style,
    unused_imports,
    unused_mut,
    unused_variables,
    unused_unsafe,
    unreachable_patterns
)]

use std::time::Duration;

use clap::Parser;
use clap::ValueEnum;
use eyre::WrapErr as _;
use serde::Serialize;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use hwp_config::load_config;
use hwp_config::load_config_from_env;
use hwpower::Engine;

#[derive(Parser, Debug)]
struct Args {
    /// TOML configuration. Without it the configuration comes from `HWP_`
    /// environment variables and defaults.
    #[arg(short, long)]
    config_path: Option<String>,

    #[arg(short, long, value_enum, default_value_t = Probe::Power)]
    probe: Probe,

    /// Power is derived from two energy readings, so the first power sample
    /// of a run only sets the baseline.
    #[arg(short, long, default_value_t = 1)]
    samples: u32,

    #[arg(short, long, default_value_t = 1000)]
    interval_ms: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Probe {
    Power,
    Limits,
    Thermals,
    Frequencies,
    Counters,
    Turbo,
    Features,
}

fn main() -> eyre::Result<()> {
    let args = Args::parse();
    let config = match args.config_path.as_deref() {
        Some(path) => load_config(path)?,
        None => load_config_from_env()?,
    };

    let filter = EnvFilter::builder()
        .with_env_var("RUST_LOG")
        .with_default_directive(Directive::from(config.logs.log_level))
        .from_env_lossy();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_ids(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .wrap_err("setting global tracing subscriber failed")?;
    tracing_log::LogTracer::init()?;

    tracing::info!("initializing with config {config:?}");
    let mut engine = Engine::init(&config).wrap_err("hardware telemetry initialization failed")?;

    let interval = Duration::from_millis(args.interval_ms);
    for index in 0..args.samples {
        if index > 0 {
            std::thread::sleep(interval);
        }

        probe(&mut engine, args.probe)
            .wrap_err_with(|| format!("{:?} sample {index} failed", args.probe))?;
    }

    Ok(())
}

fn probe(engine: &mut Engine, probe: Probe) -> eyre::Result<()> {
    match probe {
        Probe::Power => print(&engine.get_power()?),
        Probe::Limits => print(&engine.get_power_limits()?),
        Probe::Thermals => print(&engine.get_thermals()?),
        Probe::Frequencies => print(&engine.get_frequencies()?),
        Probe::Counters => print(&engine.get_counters()?),
        Probe::Turbo => print(&engine.get_turbo()?),
        Probe::Features => print(&engine.features()),
    }
}

fn print(sample: &impl Serialize) -> eyre::Result<()> {
    let json = serde_json::to_string_pretty(sample).wrap_err("sample serialization failed")?;
    println!("{json}");
    Ok(())
}
