//! polyclock: run, inspect and benchmark polyclock modules offline
//!
//! - `run`: play a JSON scenario through a module and print its outputs
//! - `schema`: print module schemas (params, inputs, output ports)
//! - `bench`: time a module over N frames

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use polyclock_core::dsp::{get_constructors, schemas};
use polyclock_core::{PersistedState, ProcessorConfig, Sampleable};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Offline runner for polyclock modules
#[derive(Parser)]
#[command(name = "polyclock")]
#[command(about = "Run and benchmark polyclock modules without a host")]
#[command(version)]
struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a scenario file through a module
    Run {
        /// Path to the scenario JSON
        scenario: PathBuf,
    },

    /// Print module schemas as JSON
    Schema {
        /// Only this module type (e.g. "cron", "buckets")
        module: Option<String>,
    },

    /// Time a module over a number of frames
    Bench {
        /// Module type
        module: String,

        /// Frames to process
        #[arg(short = 'n', long, default_value = "480000")]
        frames: u64,

        /// Run the module on one of every N frames
        #[arg(long, default_value = "1")]
        idle_skip: u32,
    },
}

/// A module, its starting configuration and a sequence of input changes.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scenario {
    module: String,
    #[serde(default)]
    config: ProcessorConfig,
    /// Persisted state restored before the first step
    #[serde(default)]
    state: Option<PersistedState>,
    #[serde(default)]
    params: Value,
    /// Output ports to print; all ports when empty
    #[serde(default)]
    ports: Vec<String>,
    steps: Vec<Step>,
}

/// Inputs and params applied once, then held for `frames` frames.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Step {
    #[serde(default = "default_frames")]
    frames: u64,
    #[serde(default)]
    inputs: Value,
    #[serde(default)]
    params: Value,
}

fn default_frames() -> u64 {
    1
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StepReport {
    step: usize,
    frame: u64,
    processed: u64,
    outputs: Vec<(String, Vec<f32>)>,
}

fn make_module(module_type: &str, config: &ProcessorConfig) -> Result<Box<dyn Sampleable>> {
    let constructors = get_constructors();
    let constructor = constructors.get(module_type).ok_or_else(|| {
        let mut known: Vec<_> = constructors.keys().cloned().collect();
        known.sort();
        anyhow!(
            "unknown module type '{}' (known: {})",
            module_type,
            known.join(", ")
        )
    })?;
    Ok(constructor(config))
}

fn load_scenario(path: &Path) -> Result<Scenario> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("failed to parse scenario {}", path.display()))
}

fn format_lanes(lanes: &[f32]) -> String {
    match lanes {
        [] => "-".to_string(),
        [value] => format!("{:.4}", value),
        _ => lanes
            .iter()
            .map(|v| format!("{:.3}", v))
            .collect::<Vec<_>>()
            .join(","),
    }
}

fn print_report_table(report: &StepReport) {
    let outputs: Vec<String> = report
        .outputs
        .iter()
        .map(|(port, lanes)| format!("{}={}", port.cyan(), format_lanes(lanes).yellow()))
        .collect();
    println!(
        "{:>5} {:>10} {:>10}  {}",
        report.step.to_string().dimmed(),
        report.frame,
        report.processed.to_string().dimmed(),
        outputs.join(" ")
    );
}

fn cmd_run(path: &Path, format: OutputFormat) -> Result<()> {
    let scenario = load_scenario(path)?;
    let mut module = make_module(&scenario.module, &scenario.config)?;
    tracing::info!(
        module = %scenario.module,
        steps = scenario.steps.len(),
        "running scenario"
    );

    if let Some(state) = &scenario.state {
        module.load_state(state);
    }
    module
        .try_update_params(scenario.params.clone())
        .context("scenario params")?;

    let ports: Vec<String> = if scenario.ports.is_empty() {
        module.output_schemas().into_iter().map(|s| s.name).collect()
    } else {
        scenario.ports.clone()
    };
    for port in &ports {
        if module.get_poly_sample(port).is_none() {
            bail!("module '{}' has no output port '{}'", scenario.module, port);
        }
    }

    if format == OutputFormat::Table {
        println!("{:>5} {:>10} {:>10}  {}", "STEP", "FRAME", "PROCESSED", "OUTPUTS");
        println!("{}", "-".repeat(80));
    }

    let mut frame: u64 = 0;
    for (index, step) in scenario.steps.iter().enumerate() {
        module
            .try_update_inputs(step.inputs.clone())
            .with_context(|| format!("inputs of step {}", index))?;
        module
            .try_update_params(step.params.clone())
            .with_context(|| format!("params of step {}", index))?;

        let mut processed = 0;
        for _ in 0..step.frames {
            if module.step() {
                processed += 1;
            }
        }
        frame += step.frames;

        let report = StepReport {
            step: index,
            frame,
            processed,
            outputs: ports
                .iter()
                .filter_map(|port| {
                    module
                        .get_poly_sample(port)
                        .map(|poly| (port.clone(), poly.voltages().to_vec()))
                })
                .collect(),
        };
        match format {
            OutputFormat::Table => print_report_table(&report),
            OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
        }
    }

    let state = module.save_state();
    match format {
        OutputFormat::Table => {
            println!("{}", "-".repeat(80));
            let entries: Vec<String> = state
                .iter()
                .filter(|(_, v)| *v != 0.0)
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            println!("Final state: {}", entries.join(" "));
        }
        OutputFormat::Json => println!("{}", json!({ "state": state })),
    }
    Ok(())
}

fn cmd_schema(module: Option<String>) -> Result<()> {
    let all = schemas();
    let selected: Vec<_> = match &module {
        Some(name) => all.into_iter().filter(|s| &s.name == name).collect(),
        None => all,
    };
    if selected.is_empty() {
        bail!("unknown module type '{}'", module.unwrap_or_default());
    }
    println!("{}", serde_json::to_string_pretty(&selected)?);
    Ok(())
}

/// Frames between input changes while benchmarking
const BENCH_PATTERN_FRAMES: u64 = 500;

/// Inputs cycled through while benchmarking a module.
fn bench_patterns(module: &str) -> Vec<Value> {
    match module {
        "cron" => vec![
            json!({ "clock": 10.0, "compare": 1.0 }),
            json!({ "clock": 0.0, "compare": 1.0 }),
        ],
        "buckets" => {
            let voct: Vec<f32> = (0..16).map(|i| -4.0 + i as f32 * 0.55).collect();
            vec![json!({ "voct": voct, "gate": vec![10.0_f32; 16] })]
        }
        _ => vec![json!({})],
    }
}

fn format_ns(ns: f64) -> String {
    if ns >= 1_000_000.0 {
        format!("{:.2}ms", ns / 1_000_000.0)
    } else if ns >= 1_000.0 {
        format!("{:.2}µs", ns / 1_000.0)
    } else {
        format!("{:.1}ns", ns)
    }
}

fn cmd_bench(module_type: &str, frames: u64, idle_skip: u32, format: OutputFormat) -> Result<()> {
    let config = ProcessorConfig {
        idle_skip,
        ..Default::default()
    };
    let mut module = make_module(module_type, &config)?;
    let patterns = bench_patterns(module_type);

    let mut processed: u64 = 0;
    let started = Instant::now();
    for frame in 0..frames {
        if frame % BENCH_PATTERN_FRAMES == 0 {
            let pattern = &patterns[(frame / BENCH_PATTERN_FRAMES) as usize % patterns.len()];
            module.try_update_inputs(pattern.clone())?;
        }
        if module.step() {
            processed += 1;
        }
    }
    let elapsed = started.elapsed();
    let per_frame = elapsed.as_nanos() as f64 / frames.max(1) as f64;
    tracing::debug!(?elapsed, "bench finished");

    match format {
        OutputFormat::Table => {
            println!(
                "{:>12} {:>12} {:>12} {:>12}",
                "MODULE", "FRAMES", "PROCESSED", "PER FRAME"
            );
            println!("{}", "-".repeat(52));
            println!(
                "{:>12} {:>12} {:>12} {:>12}",
                module_type.cyan(),
                frames,
                processed.to_string().dimmed(),
                format_ns(per_frame).yellow()
            );
        }
        OutputFormat::Json => {
            let obj = json!({
                "module": module_type,
                "frames": frames,
                "processed": processed,
                "ns_per_frame": per_frame,
            });
            println!("{}", obj);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { scenario } => cmd_run(&scenario, cli.format),
        Commands::Schema { module } => cmd_schema(module),
        Commands::Bench {
            module,
            frames,
            idle_skip,
        } => cmd_bench(&module, frames, idle_skip, cli.format),
    }
}
