// Copyright 2026 QubitOS Contributors
// SPDX-License-Identifier: Apache-2.0

//! QubitOS pulse control CLI
//!
//! Optimizes piecewise-constant control pulses for built-in systems or
//! problem files and writes the amplitudes to disk.
//!
//! # Usage
//!
//! ```bash
//! # Two coupled oscillators with the default settings
//! qubit-os-control optimize
//!
//! # Problem file, random initial pulse, JSON result
//! qubit-os-control optimize --problem x_gate.yaml --p-type RND --json result.json
//!
//! # List built-in systems
//! qubit-os-control systems
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ndarray::Array2;
use num_complex::Complex64;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use qubit_os_control::control::stats::format_hms;
use qubit_os_control::control::{optimize_pulse, optimize_pulse_from, PulseType};
use qubit_os_control::output::{file_ext, load_amps, write_amps_files};
use qubit_os_control::problem::ProblemFile;
use qubit_os_control::validation::{validate_physics, validate_problem, validate_resource_limits};
use qubit_os_control::{systems, Config, ControlProblem, Error, OptimResult, Result, VERSION};

/// QubitOS pulse optimizer
#[derive(Parser)]
#[command(name = "qubit-os-control")]
#[command(author = "QubitOS Contributors")]
#[command(version = VERSION)]
#[command(about = "Piecewise-constant control pulse optimization")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize control pulses
    Optimize {
        /// Problem file (YAML, or JSON by extension)
        #[arg(short, long, conflicts_with = "system")]
        problem: Option<PathBuf>,

        /// Built-in system name (default: two-oscillator)
        #[arg(short, long)]
        system: Option<String>,

        /// Number of timeslots
        #[arg(long)]
        n_ts: Option<usize>,

        /// Total evolution time
        #[arg(long)]
        evo_time: Option<f64>,

        /// Initial pulse type
        #[arg(long)]
        p_type: Option<PulseType>,

        /// Start from amplitudes in this file instead of a generated pulse
        #[arg(long)]
        init_amps: Option<PathBuf>,

        /// Directory for amplitude files
        #[arg(long)]
        out_dir: Option<String>,

        /// Do not write amplitude files
        #[arg(long)]
        no_files: bool,

        /// Write the full result as JSON to this file
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// List built-in systems
    Systems {
        /// Print the named system as a problem file
        #[arg(long)]
        export: Option<String>,
    },

    /// Show effective configuration
    Config,

    /// Validate configuration and, optionally, a problem file
    Validate {
        /// Problem file to check
        #[arg(short, long)]
        problem: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config.logging.level, &config.logging.format);

    match cli.command {
        Commands::Optimize {
            problem,
            system,
            n_ts,
            evo_time,
            p_type,
            init_amps,
            out_dir,
            no_files,
            json,
        } => {
            let mut problem = load_problem(problem, system)?;
            apply_grid_overrides(&mut problem, n_ts, evo_time)?;
            if let Some(p) = p_type {
                config.pulse.init_pulse_type = p;
            }
            if let Some(dir) = out_dir {
                config.output.directory = dir;
            }
            if no_files {
                config.output.write_amps = false;
            }

            config.validate()?;

            info!(
                version = VERSION,
                problem = %problem.name,
                n_ts = problem.n_ts,
                evo_time = problem.evo_time,
                p_type = %config.pulse.init_pulse_type,
                "Starting QubitOS pulse optimization"
            );

            let result = match init_amps {
                Some(path) => {
                    let (_, amps) = load_amps(&path)?;
                    optimize_pulse_from(&problem, &config, amps)?
                }
                None => optimize_pulse(&problem, &config)?,
            };

            print_summary(&result);

            if config.output.write_amps {
                let ext = config.output.file_ext.clone().unwrap_or_else(|| {
                    file_ext(&problem.name, problem.n_ts, config.pulse.init_pulse_type)
                });
                let dir = PathBuf::from(&config.output.directory);
                let (initial, final_) = write_amps_files(&result, &dir, &ext)?;
                println!("Initial amplitudes written to {}", initial.display());
                println!("Final amplitudes written to {}", final_.display());
            }

            if let Some(path) = json {
                std::fs::write(&path, serde_json::to_string_pretty(&result)?)?;
                println!("Result written to {}", path.display());
            }
        }

        Commands::Systems { export } => match export {
            Some(name) => {
                let problem = systems::builtin(&name)?;
                println!("{}", serde_yaml::to_string(&ProblemFile::from(&problem))?);
            }
            None => {
                println!("Available systems:");
                for (name, description) in systems::SYSTEMS {
                    println!("  {:<16} {}", name, description);
                }
            }
        },

        Commands::Config => {
            println!("{}", serde_yaml::to_string(&config)?);
        }

        Commands::Validate { problem } => {
            if let Err(e) = config.validate() {
                eprintln!("Configuration error: {}", e);
                std::process::exit(1);
            }
            println!("Configuration is valid");

            if let Some(path) = problem {
                let checked = ProblemFile::load(&path)
                    .and_then(ProblemFile::into_problem)
                    .and_then(|p| {
                        validate_problem(&p)?;
                        validate_resource_limits(
                            &p,
                            config.optimizer.max_iter,
                            &config.validation.limits,
                        )?;
                        validate_physics(&p, config.validation.strict)
                    });
                match checked {
                    Ok(()) => println!("Problem {} is valid", path.display()),
                    Err(e) => {
                        eprintln!("Problem error: {}", e);
                        std::process::exit(1);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Initialize logging with tracing.
fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    if format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

fn load_problem(problem: Option<PathBuf>, system: Option<String>) -> Result<ControlProblem> {
    match (problem, system) {
        (Some(path), _) => ProblemFile::load(&path)?.into_problem(),
        (None, Some(name)) => systems::builtin(&name),
        (None, None) => systems::two_oscillator(),
    }
}

/// Apply `--n-ts` / `--evo-time` to the problem's time grid.
///
/// Problems with explicit `tau` fix their own total time, so `--evo-time` is
/// rejected for them.
fn apply_grid_overrides(
    problem: &mut ControlProblem,
    n_ts: Option<usize>,
    evo_time: Option<f64>,
) -> Result<()> {
    if let Some(t) = evo_time {
        if problem.tau.is_some() {
            return Err(Error::Config(format!(
                "--evo-time {} conflicts with the explicit tau of problem '{}'",
                t, problem.name
            )));
        }
        problem.evo_time = t;
    }
    if let Some(n) = n_ts {
        problem.n_ts = n;
    }
    Ok(())
}

fn format_matrix(m: &Array2<Complex64>) -> String {
    m.rows()
        .into_iter()
        .map(|row| {
            let cells: Vec<String> = row
                .iter()
                .map(|v| format!("{:+.6}{:+.6}i", v.re, v.im))
                .collect();
            format!("[{}]", cells.join("  "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn print_summary(result: &OptimResult) {
    println!("Final evolution");
    println!("{}", format_matrix(&result.evo_full_final));
    println!();
    println!("********* Summary *****************");
    println!("Initial fidelity error {}", result.initial_fid_err);
    println!("Final fidelity error {}", result.fid_err);
    println!("Final gradient normal {}", result.grad_norm_final);
    println!("Terminated due to {}", result.termination_reason);
    println!("Number of iterations {}", result.num_iter);
    println!("Completed in {} HH:MM:SS.US", format_hms(result.wall_time));
    println!("{}", result.stats);
}
