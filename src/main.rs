use std::fs;
use std::io;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use crossbeam_channel::unbounded;
use log::{info, warn};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use ucp_swarm::analysis::timeline::Timeline;
use ucp_swarm::core::domain::{
    AlgorithmType, ExhaustiveOptions, Problem, PsoOptions, ScenarioDefinition, DEFAULT_PENALTY,
};
use ucp_swarm::core::presets;
use ucp_swarm::engine::dispatch::{economic_dispatch, DispatchReport};
use ucp_swarm::solvers::exhaustive::ExhaustiveSearch;
use ucp_swarm::solvers::pso::PsoSearch;
use ucp_swarm::solvers::{RunSummary, SearchEvent, SearchOutcome};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

// --- CLI Definitions ---

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Algo {
    Pso,
    Exhaustive,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Unit commitment for microgrids (binary PSO / exhaustive search)", long_about = None)]
struct Args {
    /// Scenario JSON (problem + search options). A preset demo is used if omitted.
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Search algorithm; overrides the scenario
    #[arg(short, long, value_enum)]
    algo: Option<Algo>,

    /// Master seed for the swarm runs
    #[arg(long)]
    seed: Option<u64>,

    /// Independent swarm runs
    #[arg(long)]
    runs: Option<usize>,

    /// Iterations per swarm run
    #[arg(long)]
    iterations: Option<usize>,

    /// Particles per swarm
    #[arg(long)]
    particles: Option<usize>,

    /// Coarse steps the horizon is split into
    #[arg(long)]
    steps: Option<usize>,

    /// Parallel segments for exhaustive search
    #[arg(long)]
    tasks: Option<usize>,

    /// Generators in the demo fleet
    #[arg(short, long, default_value_t = 4)]
    generators: usize,

    /// Ticks (minutes) in the demo horizon
    #[arg(long, default_value_t = 1440)]
    ticks: usize,
}

// --- Report ---

#[derive(Serialize)]
struct Report<'a> {
    execution_id: Uuid,
    algorithm: AlgorithmType,
    started_at: DateTime<Utc>,
    elapsed_secs: f64,
    fitness: f64,
    step_size: usize,
    /// `[step][generator]` on/off.
    schedule: Vec<Vec<u8>>,
    runs: &'a [RunSummary],
    dispatch: &'a DispatchReport,
}

// --- Initialization Helpers ---

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// One day of load with morning and evening peaks, a midday solar bump and
/// a day/night price curve.
fn create_demo_scenario(args: &Args) -> Result<ScenarioDefinition> {
    if args.generators == 0 {
        return Err(anyhow!("demo fleet needs at least one generator"));
    }
    let generators = presets::default_fleet(args.generators);
    let fleet_mw: f64 = generators.iter().map(|g| g.max_power).sum();

    let ticks = args.ticks;
    let hour = |t: usize| 24.0 * t as f64 / ticks as f64;
    let bump = |h: f64, center: f64, width: f64| (-((h - center) / width).powi(2)).exp();

    let load = (0..ticks)
        .map(|t| {
            let h = hour(t);
            fleet_mw * (0.35 + 0.35 * bump(h, 8.0, 2.5) + 0.45 * bump(h, 19.0, 3.0))
        })
        .collect();
    let renewable = (0..ticks)
        .map(|t| 0.25 * fleet_mw * bump(hour(t), 13.0, 3.0))
        .collect();
    let price = (0..ticks)
        .map(|t| 40.0 + 35.0 * bump(hour(t), 18.5, 3.5))
        .collect();

    Ok(ScenarioDefinition {
        problem: Problem {
            generators,
            load,
            renewable,
            price,
            can_buy: true,
            can_sell: false,
            penalty: DEFAULT_PENALTY,
            ticks_per_hour: ticks as f64 / 24.0,
        },
        algorithm: AlgorithmType::ParticleSwarm,
        pso: PsoOptions::default(),
        exhaustive: ExhaustiveOptions::default(),
    })
}

fn load_scenario(args: &Args) -> Result<ScenarioDefinition> {
    let mut scenario = match &args.scenario {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read scenario {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse scenario {}", path.display()))?
        }
        None => create_demo_scenario(args)?,
    };

    if let Some(algo) = args.algo {
        scenario.algorithm = match algo {
            Algo::Pso => AlgorithmType::ParticleSwarm,
            Algo::Exhaustive => AlgorithmType::Exhaustive,
        };
    }
    let pso = &mut scenario.pso;
    pso.seed = args.seed.or(pso.seed);
    pso.run_count = args.runs.unwrap_or(pso.run_count);
    pso.iter_count = args.iterations.unwrap_or(pso.iter_count);
    pso.particle_count = args.particles.unwrap_or(pso.particle_count);
    if let Some(steps) = args.steps {
        pso.step_count = steps;
        scenario.exhaustive.step_count = steps;
    }
    scenario.exhaustive.task_count = args.tasks.unwrap_or(scenario.exhaustive.task_count);
    Ok(scenario)
}

fn log_event(event: &SearchEvent) {
    match event {
        SearchEvent::Log(msg) => info!("{}", msg),
        SearchEvent::Started { execution_id, algorithm } => {
            info!("Search {} ({:?}) started", execution_id, algorithm)
        }
        SearchEvent::NewBest { fitness, .. } => info!("New best: {:.2}", fitness),
        SearchEvent::Finished { execution_id } => info!("Search {} finished", execution_id),
        SearchEvent::PsoProgress(_) | SearchEvent::ExhaustiveProgress { .. } => {}
    }
}

// --- Main ---

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let scenario = load_scenario(&args)?;
    let problem = scenario.problem.clone();
    problem.validate().context("Invalid problem")?;

    // Spawn Solver Thread
    let (tx, rx) = unbounded();
    let solver = thread::Builder::new()
        .name("Solver-Worker".to_string())
        .spawn(move || -> ucp_swarm::core::error::UcpResult<SearchOutcome> {
            match scenario.algorithm {
                AlgorithmType::ParticleSwarm => PsoSearch::new(scenario.problem, scenario.pso).solve(tx),
                AlgorithmType::Exhaustive => {
                    ExhaustiveSearch::new(scenario.problem, scenario.exhaustive).solve(tx)
                }
            }
        })
        .context("Failed to spawn solver thread")?;

    // Event Loop
    let mut timeline = Timeline::new();
    timeline.set_channel(rx);
    let mut last_decile = 0;
    while timeline.is_connected() {
        if timeline.tick_with(log_event) == 0 {
            thread::sleep(POLL_INTERVAL);
        }
        let decile = (timeline.completion * 10.0).floor() as u32;
        if decile > last_decile {
            last_decile = decile;
            info!("{:>3.0}% complete", timeline.completion * 100.0);
        }
    }

    let outcome = solver
        .join()
        .map_err(|_| anyhow!("Solver thread panicked"))?
        .context("Search failed")?;

    if timeline.best_fitness.is_finite() && (timeline.best_fitness - outcome.fitness).abs() > 1e-6 {
        warn!(
            "Progress stream reported {:.4}, outcome is {:.4}",
            timeline.best_fitness, outcome.fitness
        );
    }

    let power = economic_dispatch(&problem, &outcome.commitment).context("Economic dispatch failed")?;
    let dispatch = DispatchReport::new(&problem, &outcome.commitment, &power)?;

    let gen_count = problem.gen_count();
    let report = Report {
        execution_id: outcome.execution_id,
        algorithm: outcome.algorithm,
        started_at: outcome.started_at,
        elapsed_secs: outcome.elapsed.as_secs_f64(),
        fitness: outcome.fitness,
        step_size: outcome.step_size,
        schedule: outcome
            .schedule
            .iter()
            .map(|&s| ucp_swarm::core::state::decode(s, gen_count))
            .collect(),
        runs: &outcome.runs,
        dispatch: &dispatch,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!(
        "Total cost {:.2} (thermal {:.2}, grid {:.2}, penalty {:.2})",
        dispatch.total_cost(),
        dispatch.c_thr_total,
        dispatch.c_sys_total,
        dispatch.c_penalty_total
    );
    Ok(())
}
