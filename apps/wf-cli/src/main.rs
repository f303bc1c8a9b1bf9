use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use uom::si::pressure::bar;
use wf_core::pa;
use wf_fluids::Phase;
use wf_wells::{
    DeferredLogger, EconLimitedList, StandardWells, WellContext, WellSolveReport, WellState,
};

mod error;
mod scenario;

use error::CliResult;
use scenario::{Scenario, Simulation, per_day};

#[derive(Parser)]
#[command(name = "wf-cli")]
#[command(about = "WellFlow CLI - implicit standard-well model driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a scenario file and build the well model
    Validate {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
    },
    /// Assemble the wells once (including the local well solve) and print rates
    Run {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// Override the scenario time step [days]
        #[arg(long)]
        dt_days: Option<f64>,
        /// Number of outer iterations to assemble
        #[arg(long, default_value_t = 1)]
        iterations: usize,
    },
    /// Print the connection potentials at the most restrictive pressure limits
    Potentials {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
    },
    /// Evaluate economic limits after one assemble
    Econ {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// Report step the limits are evaluated at
        #[arg(long, default_value_t = 0)]
        step: usize,
    },
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { scenario_path } => cmd_validate(&scenario_path),
        Commands::Run {
            scenario_path,
            dt_days,
            iterations,
        } => cmd_run(&scenario_path, dt_days, iterations),
        Commands::Potentials { scenario_path } => cmd_potentials(&scenario_path),
        Commands::Econ {
            scenario_path,
            step,
        } => cmd_econ(&scenario_path, step),
    }
}

fn load(path: &Path, dt_days: Option<f64>) -> CliResult<Simulation> {
    let mut scenario = Scenario::load(path)?;
    if let Some(dt) = dt_days {
        scenario.dt_days = dt;
    }
    scenario.build()
}

/// Initialize the well state and assemble `iterations` outer iterations.
fn assemble(sim: &mut Simulation, iterations: usize) -> CliResult<(WellState, WellSolveReport)> {
    let mut state = sim.model.init_well_state(&sim.cells)?;
    let mut logger = DeferredLogger::new();
    let mut report = WellSolveReport::converged(0);
    for iteration in 0..iterations.max(1) {
        let mut ctx = WellContext::new(&sim.cells, sim.groups.as_mut(), &mut logger);
        let result = sim.model.assemble(&mut ctx, sim.dt, iteration, &mut state);
        logger.flush(sim.model.terminal_output());
        let step = result?;
        if iteration == 0 {
            report = step;
        }
    }
    Ok((state, report))
}

fn cmd_validate(scenario_path: &Path) -> CliResult<()> {
    println!("Validating scenario: {}", scenario_path.display());
    let sim = load(scenario_path, None)?;
    println!("✓ Scenario is valid");
    println!("  Cells: {}", sim.cells.len());
    println!("  Wells: {}", sim.model.num_wells());
    println!(
        "  Connections: {}",
        sim.model.wells().num_connections()
    );
    Ok(())
}

fn cmd_run(scenario_path: &Path, dt_days: Option<f64>, iterations: usize) -> CliResult<()> {
    let mut sim = load(scenario_path, dt_days)?;
    println!(
        "Assembling {} wells, dt = {:.3} s",
        sim.model.num_wells(),
        sim.dt
    );
    let (state, report) = assemble(&mut sim, iterations)?;

    if report.converged {
        println!(
            "✓ Local well solve converged in {} iterations",
            report.total_well_iterations
        );
    } else {
        println!(
            "✗ Local well solve did not converge after {} iterations",
            report.total_well_iterations
        );
    }
    print_wells(&sim.model, &state)?;
    Ok(())
}

fn cmd_potentials(scenario_path: &Path) -> CliResult<()> {
    let mut sim = load(scenario_path, None)?;
    let (mut state, _report) = assemble(&mut sim, 1)?;
    sim.model.compute_well_potentials(&sim.cells, &mut state)?;

    println!("\nConnection potentials [m3/day]:");
    println!(
        "  {:<10} {:>6} {:>14} {:>14} {:>14}",
        "Well", "Cell", "Water", "Oil", "Gas"
    );
    let wells = sim.model.wells();
    for (w, well) in wells.iter().enumerate() {
        for (k, perf) in wells.connection_range(w).enumerate() {
            let q = &state.well_potentials[perf * 3..perf * 3 + 3];
            println!(
                "  {:<10} {:>6} {:>14.4} {:>14.4} {:>14.4}",
                well.name,
                well.connections[k].cell,
                per_day(q[Phase::Water.index()]),
                per_day(q[Phase::Oil.index()]),
                per_day(q[Phase::Gas.index()])
            );
        }
    }
    Ok(())
}

fn cmd_econ(scenario_path: &Path, step: usize) -> CliResult<()> {
    let mut sim = load(scenario_path, None)?;
    let (state, _report) = assemble(&mut sim, 1)?;
    print_wells(&sim.model, &state)?;

    let mut list = EconLimitedList::new();
    let mut logger = DeferredLogger::new();
    sim.model
        .update_list_econ_limited(&sim.econ, step, &state, &mut list, &mut logger)?;
    logger.flush(sim.model.terminal_output());

    println!("\nEconomic limits at report step {step}:");
    let mut any = false;
    for name in list.shut_wells() {
        println!("  {name}: shut");
        any = true;
    }
    for name in list.stopped_wells() {
        println!("  {name}: stopped");
        any = true;
    }
    for well in sim.model.wells().iter() {
        let closed = list.closed_connections(&well.name);
        if !closed.is_empty() {
            println!("  {}: closed connections in cells {:?}", well.name, closed);
            any = true;
        }
    }
    if !any {
        println!("  No well violates its limits");
    }
    Ok(())
}

fn print_wells(model: &StandardWells, state: &WellState) -> CliResult<()> {
    println!(
        "\n  {:<10} {:<16} {:>10} {:>10} {:>14} {:>14} {:>14}",
        "Well", "Control", "BHP [bar]", "THP [bar]", "Water [m3/d]", "Oil [m3/d]", "Gas [m3/d]"
    );
    for (w, well) in model.wells().iter().enumerate() {
        let control = well.controls.get(state.current_controls[w])?;
        let rates = state.rates(w);
        println!(
            "  {:<10} {:<16} {:>10.3} {:>10.3} {:>14.4} {:>14.4} {:>14.4}",
            well.name,
            control.kind.name(),
            pa(state.bhp[w]).get::<bar>(),
            pa(state.thp[w]).get::<bar>(),
            per_day(rates[Phase::Water.index()]),
            per_day(rates[Phase::Oil.index()]),
            per_day(rates[Phase::Gas.index()])
        );
    }
    Ok(())
}
