use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::Result;
use serde::Serialize;
use tracing::info;

use synacor_puzzles::{
    grid::{Grid, Square},
    logging,
    paths::{solve_orb, SearchConfig},
    routine::{ClosedForm, Memoized},
    sweep::{verify_evaluators, Sweep, TELEPORTER_R0, TELEPORTER_R1, TELEPORTER_TARGET},
};

#[derive(Parser)]
#[command(name = "synacor-puzzles")]
#[command(about = "Solves the orb and teleporter puzzles of the Synacor challenge")]
#[command(version)]
struct Cli {
    /// Log more to stderr (-v, -vv, -vvv); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Find a route that carries the orb to the vault door at the right weight
    Orb(OrbArgs),
    /// Find the eighth register value that passes the teleporter check
    Teleporter(TeleporterArgs),
}

#[derive(Args)]
struct OrbArgs {
    /// JSON board to use instead of the vault
    #[arg(long, value_name = "FILE")]
    grid: Option<PathBuf>,

    /// Weight the orb must have at the door
    #[arg(long)]
    target: Option<i64>,

    /// Give up the heuristic search after this many nodes
    #[arg(long, default_value = "1000000")]
    max_pops: usize,

    /// Don't walk on past the door at the wrong weight
    #[arg(long)]
    stop_at_end: bool,

    /// Print the solution as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
enum EvaluatorKind {
    ClosedForm,
    Memoized,
}

#[derive(Args)]
struct TeleporterArgs {
    /// Output the check expects
    #[arg(long, default_value_t = TELEPORTER_TARGET)]
    target: u16,

    #[arg(long, default_value_t = TELEPORTER_R0)]
    r0: u16,

    #[arg(long, default_value_t = TELEPORTER_R1)]
    r1: u16,

    #[arg(long, value_enum, default_value_t = EvaluatorKind::ClosedForm)]
    evaluator: EvaluatorKind,

    /// Spread candidates over all cores
    #[arg(long)]
    parallel: bool,

    /// Don't cross-check the evaluators first
    #[arg(long)]
    skip_check: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn orb(args: OrbArgs) -> Result<()> {
    let mut grid = match &args.grid {
        Some(path) => Grid::load(path)?,
        None => Grid::vault(),
    };
    if let Some(target) = args.target {
        grid = grid.with_target(target);
    }

    let config = SearchConfig {
        max_pops: args.max_pops,
        stop_at_end: args.stop_at_end,
    };
    let solution = solve_orb(&grid, &config)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&solution)?);
        return Ok(());
    }
    let Some(solution) = solution else {
        println!("no path found");
        return Ok(());
    };

    let positions: Vec<_> = solution.path.iter().map(ToString::to_string).collect();
    println!("found path: {}", positions.join(" "));
    if let Square::Num(start) = grid.cell_at(grid.start())? {
        println!("start at {} with {start}", grid.start());
    }
    for step in grid.walk(&solution.path)? {
        match step.value {
            Some(value) => println!("go {}\t# {} = {value}", step.direction, step.square),
            None => println!("go {}\t# {}", step.direction, step.square),
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct TeleporterReport {
    sweep: Sweep,
    evaluator: EvaluatorKind,
    r7: Option<u16>,
}

fn teleporter(args: TeleporterArgs) -> Result<()> {
    if !args.skip_check {
        verify_evaluators()?;
        info!("literal, memoized and closed form evaluators agree");
    }

    let sweep = Sweep {
        r0: args.r0,
        r1: args.r1,
        target: args.target,
        parallel: args.parallel,
    };
    let r7 = match args.evaluator {
        EvaluatorKind::ClosedForm => sweep.run::<ClosedForm>()?,
        EvaluatorKind::Memoized => sweep.run::<Memoized>()?,
    };

    if args.json {
        let report = TeleporterReport {
            sweep,
            evaluator: args.evaluator,
            r7,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    match r7 {
        Some(r7) => println!("found r7 = {r7}"),
        None => println!("no r7 found"),
    }
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Orb(args) => orb(args),
        Commands::Teleporter(args) => teleporter(args),
    }
}
