// OpSched: Scheduling operator graphs onto accelerator cards
// Copyright (C) 2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::{
    path::{Path, PathBuf},
    time::Instant,
};

use clap::Parser;

use opsched::{execute_order_with, parser, validate_and_makespan, GaConfig};

/// Schedule the operator graphs of the given input files and report the achieved makespans.
#[derive(Debug, Parser)]
struct Cli {
    /// Input files to schedule.
    #[clap(required = true)]
    files: Vec<PathBuf>,
    /// GA configuration file. If not specified, `ga_config.txt` is tried.
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Random seed, overriding the configuration file.
    #[clap(short, long, allow_hyphen_values = true)]
    seed: Option<i64>,
}

fn main() {
    pretty_env_logger::init_timed();

    let args = Cli::parse();
    let mut cfg = match &args.config {
        Some(path) => GaConfig::load(path),
        None => GaConfig::load_default(),
    };
    if args.seed.is_some() {
        cfg.seed = args.seed;
    }

    let mut failed = false;
    for file in &args.files {
        if let Err(e) = run_case(file, &cfg) {
            log::error!("{}: {e}", file.display());
            failed = true;
        }
    }
    if failed {
        std::process::exit(1);
    }
}

/// Solve a single input file: parse, schedule, validate, and print the result line.
fn run_case(file: &Path, cfg: &GaConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (graph, card_count) = parser::load(file)?;

    let start = Instant::now();
    let order = execute_order_with(&graph, card_count, cfg);
    let solve_time = start.elapsed().as_secs_f64();

    let makespan = validate_and_makespan(&order, &graph, card_count)?;
    println!(
        "{}: solved in {solve_time:.3}s, makespan {makespan}",
        file.display()
    );
    Ok(())
}
