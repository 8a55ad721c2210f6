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

use rand::{rngs::StdRng, SeedableRng};

use super::{assert_valid, graph, random_dag};
use crate::{
    config::GaConfig,
    evaluator::{makespan, validate_and_makespan},
    ga::{crossover, execute_order_with, mutate},
    heuristic::{build_greedy, topo_by_priority},
};

/// A small configuration with a fixed seed, so the tests stay fast and reproducible.
fn test_config() -> GaConfig {
    GaConfig {
        pop_size: 8,
        mutation_rate: 0.5,
        tournament_k: 2,
        seed: Some(42),
        early_stop: false,
    }
}

#[test]
fn crossover_children_are_valid() {
    let mut rng = StdRng::seed_from_u64(5);
    let g = random_dag(&mut rng, 40, 0.15);
    let prio_a: Vec<f64> = (0..g.len()).map(|op| op as f64).collect();
    let prio_b: Vec<f64> = (0..g.len()).map(|op| -(op as f64)).collect();
    let a = topo_by_priority(&g, 3, &prio_a, None, &mut rng);
    let b = topo_by_priority(&g, 3, &prio_b, None, &mut rng);
    for _ in 0..10 {
        let child = crossover(&g, 3, &a, &b, &mut rng);
        assert_valid(&child, &g, 3);
    }
}

#[test]
fn mutation_preserves_validity() {
    let mut rng = StdRng::seed_from_u64(6);
    let g = random_dag(&mut rng, 40, 0.15);
    let prio: Vec<f64> = (0..g.len()).map(|op| op as f64).collect();
    let mut indiv = topo_by_priority(&g, 3, &prio, None, &mut rng);
    for _ in 0..10 {
        mutate(&g, 3, &mut indiv, &mut rng);
        assert_valid(&indiv, &g, 3);
    }
}

#[test]
fn execute_order_returns_a_valid_schedule() {
    let mut rng = StdRng::seed_from_u64(7);
    let g = random_dag(&mut rng, 30, 0.2);
    let order = execute_order_with(&g, 3, &test_config());
    assert_valid(&order, &g, 3);
    assert!(validate_and_makespan(&order, &g, 3).is_ok());
}

#[test]
fn execute_order_never_loses_against_the_greedy_seed() {
    // the greedy seed is part of the initial population and the best fitness only ever improves
    let mut rng = StdRng::seed_from_u64(8);
    let g = random_dag(&mut rng, 30, 0.2);
    let greedy = build_greedy(&g, 3, &mut rng, false);
    let order = execute_order_with(&g, 3, &test_config());
    assert!(makespan(&order, &g, 3) <= makespan(&greedy, &g, 3));
}

#[test]
fn execute_order_solves_a_chain() {
    let g = graph(&[(&[], 10, 5), (&[0], 10, 5), (&[1], 10, 5)]);
    let order = execute_order_with(&g, 1, &test_config());
    assert_eq!(validate_and_makespan(&order, &g, 1), Ok(30));
}

#[test]
fn execute_order_on_degenerate_input() {
    let g = graph(&[(&[], 10, 5)]);
    assert!(execute_order_with(&g, 0, &test_config()).is_empty());
    let empty = graph(&[]);
    assert!(execute_order_with(&empty, 4, &test_config()).is_empty());
}

#[test]
fn early_stop_still_returns_a_valid_schedule() {
    let mut rng = StdRng::seed_from_u64(9);
    let g = random_dag(&mut rng, 30, 0.2);
    let cfg = GaConfig {
        early_stop: true,
        ..test_config()
    };
    let order = execute_order_with(&g, 3, &cfg);
    assert_valid(&order, &g, 3);
}
