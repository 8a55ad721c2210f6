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

//! Seeding of the initial population.
//!
//! The population mixes a few strong deterministic seeds (greedy earliest-finish-time, longest
//! execution first, HEFT upward rank) with heuristically prioritized random individuals, so the
//! search starts from several different regions of the schedule space.

use rand::Rng;

use crate::{
    graph::{Graph, Schedule},
    heuristic::{build_greedy, refine_cards, topo_by_priority, topo_by_priority_eft, upward_rank},
};

/// Refinement ratio applied to the heuristically prioritized individuals.
const SEED_REFINE_RATIO: f64 = 0.3;
/// Amplitude of the noise added to the heuristic priority.
const SEED_PRIO_NOISE: f64 = 0.1;
/// Weight of the transfer cost in the heuristic priority.
const SEED_TRANSFER_WEIGHT: f64 = 0.5;

/// Produce the initial population of (up to) `pop_size` individuals.
///
/// The first individual is the deterministic greedy seed; its fitness is the early-stop target of
/// the GA. Returns an empty population if the graph is cyclic.
pub(crate) fn initialize_population(
    graph: &Graph,
    card_count: usize,
    pop_size: usize,
    rng: &mut impl Rng,
) -> Vec<Schedule> {
    let mut population = Vec::with_capacity(pop_size);

    // the strong deterministic seed, used as the early-stop reference
    let greedy = build_greedy(graph, card_count, rng, false);
    if !greedy.is_empty() {
        population.push(greedy);
    }

    // longest execution first, cards by earliest finish time
    let long_prio: Vec<f64> = (0..graph.len())
        .map(|op| -(graph.exec_cost(op) as f64))
        .collect();
    let long_first = topo_by_priority_eft(graph, card_count, &long_prio, None);
    if !long_first.is_empty() {
        population.push(long_first);
    }

    // critical path first via the HEFT upward rank, cards by earliest finish time
    let heft_prio: Vec<f64> = upward_rank(graph).into_iter().map(|r| -r).collect();
    let heft = topo_by_priority_eft(graph, card_count, &heft_prio, None);
    if !heft.is_empty() {
        population.push(heft);
    }

    // the remainder: heuristic priority with a little noise, random cards, partial refinement
    while population.len() < pop_size {
        let prio: Vec<f64> = (0..graph.len())
            .map(|op| {
                let base =
                    graph.exec_cost(op) as f64 + SEED_TRANSFER_WEIGHT * graph.transfer_cost(op) as f64;
                -base + rng.gen::<f64>() * SEED_PRIO_NOISE
            })
            .collect();
        let indiv = topo_by_priority(graph, card_count, &prio, None, rng);
        if indiv.is_empty() {
            // cyclic graph: nothing can be scheduled
            return Vec::new();
        }
        population.push(refine_cards(&indiv, graph, card_count, SEED_REFINE_RATIO, rng));
    }
    population
}
