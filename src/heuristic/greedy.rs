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

//! Greedy earliest-finish-time list scheduler.
//!
//! At every step, the full cross product of ready operators and cards is probed, and the candidate
//! with the smallest simulated end time is dispatched. The randomized variant perturbs each end
//! time by a small proportional noise and then applies ε-greedy selection over the best `k`
//! candidates, which yields diverse but still high-quality schedules for seeding the population.

use rand::Rng;

use crate::{
    evaluator::SimState,
    graph::{Assignment, Graph, Schedule, Time},
};

/// Probability of picking uniformly among the top candidates instead of the best one.
const EPSILON: f64 = 0.2;
/// Number of candidates kept for ε-greedy selection.
const TOP_K: usize = 3;
/// Relative amplitude of the noise added to candidate end times in the randomized variant.
const NOISE_FRAC: f64 = 0.05;

/// A scored `(op, card)` candidate. Candidates order by `(score, op, card)`, all ascending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Candidate {
    /// Perturbed end time of dispatching `op` on `card`.
    score: Time,
    /// The ready operator.
    op: usize,
    /// The card probed for it.
    card: usize,
}

/// Insert `cand` into the sorted top-`k` array, dropping the worst entry when full.
fn insert_top_k(top: &mut Vec<Candidate>, cand: Candidate, k: usize) {
    if top.len() < k {
        let pos = top.partition_point(|c| *c < cand);
        top.insert(pos, cand);
    } else if let Some(last) = top.last().copied() {
        if cand < last {
            let pos = top.partition_point(|c| *c < cand);
            top.insert(pos, cand);
            top.pop();
        }
    }
}

/// Build a schedule by greedy earliest-finish-time selection over `ready × cards`.
///
/// With `randomized == false` the construction is fully deterministic and always dispatches the
/// candidate minimizing `(end_time, op, card)`. Returns an empty schedule on a cyclic graph or
/// `card_count == 0`.
pub fn build_greedy(
    graph: &Graph,
    card_count: usize,
    rng: &mut impl Rng,
    randomized: bool,
) -> Schedule {
    if card_count == 0 || graph.is_empty() {
        return Vec::new();
    }
    let mut state = SimState::new(graph.len(), card_count);
    let mut indeg = graph.in_degrees();
    let mut ready: Vec<usize> = indeg
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(op, _)| op)
        .collect();
    let mut order = Vec::with_capacity(graph.len());

    let k = if randomized { TOP_K } else { 1 };
    let mut top: Vec<Candidate> = Vec::with_capacity(k);

    while !ready.is_empty() {
        top.clear();
        for &op in &ready {
            for card in 0..card_count {
                let end = state.probe(graph, op, card);
                let score = if randomized {
                    end + (NOISE_FRAC * end as f64 * rng.gen::<f64>()) as Time
                } else {
                    end
                };
                insert_top_k(&mut top, Candidate { score, op, card }, k);
            }
        }
        let Some(&Candidate { op, card, .. }) = (if randomized && rng.gen::<f64>() < EPSILON {
            top.get(rng.gen_range(0..top.len()))
        } else {
            top.first()
        }) else {
            break;
        };

        state.commit(graph, op, card);
        order.push(Assignment { op, card });

        if let Some(pos) = ready.iter().position(|&r| r == op) {
            ready.remove(pos);
        }
        for &s in graph.successors(op) {
            indeg[s] -= 1;
            if indeg[s] == 0 {
                ready.push(s);
            }
        }
    }

    if order.len() != graph.len() {
        return Vec::new();
    }
    order
}
