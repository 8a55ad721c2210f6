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

//! Priority-driven topological constructors.
//!
//! Both constructors perform Kahn-style emission where the ready set is a min-heap keyed by
//! `(priority, op)`: the ready operator with the smallest priority value is dispatched first, ties
//! broken by the smaller id. They differ only in how the card is chosen for the popped operator.

use std::{cmp::Reverse, collections::BinaryHeap};

use ordered_float::OrderedFloat;
use rand::Rng;

use crate::{
    evaluator::SimState,
    graph::{Assignment, Graph, Schedule, Time},
};

/// Key of the ready heap: `(priority, op)`, popped in ascending order.
type ReadyKey = Reverse<(OrderedFloat<f64>, usize)>;

/// Build the min-heap of initially ready operators (in-degree zero).
fn ready_heap(indeg: &[usize], priority: &[f64]) -> BinaryHeap<ReadyKey> {
    indeg
        .iter()
        .enumerate()
        .filter(|(_, &d)| d == 0)
        .map(|(op, _)| Reverse((OrderedFloat(priority[op]), op)))
        .collect()
}

/// Decrement the in-degrees of the successors of `op` and push the newly ready ones.
fn release_successors(
    graph: &Graph,
    op: usize,
    indeg: &mut [usize],
    priority: &[f64],
    ready: &mut BinaryHeap<ReadyKey>,
) {
    for &s in graph.successors(op) {
        indeg[s] -= 1;
        if indeg[s] == 0 {
            ready.push(Reverse((OrderedFloat(priority[s]), s)));
        }
    }
}

/// Topological emission by priority, with cards assigned by inheritance or uniformly at random.
///
/// `priority` (and `inherit`, if given) must hold one entry per operator. The operator's card is
/// `inherit[op]` if an inheritance table is given, otherwise a uniform random card. Returns an
/// empty schedule if the graph is cyclic (emission cannot cover all operators) or
/// `card_count == 0`.
pub fn topo_by_priority(
    graph: &Graph,
    card_count: usize,
    priority: &[f64],
    inherit: Option<&[usize]>,
    rng: &mut impl Rng,
) -> Schedule {
    if card_count == 0 {
        return Vec::new();
    }
    let mut indeg = graph.in_degrees();
    let mut ready = ready_heap(&indeg, priority);
    let mut order = Vec::with_capacity(graph.len());

    while let Some(Reverse((_, op))) = ready.pop() {
        let card = match inherit {
            Some(cards) => cards[op],
            None => rng.gen_range(0..card_count),
        };
        order.push(Assignment { op, card });
        release_successors(graph, op, &mut indeg, priority, &mut ready);
    }

    if order.len() != graph.len() {
        return Vec::new();
    }
    order
}

/// Topological emission by priority, with cards assigned by earliest finish time.
///
/// For every popped operator, all cards are probed with the simulated state built up so far, and
/// the card with the smallest tentative finish time wins. On a tie, the inherited card is
/// preferred if one is given, otherwise the lowest card id. Returns an empty schedule on a cyclic
/// graph or `card_count == 0`.
pub fn topo_by_priority_eft(
    graph: &Graph,
    card_count: usize,
    priority: &[f64],
    inherit: Option<&[usize]>,
) -> Schedule {
    if card_count == 0 {
        return Vec::new();
    }
    let mut state = SimState::new(graph.len(), card_count);
    let mut indeg = graph.in_degrees();
    let mut ready = ready_heap(&indeg, priority);
    let mut order = Vec::with_capacity(graph.len());

    while let Some(Reverse((_, op))) = ready.pop() {
        let preferred = inherit.map(|cards| cards[op]);
        let mut best_card = 0;
        let mut best_end = Time::MAX;
        for c in 0..card_count {
            let end = state.probe(graph, op, c);
            if end < best_end || (end == best_end && preferred == Some(c)) {
                best_end = end;
                best_card = c;
            }
        }
        state.commit(graph, op, best_card);
        order.push(Assignment {
            op,
            card: best_card,
        });
        release_successors(graph, op, &mut indeg, priority, &mut ready);
    }

    if order.len() != graph.len() {
        return Vec::new();
    }
    order
}
