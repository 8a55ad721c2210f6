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

//! End-to-end scenarios and properties of the scheduling engine.

use rand::{rngs::StdRng, Rng};

use crate::graph::{Assignment, Graph, Operator, Schedule, Time};

mod ga;

/// Build a graph from `(inputs, exec_cost, transfer_cost)` triples; position is the id.
fn graph(ops: &[(&[usize], Time, Time)]) -> Graph {
    Graph::new(
        ops.iter()
            .map(|(inputs, exec_cost, transfer_cost)| Operator {
                inputs: inputs.to_vec(),
                exec_cost: *exec_cost,
                transfer_cost: *transfer_cost,
            })
            .collect(),
    )
}

/// Build a schedule from `(op, card)` pairs.
fn sched(pairs: &[(usize, usize)]) -> Schedule {
    pairs
        .iter()
        .map(|&(op, card)| Assignment { op, card })
        .collect()
}

/// Generate a random DAG where every earlier operator feeds a later one with the given
/// probability, and costs are uniform in `[1, 20]`.
fn random_dag(rng: &mut StdRng, n: usize, edge_prob: f64) -> Graph {
    Graph::new(
        (0..n)
            .map(|op| Operator {
                inputs: (0..op).filter(|_| rng.gen::<f64>() < edge_prob).collect(),
                exec_cost: rng.gen_range(1..=20),
                transfer_cost: rng.gen_range(1..=20),
            })
            .collect(),
    )
}

/// Assert that `schedule` covers the graph exactly once, uses only valid cards, and dispatches
/// every producer strictly before all of its consumers.
#[track_caller]
fn assert_valid(schedule: &[Assignment], g: &Graph, card_count: usize) {
    assert_eq!(schedule.len(), g.len());
    let mut pos: Vec<Option<usize>> = vec![None; g.len()];
    for (i, a) in schedule.iter().enumerate() {
        assert!(a.op < g.len(), "operator {} out of range", a.op);
        assert!(a.card < card_count, "card {} out of range", a.card);
        assert!(pos[a.op].is_none(), "operator {} scheduled twice", a.op);
        pos[a.op] = Some(i);
    }
    for op in 0..g.len() {
        for &p in g.inputs(op) {
            assert!(
                pos[p].unwrap() < pos[op].unwrap(),
                "producer {p} scheduled after consumer {op}"
            );
        }
    }
}
