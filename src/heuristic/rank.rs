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

//! HEFT upward rank.
//!
//! `rank_u(n) = exec(n) + max_s (transfer(n) + rank_u(s))` over the successors `s` of `n`, or
//! `exec(n)` for sinks. Scheduling by descending rank prioritizes the critical path; the GA uses
//! the negated rank to seed one individual of the initial population.

use std::collections::VecDeque;

use crate::graph::Graph;

/// Compute the HEFT upward rank of every operator.
///
/// On a cyclic graph the operators on cycles keep their base rank `exec(n)`; completeness is the
/// constructors' concern, not the ranker's.
pub fn upward_rank(graph: &Graph) -> Vec<f64> {
    let n = graph.len();

    // Kahn topological order
    let mut indeg = graph.in_degrees();
    let mut queue: VecDeque<usize> = (0..n).filter(|&op| indeg[op] == 0).collect();
    let mut topo = Vec::with_capacity(n);
    while let Some(op) = queue.pop_front() {
        topo.push(op);
        for &s in graph.successors(op) {
            indeg[s] -= 1;
            if indeg[s] == 0 {
                queue.push_back(s);
            }
        }
    }

    let mut rank = vec![0.0; n];
    for &op in topo.iter().rev() {
        let best_succ = graph
            .successors(op)
            .iter()
            .map(|&s| graph.transfer_cost(op) as f64 + rank[s])
            .fold(0.0, f64::max);
        rank[op] = graph.exec_cost(op) as f64 + best_succ;
    }
    // operators never emitted (cycles) keep their base rank
    for op in 0..n {
        if rank[op] == 0.0 {
            rank[op] = graph.exec_cost(op) as f64;
        }
    }
    rank
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::graph::Operator;

    #[test]
    fn chain_rank() {
        // 0 -> 1 -> 2, exec 10, transfer 5
        let g = Graph::new(vec![
            Operator {
                inputs: vec![],
                exec_cost: 10,
                transfer_cost: 5,
            },
            Operator {
                inputs: vec![0],
                exec_cost: 10,
                transfer_cost: 5,
            },
            Operator {
                inputs: vec![1],
                exec_cost: 10,
                transfer_cost: 5,
            },
        ]);
        assert_eq!(upward_rank(&g), vec![40.0, 25.0, 10.0]);
    }

    #[test]
    fn fork_takes_the_larger_branch() {
        // 0 -> {1, 2}
        let g = Graph::new(vec![
            Operator {
                inputs: vec![],
                exec_cost: 1,
                transfer_cost: 2,
            },
            Operator {
                inputs: vec![0],
                exec_cost: 7,
                transfer_cost: 0,
            },
            Operator {
                inputs: vec![0],
                exec_cost: 3,
                transfer_cost: 0,
            },
        ]);
        assert_eq!(upward_rank(&g), vec![1.0 + 2.0 + 7.0, 7.0, 3.0]);
    }
}
