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

//! The immutable operator DAG, stored as flat, dense arrays keyed by operator id.
//!
//! Operator ids are dense and contiguous in `[0, N)`, which allows every per-operator map in the
//! scheduler (in-degrees, priorities, finish times, residency) to be a plain vector instead of an
//! associative container. Inputs and successors are stored in CSR form (offsets + ids).

/// Time unit used for execution costs, transfer costs and simulated clocks.
pub type Time = i64;

/// A single operator of the computational graph, as handed to [`Graph::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Operator {
    /// Ids of the operators whose outputs this operator consumes. Duplicate entries are not
    /// expected, but tolerated.
    pub inputs: Vec<usize>,
    /// Time this operator occupies a card while executing.
    pub exec_cost: Time,
    /// Time it takes to ship this operator's output to another card.
    pub transfer_cost: Time,
}

/// One entry of a [`Schedule`]: operator `op` is dispatched on card `card`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Assignment {
    /// The operator to execute.
    pub op: usize,
    /// The card executing it.
    pub card: usize,
}

/// A complete schedule: every operator of the graph exactly once, in dispatch order, each with
/// the card it runs on. Producers appear at strictly earlier positions than their consumers.
pub type Schedule = Vec<Assignment>;

/// The immutable operator DAG. Built once (usually by [`crate::parser`]) and shared read-only by
/// all constructors and evaluators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graph {
    /// Execution cost per operator.
    exec_cost: Vec<Time>,
    /// Transfer cost per operator (paid by consumers on other cards).
    transfer_cost: Vec<Time>,
    /// CSR offsets into `input_ids`, length `N + 1`.
    input_offsets: Vec<usize>,
    /// Concatenated producer ids of all operators.
    input_ids: Vec<usize>,
    /// CSR offsets into `succ_ids`, length `N + 1`.
    succ_offsets: Vec<usize>,
    /// Concatenated consumer ids of all operators.
    succ_ids: Vec<usize>,
    /// Number of input edges per operator (counting duplicates).
    in_degree: Vec<usize>,
}

impl Graph {
    /// Build the graph from a list of operators. The position of an operator in `ops` is its id.
    ///
    /// All referenced input ids must be smaller than `ops.len()`. Acyclicity is *not* checked
    /// here; the constructors detect cycles by incomplete topological emission.
    pub fn new(ops: Vec<Operator>) -> Self {
        let n = ops.len();

        let mut exec_cost = Vec::with_capacity(n);
        let mut transfer_cost = Vec::with_capacity(n);
        let mut input_offsets = Vec::with_capacity(n + 1);
        let mut input_ids = Vec::new();
        let mut in_degree = Vec::with_capacity(n);
        let mut succ_count = vec![0usize; n];

        input_offsets.push(0);
        for op in &ops {
            exec_cost.push(op.exec_cost);
            transfer_cost.push(op.transfer_cost);
            in_degree.push(op.inputs.len());
            for &p in &op.inputs {
                debug_assert!(p < n, "input id {p} out of range");
                input_ids.push(p);
                succ_count[p] += 1;
            }
            input_offsets.push(input_ids.len());
        }

        // build the successor CSR from the counts
        let mut succ_offsets = vec![0usize; n + 1];
        for (p, c) in succ_count.iter().enumerate() {
            succ_offsets[p + 1] = succ_offsets[p] + c;
        }
        let mut succ_ids = vec![0usize; input_ids.len()];
        let mut cursor = succ_offsets.clone();
        for (id, op) in ops.iter().enumerate() {
            for &p in &op.inputs {
                succ_ids[cursor[p]] = id;
                cursor[p] += 1;
            }
        }

        Self {
            exec_cost,
            transfer_cost,
            input_offsets,
            input_ids,
            succ_offsets,
            succ_ids,
            in_degree,
        }
    }

    /// Number of operators in the graph.
    pub fn len(&self) -> usize {
        self.exec_cost.len()
    }

    /// Whether the graph contains no operators.
    pub fn is_empty(&self) -> bool {
        self.exec_cost.is_empty()
    }

    /// Execution cost of operator `op`.
    #[inline]
    pub fn exec_cost(&self, op: usize) -> Time {
        self.exec_cost[op]
    }

    /// Transfer cost of operator `op`.
    #[inline]
    pub fn transfer_cost(&self, op: usize) -> Time {
        self.transfer_cost[op]
    }

    /// Producers of operator `op`, in input order.
    #[inline]
    pub fn inputs(&self, op: usize) -> &[usize] {
        &self.input_ids[self.input_offsets[op]..self.input_offsets[op + 1]]
    }

    /// Consumers of operator `op`.
    #[inline]
    pub fn successors(&self, op: usize) -> &[usize] {
        &self.succ_ids[self.succ_offsets[op]..self.succ_offsets[op + 1]]
    }

    /// A fresh copy of the per-operator in-degrees, ready to be consumed by Kahn-style emission.
    pub fn in_degrees(&self) -> Vec<usize> {
        self.in_degree.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn csr_roundtrip() {
        let g = Graph::new(vec![
            Operator {
                inputs: vec![],
                exec_cost: 1,
                transfer_cost: 2,
            },
            Operator {
                inputs: vec![0],
                exec_cost: 3,
                transfer_cost: 4,
            },
            Operator {
                inputs: vec![0, 1],
                exec_cost: 5,
                transfer_cost: 6,
            },
        ]);
        assert_eq!(g.len(), 3);
        assert_eq!(g.inputs(0), &[] as &[usize]);
        assert_eq!(g.inputs(2), &[0, 1]);
        assert_eq!(g.successors(0), &[1, 2]);
        assert_eq!(g.successors(2), &[] as &[usize]);
        assert_eq!(g.in_degrees(), vec![0, 1, 2]);
        assert_eq!(g.exec_cost(1), 3);
        assert_eq!(g.transfer_cost(1), 4);
    }

    #[test]
    fn duplicate_inputs_are_tolerated() {
        let g = Graph::new(vec![
            Operator {
                inputs: vec![],
                exec_cost: 1,
                transfer_cost: 1,
            },
            Operator {
                inputs: vec![0, 0],
                exec_cost: 1,
                transfer_cost: 1,
            },
        ]);
        assert_eq!(g.inputs(1), &[0, 0]);
        assert_eq!(g.successors(0), &[1, 1]);
        assert_eq!(g.in_degrees(), vec![0, 2]);
    }
}
