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

//! The deterministic simulator of the card resource model.
//!
//! [`SimState`] is the single implementation of the model: every card runs its operators serially,
//! and inbound transfers share the card's timeline with execution. A remote input starts its
//! transfer no earlier than its producer's finish time and no earlier than the destination card is
//! free, and its arrival blocks both the inbound channel and execution on that card. After the
//! transfer, the producer's output resides on the destination card, so later consumers on the same
//! card pay nothing for that producer.
//!
//! [`makespan`] walks a schedule permissively (entries it cannot interpret are skipped), while
//! [`validate_and_makespan`] rejects any malformed schedule with an [`InvalidSchedule`] error.

use thiserror::Error;

use crate::graph::{Assignment, Graph, Time};

/// Error describing why a schedule was rejected by [`validate_and_makespan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum InvalidSchedule {
    /// The schedule was checked against zero cards.
    #[error("schedule requires at least one card")]
    NoCards,
    /// The schedule does not cover the graph.
    #[error("schedule has {got} entries, but the graph has {expected} operators")]
    WrongLength {
        /// Number of entries in the schedule.
        got: usize,
        /// Number of operators in the graph.
        expected: usize,
    },
    /// An entry references an operator id outside of `[0, N)`.
    #[error("operator id {0} is out of range")]
    OpOutOfRange(usize),
    /// An entry references a card id outside of `[0, card_count)`.
    #[error("card id {card} of operator {op} is out of range")]
    CardOutOfRange {
        /// The offending operator.
        op: usize,
        /// The out-of-range card.
        card: usize,
    },
    /// An operator appears more than once in the schedule.
    #[error("operator {0} is scheduled more than once")]
    DuplicateOp(usize),
    /// A consumer is scheduled before one of its producers.
    #[error("producer {producer} of operator {op} not yet executed")]
    ProducerNotExecuted {
        /// The consumer reached too early.
        op: usize,
        /// The producer that has no finish time yet.
        producer: usize,
    },
}

/// Simulated state of all cards and operators during one evaluation or construction.
///
/// The state is only meaningful for the duration of a single walk over a schedule; [`reset`]
/// recycles the allocations between walks (evaluation runs in a tight loop inside the GA).
///
/// [`reset`]: SimState::reset
#[derive(Debug, Clone, Default)]
pub(crate) struct SimState {
    /// Next time each card's shared execution-and-inbound timeline is free.
    pub(crate) exec_ready: Vec<Time>,
    /// Next time each card's inbound channel is free.
    pub(crate) inbound_ready: Vec<Time>,
    /// Finish time per operator, `None` until it executed.
    pub(crate) finish: Vec<Option<Time>>,
    /// Card on which each operator's output currently resides. Starts as the card it executed
    /// on, and moves (write-through) with every transfer.
    pub(crate) resident: Vec<Option<usize>>,
    /// Scratch buffer holding `(finish_time, producer)` of the remote inputs of the operator
    /// currently being probed or committed, sorted ascending.
    remote: Vec<(Time, usize)>,
}

impl SimState {
    /// Create a state for `num_ops` operators on `card_count` cards, everything idle at time 0.
    pub(crate) fn new(num_ops: usize, card_count: usize) -> Self {
        let mut state = Self::default();
        state.reset(num_ops, card_count);
        state
    }

    /// Reset to the idle state, reusing the allocations.
    pub(crate) fn reset(&mut self, num_ops: usize, card_count: usize) {
        self.exec_ready.clear();
        self.exec_ready.resize(card_count, 0);
        self.inbound_ready.clear();
        self.inbound_ready.resize(card_count, 0);
        self.finish.clear();
        self.finish.resize(num_ops, None);
        self.resident.clear();
        self.resident.resize(num_ops, None);
        self.remote.clear();
    }

    /// Makespan of the simulated cards so far: the latest time any card becomes idle.
    pub(crate) fn makespan(&self) -> Time {
        self.exec_ready.iter().copied().max().unwrap_or(0)
    }

    /// Partition the inputs of `op` relative to `card`: returns the latest finish time among the
    /// local inputs, and fills the scratch buffer with the remote ones, sorted ascending by
    /// `(finish_time, producer)`.
    ///
    /// Inputs whose producer has not executed yet are ignored, and a producer is recorded at most
    /// once (transfers are charged once per producer and destination card).
    fn gather_inputs(&mut self, graph: &Graph, op: usize, card: usize) -> Time {
        self.remote.clear();
        let mut local_max = 0;
        for &p in graph.inputs(op) {
            let Some(ft) = self.finish[p] else { continue };
            if self.resident[p] == Some(card) {
                local_max = local_max.max(ft);
            } else if !self.remote.iter().any(|&(_, q)| q == p) {
                self.remote.push((ft, p));
            }
        }
        self.remote.sort_unstable();
        local_max
    }

    /// Earliest finish time of `op` if it were dispatched on `card` now, without committing
    /// anything.
    pub(crate) fn probe(&mut self, graph: &Graph, op: usize, card: usize) -> Time {
        let local_max = self.gather_inputs(graph, op, card);
        let mut exec_ready = self.exec_ready[card];
        let mut inbound_ready = self.inbound_ready[card];
        for i in 0..self.remote.len() {
            let (ft, p) = self.remote[i];
            let start = ft.max(inbound_ready).max(exec_ready);
            let arrival = start + graph.transfer_cost(p);
            inbound_ready = arrival;
            exec_ready = arrival;
        }
        exec_ready.max(local_max) + graph.exec_cost(op)
    }

    /// Dispatch `op` on `card`: perform all pending inbound transfers, execute the operator, and
    /// return its finish time.
    pub(crate) fn commit(&mut self, graph: &Graph, op: usize, card: usize) -> Time {
        let local_max = self.gather_inputs(graph, op, card);
        for i in 0..self.remote.len() {
            let (ft, p) = self.remote[i];
            let start = ft.max(self.inbound_ready[card]).max(self.exec_ready[card]);
            let arrival = start + graph.transfer_cost(p);
            self.inbound_ready[card] = arrival;
            self.exec_ready[card] = arrival;
            // write-through residency: the producer now lives on the destination card only
            self.resident[p] = Some(card);
        }
        let start_exec = self.exec_ready[card].max(local_max);
        let end = start_exec + graph.exec_cost(op);
        self.exec_ready[card] = end;
        self.finish[op] = Some(end);
        self.resident[op] = Some(card);
        end
    }
}

/// Compute the makespan of `schedule` on `card_count` cards.
///
/// This walk is permissive: entries referencing an unknown operator or card, or an operator that
/// already executed, are skipped, and input edges to producers that never executed are ignored.
/// An empty schedule or `card_count == 0` yields 0. Use [`validate_and_makespan`] to reject such
/// schedules instead.
///
/// The result is deterministic: the same `(schedule, graph, card_count)` always yields the same
/// makespan, on any thread.
pub fn makespan(schedule: &[Assignment], graph: &Graph, card_count: usize) -> Time {
    let mut state = SimState::new(graph.len(), card_count);
    makespan_in(&mut state, schedule, graph, card_count)
}

/// [`makespan`] into a caller-provided state, reusing its allocations.
pub(crate) fn makespan_in(
    state: &mut SimState,
    schedule: &[Assignment],
    graph: &Graph,
    card_count: usize,
) -> Time {
    state.reset(graph.len(), card_count);
    for &Assignment { op, card } in schedule {
        if op >= graph.len() || card >= card_count || state.finish[op].is_some() {
            continue;
        }
        state.commit(graph, op, card);
    }
    state.makespan()
}

/// Check `schedule` for completeness, range correctness and topological validity, and return its
/// makespan. The simulation is identical to [`makespan`]; only the error handling differs.
pub fn validate_and_makespan(
    schedule: &[Assignment],
    graph: &Graph,
    card_count: usize,
) -> Result<Time, InvalidSchedule> {
    if card_count == 0 {
        return Err(InvalidSchedule::NoCards);
    }
    if schedule.len() != graph.len() {
        return Err(InvalidSchedule::WrongLength {
            got: schedule.len(),
            expected: graph.len(),
        });
    }
    let mut state = SimState::new(graph.len(), card_count);
    for &Assignment { op, card } in schedule {
        if op >= graph.len() {
            return Err(InvalidSchedule::OpOutOfRange(op));
        }
        if card >= card_count {
            return Err(InvalidSchedule::CardOutOfRange { op, card });
        }
        if state.finish[op].is_some() {
            return Err(InvalidSchedule::DuplicateOp(op));
        }
        if let Some(&producer) = graph
            .inputs(op)
            .iter()
            .find(|&&p| state.finish[p].is_none())
        {
            return Err(InvalidSchedule::ProducerNotExecuted { op, producer });
        }
        state.commit(graph, op, card);
    }
    Ok(state.makespan())
}
