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

//! Card refinement: re-assign the cards of a random subset of schedule positions by earliest
//! finish time, keeping the dispatch order fixed. Since only cards change, a topologically valid
//! schedule stays valid.

use rand::{seq::SliceRandom, Rng};

use crate::{
    evaluator::SimState,
    graph::{Assignment, Graph, Schedule, Time},
};

/// Refine the cards of `ratio * N` (rounded up) schedule positions, chosen uniformly without
/// replacement.
///
/// The schedule is re-simulated in its original order. At every selected position all cards are
/// probed and the one with the smallest tentative finish time is adopted; at every other position
/// the original card is kept. The state is committed after each step, so later decisions see the
/// effect of earlier ones.
pub fn refine_cards(
    schedule: &[Assignment],
    graph: &Graph,
    card_count: usize,
    ratio: f64,
    rng: &mut impl Rng,
) -> Schedule {
    let n = schedule.len();
    if n == 0 || card_count <= 1 || ratio <= 0.0 {
        return schedule.to_vec();
    }
    let refine_count = ((n as f64 * ratio).ceil() as usize).clamp(1, n);

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    let mut selected = vec![false; n];
    for &i in indices.iter().take(refine_count) {
        selected[i] = true;
    }

    let mut state = SimState::new(graph.len(), card_count);
    let mut result = schedule.to_vec();
    for (i, &Assignment { op, card }) in schedule.iter().enumerate() {
        let chosen = if selected[i] {
            let mut best_card = card;
            let mut best_end = Time::MAX;
            for c in 0..card_count {
                let end = state.probe(graph, op, c);
                if end < best_end {
                    best_end = end;
                    best_card = c;
                }
            }
            best_card
        } else {
            card
        };
        state.commit(graph, op, chosen);
        result[i].card = chosen;
    }
    result
}
