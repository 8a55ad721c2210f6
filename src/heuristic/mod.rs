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

//! Heuristic schedule constructors.
//!
//! All constructors emit operators in a topologically valid order and therefore produce valid
//! schedules on any DAG. On a cyclic graph the emission cannot cover all operators, and the
//! constructors return an empty schedule instead.

pub mod greedy;
pub mod rank;
pub mod refine;
pub mod topo;

pub use greedy::build_greedy;
pub use rank::upward_rank;
pub use refine::refine_cards;
pub use topo::{topo_by_priority, topo_by_priority_eft};
