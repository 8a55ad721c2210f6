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

//! # OpSched: Scheduling operator graphs onto accelerator cards
//!
//! OpSched assigns every operator of a computational DAG to one of several homogeneous
//! accelerator cards, and fixes the order in which the operators are dispatched, such that the
//! overall makespan (the latest completion time across all cards) becomes as small as possible.
//! Each card executes its operators serially, and each card receives data from other cards over a
//! single serial inbound channel that shares the card's timeline with execution. Shipping the
//! output of an operator to another card costs the producer's transfer time, and is paid at most
//! once per (producer, destination card) pair.
//!
//! ## Structure
//! The source code of this program is structured as follows:
//! - The module [`graph`] defines the immutable operator DAG ([`Graph`]) as flat, dense arrays,
//!   together with the [`Schedule`] that all other components produce or consume.
//! - The module [`evaluator`] contains the deterministic simulator of the resource model. It
//!   computes the makespan of a schedule ([`makespan`]), or checks the schedule first and fails
//!   with a typed error ([`validate_and_makespan`]).
//! - The module [`heuristic`] contains the list-scheduling constructors: priority-driven
//!   topological emission with random or earliest-finish-time card assignment, a greedy
//!   earliest-finish-time scheduler, the HEFT upward rank, and a card-refinement pass.
//! - The module [`ga`] implements the evolutionary search over the space of valid schedules, and
//!   exposes the main entry point [`execute_order`].
//! - The modules [`parser`] and [`config`] read the operator graph file format and the optional
//!   GA configuration file.

#![deny(
    missing_docs,
    clippy::missing_docs_in_private_items,
    missing_debug_implementations,
    rust_2018_idioms
)]

pub mod config;
pub mod evaluator;
pub mod ga;
pub mod graph;
pub mod heuristic;
pub mod parser;
#[cfg(test)]
mod test;

pub use config::GaConfig;
pub use evaluator::{makespan, validate_and_makespan, InvalidSchedule};
pub use ga::{execute_order, execute_order_with};
pub use graph::{Assignment, Graph, Operator, Schedule, Time};
