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

//! Parser for the operator graph file format.
//!
//! Line 1 holds the card count. Every following non-empty line describes one operator:
//!
//! ```text
//! id input_count input_id_1 ... input_id_k exec_cost transfer_cost
//! ```
//!
//! Ids must be dense and ascending from 0 (the id equals the 0-based operator index), every input
//! must reference an earlier operator, and costs must be non-negative. Any violation is a typed
//! [`InputError`]; the file format guarantees well-founded inputs, so a successfully parsed graph
//! is acyclic by construction.

use std::{fs::read_to_string, path::Path};

use thiserror::Error;

use crate::graph::{Graph, Operator, Time};

/// Error describing why an input file was rejected.
#[derive(Debug, Error)]
pub enum InputError {
    /// The file could not be read.
    #[error("cannot read input file: {0}")]
    Io(#[from] std::io::Error),
    /// The file does not even contain the card count line.
    #[error("input is missing the card count line")]
    MissingCardCount,
    /// A line contains a token that is not a valid integer, or too few tokens.
    #[error("malformed integer on line {line}")]
    BadToken {
        /// 1-based line number.
        line: usize,
    },
    /// The operator id does not equal the 0-based operator index.
    #[error("invalid operator id {got} on line {line}: expected {expected}")]
    IdMismatch {
        /// 1-based line number.
        line: usize,
        /// The id this line must carry.
        expected: usize,
        /// The id the line carries.
        got: i64,
    },
    /// The declared input count is negative or exceeds the number of prior operators.
    #[error("invalid input count {count} for operator {op} on line {line}")]
    BadInputCount {
        /// 1-based line number.
        line: usize,
        /// The operator being parsed.
        op: usize,
        /// The declared input count.
        count: i64,
    },
    /// An input references the operator itself or a later operator.
    #[error("invalid input id {input} for operator {op} on line {line}")]
    InputOutOfRange {
        /// 1-based line number.
        line: usize,
        /// The operator being parsed.
        op: usize,
        /// The offending input id.
        input: i64,
    },
    /// An execution or transfer cost is negative.
    #[error("negative cost for operator {op} on line {line}")]
    NegativeCost {
        /// 1-based line number.
        line: usize,
        /// The operator being parsed.
        op: usize,
    },
}

/// Read and parse an input file into the graph and the card count.
pub fn load(path: impl AsRef<Path>) -> Result<(Graph, usize), InputError> {
    parse_str(&read_to_string(path)?)
}

/// Parse the content of an input file into the graph and the card count.
pub fn parse_str(content: &str) -> Result<(Graph, usize), InputError> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l.trim()))
        .filter(|(_, l)| !l.is_empty());

    let (line, first) = lines.next().ok_or(InputError::MissingCardCount)?;
    let card_count = first
        .split_whitespace()
        .next()
        .and_then(|tok| tok.parse::<usize>().ok())
        .ok_or(InputError::BadToken { line })?;

    let mut ops: Vec<Operator> = Vec::new();
    for (line, text) in lines {
        let op = ops.len();
        let mut tokens = text.split_whitespace();
        let mut next = move || -> Result<i64, InputError> {
            tokens
                .next()
                .ok_or(InputError::BadToken { line })?
                .parse()
                .map_err(|_| InputError::BadToken { line })
        };

        let id = next()?;
        if id != op as i64 {
            return Err(InputError::IdMismatch {
                line,
                expected: op,
                got: id,
            });
        }

        let count = next()?;
        if count < 0 || count as usize > op {
            return Err(InputError::BadInputCount { line, op, count });
        }
        let mut inputs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let input = next()?;
            if input < 0 || input as usize >= op {
                return Err(InputError::InputOutOfRange { line, op, input });
            }
            inputs.push(input as usize);
        }

        let exec_cost: Time = next()?;
        let transfer_cost: Time = next()?;
        if exec_cost < 0 || transfer_cost < 0 {
            return Err(InputError::NegativeCost { line, op });
        }

        ops.push(Operator {
            inputs,
            exec_cost,
            transfer_cost,
        });
    }

    log::debug!("Parsed {} operators on {card_count} cards", ops.len());
    Ok((Graph::new(ops), card_count))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_small_graph() {
        let (g, cards) = parse_str(
            "2\n\
             0 0 10 5\n\
             1 1 0 10 5\n\
             2 2 0 1 7 3\n",
        )
        .unwrap();
        assert_eq!(cards, 2);
        assert_eq!(g.len(), 3);
        assert_eq!(g.inputs(2), &[0, 1]);
        assert_eq!(g.exec_cost(2), 7);
        assert_eq!(g.transfer_cost(1), 5);
    }

    #[test]
    fn reject_empty_input() {
        assert!(matches!(
            parse_str(""),
            Err(InputError::MissingCardCount)
        ));
    }

    #[test]
    fn reject_id_mismatch() {
        assert!(matches!(
            parse_str("1\n0 0 1 1\n5 0 1 1\n"),
            Err(InputError::IdMismatch {
                line: 3,
                expected: 1,
                got: 5
            })
        ));
    }

    #[test]
    fn reject_input_count_exceeding_prior_ops() {
        assert!(matches!(
            parse_str("1\n0 2 1 1 1\n"),
            Err(InputError::BadInputCount { op: 0, .. })
        ));
    }

    #[test]
    fn reject_forward_reference() {
        assert!(matches!(
            parse_str("1\n0 0 1 1\n1 1 1 1 1\n"),
            Err(InputError::InputOutOfRange { op: 1, input: 1, .. })
        ));
    }

    #[test]
    fn reject_negative_cost() {
        assert!(matches!(
            parse_str("1\n0 0 -4 1\n"),
            Err(InputError::NegativeCost { op: 0, .. })
        ));
    }

    #[test]
    fn reject_truncated_line() {
        assert!(matches!(
            parse_str("1\n0 0 1\n"),
            Err(InputError::BadToken { line: 2 })
        ));
    }
}
