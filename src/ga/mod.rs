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

//! The evolutionary search over the space of valid schedules.
//!
//! The engine runs a generational GA under a wall-clock budget: elitism keeps the two best
//! individuals alive, parents are chosen by tournament (whose size adapts to the fitness
//! diversity and the elapsed time), crossover blends the dispatch positions and cards of two
//! parents through the earliest-finish-time constructor, and mutation rebuilds an individual from
//! noisy positions. Fitness (the makespan) is evaluated in parallel across the new individuals of
//! every generation; the evaluation itself is deterministic, so workers need no randomness.

use std::{
    cell::RefCell,
    time::{Duration, Instant},
};

use itertools::Itertools;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;

use crate::{
    config::GaConfig,
    evaluator::{makespan_in, SimState},
    graph::{Assignment, Graph, Schedule, Time},
    heuristic::{refine_cards, topo_by_priority_eft},
};

mod population;

use population::initialize_population;

/// Number of individuals copied unchanged into the next generation.
const ELITE_COUNT: usize = 2;
/// Time budget per operator: one minute per 50'000 operators.
const BUDGET_PER_OP: Duration = Duration::from_nanos(60_000_000_000 / 50_000);
/// Lower clamp of the time budget. Tiny graphs would otherwise get a degenerate sub-millisecond
/// budget.
const MIN_BUDGET: Duration = Duration::from_millis(100);
/// Early-stop threshold relative to the fitness of the deterministic greedy seed.
const EARLY_STOP_FACTOR: f64 = 0.9;
/// Largest tournament size the adaptation may reach.
const MAX_TOURNAMENT_K: usize = 8;
/// Refinement ratio applied to crossover children.
const CROSSOVER_REFINE_RATIO: f64 = 0.2;
/// Refinement ratio applied to mutated individuals.
const MUTATION_REFINE_RATIO: f64 = 0.15;
/// Amplitude of the position noise used by mutation.
const MUTATION_PRIO_NOISE: f64 = 0.5;

thread_local! {
    /// Per-worker simulation scratch, so batch evaluation does not allocate per call.
    static SIM_SCRATCH: RefCell<SimState> = RefCell::new(SimState::default());
}

/// Find a good schedule for `graph` on `card_count` cards, with the GA configuration loaded from
/// the default file location ([`GaConfig::load_default`]).
///
/// Returns an empty schedule if `card_count == 0`, the graph is empty, or the graph contains a
/// cycle.
pub fn execute_order(graph: &Graph, card_count: usize) -> Schedule {
    execute_order_with(graph, card_count, &GaConfig::load_default())
}

/// Find a good schedule for `graph` on `card_count` cards within the time budget.
///
/// The budget scales linearly with the graph size (about one minute per 50'000 operators) and is
/// clamped to at least 100 ms. The best schedule found when the budget expires is returned;
/// in-flight evaluations always complete first.
pub fn execute_order_with(graph: &Graph, card_count: usize, cfg: &GaConfig) -> Schedule {
    if card_count == 0 || graph.is_empty() {
        log::warn!(
            "Degenerate scheduling problem ({} operators, {card_count} cards)",
            graph.len()
        );
        return Vec::new();
    }

    let start = Instant::now();
    let budget = (BUDGET_PER_OP * graph.len() as u32).max(MIN_BUDGET);
    let mut rng = StdRng::seed_from_u64(cfg.resolved_seed());

    let mut population = initialize_population(graph, card_count, cfg.pop_size, &mut rng);
    if population.is_empty() {
        log::warn!("Could not build an initial population: the graph contains a cycle");
        return Vec::new();
    }

    let mut fitness = vec![None; population.len()];
    evaluate_batch(graph, card_count, &population, &mut fitness);
    let mut fitness: Vec<Time> = fitness.into_iter().flatten().collect();

    // the first individual is the deterministic greedy seed: its fitness is the early-stop target
    let target = fitness[0];
    let Some(best_idx) = fitness.iter().position_min() else {
        return Vec::new();
    };
    let mut best = population[best_idx].clone();
    let mut best_fit = fitness[best_idx];
    log::info!(
        "Scheduling {} operators on {card_count} cards: initial best {best_fit}, budget {:?}",
        graph.len(),
        budget
    );

    let mut generation = 0usize;
    loop {
        let elapsed = start.elapsed();
        if elapsed >= budget {
            break;
        }
        if cfg.early_stop && (best_fit as f64) <= EARLY_STOP_FACTOR * target as f64 {
            log::info!("Early stop in generation {generation}: {best_fit} <= 0.9 * {target}");
            break;
        }

        let mut next: Vec<Schedule> = Vec::with_capacity(cfg.pop_size);
        let mut next_fit: Vec<Option<Time>> = Vec::with_capacity(cfg.pop_size);

        // elitism: keep the two best individuals, reusing their cached fitness
        let mut by_fitness: Vec<usize> = (0..population.len()).collect();
        if by_fitness.len() > ELITE_COUNT {
            by_fitness.select_nth_unstable_by_key(ELITE_COUNT - 1, |&i| fitness[i]);
        }
        for &i in by_fitness.iter().take(ELITE_COUNT.min(cfg.pop_size)) {
            next.push(population[i].clone());
            next_fit.push(Some(fitness[i]));
        }

        let k = adaptive_tournament_k(
            cfg.tournament_k,
            &fitness,
            elapsed.as_secs_f64() / budget.as_secs_f64(),
            cfg.pop_size,
        );

        while next.len() < cfg.pop_size {
            let a = tournament(&fitness, k, &mut rng);
            let b = tournament(&fitness, k, &mut rng);
            let mut child = crossover(graph, card_count, &population[a], &population[b], &mut rng);
            if child.is_empty() {
                child = population[a].clone();
            }
            let mutated = rng.gen::<f64>() < cfg.mutation_rate;
            if mutated {
                mutate(graph, card_count, &mut child, &mut rng);
            }
            // reuse the parent's fitness if the child is an unmutated copy of it
            let cached = if !mutated && child == population[a] {
                Some(fitness[a])
            } else if !mutated && child == population[b] {
                Some(fitness[b])
            } else {
                None
            };
            next.push(child);
            next_fit.push(cached);
        }

        evaluate_batch(graph, card_count, &next, &mut next_fit);
        population = next;
        fitness = next_fit.into_iter().flatten().collect();

        if let Some(idx) = fitness.iter().position_min() {
            if fitness[idx] < best_fit {
                best_fit = fitness[idx];
                best = population[idx].clone();
            }
        }
        generation += 1;
        log::debug!("Generation {generation}: best {best_fit}, tournament size {k}");
    }

    log::info!(
        "Finished after {generation} generations in {:?}: best makespan {best_fit}",
        start.elapsed()
    );
    best
}

/// Evaluate all individuals whose fitness slot is still empty, in parallel.
///
/// The batch is partitioned into contiguous chunks, one per worker (`min(cores, batch)`), and
/// each worker evaluates its chunk sequentially into its disjoint part of the fitness vector.
/// The join at the end of the batch is the only synchronization point of the engine.
fn evaluate_batch(
    graph: &Graph,
    card_count: usize,
    batch: &[Schedule],
    fitness: &mut [Option<Time>],
) {
    let pending = fitness.iter().filter(|f| f.is_none()).count();
    if pending == 0 {
        return;
    }
    let workers = num_cpus::get().clamp(1, pending);
    let chunk = (batch.len() + workers - 1) / workers;
    batch
        .par_chunks(chunk)
        .zip(fitness.par_chunks_mut(chunk))
        .for_each(|(individuals, slots)| {
            SIM_SCRATCH.with(|scratch| {
                let mut state = scratch.borrow_mut();
                for (indiv, slot) in individuals.iter().zip(slots) {
                    if slot.is_none() {
                        *slot = Some(makespan_in(&mut state, indiv, graph, card_count));
                    }
                }
            })
        });
}

/// Tournament selection: sample `k` individuals with replacement, return the index of the fittest.
fn tournament(fitness: &[Time], k: usize, rng: &mut impl Rng) -> usize {
    let mut winner = rng.gen_range(0..fitness.len());
    for _ in 1..k {
        let cand = rng.gen_range(0..fitness.len());
        if fitness[cand] < fitness[winner] {
            winner = cand;
        }
    }
    winner
}

/// Adapt the tournament size to the fitness diversity and the time progress.
///
/// A low coefficient of variation (converged population) raises the selection pressure, a high
/// one lowers it; pressure also rises towards the end of the budget. The result is clamped to
/// `[2, min(pop_size, 8)]`.
fn adaptive_tournament_k(base_k: usize, fitness: &[Time], progress: f64, pop_size: usize) -> usize {
    let n = fitness.len() as f64;
    let mean = fitness.iter().map(|&f| f as f64).sum::<f64>() / n;
    let var = (fitness.iter().map(|&f| (f as f64) * (f as f64)).sum::<f64>() / n
        - mean * mean)
        .max(0.0);
    let cv = if mean > 0.0 { var.sqrt() / mean } else { 0.0 };

    let cv_factor = if cv < 0.10 {
        1.5
    } else if cv > 0.25 {
        0.8
    } else {
        1.0
    };
    let time_factor = if progress < 1.0 / 3.0 {
        0.8
    } else if progress > 2.0 / 3.0 {
        1.2
    } else {
        1.0
    };

    let max_k = pop_size.min(MAX_TOURNAMENT_K);
    ((base_k as f64 * cv_factor * time_factor).round() as usize).clamp(2, max_k.max(2))
}

/// Produce a child from two parents.
///
/// The child's priority of every operator is the average of its dispatch positions in the two
/// parents, and its card is inherited from either parent by coin flip; the child is then rebuilt
/// through the earliest-finish-time constructor and lightly refined. Returns an empty schedule
/// only if emission fails (cyclic graph).
pub(crate) fn crossover(
    graph: &Graph,
    card_count: usize,
    parent_a: &[Assignment],
    parent_b: &[Assignment],
    rng: &mut impl Rng,
) -> Schedule {
    let n = graph.len();
    let mut prio = vec![0.0; n];
    for (pos, asg) in parent_a.iter().enumerate() {
        prio[asg.op] += pos as f64;
    }
    for (pos, asg) in parent_b.iter().enumerate() {
        prio[asg.op] += pos as f64;
    }
    for p in &mut prio {
        *p /= 2.0;
    }

    let mut inherit = vec![0; n];
    for asg in parent_a {
        inherit[asg.op] = asg.card;
    }
    for asg in parent_b {
        if rng.gen_bool(0.5) {
            inherit[asg.op] = asg.card;
        }
    }

    let child = topo_by_priority_eft(graph, card_count, &prio, Some(&inherit));
    if child.is_empty() {
        return child;
    }
    refine_cards(&child, graph, card_count, CROSSOVER_REFINE_RATIO, rng)
}

/// Mutate an individual in place: rebuild it from its current dispatch positions perturbed by
/// uniform noise in `[0, 0.5)`, cards inherited from itself, followed by a 15% card refinement.
pub(crate) fn mutate(
    graph: &Graph,
    card_count: usize,
    indiv: &mut Schedule,
    rng: &mut impl Rng,
) {
    let n = graph.len();
    let mut prio = vec![0.0; n];
    let mut inherit = vec![0; n];
    for (pos, asg) in indiv.iter().enumerate() {
        prio[asg.op] = pos as f64 + rng.gen::<f64>() * MUTATION_PRIO_NOISE;
        inherit[asg.op] = asg.card;
    }
    let rebuilt = topo_by_priority_eft(graph, card_count, &prio, Some(&inherit));
    if !rebuilt.is_empty() {
        *indiv = refine_cards(&rebuilt, graph, card_count, MUTATION_REFINE_RATIO, rng);
    }
}
