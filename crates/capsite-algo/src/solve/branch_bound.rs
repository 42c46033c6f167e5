//! Best-first branch-and-bound over the capacitor selection binaries.
//!
//! Every node is the continuous SOCP relaxation with some binaries fixed to 0
//! or 1. Nodes are explored lowest bound first; ties go to the deeper node so
//! an incumbent appears early. A node is pruned when its bound cannot beat
//! the incumbent by more than the configured gap.

use super::relaxation::{ClarabelRelaxation, RelaxationStatus};
use super::{SolveBackend, SolveConfig, SolveOutcome, SolveStatus};
use crate::model::ConicProblem;
use capsite_core::CapsiteResult;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, info, warn};
use web_time::Instant;

/// Relative tolerance absorbing interior-point inaccuracy in node bounds
const BOUND_TOLERANCE: f64 = 1e-7;

#[derive(Debug, Clone)]
struct Node {
    /// Relaxation objective of the parent
    bound: f64,
    depth: usize,
    seq: usize,
    /// (binary index, fixed value)
    fixings: Vec<(usize, f64)>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Node {}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering on bound for a min-heap, then deepest first
        other
            .bound
            .total_cmp(&self.bound)
            .then_with(|| self.depth.cmp(&other.depth))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Incumbent {
    objective: f64,
    x: Vec<f64>,
}

/// MISOCP backend: Clarabel relaxations inside a branch-and-bound search.
#[derive(Debug, Clone, Default)]
pub struct ClarabelBranchAndBound;

impl ClarabelBranchAndBound {
    pub fn new() -> Self {
        Self
    }

    fn prune_threshold(config: &SolveConfig, incumbent: f64) -> f64 {
        let gap = config
            .absolute_gap
            .max(config.relative_gap * incumbent.abs())
            .max(BOUND_TOLERANCE * (1.0 + incumbent.abs()));
        incumbent - gap
    }

    /// Binary with the value farthest from integrality among the unfixed ones
    fn most_fractional(
        problem: &ConicProblem,
        x: &[f64],
        fixed: &[bool],
        tolerance: f64,
    ) -> Option<usize> {
        problem
            .binaries
            .iter()
            .enumerate()
            .filter(|(i, _)| !fixed[*i])
            .map(|(i, bin)| {
                let v = x[bin.var];
                (i, (v - v.floor()).min(v.ceil() - v))
            })
            .filter(|&(_, frac)| frac > tolerance)
            .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            .map(|(i, _)| i)
    }
}

impl SolveBackend for ClarabelBranchAndBound {
    fn id(&self) -> &'static str {
        "clarabel-bnb"
    }

    fn solve(&self, problem: &ConicProblem, config: &SolveConfig) -> CapsiteResult<SolveOutcome> {
        config.validate()?;
        let start = Instant::now();
        let deadline = config.time_limit.map(|limit| start + limit);
        let relaxation = ClarabelRelaxation::new(problem);

        let mut heap = BinaryHeap::new();
        heap.push(Node {
            bound: f64::NEG_INFINITY,
            depth: 0,
            seq: 0,
            fixings: Vec::new(),
        });
        let mut seq = 1;

        let mut incumbent: Option<Incumbent> = None;
        let mut nodes = 0usize;
        let mut iterations = 0u32;
        let mut limit: Option<SolveStatus> = None;
        let mut unresolved_iteration = false;
        let mut unresolved_numerical = false;

        while let Some(node) = heap.pop() {
            if let Some(inc) = &incumbent {
                if node.bound >= Self::prune_threshold(config, inc.objective) {
                    // Heap is ordered by bound: every remaining node is dominated too
                    debug!(remaining = heap.len() + 1, "closing search by bound");
                    heap.clear();
                    break;
                }
            }

            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                limit = Some(SolveStatus::TimeLimit);
                heap.push(node);
                break;
            }
            if nodes >= config.max_nodes {
                limit = Some(SolveStatus::IterationLimit);
                heap.push(node);
                break;
            }

            let mut rhs = problem.rhs.clone();
            let mut fixed = vec![false; problem.binaries.len()];
            for &(i, value) in &node.fixings {
                problem.binaries[i].set_bounds(&mut rhs, value, value);
                fixed[i] = true;
            }

            let time_left = deadline.map(|d| d.saturating_duration_since(now));
            let outcome = relaxation.solve(&rhs, config, time_left)?;
            nodes += 1;
            iterations = iterations.saturating_add(outcome.iterations);

            match outcome.status {
                RelaxationStatus::Solved => {}
                RelaxationStatus::Infeasible => {
                    debug!(depth = node.depth, "node infeasible");
                    continue;
                }
                RelaxationStatus::Unbounded => {
                    warn!("relaxation unbounded; stopping search");
                    return Ok(SolveOutcome {
                        status: SolveStatus::Unbounded,
                        x: None,
                        objective: None,
                        best_bound: None,
                        nodes,
                        iterations,
                        elapsed: start.elapsed(),
                    });
                }
                RelaxationStatus::TimeLimit => {
                    limit = Some(SolveStatus::TimeLimit);
                    heap.push(node);
                    break;
                }
                RelaxationStatus::IterationLimit => {
                    warn!(depth = node.depth, "relaxation hit the iteration limit");
                    unresolved_iteration = true;
                    continue;
                }
                RelaxationStatus::NumericalError => {
                    warn!(depth = node.depth, "relaxation failed numerically");
                    unresolved_numerical = true;
                    continue;
                }
            }

            let bound = outcome.objective;
            if let Some(inc) = &incumbent {
                if bound >= Self::prune_threshold(config, inc.objective) {
                    debug!(bound, incumbent = inc.objective, "node pruned by bound");
                    continue;
                }
            }

            match Self::most_fractional(problem, &outcome.x, &fixed, config.integrality_tolerance)
            {
                None => {
                    let mut x = outcome.x;
                    problem.snap_binaries(&mut x);
                    let objective = problem.objective_value(&x);
                    if incumbent.as_ref().map_or(true, |inc| objective < inc.objective) {
                        info!(objective, nodes, "new incumbent");
                        incumbent = Some(Incumbent { objective, x });
                    }
                }
                Some(branch) => {
                    debug!(
                        depth = node.depth,
                        bound,
                        var = problem.binaries[branch].var,
                        value = outcome.x[problem.binaries[branch].var],
                        "branching"
                    );
                    for value in [1.0, 0.0] {
                        let mut fixings = node.fixings.clone();
                        fixings.push((branch, value));
                        heap.push(Node {
                            bound,
                            depth: node.depth + 1,
                            seq,
                            fixings,
                        });
                        seq += 1;
                    }
                }
            }
        }

        let open_bound = heap.iter().map(|n| n.bound).min_by(|a, b| a.total_cmp(b));
        let status = match (limit, &incumbent) {
            (Some(limit), _) => limit,
            (None, _) if unresolved_iteration => SolveStatus::IterationLimit,
            (None, _) if unresolved_numerical => SolveStatus::NumericalError,
            (None, Some(_)) => SolveStatus::Optimal,
            (None, None) => SolveStatus::Infeasible,
        };
        let best_bound = match (status, &incumbent) {
            (SolveStatus::Optimal, Some(inc)) => Some(inc.objective),
            (_, Some(inc)) => Some(
                open_bound
                    .filter(|b| b.is_finite())
                    .map_or(inc.objective, |b| b.min(inc.objective)),
            ),
            (_, None) => open_bound.filter(|b| b.is_finite()),
        };
        let elapsed = start.elapsed();

        info!(
            %status,
            nodes,
            iterations,
            objective = incumbent.as_ref().map(|inc| inc.objective),
            elapsed_ms = elapsed.as_millis() as u64,
            "branch-and-bound finished"
        );

        Ok(SolveOutcome {
            status,
            objective: incumbent.as_ref().map(|inc| inc.objective),
            x: incumbent.map(|inc| inc.x),
            best_bound,
            nodes,
            iterations,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(bound: f64, depth: usize, seq: usize) -> Node {
        Node {
            bound,
            depth,
            seq,
            fixings: Vec::new(),
        }
    }

    #[test]
    fn test_heap_pops_lowest_bound_then_deepest() {
        let mut heap = BinaryHeap::new();
        heap.push(node(5.0, 1, 1));
        heap.push(node(2.0, 1, 2));
        heap.push(node(2.0, 3, 3));
        heap.push(node(f64::NEG_INFINITY, 0, 0));

        assert_eq!(heap.pop().unwrap().seq, 0);
        assert_eq!(heap.pop().unwrap().seq, 3);
        assert_eq!(heap.pop().unwrap().seq, 2);
        assert_eq!(heap.pop().unwrap().seq, 1);
    }

    #[test]
    fn test_prune_threshold_uses_largest_gap() {
        let exact = SolveConfig::default();
        let t = ClarabelBranchAndBound::prune_threshold(&exact, 100.0);
        assert!(t < 100.0 && t > 100.0 - 1e-4);

        let loose = SolveConfig::default().with_gaps(5.0, 0.01);
        assert_eq!(ClarabelBranchAndBound::prune_threshold(&loose, 100.0), 95.0);

        let relative = SolveConfig::default().with_gaps(0.0, 0.1);
        assert!((ClarabelBranchAndBound::prune_threshold(&relative, -200.0) - (-220.0)).abs() < 1e-9);
    }
}
