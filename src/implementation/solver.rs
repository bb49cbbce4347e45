// Copyright 2020 Xavier Gillard
//
// Permission is hereby granted, free of charge, to any person obtaining a copy of
// this software and associated documentation files (the "Software"), to deal in
// the Software without restriction, including without limitation the rights to
// use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software is furnished to do so,
// subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS
// FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR
// COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER
// IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN
// CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! This module provides the implementation of the spatial branch-and-bound
//! search. One single thread drives everything: it solves the root
//! relaxation, then repeatedly pops the open node with the least lower bound,
//! branches on the variable whose relaxation is the poorest there, bounds the
//! two children by warm-started dual simplex re-solves, and fathoms whatever
//! cannot beat the incumbent anymore. The search stops when the relative gap
//! between the incumbent and the frontier's least bound drops below epsilon,
//! when the frontier runs empty, or when a time or memory budget is hit.

use std::sync::Arc;
use std::time::Instant;

use crate::implementation::envelope::lower_envelope;
use crate::{
    build_root, largest_error, solve_child, BranchSide, Envelope, Frontier, Instance, LinearModel,
    LpStatus, MemoryVerdict, MemoryWatchdog, Node, Parameters, ProblemClass, SimplexModel,
    SolveOutcome, SolveStatus, SortedFrontier, Timings, MEMORY_ABORT,
};

/// The memory guard only arms itself on this regime: nonconcave knapsacks
/// with this many segments per function.
const GUARDED_SEGMENTS: usize = 10_000;

/// True as long as the relative gap between the bounds exceeds epsilon.
/// With equal bounds at zero the quotient is not a number, which correctly
/// reads as "the gap does not exceed epsilon".
fn gap_exceeds(ub: f64, lb: f64, epsilon: f64) -> bool {
    (ub - lb) / ub.abs() > epsilon
}

/// This is the structure implementing the (single-threaded) spatial
/// branch-and-bound search described above.
///
/// # Example Usage
/// ```
/// # use plopt::*;
/// // a single nonconvex cost constrained to x = 1: the only feasible point
/// // is x = 1 where the cost interpolates to 1.5
/// let f = PwlFunction::new(vec![-2.0, 0.0, 2.0], vec![4.0, -1.0, 4.0]).unwrap();
/// let instance = Instance::new(vec![f], ProblemClass::Knapsack, vec![1.0]).unwrap();
///
/// let mut frontier = SortedFrontier::<SimplexModel>::new();
/// let mut solver = SpatialSolver::new(&instance, Parameters::default(), &mut frontier);
/// let outcome = solver.minimize();
///
/// assert_eq!(SolveStatus::Optimal, outcome.status);
/// assert!((outcome.upper_bound - 1.5).abs() < 1e-6);
/// ```
pub struct SpatialSolver<'a, L: LinearModel> {
    /// The problem being solved.
    instance: &'a Instance,
    /// The termination knobs (time budget and gap tolerance).
    parameters: Parameters,
    /// The open nodes, sorted by increasing lower bound.
    ///
    /// # Note:
    /// The bound of the front node is a lower bound on anything feasible
    /// anywhere, so the search can stop as soon as it comes within epsilon
    /// of the incumbent.
    frontier: &'a mut dyn Frontier<Model = L>,
    /// The value of the best feasible point found so far.
    global_ub: f64,
    /// The best feasible point found so far.
    incumbent: Vec<f64>,
    /// The lower bound proved by the root relaxation alone.
    root_bound: f64,
    /// The number of nodes bounded so far (the root plus two per iteration).
    node_count: usize,
    /// Wall-clock accounting of the sub-operations.
    timings: Timings,
}

impl<'a, L: LinearModel> SpatialSolver<'a, L> {
    pub fn new(
        instance: &'a Instance,
        parameters: Parameters,
        frontier: &'a mut dyn Frontier<Model = L>,
    ) -> Self {
        SpatialSolver {
            instance,
            parameters,
            frontier,
            global_ub: f64::INFINITY,
            incumbent: vec![],
            root_bound: f64::NEG_INFINITY,
            node_count: 0,
            timings: Timings::default(),
        }
    }

    /// Runs the search and reports its outcome. An infeasible root relaxation
    /// yields the zeroed `Infeasible` sentinel; a memory abort yields the
    /// out-of-budget elapsed time so that downstream accounting lumps it with
    /// the timeouts.
    pub fn minimize(&mut self) -> SolveOutcome {
        let start = Instant::now();
        let instance = self.instance;
        let n = instance.nb_variables();
        let jump = instance.problem().jump_at_zero();

        // full-range envelopes and the root relaxation
        let clock = Instant::now();
        let envelopes: Vec<Arc<Envelope>> = instance
            .functions()
            .iter()
            .map(|f| Arc::new(lower_envelope(f, f.bounds(), jump)))
            .collect();
        self.timings.envelope += clock.elapsed();

        let clock = Instant::now();
        let mut lp: L = build_root(instance, &envelopes);
        self.timings.model += clock.elapsed();

        let status = lp.solve();
        self.timings.lp += lp.solve_time();
        if status != LpStatus::Optimal {
            log::info!("root relaxation is infeasible, giving the instance up");
            return SolveOutcome::infeasible();
        }

        let clock = Instant::now();
        let values: Vec<f64> = {
            let primal = lp.primal();
            (0..n)
                .map(|i| instance.function(i).evaluate(primal[i], jump))
                .collect()
        };
        self.timings.evaluation += clock.elapsed();

        self.global_ub = values.iter().sum();
        self.incumbent = lp.primal()[..n].to_vec();
        self.root_bound = lp.objective_value();
        log::debug!(
            "root: lb {:.6} ub {:.6}",
            self.root_bound,
            self.global_ub
        );

        let lb = self.root_bound;
        self.frontier.push(Node { lp, envelopes, values, lb, depth: 0 });
        self.node_count = 1;

        let mut watchdog = (instance.problem() == ProblemClass::Knapsack
            && instance.nb_segments() == GUARDED_SEGMENTS)
            .then(MemoryWatchdog::new);

        let status = loop {
            let Some(best_lb) = self.frontier.best_lb() else {
                break SolveStatus::Optimal;
            };
            if !gap_exceeds(self.global_ub, best_lb, self.parameters.epsilon) {
                break SolveStatus::Optimal;
            }
            if start.elapsed() >= self.parameters.time_limit {
                break SolveStatus::TimeLimit;
            }
            if let Some(guard) = watchdog.as_mut() {
                if guard.probe(start.elapsed()) == MemoryVerdict::Abort {
                    log::warn!("memory exhausted after {} nodes, giving up", self.node_count);
                    return self.outcome(SolveStatus::MemoryLimit, MEMORY_ABORT.as_secs_f64());
                }
            }

            // best-first selection and largest-error branching
            let Some(node) = self.frontier.pop() else {
                break SolveStatus::Optimal;
            };
            let branching = largest_error(node.lp.primal(), &node.values, &node.envelopes);

            let left =
                solve_child(instance, &node, &branching, BranchSide::Left, &mut self.timings);
            let right =
                solve_child(instance, &node, &branching, BranchSide::Right, &mut self.timings);

            // the cheapest child below the incumbent becomes the incumbent
            let ub_left = left
                .as_ref()
                .map(|c| c.values.iter().sum::<f64>())
                .unwrap_or(f64::INFINITY);
            let ub_right = right
                .as_ref()
                .map(|c| c.values.iter().sum::<f64>())
                .unwrap_or(f64::INFINITY);
            if ub_left < self.global_ub && ub_left < ub_right {
                if let Some(child) = left.as_ref() {
                    self.global_ub = ub_left;
                    self.incumbent = child.lp.primal()[..n].to_vec();
                    log::debug!("incumbent improved to {:.6}", self.global_ub);
                }
            } else if ub_right < self.global_ub {
                if let Some(child) = right.as_ref() {
                    self.global_ub = ub_right;
                    self.incumbent = child.lp.primal()[..n].to_vec();
                    log::debug!("incumbent improved to {:.6}", self.global_ub);
                }
            }

            // open the children that can still beat the incumbent, then
            // fathom the tail of the frontier against the new incumbent
            if let Some(child) = left {
                if child.lb < self.global_ub {
                    self.frontier.push(child);
                }
            }
            if let Some(child) = right {
                if child.lb < self.global_ub {
                    self.frontier.push(child);
                }
            }
            self.frontier.truncate(self.global_ub);
            self.node_count += 2;
        };

        let outcome = self.outcome(status, start.elapsed().as_secs_f64());
        log::info!(
            "done: {:?} after {} nodes, lb {:.6} ub {:.6}",
            outcome.status,
            outcome.node_count,
            outcome.lower_bound,
            outcome.upper_bound
        );
        outcome
    }

    fn outcome(&self, status: SolveStatus, elapsed_secs: f64) -> SolveOutcome {
        SolveOutcome {
            status,
            elapsed: std::time::Duration::from_secs_f64(elapsed_secs),
            timings: self.timings,
            node_count: self.node_count,
            upper_bound: self.global_ub,
            lower_bound: self.frontier.best_lb().unwrap_or(self.global_ub),
            incumbent: self.incumbent.clone(),
            root_bound: self.root_bound,
        }
    }
}

/// Solves the given instance with the bundled simplex backend and a sorted
/// frontier. This is the one-call entry point mirroring what the batch
/// drivers use.
pub fn minimize(instance: &Instance, parameters: Parameters) -> SolveOutcome {
    let mut frontier = SortedFrontier::<SimplexModel>::new();
    SpatialSolver::new(instance, parameters, &mut frontier).minimize()
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

/// The solver tests resolve small instances whose optimum is known in closed
/// form, plus one randomized stress instance checking that the certified gap
/// is actually met.

#[cfg(test)]
mod test_solver {
    use crate::*;
    use std::time::Duration;

    const EPS: f64 = 1e-6;

    fn params(epsilon: f64, secs: u64) -> Parameters {
        ParametersBuilder::default()
            .epsilon(epsilon)
            .time_limit(Duration::from_secs(secs))
            .build()
            .unwrap()
    }

    #[test]
    fn a_convex_cost_is_settled_at_the_root() {
        // |x| constrained to x = 0
        let f = PwlFunction::new(vec![-1.0, 0.0, 1.0], vec![1.0, 0.0, 1.0]).unwrap();
        let instance = Instance::new(vec![f], ProblemClass::Knapsack, vec![0.0]).unwrap();
        let outcome = minimize(&instance, Parameters::default());

        assert_eq!(SolveStatus::Optimal, outcome.status);
        assert_eq!(1, outcome.node_count);
        assert!((outcome.upper_bound - 0.0).abs() < EPS);
        assert!((outcome.incumbent[0] - 0.0).abs() < EPS);
    }

    #[test]
    fn a_singleton_feasible_region_is_settled_at_the_root() {
        // the region {1} forces the value f(1) = 1.5 (the cost is convex so
        // the root relaxation is already exact)
        let f = PwlFunction::new(vec![-2.0, 0.0, 2.0], vec![4.0, -1.0, 4.0]).unwrap();
        let instance = Instance::new(vec![f], ProblemClass::Knapsack, vec![1.0]).unwrap();
        let outcome = minimize(&instance, Parameters::default());

        assert_eq!(SolveStatus::Optimal, outcome.status);
        assert_eq!(1, outcome.node_count);
        assert!((outcome.upper_bound - 1.5).abs() < EPS);
        assert!((outcome.root_bound - 1.5).abs() < EPS);
        assert!((outcome.incumbent[0] - 1.0).abs() < EPS);
    }

    #[test]
    fn a_two_variable_knapsack_with_increasing_slopes_spreads_the_mass() {
        // slopes -1 then -0.6: spreading 6 units over both variables keeps
        // everything on the steep first segment and yields -6
        let f = || PwlFunction::new(vec![0.0, 5.0, 10.0], vec![0.0, -5.0, -8.0]).unwrap();
        let instance = Instance::new(vec![f(), f()], ProblemClass::ConcaveKnapsack, vec![6.0]).unwrap();
        let outcome = minimize(&instance, Parameters::default());

        assert_eq!(SolveStatus::Optimal, outcome.status);
        assert!((outcome.upper_bound - -6.0).abs() < 1e-5);
        let total: f64 = outcome.incumbent.iter().sum();
        assert!((total - 6.0).abs() < EPS);
    }

    #[test]
    fn a_two_variable_concave_knapsack_allocates_everything_to_one_variable() {
        // slopes -0.6 then -1: a genuinely concave cost, whose minimum piles
        // the whole right-hand side onto a single variable: f(6) = -4
        let f = || PwlFunction::new(vec![0.0, 5.0, 10.0], vec![0.0, -3.0, -8.0]).unwrap();
        let instance = Instance::new(vec![f(), f()], ProblemClass::ConcaveKnapsack, vec![6.0]).unwrap();
        let outcome = minimize(&instance, Parameters::default());

        assert_eq!(SolveStatus::Optimal, outcome.status);
        assert!((outcome.upper_bound - -4.0).abs() < 1e-4);
        assert!(outcome.node_count > 1);
        let total: f64 = outcome.incumbent.iter().sum();
        assert!((total - 6.0).abs() < EPS);
        // all-to-one: one variable carries (essentially) the whole mass
        let largest = outcome.incumbent.iter().cloned().fold(f64::MIN, f64::max);
        assert!(largest > 6.0 - 1e-3);
    }

    #[test]
    fn the_fixed_charge_is_not_paid_at_the_origin() {
        // 2x2 network pushing 5 units from node 0 to node 1; the return arc
        // carries a fixed charge of 3 which the optimum avoids by leaving it
        // at zero: total cost is f01(5) = 5, not 5 + 3
        let free = || PwlFunction::new(vec![0.0, 10.0], vec![0.0, 0.0]).unwrap();
        let forward = PwlFunction::new(vec![0.0, 10.0], vec![0.0, 10.0]).unwrap();
        let charged = PwlFunction::new(vec![0.0, 10.0], vec![3.0, 4.0]).unwrap();
        let funcs = vec![free(), forward, charged, free()];
        let instance =
            Instance::new(funcs, ProblemClass::DiscontinuousNetworkFlow, vec![5.0, -5.0]).unwrap();
        let outcome = minimize(&instance, Parameters::default());

        assert_eq!(SolveStatus::Optimal, outcome.status);
        assert!((outcome.upper_bound - 5.0).abs() < 1e-5);
        assert!((outcome.incumbent[1] - 5.0).abs() < 1e-5);
        assert!((outcome.incumbent[2] - 0.0).abs() < 1e-5);
    }

    #[test]
    fn an_unreachable_right_hand_side_returns_the_infeasible_sentinel() {
        let f = || PwlFunction::new(vec![0.0, 1.0], vec![0.0, 1.0]).unwrap();
        let instance = Instance::new(vec![f(), f()], ProblemClass::Knapsack, vec![5.0]).unwrap();
        let outcome = minimize(&instance, Parameters::default());

        assert_eq!(SolveStatus::Infeasible, outcome.status);
        assert_eq!(0, outcome.node_count);
        assert_eq!(0.0, outcome.upper_bound);
        assert!(outcome.incumbent.is_empty());
    }

    #[test]
    fn the_bounds_tighten_monotonically_down_to_the_certified_gap() {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(17);
        let functions = generator::knapsack_functions(10, 100, false, &mut rng);
        let rhs = generator::knapsack_rhs(&functions, &mut rng);
        let instance = Instance::new(functions, ProblemClass::Knapsack, vec![rhs]).unwrap();

        let epsilon = 1e-5;
        let outcome = minimize(&instance, params(epsilon, 300));

        assert_eq!(SolveStatus::Optimal, outcome.status);
        assert!(outcome.node_count > 1);
        assert!(outcome.gap().is_nan() || outcome.gap() <= epsilon);
        // the root bound can only be weaker than the final one
        assert!(outcome.root_bound <= outcome.lower_bound + 1e-9);
        assert!(outcome.lower_bound <= outcome.upper_bound + 1e-9);
        // the incumbent is feasible: it meets the knapsack equality
        let total: f64 = outcome.incumbent.iter().sum();
        assert!((total - rhs).abs() < 1e-5);
        // and its true cost is the reported upper bound
        let cost: f64 = outcome
            .incumbent
            .iter()
            .zip(instance.functions())
            .map(|(&x, f)| f.evaluate(x, false))
            .sum();
        assert!((cost - outcome.upper_bound).abs() < 1e-6);
    }

    #[test]
    fn a_zero_time_budget_reports_a_timeout_with_valid_bounds() {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let functions = generator::knapsack_functions(5, 20, false, &mut rng);
        let rhs = generator::knapsack_rhs(&functions, &mut rng);
        let instance = Instance::new(functions, ProblemClass::Knapsack, vec![rhs]).unwrap();

        let outcome = minimize(&instance, params(1e-9, 0));
        // the root is still bounded, the loop just never starts
        if outcome.status == SolveStatus::TimeLimit {
            assert_eq!(1, outcome.node_count);
            assert!(outcome.lower_bound <= outcome.upper_bound + 1e-9);
        }
    }
}
