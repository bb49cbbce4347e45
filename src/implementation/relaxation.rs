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

//! This module provides the construction of the linear relaxations explored
//! by the search: the root model (variables, epigraph variables, the
//! constraint rows of the problem class and one cut per envelope segment) and
//! the child models derived from a parent by branching. A child is a deep
//! copy of its parent with a branching bound and the refined envelope cuts
//! appended, warm-started from the parent's optimal basis and re-optimized
//! with the dual simplex.

use std::sync::Arc;
use std::time::Instant;

use crate::implementation::envelope::lower_envelope;
use crate::{
    Branching, Envelope, Instance, LinearModel, LpStatus, Node, RowSense, RowStatus, Timings,
};

/// Which of the two sub-intervals a child covers.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BranchSide {
    /// The sub-interval at the left of the branching point.
    Left,
    /// The sub-interval at the right of the branching point.
    Right,
}

/// Builds the root relaxation: one bounded variable and one free epigraph
/// variable per function, the equality rows of the problem class, and the
/// epigraph cuts of the given full-range envelopes. The objective minimizes
/// the sum of the epigraph variables.
pub fn build_root<L: LinearModel>(instance: &Instance, envelopes: &[Arc<Envelope>]) -> L {
    let n = instance.nb_variables();
    let mut lp = L::default();

    for i in 0..n {
        let (lower, upper) = instance.function(i).bounds();
        lp.add_variable(lower, upper, 0.0);
    }
    for _ in 0..n {
        lp.add_variable(f64::NEG_INFINITY, f64::INFINITY, 1.0);
    }

    if instance.problem().is_knapsack() {
        let terms: Vec<(usize, f64)> = (0..n).map(|i| (i, 1.0)).collect();
        lp.add_row(&terms, RowSense::Eq, instance.rhs()[0]);
    } else {
        // flow conservation on a complete directed graph: variable i*nr+j is
        // the flow on the arc from node i to node j, and a self loop cancels
        // out of its own balance
        let nr = instance.side();
        for node in 0..nr {
            let mut coefs = vec![0.0; n];
            for j in 0..nr {
                coefs[node * nr + j] += 1.0;
                coefs[j * nr + node] -= 1.0;
            }
            let terms: Vec<(usize, f64)> = coefs
                .iter()
                .enumerate()
                .filter(|(_, &c)| c != 0.0)
                .map(|(i, &c)| (i, c))
                .collect();
            lp.add_row(&terms, RowSense::Eq, instance.rhs()[node]);
        }
    }

    for (i, envelope) in envelopes.iter().enumerate() {
        add_envelope_cuts(&mut lp, i, n + i, envelope);
    }
    lp
}

/// Appends one epigraph cut per segment of the given envelope:
/// `e >= slope * (x - anchor_x) + anchor_y`, rewritten as a `<=` row.
fn add_envelope_cuts<L: LinearModel>(lp: &mut L, var: usize, epi: usize, envelope: &Envelope) {
    for segment in envelope.segments() {
        lp.add_row(
            &[(var, segment.slope), (epi, -1.0)],
            RowSense::Le,
            segment.slope * segment.anchor_x - segment.anchor_y,
        );
    }
}

/// Builds and bounds one child of the given parent node.
///
/// The child restricts the branched variable to the sub-interval delimited by
/// the branching point and the enclosing envelope breakpoints, computes the
/// refined envelope on that sub-interval, deep-copies the parent model,
/// appends the branching bound and the refined cuts, installs the parent's
/// basis (the appended rows stay basic so the parent's optimum remains
/// reachable), and re-optimizes with the dual simplex.
///
/// Returns `None` when the re-optimization does not end with an optimum: the
/// child is then simply fathomed.
pub fn solve_child<L: LinearModel>(
    instance: &Instance,
    parent: &Node<L>,
    branching: &Branching,
    side: BranchSide,
    timings: &mut Timings,
) -> Option<Node<L>> {
    let jump = instance.problem().jump_at_zero();
    let n = instance.nb_variables();
    let i = branching.variable;
    let parent_env = &parent.envelopes[i];
    let (pos, point) = (branching.position, branching.point);

    let interval = match side {
        BranchSide::Left => (parent_env.breakpoints_x()[pos - 1], point),
        BranchSide::Right => (point, parent_env.breakpoints_x()[pos]),
    };
    let clock = Instant::now();
    let refined = lower_envelope(instance.function(i), interval, jump);
    timings.envelope += clock.elapsed();

    let clock = Instant::now();
    // the parent's optimal basis, captured before the copy is amended
    let var_basis: Vec<_> = (0..parent.lp.nb_variables())
        .map(|v| parent.lp.variable_status(v))
        .collect();
    let row_basis: Vec<_> = (0..parent.lp.nb_rows())
        .map(|r| parent.lp.row_status(r))
        .collect();

    let mut lp = parent.lp.clone();
    match side {
        BranchSide::Left => lp.add_row(&[(i, 1.0)], RowSense::Le, point),
        BranchSide::Right => lp.add_row(&[(i, 1.0)], RowSense::Ge, point),
    };
    add_envelope_cuts(&mut lp, i, n + i, &refined);

    for (v, &status) in var_basis.iter().enumerate() {
        lp.set_variable_status(v, status);
    }
    for (r, &status) in row_basis.iter().enumerate() {
        lp.set_row_status(r, status);
    }
    for r in row_basis.len()..lp.nb_rows() {
        lp.set_row_status(r, RowStatus::Basic);
    }
    timings.model += clock.elapsed();

    let status = lp.resolve_dual();
    timings.lp += lp.solve_time();
    if status != LpStatus::Optimal {
        return None;
    }

    let mut envelopes = parent.envelopes.clone();
    envelopes[i] = Arc::new(splice(parent_env, &refined, pos, side));

    let clock = Instant::now();
    let values: Vec<f64> = {
        let primal = lp.primal();
        (0..n)
            .map(|v| instance.function(v).evaluate(primal[v], jump))
            .collect()
    };
    timings.evaluation += clock.elapsed();

    let lb = lp.objective_value();
    Some(Node { lp, envelopes, values, lb, depth: parent.depth + 1 })
}

/// Replaces the part of the parent envelope covered by the refined one: the
/// left child keeps the parent breakpoints before the split and the right
/// child those after it. The result tracks the sub-interval partition of the
/// branched variable; it needs not be globally convex.
fn splice(parent: &Envelope, refined: &Envelope, pos: usize, side: BranchSide) -> Envelope {
    let (px, py) = (parent.breakpoints_x(), parent.breakpoints_y());
    let (rx, ry) = (refined.breakpoints_x(), refined.breakpoints_y());
    let (mut x, mut y) = (vec![], vec![]);
    match side {
        BranchSide::Left => {
            x.extend_from_slice(&px[..pos - 1]);
            y.extend_from_slice(&py[..pos - 1]);
            x.extend_from_slice(rx);
            y.extend_from_slice(ry);
        }
        BranchSide::Right => {
            x.extend_from_slice(rx);
            y.extend_from_slice(ry);
            if pos + 1 < px.len() {
                x.extend_from_slice(&px[pos + 1..]);
                y.extend_from_slice(&py[pos + 1..]);
            }
        }
    }
    Envelope::new(x, y)
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_relaxation {
    use crate::implementation::envelope::lower_envelope;
    use crate::implementation::simplex::SimplexModel;
    use crate::*;
    use std::sync::Arc;

    const EPS: f64 = 1e-6;

    fn full_envelopes(instance: &Instance) -> Vec<Arc<Envelope>> {
        let jump = instance.problem().jump_at_zero();
        instance
            .functions()
            .iter()
            .map(|f| Arc::new(lower_envelope(f, f.bounds(), jump)))
            .collect()
    }

    #[test]
    fn the_root_relaxation_of_a_convex_knapsack_is_exact() {
        // |x| constrained to x = 0 relaxes to exactly 0
        let f = PwlFunction::new(vec![-1.0, 0.0, 1.0], vec![1.0, 0.0, 1.0]).unwrap();
        let instance = Instance::new(vec![f], ProblemClass::Knapsack, vec![0.0]).unwrap();
        let envelopes = full_envelopes(&instance);
        let mut lp: SimplexModel = build_root(&instance, &envelopes);
        assert_eq!(LpStatus::Optimal, lp.solve());
        assert!((lp.objective_value() - 0.0).abs() < EPS);
        assert!((lp.primal()[0] - 0.0).abs() < EPS);
    }

    #[test]
    fn the_root_relaxation_bounds_a_nonconvex_function_from_below() {
        // w-shaped cost over [0, 4], all mass on a single variable
        let f =
            PwlFunction::new(vec![0.0, 1.0, 2.0, 3.0, 4.0], vec![2.0, 0.0, 1.0, 0.0, 2.0]).unwrap();
        let instance = Instance::new(vec![f.clone()], ProblemClass::Knapsack, vec![2.0]).unwrap();
        let envelopes = full_envelopes(&instance);
        let mut lp: SimplexModel = build_root(&instance, &envelopes);
        assert_eq!(LpStatus::Optimal, lp.solve());
        // the envelope flattens the middle bump: value 0 at x = 2 while the
        // true cost there is 1
        assert!(lp.objective_value() <= f.evaluate(2.0, false) + EPS);
        assert!((lp.objective_value() - 0.0).abs() < EPS);
    }

    #[test]
    fn flow_balance_rows_cancel_the_self_loops() {
        // a 2x2 network pushing 5 units from node 0 to node 1 over an
        // identity-cost arc: the self loops must not disturb the balance
        let arc = |slope: f64| {
            PwlFunction::new(vec![0.0, 10.0], vec![0.0, 10.0 * slope]).unwrap()
        };
        let funcs = vec![arc(0.0), arc(1.0), arc(2.0), arc(0.0)];
        let instance = Instance::new(funcs, ProblemClass::NetworkFlow, vec![5.0, -5.0]).unwrap();
        let envelopes = full_envelopes(&instance);
        let mut lp: SimplexModel = build_root(&instance, &envelopes);
        assert_eq!(LpStatus::Optimal, lp.solve());
        // arc 0->1 costs 1 per unit, arc 1->0 costs 2: ship the 5 units
        // one way only
        assert!((lp.objective_value() - 5.0).abs() < EPS);
        assert!((lp.primal()[1] - 5.0).abs() < EPS);
        assert!((lp.primal()[2] - 0.0).abs() < EPS);
    }

    #[test]
    fn children_partition_the_interval_of_the_branched_variable() {
        // w-shaped cost whose relaxed optimum sits in the flattened middle
        let f =
            PwlFunction::new(vec![0.0, 1.0, 2.0, 3.0, 4.0], vec![2.0, 0.0, 1.0, 0.0, 2.0]).unwrap();
        let instance = Instance::new(vec![f], ProblemClass::Knapsack, vec![2.0]).unwrap();
        let envelopes = full_envelopes(&instance);
        let mut lp: SimplexModel = build_root(&instance, &envelopes);
        assert_eq!(LpStatus::Optimal, lp.solve());

        let jump = instance.problem().jump_at_zero();
        let values: Vec<f64> = (0..1)
            .map(|v| instance.function(v).evaluate(lp.primal()[v], jump))
            .collect();
        let lb = lp.objective_value();
        let root = Node { lp, envelopes, values, lb, depth: 0 };

        let branching = largest_error(root.lp.primal(), &root.values, &root.envelopes);
        assert_eq!(0, branching.variable);
        assert!((branching.point - 2.0).abs() < EPS);

        let mut timings = Timings::default();
        let left = solve_child(&instance, &root, &branching, BranchSide::Left, &mut timings)
            .expect("left child solves");
        let right = solve_child(&instance, &root, &branching, BranchSide::Right, &mut timings)
            .expect("right child solves");

        // both children must respect the branching bound and both end up
        // tight: the restriction is feasible only at x = 2 where f = 1
        assert!(left.lp.primal()[0] <= branching.point + EPS);
        assert!(right.lp.primal()[0] >= branching.point - EPS);
        assert!((left.lb - 1.0).abs() < EPS);
        assert!((right.lb - 1.0).abs() < EPS);
        assert_eq!(1, left.depth);

        // the child's lower bound can only move up
        assert!(left.lb >= root.lb - EPS);
        assert!(right.lb >= root.lb - EPS);
    }

    #[test]
    fn unbranched_envelopes_are_shared_with_the_parent() {
        // the w-shape attracts all the mass: its flattened middle is free
        // while the steep convex companion charges at least 10 per unit
        let f =
            PwlFunction::new(vec![0.0, 1.0, 2.0, 3.0, 4.0], vec![2.0, 0.0, 1.0, 0.0, 2.0]).unwrap();
        let g = PwlFunction::new(
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![0.0, 10.0, 21.0, 33.0, 46.0],
        )
        .unwrap();
        let instance = Instance::new(vec![f, g], ProblemClass::Knapsack, vec![2.5]).unwrap();
        let envelopes = full_envelopes(&instance);
        let mut lp: SimplexModel = build_root(&instance, &envelopes);
        assert_eq!(LpStatus::Optimal, lp.solve());

        let values: Vec<f64> = (0..2)
            .map(|v| instance.function(v).evaluate(lp.primal()[v], false))
            .collect();
        let lb = lp.objective_value();
        let root = Node { lp, envelopes, values, lb, depth: 0 };

        // the relaxed optimum is (2.5, 0) where only f is poorly approximated
        let branching = largest_error(root.lp.primal(), &root.values, &root.envelopes);
        assert_eq!(0, branching.variable);

        let mut timings = Timings::default();
        let child = solve_child(&instance, &root, &branching, BranchSide::Left, &mut timings)
            .expect("child solves");

        assert!(Arc::ptr_eq(&root.envelopes[1], &child.envelopes[1]));
        assert!(!Arc::ptr_eq(&root.envelopes[0], &child.envelopes[0]));
    }
}
