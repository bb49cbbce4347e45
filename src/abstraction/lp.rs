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

//! This module defines the contract between the branch-and-bound search and
//! the linear-programming backend it relies on. Any solver able to add
//! bounded continuous variables and linear rows, to deep-copy a model, to
//! re-optimize with the dual simplex, and to expose its basis can serve as a
//! backend: the bundled `SimplexModel` is one such implementation.

use std::time::Duration;

/// The status a linear solve can end with. Anything that is neither a proof
/// of optimality nor a proof of infeasibility (iteration limits, numerical
/// breakdowns, unbounded rays) is lumped into `Aborted`: the search treats
/// those nodes as if they had been fathomed.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum LpStatus {
    Optimal,
    Infeasible,
    Aborted,
}

/// The direction of a linear row.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum RowSense {
    /// `terms == rhs`
    Eq,
    /// `terms <= rhs`
    Le,
    /// `terms >= rhs`
    Ge,
}

/// The simplex status of one variable of the model.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum VarStatus {
    /// The variable belongs to the basis.
    Basic,
    /// The variable sits at its lower bound.
    NonbasicLower,
    /// The variable sits at its upper bound.
    NonbasicUpper,
    /// The variable is free and sits at zero.
    NonbasicFree,
}

/// The simplex status of one row of the model. A row whose logical variable
/// is basic is currently slack (non-binding); a nonbasic logical means the
/// row is tight at the reported optimum.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum RowStatus {
    /// The row's logical variable is basic: the row does not bind.
    Basic,
    /// The row binds at the current point.
    Nonbasic,
}

/// The linear-programming capability consumed by the search. A model is a
/// bag of bounded continuous variables and linear rows with a linear
/// objective that is always *minimized*.
///
/// `Default` stands for the empty model and `Clone` for a deep copy carrying
/// the solution state and the basis along, which is what makes the
/// parent-to-child warm start possible: a child is a clone of its parent with
/// a handful of extra rows, re-optimized with the dual simplex from the
/// parent's optimal basis.
pub trait LinearModel: Clone + Default {
    /// Appends a continuous variable with the given bounds and objective
    /// coefficient and returns its index. Use infinite bounds for a free
    /// variable. All variables must be added before the first row.
    fn add_variable(&mut self, lower: f64, upper: f64, objective: f64) -> usize;

    /// Appends a linear row `sum(coef * var) sense rhs` and returns its
    /// index. Duplicate variable indices within `terms` are not allowed.
    /// The row's logical variable starts basic, so the previously optimal
    /// point remains reachable by the dual simplex.
    fn add_row(&mut self, terms: &[(usize, f64)], sense: RowSense, rhs: f64) -> usize;

    fn nb_variables(&self) -> usize;
    fn nb_rows(&self) -> usize;

    /// Optimizes the model from scratch (primal simplex, two phases).
    fn solve(&mut self) -> LpStatus;

    /// Re-optimizes the model with the dual simplex, starting from the basis
    /// currently installed in the model. This is the workhorse of the search:
    /// after `add_row` the parent's optimal basis is dual feasible and a few
    /// pivots usually suffice.
    fn resolve_dual(&mut self) -> LpStatus;

    /// The objective value of the last successful solve.
    fn objective_value(&self) -> f64;

    /// The primal values of all variables at the last successful solve.
    fn primal(&self) -> &[f64];

    /// The wall-clock time spent inside the last call to `solve` or
    /// `resolve_dual`.
    fn solve_time(&self) -> Duration;

    fn variable_status(&self, var: usize) -> VarStatus;
    fn set_variable_status(&mut self, var: usize, status: VarStatus);
    fn row_status(&self, row: usize) -> RowStatus;
    fn set_row_status(&mut self, row: usize, status: RowStatus);
}
