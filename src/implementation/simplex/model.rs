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

//! This module provides the model side of the bundled linear-programming
//! backend: bounded continuous columns, linear rows turned into equalities
//! through one logical (slack) column each, and the basis bookkeeping that
//! the revised-simplex engine operates on. The pivoting itself lives in the
//! sibling `engine` module.

use std::time::Duration;

use crate::{LinearModel, LpStatus, RowSense, RowStatus, VarStatus};

use super::matrix::Matrix;

/// The internal simplex status of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ColStatus {
    Basic,
    /// Nonbasic at its lower bound.
    Lower,
    /// Nonbasic at its upper bound.
    Upper,
    /// Nonbasic free column, resting at zero.
    Free,
}

/// What a column stands for. Logical columns carry the row senses (their
/// bounds encode `=`, `<=` or `>=`); artificial columns only ever exist to
/// give the cold start a feasible basis and are pinned to zero afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ColKind {
    Structural,
    Logical,
    Artificial,
}

#[derive(Debug, Clone)]
pub(super) struct Column {
    pub lower: f64,
    pub upper: f64,
    pub cost: f64,
    pub kind: ColKind,
    /// The sparse constraint column: (row, coefficient) pairs.
    pub entries: Vec<(usize, f64)>,
}

#[derive(Debug, Clone)]
pub(super) struct Row {
    pub sense: RowSense,
    pub rhs: f64,
    /// The index of the logical column of this row.
    pub logical: usize,
}

/// A dense-inverse revised simplex over bounded variables. This is the
/// bundled implementation of the `LinearModel` contract: a cold `solve` runs
/// a two-phase primal simplex, while `resolve_dual` restarts from whatever
/// basis is installed in the model and lets the dual simplex repair primal
/// feasibility, the cheap path after a clone-and-add-rows warm start.
#[derive(Debug, Clone)]
pub struct SimplexModel {
    pub(super) cols: Vec<Column>,
    pub(super) rows: Vec<Row>,
    pub(super) nb_structural: usize,

    pub(super) status: Vec<ColStatus>,
    pub(super) value: Vec<f64>,
    /// The basis: one column index per row position. Only meaningful while
    /// the engine runs; it is rebuilt from the statuses at every (re)solve.
    pub(super) basic: Vec<usize>,
    /// The explicit inverse of the basis matrix.
    pub(super) binv: Matrix,

    pub(super) solved: bool,
    pub(super) objective: f64,
    pub(super) primal_cache: Vec<f64>,
    pub(super) solve_time: Duration,
}

impl Default for SimplexModel {
    fn default() -> Self {
        Self {
            cols: vec![],
            rows: vec![],
            nb_structural: 0,
            status: vec![],
            value: vec![],
            basic: vec![],
            binv: Matrix::zeros(0, 0),
            solved: false,
            objective: 0.0,
            primal_cache: vec![],
            solve_time: Duration::ZERO,
        }
    }
}

impl SimplexModel {
    /// The resting status of a column that is pushed out of the basis (or has
    /// never been in it): its nearest bound, or zero when it is free.
    pub(super) fn resting_status(lower: f64, upper: f64) -> (ColStatus, f64) {
        if lower.is_finite() {
            (ColStatus::Lower, lower)
        } else if upper.is_finite() {
            (ColStatus::Upper, upper)
        } else {
            (ColStatus::Free, 0.0)
        }
    }

    pub(super) fn push_col(&mut self, col: Column) -> usize {
        let idx = self.cols.len();
        let (status, value) = Self::resting_status(col.lower, col.upper);
        self.cols.push(col);
        self.status.push(status);
        self.value.push(value);
        idx
    }
}

impl LinearModel for SimplexModel {
    fn add_variable(&mut self, lower: f64, upper: f64, objective: f64) -> usize {
        debug_assert!(self.rows.is_empty(), "variables must be added before rows");
        let idx = self.push_col(Column {
            lower,
            upper,
            cost: objective,
            kind: ColKind::Structural,
            entries: vec![],
        });
        self.nb_structural += 1;
        idx
    }

    fn add_row(&mut self, terms: &[(usize, f64)], sense: RowSense, rhs: f64) -> usize {
        let row = self.rows.len();
        for &(var, coef) in terms {
            debug_assert!(var < self.nb_structural);
            self.cols[var].entries.push((row, coef));
        }
        let (lower, upper) = match sense {
            RowSense::Eq => (0.0, 0.0),
            RowSense::Le => (0.0, f64::INFINITY),
            RowSense::Ge => (f64::NEG_INFINITY, 0.0),
        };
        let logical = self.push_col(Column {
            lower,
            upper,
            cost: 0.0,
            kind: ColKind::Logical,
            entries: vec![(row, 1.0)],
        });
        // the new row starts with a basic logical so that a previously
        // optimal basis remains a valid (dual feasible) starting point
        self.status[logical] = ColStatus::Basic;
        self.rows.push(Row { sense, rhs, logical });
        row
    }

    fn nb_variables(&self) -> usize {
        self.nb_structural
    }

    fn nb_rows(&self) -> usize {
        self.rows.len()
    }

    fn solve(&mut self) -> LpStatus {
        self.cold_solve()
    }

    fn resolve_dual(&mut self) -> LpStatus {
        self.warm_resolve()
    }

    fn objective_value(&self) -> f64 {
        self.objective
    }

    fn primal(&self) -> &[f64] {
        &self.primal_cache
    }

    fn solve_time(&self) -> Duration {
        self.solve_time
    }

    fn variable_status(&self, var: usize) -> VarStatus {
        debug_assert!(var < self.nb_structural);
        match self.status[var] {
            ColStatus::Basic => VarStatus::Basic,
            ColStatus::Lower => VarStatus::NonbasicLower,
            ColStatus::Upper => VarStatus::NonbasicUpper,
            ColStatus::Free => VarStatus::NonbasicFree,
        }
    }

    fn set_variable_status(&mut self, var: usize, status: VarStatus) {
        debug_assert!(var < self.nb_structural);
        let col = &self.cols[var];
        let (status, value) = match status {
            VarStatus::Basic => (ColStatus::Basic, self.value[var]),
            VarStatus::NonbasicLower => (ColStatus::Lower, col.lower),
            VarStatus::NonbasicUpper => (ColStatus::Upper, col.upper),
            VarStatus::NonbasicFree => (ColStatus::Free, 0.0),
        };
        self.status[var] = status;
        self.value[var] = value;
    }

    fn row_status(&self, row: usize) -> RowStatus {
        let logical = self.rows[row].logical;
        if self.status[logical] == ColStatus::Basic {
            RowStatus::Basic
        } else {
            RowStatus::Nonbasic
        }
    }

    fn set_row_status(&mut self, row: usize, status: RowStatus) {
        let logical = self.rows[row].logical;
        match status {
            RowStatus::Basic => self.status[logical] = ColStatus::Basic,
            RowStatus::Nonbasic => {
                // every row sense has zero as its one finite logical bound,
                // so a nonbinding-to-binding transition rests the logical at 0
                let (status, value) = match self.rows[row].sense {
                    RowSense::Ge => (ColStatus::Upper, 0.0),
                    _ => (ColStatus::Lower, 0.0),
                };
                self.status[logical] = status;
                self.value[logical] = value;
            }
        }
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_model {
    use crate::*;
    use crate::implementation::simplex::SimplexModel;

    #[test]
    fn variables_and_rows_are_counted_separately() {
        let mut lp = SimplexModel::default();
        let x = lp.add_variable(0.0, 1.0, 1.0);
        let y = lp.add_variable(0.0, 1.0, 1.0);
        assert_eq!((0, 1), (x, y));
        let r = lp.add_row(&[(x, 1.0), (y, 1.0)], RowSense::Le, 1.0);
        assert_eq!(0, r);
        assert_eq!(2, lp.nb_variables());
        assert_eq!(1, lp.nb_rows());
    }

    #[test]
    fn a_fresh_row_reports_a_basic_logical() {
        let mut lp = SimplexModel::default();
        let x = lp.add_variable(0.0, 1.0, 1.0);
        let r = lp.add_row(&[(x, 1.0)], RowSense::Le, 1.0);
        assert_eq!(RowStatus::Basic, lp.row_status(r));
    }

    #[test]
    fn statuses_can_be_written_and_read_back() {
        let mut lp = SimplexModel::default();
        let x = lp.add_variable(0.0, 2.0, 1.0);
        let r = lp.add_row(&[(x, 1.0)], RowSense::Le, 1.0);

        lp.set_variable_status(x, VarStatus::NonbasicUpper);
        assert_eq!(VarStatus::NonbasicUpper, lp.variable_status(x));
        lp.set_row_status(r, RowStatus::Nonbasic);
        assert_eq!(RowStatus::Nonbasic, lp.row_status(r));
        lp.set_row_status(r, RowStatus::Basic);
        assert_eq!(RowStatus::Basic, lp.row_status(r));
    }
}
