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

//! The pivoting engine of the bundled linear-programming backend: a revised
//! simplex over bounded variables that maintains an explicit dense inverse of
//! the basis. Cold solves run the primal simplex in two phases (artificial
//! columns absorb the initial infeasibility); warm re-solves run the dual
//! simplex from the basis installed in the model, which is the standard way
//! of re-optimizing after rows have been appended to an optimal model.

use std::time::Instant;

use crate::LpStatus;

use super::matrix::{LuDecomposition, Matrix, SingularMatrix};
use super::model::{ColKind, ColStatus, Column, SimplexModel};

/// Bound violations below this threshold count as feasible.
const PRIMAL_TOL: f64 = 1e-7;
/// Reduced costs below this threshold count as optimal.
const DUAL_TOL: f64 = 1e-7;
/// Pivot elements smaller than this are never eligible.
const PIVOT_TOL: f64 = 1e-9;
/// Basis matrices whose LU pivots fall below this are deemed singular.
const SINGULAR_TOL: f64 = 1e-10;
/// A leftover phase-one objective above this proves infeasibility.
const INFEASIBILITY_TOL: f64 = 1e-6;
/// The inverse is rebuilt from scratch every so many pivots to keep the
/// accumulated update error in check.
const REFACTOR_CYCLE: usize = 64;

enum PrimalEnd {
    Converged,
    Unbounded,
    IterationLimit,
    Singular,
}

enum DualEnd {
    Converged,
    Infeasible,
    IterationLimit,
    Singular,
}

impl SimplexModel {
    pub(super) fn cold_solve(&mut self) -> LpStatus {
        let start = Instant::now();
        let status = self.cold_solve_inner();
        self.solve_time = start.elapsed();
        status
    }

    pub(super) fn warm_resolve(&mut self) -> LpStatus {
        let start = Instant::now();
        let status = if self.solved {
            self.warm_resolve_inner()
        } else {
            self.cold_solve_inner()
        };
        self.solve_time = start.elapsed();
        status
    }

    fn cold_solve_inner(&mut self) -> LpStatus {
        let fresh = self.initial_point();
        if self.refactorize().is_err() {
            return LpStatus::Aborted;
        }
        self.compute_values();

        if !fresh.is_empty() {
            // phase one: drive the artificial columns down to zero
            let mut costs = vec![0.0; self.cols.len()];
            for &a in &fresh {
                costs[a] = 1.0;
            }
            match self.primal_loop(&costs) {
                PrimalEnd::Converged => {}
                _ => return LpStatus::Aborted,
            }
            let infeasibility: f64 = fresh.iter().map(|&a| self.value[a]).sum();
            if infeasibility > INFEASIBILITY_TOL {
                return LpStatus::Infeasible;
            }
            // pin the artificials to zero; a degenerate one may stay basic
            for &a in &fresh {
                self.cols[a].upper = 0.0;
                if self.status[a] != ColStatus::Basic {
                    self.status[a] = ColStatus::Lower;
                    self.value[a] = 0.0;
                }
            }
        }

        let costs: Vec<f64> = self.cols.iter().map(|c| c.cost).collect();
        match self.primal_loop(&costs) {
            PrimalEnd::Converged => {
                self.finalize();
                LpStatus::Optimal
            }
            _ => LpStatus::Aborted,
        }
    }

    fn warm_resolve_inner(&mut self) -> LpStatus {
        if !self.try_extend_basis() {
            // the statuses no longer describe the carried basis: rebuild it,
            // and if even that fails start over from scratch
            if self.rebuild_basis().is_err() || self.refactorize().is_err() {
                return self.cold_solve_inner();
            }
        }
        self.compute_values();
        match self.dual_loop() {
            DualEnd::Infeasible => return LpStatus::Infeasible,
            DualEnd::IterationLimit | DualEnd::Singular => return LpStatus::Aborted,
            DualEnd::Converged => {}
        }
        // the dual loop stops at primal feasibility; optimality additionally
        // requires the reduced costs to clear, which the primal loop certifies
        let costs: Vec<f64> = self.cols.iter().map(|c| c.cost).collect();
        match self.primal_loop(&costs) {
            PrimalEnd::Converged => {
                self.finalize();
                LpStatus::Optimal
            }
            _ => LpStatus::Aborted,
        }
    }

    /// Rests every column at a bound and builds a starting basis out of one
    /// logical or artificial column per row. Returns the indices of the
    /// artificial columns introduced for this solve.
    fn initial_point(&mut self) -> Vec<usize> {
        let m = self.rows.len();
        self.basic.clear();

        for j in 0..self.cols.len() {
            let col = &self.cols[j];
            let (status, value) = Self::resting_status(col.lower, col.upper);
            self.status[j] = status;
            self.value[j] = value;
        }

        let mut activity = vec![0.0; m];
        for j in 0..self.cols.len() {
            if self.cols[j].kind == ColKind::Logical {
                continue;
            }
            let v = self.value[j];
            if v != 0.0 {
                for &(i, a) in &self.cols[j].entries {
                    activity[i] += a * v;
                }
            }
        }

        let mut fresh = vec![];
        for i in 0..m {
            let residual = self.rows[i].rhs - activity[i];
            let logical = self.rows[i].logical;
            let (lo, up) = (self.cols[logical].lower, self.cols[logical].upper);
            if residual >= lo - PRIMAL_TOL && residual <= up + PRIMAL_TOL {
                self.status[logical] = ColStatus::Basic;
                self.value[logical] = residual;
                self.basic.push(logical);
            } else {
                // the logical rests at zero, an artificial takes the residual
                let sign = if residual > 0.0 { 1.0 } else { -1.0 };
                let art = self.push_col(Column {
                    lower: 0.0,
                    upper: f64::INFINITY,
                    cost: 0.0,
                    kind: ColKind::Artificial,
                    entries: vec![(i, sign)],
                });
                self.status[art] = ColStatus::Basic;
                self.value[art] = residual.abs();
                self.basic.push(art);
                fresh.push(art);
            }
        }
        fresh
    }

    /// The fast path of a warm re-solve: when the statuses still describe
    /// the basis carried over from the last solve plus the basic logicals of
    /// rows appended since, the inverse needs no refactorization. The basis
    /// matrix then has the block shape `[[B, 0], [C, I]]` (appended rows
    /// touch old basic columns through `C`, appended logicals are unit
    /// columns), whose inverse is `[[B^-1, 0], [-C B^-1, I]]`.
    ///
    /// Returns false when the statuses diverged from the carried basis, in
    /// which case the caller must refactorize.
    fn try_extend_basis(&mut self) -> bool {
        let old_m = self.basic.len();
        let m = self.rows.len();
        if self.binv.rows != old_m || old_m > m {
            return false;
        }
        if self.basic.iter().any(|&j| self.status[j] != ColStatus::Basic) {
            return false;
        }
        for row in &self.rows[old_m..] {
            if self.status[row.logical] != ColStatus::Basic {
                return false;
            }
        }
        let total_basic = self.status.iter().filter(|&&s| s == ColStatus::Basic).count();
        if total_basic != m {
            return false;
        }
        if old_m == m {
            return true;
        }

        let mut ext = Matrix::zeros(m, m);
        for pos in 0..old_m {
            let row = self.binv.row(pos);
            ext.row_mut(pos)[..old_m].copy_from_slice(row);
        }
        for i in old_m..m {
            ext.set(i, i, 1.0);
            // subtract C[i] * B^-1, where C[i] holds the coefficients of the
            // old basic columns in appended row i
            for (pos, &j) in self.basic.iter().enumerate() {
                let mut c = 0.0;
                for &(r, a) in &self.cols[j].entries {
                    if r == i {
                        c += a;
                    }
                }
                if c != 0.0 {
                    for k in 0..old_m {
                        let v = ext.get(i, k) - c * self.binv.get(pos, k);
                        ext.set(i, k, v);
                    }
                }
            }
        }
        self.binv = ext;
        for i in old_m..m {
            self.basic.push(self.rows[i].logical);
        }
        true
    }

    /// Recollects the basis from the column statuses (the order is
    /// irrelevant, only the set matters). Fails when the statuses do not
    /// describe a candidate basis.
    fn rebuild_basis(&mut self) -> Result<(), SingularMatrix> {
        self.basic.clear();
        for j in 0..self.cols.len() {
            if self.status[j] == ColStatus::Basic {
                self.basic.push(j);
            }
        }
        if self.basic.len() == self.rows.len() {
            Ok(())
        } else {
            Err(SingularMatrix)
        }
    }

    /// Rebuilds the explicit inverse of the basis matrix from scratch.
    fn refactorize(&mut self) -> Result<(), SingularMatrix> {
        let m = self.rows.len();
        let mut b = Matrix::zeros(m, m);
        for (pos, &j) in self.basic.iter().enumerate() {
            for &(i, a) in &self.cols[j].entries {
                b.set(i, pos, a);
            }
        }
        let lu = LuDecomposition::decompose(&b, SINGULAR_TOL)?;
        self.binv = lu.inverse();
        Ok(())
    }

    /// Recomputes the values of the basic columns from the nonbasic ones:
    /// `x_B = B^-1 (rhs - N x_N)`.
    fn compute_values(&mut self) {
        let m = self.rows.len();
        let mut residual: Vec<f64> = self.rows.iter().map(|r| r.rhs).collect();
        for j in 0..self.cols.len() {
            if self.status[j] == ColStatus::Basic {
                continue;
            }
            let v = self.value[j];
            if v != 0.0 {
                for &(i, a) in &self.cols[j].entries {
                    residual[i] -= a * v;
                }
            }
        }
        for pos in 0..m {
            let row = self.binv.row(pos);
            let mut v = 0.0;
            for k in 0..m {
                v += row[k] * residual[k];
            }
            self.value[self.basic[pos]] = v;
        }
    }

    /// The dual prices of the rows for the given cost vector:
    /// `y = c_B B^-1`.
    fn btran(&self, costs: &[f64]) -> Vec<f64> {
        let m = self.rows.len();
        let mut y = vec![0.0; m];
        for pos in 0..m {
            let c = costs[self.basic[pos]];
            if c != 0.0 {
                let row = self.binv.row(pos);
                for k in 0..m {
                    y[k] += c * row[k];
                }
            }
        }
        y
    }

    /// The updated representation of one column: `w = B^-1 A_j`.
    fn ftran(&self, j: usize) -> Vec<f64> {
        let m = self.rows.len();
        let mut w = vec![0.0; m];
        for &(r, a) in &self.cols[j].entries {
            for pos in 0..m {
                w[pos] += self.binv.get(pos, r) * a;
            }
        }
        w
    }

    /// Applies the rank-one update turning `B^-1` into the inverse of the
    /// basis where position `r` has been replaced by the column whose updated
    /// representation is `w`.
    fn apply_pivot(&mut self, r: usize, w: &[f64]) {
        let pivot = w[r];
        self.binv.scale_row(r, 1.0 / pivot);
        for pos in 0..w.len() {
            if pos != r && w[pos] != 0.0 {
                self.binv.axpy_rows(pos, r, w[pos]);
            }
        }
    }

    fn iteration_cap(&self) -> usize {
        1000 + 50 * (self.rows.len() + self.cols.len())
    }

    /// Primal simplex iterations under the given cost vector, starting from
    /// the primal feasible basis currently installed. Dantzig pricing with a
    /// switch to Bland's rule past half the iteration budget.
    fn primal_loop(&mut self, costs: &[f64]) -> PrimalEnd {
        let cap = self.iteration_cap();
        let bland_after = cap / 2;
        let mut since_refactor = 0;

        for iter in 0..cap {
            let bland = iter >= bland_after;
            let y = self.btran(costs);

            // pricing: find a nonbasic column whose reduced cost can improve
            let mut entering: Option<(usize, f64)> = None; // (col, d)
            for j in 0..self.cols.len() {
                let status = self.status[j];
                if status == ColStatus::Basic {
                    continue;
                }
                let col = &self.cols[j];
                if col.lower == col.upper {
                    continue;
                }
                let mut d = costs[j];
                for &(i, a) in &col.entries {
                    d -= y[i] * a;
                }
                let eligible = match status {
                    ColStatus::Lower => d < -DUAL_TOL,
                    ColStatus::Upper => d > DUAL_TOL,
                    ColStatus::Free => d.abs() > DUAL_TOL,
                    ColStatus::Basic => false,
                };
                if !eligible {
                    continue;
                }
                if bland {
                    entering = Some((j, d));
                    break;
                }
                if entering.map_or(true, |(_, best)| d.abs() > best.abs()) {
                    entering = Some((j, d));
                }
            }
            let Some((q, d)) = entering else {
                return PrimalEnd::Converged;
            };
            let sigma = match self.status[q] {
                ColStatus::Lower => 1.0,
                ColStatus::Upper => -1.0,
                ColStatus::Free => {
                    if d < 0.0 {
                        1.0
                    } else {
                        -1.0
                    }
                }
                ColStatus::Basic => unreachable!(),
            };
            let w = self.ftran(q);

            // ratio test: the entering column travels until a basic column
            // hits a bound, or until it reaches its own opposite bound
            let mut t_best = self.cols[q].upper - self.cols[q].lower;
            let mut leaving: Option<usize> = None;
            let mut leaving_mag = 0.0;
            for pos in 0..w.len() {
                let delta = sigma * w[pos];
                let j = self.basic[pos];
                let (ratio, mag) = if delta > PIVOT_TOL {
                    ((self.value[j] - self.cols[j].lower) / delta, delta)
                } else if delta < -PIVOT_TOL {
                    ((self.cols[j].upper - self.value[j]) / -delta, -delta)
                } else {
                    continue;
                };
                if !ratio.is_finite() {
                    continue;
                }
                let ratio = ratio.max(0.0);
                let take = match leaving {
                    None => ratio <= t_best,
                    Some(best_pos) => {
                        ratio < t_best - PRIMAL_TOL
                            || (ratio <= t_best + PRIMAL_TOL
                                && if bland {
                                    self.basic[pos] < self.basic[best_pos]
                                } else {
                                    mag > leaving_mag
                                })
                    }
                };
                if take {
                    t_best = t_best.min(ratio);
                    leaving = Some(pos);
                    leaving_mag = mag;
                }
            }
            if t_best.is_infinite() {
                return PrimalEnd::Unbounded;
            }

            match leaving {
                None => {
                    // bound flip: no basic column blocks before the entering
                    // column reaches its opposite bound
                    for pos in 0..w.len() {
                        let j = self.basic[pos];
                        self.value[j] -= t_best * sigma * w[pos];
                    }
                    self.value[q] += sigma * t_best;
                    self.status[q] = match self.status[q] {
                        ColStatus::Lower => ColStatus::Upper,
                        ColStatus::Upper => ColStatus::Lower,
                        other => other,
                    };
                }
                Some(r) => {
                    let out = self.basic[r];
                    let delta_out = sigma * w[r];
                    for pos in 0..w.len() {
                        let j = self.basic[pos];
                        self.value[j] -= t_best * sigma * w[pos];
                    }
                    self.value[q] += sigma * t_best;
                    // the leaving column lands exactly on the bound it ran into
                    if delta_out > 0.0 {
                        self.status[out] = ColStatus::Lower;
                        self.value[out] = self.cols[out].lower;
                    } else {
                        self.status[out] = ColStatus::Upper;
                        self.value[out] = self.cols[out].upper;
                    }
                    self.status[q] = ColStatus::Basic;
                    self.basic[r] = q;
                    self.apply_pivot(r, &w);

                    since_refactor += 1;
                    if since_refactor >= REFACTOR_CYCLE {
                        since_refactor = 0;
                        if self.refactorize().is_err() {
                            return PrimalEnd::Singular;
                        }
                        self.compute_values();
                    }
                }
            }
        }
        PrimalEnd::IterationLimit
    }

    /// Dual simplex iterations under the real cost vector, starting from a
    /// dual feasible basis. Each iteration kicks the most violated basic
    /// column out towards the bound it transgressed and pulls in the nonbasic
    /// column winning the dual ratio test.
    fn dual_loop(&mut self) -> DualEnd {
        let costs: Vec<f64> = self.cols.iter().map(|c| c.cost).collect();
        let cap = self.iteration_cap();
        let bland_after = cap / 2;
        let mut since_refactor = 0;

        for iter in 0..cap {
            let bland = iter >= bland_after;

            // leaving: the basic column with the worst bound violation
            let mut leaving: Option<(usize, f64, bool)> = None; // (pos, violation, below)
            for pos in 0..self.basic.len() {
                let j = self.basic[pos];
                let below = self.cols[j].lower - self.value[j];
                let above = self.value[j] - self.cols[j].upper;
                let (violation, is_below) = if below >= above { (below, true) } else { (above, false) };
                if violation > PRIMAL_TOL {
                    let take = leaving.map_or(true, |(_, worst, _)| violation > worst);
                    if take {
                        leaving = Some((pos, violation, is_below));
                    }
                    if bland {
                        break;
                    }
                }
            }
            let Some((r, _, below)) = leaving else {
                return DualEnd::Converged;
            };

            let y = self.btran(&costs);
            let rho: Vec<f64> = self.binv.row(r).to_vec();

            // entering: dual ratio test, oriented as if the leaving column
            // always exited through its upper bound
            let mut entering: Option<(usize, f64, f64)> = None; // (col, ratio, |alpha|)
            for j in 0..self.cols.len() {
                let status = self.status[j];
                if status == ColStatus::Basic {
                    continue;
                }
                let col = &self.cols[j];
                if col.lower == col.upper {
                    continue;
                }
                let mut alpha = 0.0;
                for &(i, a) in &col.entries {
                    alpha += rho[i] * a;
                }
                if below {
                    alpha = -alpha;
                }
                let eligible = match status {
                    ColStatus::Lower => alpha > PIVOT_TOL,
                    ColStatus::Upper => alpha < -PIVOT_TOL,
                    ColStatus::Free => alpha.abs() > PIVOT_TOL,
                    ColStatus::Basic => false,
                };
                if !eligible {
                    continue;
                }
                let mut d = costs[j];
                for &(i, a) in &col.entries {
                    d -= y[i] * a;
                }
                let ratio = (d / alpha).max(0.0);
                let take = match entering {
                    None => true,
                    Some((best, best_ratio, best_mag)) => {
                        ratio < best_ratio - DUAL_TOL
                            || (ratio <= best_ratio + DUAL_TOL
                                && if bland { j < best } else { alpha.abs() > best_mag })
                    }
                };
                if take {
                    entering = Some((j, ratio, alpha.abs()));
                }
            }
            let Some((q, _, _)) = entering else {
                return DualEnd::Infeasible;
            };

            let w = self.ftran(q);
            let out = self.basic[r];
            let target = if below { self.cols[out].lower } else { self.cols[out].upper };
            let step = (self.value[out] - target) / w[r];
            for pos in 0..w.len() {
                if pos != r {
                    let j = self.basic[pos];
                    self.value[j] -= step * w[pos];
                }
            }
            self.value[q] += step;
            self.status[out] = if below { ColStatus::Lower } else { ColStatus::Upper };
            self.value[out] = target;
            self.status[q] = ColStatus::Basic;
            self.basic[r] = q;
            self.apply_pivot(r, &w);

            since_refactor += 1;
            if since_refactor >= REFACTOR_CYCLE {
                since_refactor = 0;
                if self.refactorize().is_err() {
                    return DualEnd::Singular;
                }
                self.compute_values();
            }
        }
        DualEnd::IterationLimit
    }

    fn finalize(&mut self) {
        self.objective = self
            .cols
            .iter()
            .enumerate()
            .map(|(j, c)| c.cost * self.value[j])
            .sum();
        self.primal_cache = self.value[..self.nb_structural].to_vec();
        self.solved = true;
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################
