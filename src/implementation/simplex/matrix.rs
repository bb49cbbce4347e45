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

//! Small dense linear algebra for the simplex backend: a row-major square
//! matrix and an LU factorization with partial pivoting. The factorization is
//! only ever used to (re)build the explicit inverse of the simplex basis;
//! between two refactorizations the inverse is maintained by rank-one pivot
//! updates.

/// A dense row-major matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![0.0; rows * cols] }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }
    /// A view of one full row.
    #[inline]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }
    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Subtracts `factor` times row `src` from row `dst` (`dst != src`).
    pub fn axpy_rows(&mut self, dst: usize, src: usize, factor: f64) {
        debug_assert!(dst != src);
        let (a, b) = if dst < src {
            let (lo, hi) = self.data.split_at_mut(src * self.cols);
            (&mut lo[dst * self.cols..(dst + 1) * self.cols], &hi[..self.cols])
        } else {
            let (lo, hi) = self.data.split_at_mut(dst * self.cols);
            (&mut hi[..self.cols], &lo[src * self.cols..(src + 1) * self.cols])
        };
        for (d, s) in a.iter_mut().zip(b.iter()) {
            *d -= factor * *s;
        }
    }

    /// Scales one full row by the given factor.
    pub fn scale_row(&mut self, row: usize, factor: f64) {
        for v in self.row_mut(row) {
            *v *= factor;
        }
    }
}

/// The LU factorization (with partial pivoting) of a square matrix:
/// `P * A = L * U` with the unit-diagonal L and U packed into a single
/// matrix and the row permutation kept aside.
#[derive(Debug, Clone)]
pub struct LuDecomposition {
    lu: Matrix,
    perm: Vec<usize>,
}

/// Raised when the matrix handed to the factorization is (numerically)
/// singular. For the simplex backend this means the installed basis is
/// unusable and the model must be solved from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingularMatrix;

impl LuDecomposition {
    /// Factorizes the given square matrix. Pivots smaller than `tol` in
    /// magnitude are treated as zero and make the factorization fail.
    pub fn decompose(a: &Matrix, tol: f64) -> Result<Self, SingularMatrix> {
        debug_assert_eq!(a.rows, a.cols);
        let n = a.rows;
        let mut lu = a.clone();
        let mut perm: Vec<usize> = (0..n).collect();

        for k in 0..n {
            // partial pivoting: bring the largest remaining entry of the
            // column onto the diagonal
            let mut pivot_row = k;
            let mut pivot_mag = lu.get(k, k).abs();
            for r in k + 1..n {
                let mag = lu.get(r, k).abs();
                if mag > pivot_mag {
                    pivot_mag = mag;
                    pivot_row = r;
                }
            }
            if pivot_mag <= tol {
                return Err(SingularMatrix);
            }
            if pivot_row != k {
                for c in 0..n {
                    let tmp = lu.get(k, c);
                    lu.set(k, c, lu.get(pivot_row, c));
                    lu.set(pivot_row, c, tmp);
                }
                perm.swap(k, pivot_row);
            }
            let pivot = lu.get(k, k);
            for r in k + 1..n {
                let factor = lu.get(r, k) / pivot;
                lu.set(r, k, factor);
                for c in k + 1..n {
                    let v = lu.get(r, c) - factor * lu.get(k, c);
                    lu.set(r, c, v);
                }
            }
        }
        Ok(Self { lu, perm })
    }

    /// Solves `A x = b` using the factorization.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.lu.rows;
        debug_assert_eq!(n, b.len());

        // forward substitution on the permuted right-hand side
        let mut x = vec![0.0; n];
        for i in 0..n {
            let mut sum = b[self.perm[i]];
            for j in 0..i {
                sum -= self.lu.get(i, j) * x[j];
            }
            x[i] = sum;
        }
        // backward substitution
        for i in (0..n).rev() {
            let mut sum = x[i];
            for j in i + 1..n {
                sum -= self.lu.get(i, j) * x[j];
            }
            x[i] = sum / self.lu.get(i, i);
        }
        x
    }

    /// Builds the explicit inverse of the factorized matrix, one unit vector
    /// at a time.
    pub fn inverse(&self) -> Matrix {
        let n = self.lu.rows;
        let mut inv = Matrix::zeros(n, n);
        let mut e = vec![0.0; n];
        for k in 0..n {
            e[k] = 1.0;
            let col = self.solve(&e);
            for (i, v) in col.iter().enumerate() {
                inv.set(i, k, *v);
            }
            e[k] = 0.0;
        }
        inv
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_lu {
    use super::*;

    #[test]
    fn solving_against_the_identity_is_a_copy() {
        let mut id = Matrix::zeros(3, 3);
        for i in 0..3 {
            id.set(i, i, 1.0);
        }
        let lu = LuDecomposition::decompose(&id, 1e-12).unwrap();
        assert_eq!(vec![1.0, 2.0, 3.0], lu.solve(&[1.0, 2.0, 3.0]));
    }

    #[test]
    fn a_small_system_is_solved_exactly() {
        // [2 1; 1 3] x = [5; 10] has the solution x = (1, 3)
        let mut a = Matrix::zeros(2, 2);
        a.set(0, 0, 2.0);
        a.set(0, 1, 1.0);
        a.set(1, 0, 1.0);
        a.set(1, 1, 3.0);
        let lu = LuDecomposition::decompose(&a, 1e-12).unwrap();
        let x = lu.solve(&[5.0, 10.0]);
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn pivoting_handles_a_zero_on_the_diagonal() {
        // [0 1; 1 0] swaps the two coordinates
        let mut a = Matrix::zeros(2, 2);
        a.set(0, 1, 1.0);
        a.set(1, 0, 1.0);
        let lu = LuDecomposition::decompose(&a, 1e-12).unwrap();
        let x = lu.solve(&[7.0, 9.0]);
        assert!((x[0] - 9.0).abs() < 1e-12);
        assert!((x[1] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn a_singular_matrix_is_reported() {
        let mut a = Matrix::zeros(2, 2);
        a.set(0, 0, 1.0);
        a.set(0, 1, 2.0);
        a.set(1, 0, 2.0);
        a.set(1, 1, 4.0);
        assert_eq!(Err(SingularMatrix), LuDecomposition::decompose(&a, 1e-9).map(|_| ()));
    }

    #[test]
    fn the_inverse_times_the_matrix_is_the_identity() {
        let mut a = Matrix::zeros(2, 2);
        a.set(0, 0, 4.0);
        a.set(0, 1, 7.0);
        a.set(1, 0, 2.0);
        a.set(1, 1, 6.0);
        let inv = LuDecomposition::decompose(&a, 1e-12).unwrap().inverse();
        // a * inv
        for i in 0..2 {
            for j in 0..2 {
                let mut sum = 0.0;
                for k in 0..2 {
                    sum += a.get(i, k) * inv.get(k, j);
                }
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((sum - expected).abs() < 1e-12);
            }
        }
    }
}
