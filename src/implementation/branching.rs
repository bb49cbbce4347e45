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

//! This module provides the branching rule of the search: the largest-error
//! rule picks the variable whose relaxation is the poorest at the current
//! relaxed optimum, and splits its interval right at that optimum.

use std::sync::Arc;

use crate::Envelope;

/// A branching decision: the variable to split, the point where its interval
/// is divided, and the position of that point within the variable's current
/// envelope (the index of the first envelope breakpoint strictly beyond it).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Branching {
    pub variable: usize,
    pub point: f64,
    pub position: usize,
}

/// Applies the largest-error rule to a solved relaxation. `primal` is the
/// full primal vector of the relaxation (the n variable values followed by
/// the n epigraph values) and `values` caches the true function value of each
/// variable at that point.
///
/// Since every epigraph value lies on (or above) a convex under-estimator of
/// its function, each error `values[i] - primal[n + i]` is non-negative; the
/// variable with the largest one is where the relaxation lies the most and
/// where splitting pays off the most. Ties go to the lowest index.
pub fn largest_error(primal: &[f64], values: &[f64], envelopes: &[Arc<Envelope>]) -> Branching {
    let n = values.len();
    let mut variable = 0;
    let mut worst = f64::NEG_INFINITY;
    for (i, &value) in values.iter().enumerate() {
        let error = value - primal[n + i];
        if error > worst {
            worst = error;
            variable = i;
        }
    }
    let point = primal[variable];
    let position = envelopes[variable].position_after(point);
    Branching { variable, point, position }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_largest_error {
    use crate::*;
    use std::sync::Arc;

    fn envelope(points: &[(f64, f64)]) -> Arc<Envelope> {
        let (x, y) = points.iter().copied().unzip();
        Arc::new(Envelope::new(x, y))
    }

    #[test]
    fn the_variable_with_the_largest_error_is_selected() {
        let envelopes = vec![
            envelope(&[(0.0, 0.0), (4.0, 4.0)]),
            envelope(&[(0.0, 0.0), (4.0, 4.0)]),
        ];
        // x = (1, 3), e = (0.5, 1.0), true values = (1.0, 3.0)
        let primal = [1.0, 3.0, 0.5, 1.0];
        let values = [1.0, 3.0];
        let branching = largest_error(&primal, &values, &envelopes);
        assert_eq!(1, branching.variable);
        assert_eq!(3.0, branching.point);
    }

    #[test]
    fn ties_go_to_the_lowest_index() {
        let envelopes = vec![
            envelope(&[(0.0, 0.0), (4.0, 4.0)]),
            envelope(&[(0.0, 0.0), (4.0, 4.0)]),
        ];
        let primal = [2.0, 2.0, 1.0, 1.0];
        let values = [2.0, 2.0];
        let branching = largest_error(&primal, &values, &envelopes);
        assert_eq!(0, branching.variable);
    }

    #[test]
    fn the_position_splits_the_envelope_after_the_point() {
        let envelopes = vec![envelope(&[(0.0, 0.0), (2.0, -1.0), (4.0, 4.0)])];
        let primal = [2.5, 0.0];
        let values = [3.0];
        let branching = largest_error(&primal, &values, &envelopes);
        assert_eq!(0, branching.variable);
        assert_eq!(2.5, branching.point);
        assert_eq!(2, branching.position);
    }
}
