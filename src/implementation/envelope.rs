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

//! This module provides the construction of the lower convex envelope of a
//! piecewise-linear function over a sub-interval of its domain. The envelope
//! is the tightest convex under-estimator of the function on that interval;
//! its linear pieces become the cuts of the linear relaxation, and refining
//! it on ever smaller intervals is what closes the optimality gap along a
//! branch of the search tree.

use crate::{Envelope, PwlFunction};

/// Computes the lower convex envelope of `f` restricted to `[a, b]`, which
/// must be included in the domain of `f`.
///
/// The function is first restricted to the interval: interior breakpoints are
/// kept and the two interval ends are inserted with their interpolated
/// values. When `jump_at_zero` is set and the interval reaches the origin,
/// the leftmost value is pulled down to zero: the fixed charge is not paid at
/// the origin itself, so the envelope must anchor there. The restricted point
/// sequence is then reduced to its lower hull by a monotone chain: a point is
/// appended and the previously accepted point is popped for as long as it
/// leaves the chain with a decreasing slope.
///
/// The result has at most two breakpoints more than `f` and is produced in
/// time linear in the number of breakpoints of `f`.
pub fn lower_envelope(f: &PwlFunction, interval: (f64, f64), jump_at_zero: bool) -> Envelope {
    let xs = f.breakpoints_x();
    let ys = f.breakpoints_y();
    let (a, b) = interval;
    let last = xs.len() - 1;

    let (mut px, mut py) = if a == xs[0] && b == xs[last] {
        (xs.to_vec(), ys.to_vec())
    } else {
        let pos_left = xs.partition_point(|&v| v <= a);
        let pos_right = xs.partition_point(|&v| v < b);
        let ya = (ys[pos_left] - ys[pos_left - 1]) / (xs[pos_left] - xs[pos_left - 1])
            * (a - xs[pos_left - 1])
            + ys[pos_left - 1];
        let yb = (ys[pos_right] - ys[pos_right - 1]) / (xs[pos_right] - xs[pos_right - 1])
            * (b - xs[pos_right - 1])
            + ys[pos_right - 1];

        let mut px = Vec::with_capacity(xs.len() + 2);
        let mut py = Vec::with_capacity(ys.len() + 2);
        px.push(a);
        py.push(ya);
        if pos_left < pos_right {
            px.extend_from_slice(&xs[pos_left..pos_right]);
            py.extend_from_slice(&ys[pos_left..pos_right]);
        }
        px.push(b);
        py.push(yb);
        (px, py)
    };

    if jump_at_zero && a <= 0.0 {
        py[0] = 0.0;
    }

    let mut hx: Vec<f64> = Vec::with_capacity(px.len());
    let mut hy: Vec<f64> = Vec::with_capacity(py.len());
    for (&x, &y) in px.iter().zip(py.iter()) {
        while hx.len() >= 2 {
            let n = hx.len();
            let to_candidate = (y - hy[n - 1]) / (x - hx[n - 1]);
            let last_accepted = (hy[n - 1] - hy[n - 2]) / (hx[n - 1] - hx[n - 2]);
            if to_candidate < last_accepted {
                hx.pop();
                hy.pop();
            } else {
                break;
            }
        }
        hx.push(x);
        hy.push(y);
    }

    Envelope::new(hx, hy)
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_lower_envelope {
    use crate::*;

    fn plf(x: Vec<f64>, y: Vec<f64>) -> PwlFunction {
        PwlFunction::new(x, y).unwrap()
    }
    fn full(f: &PwlFunction) -> (f64, f64) {
        f.bounds()
    }

    #[test]
    fn a_convex_function_is_its_own_envelope() {
        let f = plf(vec![-2.0, 0.0, 2.0], vec![4.0, -1.0, 4.0]);
        let env = lower_envelope(&f, full(&f), false);
        assert_eq!(f.breakpoints_x(), env.breakpoints_x());
        assert_eq!(f.breakpoints_y(), env.breakpoints_y());
    }

    #[test]
    fn a_concave_function_collapses_to_its_chord() {
        let f = plf(vec![0.0, 1.0, 2.0], vec![0.0, 2.0, 3.0]);
        let env = lower_envelope(&f, full(&f), false);
        assert_eq!(&[0.0, 2.0], env.breakpoints_x());
        assert_eq!(&[0.0, 3.0], env.breakpoints_y());
    }

    #[test]
    fn restriction_interpolates_the_interval_ends() {
        let f = plf(vec![-1.0, 0.0, 1.0], vec![1.0, 0.0, 1.0]);
        let env = lower_envelope(&f, (-0.5, 0.75), false);
        assert_eq!(&[-0.5, 0.0, 0.75], env.breakpoints_x());
        assert_eq!(&[0.5, 0.0, 0.75], env.breakpoints_y());
    }

    #[test]
    fn restriction_drops_the_breakpoints_outside_of_the_interval() {
        let f = plf(
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![0.0, 3.0, 1.0, 4.0, 0.5],
        );
        let env = lower_envelope(&f, (0.5, 2.5), false);
        // the restricted sequence is (0.5, 1.5), (1, 3), (2, 1), (2.5, 2.5)
        // and the hull drops the (1, 3) bump
        assert_eq!(&[0.5, 2.0, 2.5], env.breakpoints_x());
        assert_eq!(&[1.5, 1.0, 2.5], env.breakpoints_y());
    }

    #[test]
    fn the_envelope_never_exceeds_the_function() {
        let f = plf(
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            vec![2.0, -1.0, 3.0, 0.0, 4.0, -2.0],
        );
        let env = lower_envelope(&f, full(&f), false);
        let mut t = 0.0;
        while t <= 5.0 {
            assert!(env.value_at(t) <= f.evaluate(t, false) + 1e-9);
            t += 0.05;
        }
    }

    #[test]
    fn envelope_slopes_are_increasing() {
        let f = plf(
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            vec![2.0, -1.0, 3.0, 0.0, 4.0, -2.0],
        );
        let env = lower_envelope(&f, full(&f), false);
        let slopes: Vec<f64> = env.segments().map(|s| s.slope).collect();
        assert!(slopes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn the_jump_anchors_the_envelope_at_the_origin() {
        let f = plf(vec![0.0, 5.0, 10.0], vec![3.0, 4.0, 8.0]);
        let env = lower_envelope(&f, full(&f), true);
        assert_eq!(0.0, env.breakpoints_y()[0]);
        // with the fixed charge gone, (5, 4) survives as a hull point
        assert_eq!(&[0.0, 5.0, 10.0], env.breakpoints_x());
        assert_eq!(&[0.0, 4.0, 8.0], env.breakpoints_y());
    }

    #[test]
    fn the_jump_is_only_applied_when_the_interval_reaches_the_origin() {
        let f = plf(vec![0.0, 5.0, 10.0], vec![3.0, 4.0, 8.0]);
        let env = lower_envelope(&f, (2.0, 10.0), true);
        // f(2) = 3.4: the fixed charge is sunk on this sub-interval
        assert!((env.breakpoints_y()[0] - 3.4).abs() < 1e-12);
    }

    #[test]
    fn evaluating_the_envelope_at_its_own_breakpoints_is_exact() {
        let f = plf(
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![0.0, 3.0, 1.0, 4.0, 0.5],
        );
        let env = lower_envelope(&f, full(&f), false);
        for (&x, &y) in env.breakpoints_x().iter().zip(env.breakpoints_y()) {
            assert_eq!(y, env.value_at(x));
        }
    }
}
