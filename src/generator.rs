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

//! This module generates random test instances: piecewise-linear samplings of
//! a library of univariate curves for the knapsack variants, and random
//! concave arc costs for the network-flow variants. Everything is driven by a
//! caller-provided random generator so that batches are reproducible from a
//! seed.

use ordered_float::OrderedFloat;
use rand::Rng;

use crate::PwlFunction;

/// A univariate curve together with the interval it is sampled over.
#[derive(Debug, Clone, Copy)]
pub struct Curve {
    pub domain: [f64; 2],
    pub eval: fn(f64) -> f64,
}

fn curve1(x: f64) -> f64 {
    (-3.0 * x - 12.0).exp() - x * x + 20.0
}
fn curve2(x: f64) -> f64 {
    -0.2 * (-x).exp() + x * x
}
fn curve3(x: f64) -> f64 {
    x.powi(3) * (-x * x).exp()
}
fn curve4(x: f64) -> f64 {
    (x.powi(5) - 20.0 * x * x + 5.0) / (x.powi(4) + 1.0)
}
fn curve5(x: f64) -> f64 {
    (3.0 * x).ln() * (2.0 * x).ln() - 1.0
}
fn curve6(x: f64) -> f64 {
    10.0 * x.ln() - 3.0 * x + (x - 5.0) * (x - 5.0)
}
fn curve7(x: f64) -> f64 {
    (-x.powi(5) - 10.0 * x * x) / (x.powi(6) + 5.0)
}
fn curve8(x: f64) -> f64 {
    x * (-x * x).exp()
}
fn curve9(x: f64) -> f64 {
    -x.powi(7) / 5040.0 + x.powi(5) / 120.0 - x.powi(3) / 3.0 + x
}
fn curve10(x: f64) -> f64 {
    (x * x - 5.0 * x + 6.0) / (x * x + 1.0) - 1.0
}
fn curve11(x: f64) -> f64 {
    x.powi(4) - 12.0 * x.powi(3) + 47.0 * x * x - 60.0 * x
}
fn curve12(x: f64) -> f64 {
    x.powi(6) - 15.0 * x.powi(4) + 27.0 * x * x + 250.0
}
fn curve13(x: f64) -> f64 {
    x.powi(4) - 10.0 * x.powi(3) + 35.0 * x * x - 50.0 * x + 24.0
}
fn curve14(x: f64) -> f64 {
    0.2 * x.powi(5) - 1.25 * x.powi(4) + 2.33 * x.powi(3) - 2.5 * x * x + 6.0 * x
}
fn curve15(x: f64) -> f64 {
    x.powi(3) - 7.0 * x + 7.0
}
fn curve16(x: f64) -> f64 {
    (x.powi(4) - 4.0 * x + 10.0) / (x * x + 1.0) - 1.0
}
fn curve17(x: f64) -> f64 {
    -x.powi(5) * (-x * x).exp()
}
fn curve18(x: f64) -> f64 {
    x.powi(5) - 3.0 * x.powi(4) + 4.0 * x.powi(3) + 2.0 * x * x - 10.0 * x - 4.0
}
fn curve19(x: f64) -> f64 {
    (x.powi(3) - 5.0 * x + 6.0) / (x * x + 1.0) - 1.0
}
fn curve20(x: f64) -> f64 {
    1.0 / x + 2.0 * x.ln() - 2.0
}

/// The curve library the knapsack instances sample from. Most of these are
/// nonconvex over their interval; a few are well behaved so that mixtures
/// stay interesting.
pub const CURVES: [Curve; 20] = [
    Curve { domain: [-5.0, 5.0], eval: curve1 },
    Curve { domain: [-5.0, 5.0], eval: curve2 },
    Curve { domain: [-5.0, 5.0], eval: curve3 },
    Curve { domain: [-10.0, 10.0], eval: curve4 },
    Curve { domain: [0.1, 10.0], eval: curve5 },
    Curve { domain: [0.1, 10.0], eval: curve6 },
    Curve { domain: [-10.0, 10.0], eval: curve7 },
    Curve { domain: [-5.0, 5.0], eval: curve8 },
    Curve { domain: [-4.0, 4.0], eval: curve9 },
    Curve { domain: [-10.0, 10.0], eval: curve10 },
    Curve { domain: [-1.0, 7.0], eval: curve11 },
    Curve { domain: [-4.0, 4.0], eval: curve12 },
    Curve { domain: [0.0, 5.0], eval: curve13 },
    Curve { domain: [-1.0, 4.0], eval: curve14 },
    Curve { domain: [-4.0, 4.0], eval: curve15 },
    Curve { domain: [-5.0, 5.0], eval: curve16 },
    Curve { domain: [-10.0, 10.0], eval: curve17 },
    Curve { domain: [-1.5, 3.0], eval: curve18 },
    Curve { domain: [-5.0, 5.0], eval: curve19 },
    Curve { domain: [0.1, 10.0], eval: curve20 },
];

/// Samples the given curve at `segments - 1` random interior points plus the
/// two ends of its domain.
pub fn sampled_function(curve: &Curve, segments: usize, rng: &mut impl Rng) -> PwlFunction {
    let [lo, hi] = curve.domain;
    loop {
        let mut xs: Vec<f64> = (0..segments.saturating_sub(1))
            .map(|_| rng.gen_range(lo..hi))
            .collect();
        xs.push(lo);
        xs.push(hi);
        xs.sort_unstable_by_key(|&v| OrderedFloat(v));
        // colliding samples would break the strict breakpoint ordering;
        // resample (this essentially never happens with doubles)
        if xs.windows(2).any(|w| w[0] >= w[1]) {
            continue;
        }
        let ys: Vec<f64> = xs.iter().map(|&x| (curve.eval)(x)).collect();
        return PwlFunction::new(xs, ys).expect("sampled breakpoints are strictly increasing");
    }
}

/// Rearranges the segments of a function by decreasing slope, which turns any
/// sampling into a concave function over the same domain and with the same
/// starting value.
pub fn concave_resorted(f: &PwlFunction) -> PwlFunction {
    let xs = f.breakpoints_x().to_vec();
    let ys = f.breakpoints_y();
    let mut slopes: Vec<f64> = xs
        .windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| (y[1] - y[0]) / (x[1] - x[0]))
        .collect();
    slopes.sort_unstable_by_key(|&s| std::cmp::Reverse(OrderedFloat(s)));

    let mut new_ys = Vec::with_capacity(ys.len());
    new_ys.push(ys[0]);
    for (k, slope) in slopes.iter().enumerate() {
        let dy = slope * (xs[k + 1] - xs[k]);
        new_ys.push(new_ys[k] + dy);
    }
    PwlFunction::new(xs, new_ys).expect("the x breakpoints are unchanged")
}

/// Generates the cost functions of a knapsack instance: each variable gets a
/// sampling of a randomly selected library curve, made concave on demand.
pub fn knapsack_functions(
    n: usize,
    segments: usize,
    concave: bool,
    rng: &mut impl Rng,
) -> Vec<PwlFunction> {
    (0..n)
        .map(|_| {
            let curve = &CURVES[rng.gen_range(0..CURVES.len())];
            let f = sampled_function(curve, segments, rng);
            if concave {
                concave_resorted(&f)
            } else {
                f
            }
        })
        .collect()
}

/// Generates concave increasing arc costs for a network-flow instance: each
/// arc starts at (0, 0), caps its capacity somewhere in [5, 50], and climbs
/// with slopes drawn in [0.001, 2] sorted decreasingly.
pub fn network_functions(n: usize, segments: usize, rng: &mut impl Rng) -> Vec<PwlFunction> {
    (0..n).map(|_| network_arc(segments, 0.0, rng)).collect()
}

/// Generates the arc costs of a fixed-charge (discontinuous) network-flow
/// instance: like the concave arcs, but shifted up by a positive charge that
/// is only incurred away from the origin.
pub fn discontinuous_network_functions(
    n: usize,
    segments: usize,
    rng: &mut impl Rng,
) -> Vec<PwlFunction> {
    (0..n)
        .map(|_| {
            let charge = rng.gen_range(1.0..10.0);
            network_arc(segments, charge, rng)
        })
        .collect()
}

fn network_arc(segments: usize, charge: f64, rng: &mut impl Rng) -> PwlFunction {
    let capacity = rng.gen_range(5.0..50.0);
    loop {
        let mut xs: Vec<f64> = (0..segments.saturating_sub(1))
            .map(|_| rng.gen_range(0.0..capacity))
            .collect();
        xs.push(0.0);
        xs.push(capacity);
        xs.sort_unstable_by_key(|&v| OrderedFloat(v));
        if xs.windows(2).any(|w| w[0] >= w[1]) {
            continue;
        }
        let mut slopes: Vec<f64> = (0..segments)
            .map(|_| rng.gen_range(1.0..2000.0) / 1000.0)
            .collect();
        slopes.sort_unstable_by_key(|&s| std::cmp::Reverse(OrderedFloat(s)));

        let mut ys = Vec::with_capacity(xs.len());
        ys.push(charge);
        for (k, slope) in slopes.iter().enumerate() {
            let dy = slope * (xs[k + 1] - xs[k]);
            ys.push(ys[k] + dy);
        }
        return PwlFunction::new(xs, ys).expect("sampled breakpoints are strictly increasing");
    }
}

/// Draws a right-hand side for a knapsack instance: a point in the middle
/// half of the reachable interval, so that the equality is always attainable.
pub fn knapsack_rhs(functions: &[PwlFunction], rng: &mut impl Rng) -> f64 {
    let lower: f64 = functions.iter().map(|f| f.bounds().0).sum();
    let upper: f64 = functions.iter().map(|f| f.bounds().1).sum();
    let length = upper - lower;
    rng.gen_range(lower + 0.25 * length..upper - 0.25 * length)
}

/// Draws the node balances of a network-flow instance over `nr` nodes: each
/// node is a transshipment, supply, or demand node with equal probability,
/// and the last node absorbs the imbalance so that total flow is conserved.
pub fn flow_rhs(nr: usize, rng: &mut impl Rng) -> Vec<f64> {
    let mut rhs: Vec<f64> = (0..nr.saturating_sub(1))
        .map(|_| match rng.gen_range(1..=3) {
            1 => 0.0,
            2 => rng.gen_range(5.0..50.0),
            _ => -rng.gen_range(5.0..50.0),
        })
        .collect();
    let balance: f64 = rhs.iter().sum();
    rhs.push(-balance);
    rhs
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_generator {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn the_same_seed_reproduces_the_same_instance() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        let fa = knapsack_functions(3, 10, false, &mut a);
        let fb = knapsack_functions(3, 10, false, &mut b);
        assert_eq!(fa, fb);
    }

    #[test]
    fn sampled_functions_have_the_requested_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        for curve in CURVES.iter() {
            let f = sampled_function(curve, 25, &mut rng);
            assert_eq!(25, f.nb_segments());
            assert_eq!(curve.domain[0], f.bounds().0);
            assert_eq!(curve.domain[1], f.bounds().1);
            assert!(f.breakpoints_x().windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn concave_resorting_yields_decreasing_slopes() {
        let mut rng = StdRng::seed_from_u64(11);
        let f = sampled_function(&CURVES[3], 30, &mut rng);
        let g = concave_resorted(&f);
        let slopes: Vec<f64> = g
            .breakpoints_x()
            .windows(2)
            .zip(g.breakpoints_y().windows(2))
            .map(|(x, y)| (y[1] - y[0]) / (x[1] - x[0]))
            .collect();
        assert!(slopes.windows(2).all(|w| w[0] >= w[1]));
        // domain and starting value are preserved
        assert_eq!(f.bounds(), g.bounds());
        assert_eq!(f.breakpoints_y()[0], g.breakpoints_y()[0]);
    }

    #[test]
    fn network_arcs_are_concave_increasing_from_the_origin() {
        let mut rng = StdRng::seed_from_u64(5);
        for f in network_functions(6, 12, &mut rng) {
            assert_eq!(0.0, f.bounds().0);
            assert_eq!(0.0, f.breakpoints_y()[0]);
            assert!(f.breakpoints_y().windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn discontinuous_arcs_carry_a_positive_charge() {
        let mut rng = StdRng::seed_from_u64(5);
        for f in discontinuous_network_functions(6, 12, &mut rng) {
            assert!(f.breakpoints_y()[0] >= 1.0);
            // the jump: the evaluated value at the origin is still zero
            assert_eq!(0.0, f.evaluate(0.0, true));
        }
    }

    #[test]
    fn the_knapsack_rhs_is_always_attainable() {
        let mut rng = StdRng::seed_from_u64(23);
        let functions = knapsack_functions(8, 15, false, &mut rng);
        for _ in 0..20 {
            let rhs = knapsack_rhs(&functions, &mut rng);
            let lower: f64 = functions.iter().map(|f| f.bounds().0).sum();
            let upper: f64 = functions.iter().map(|f| f.bounds().1).sum();
            assert!(lower < rhs && rhs < upper);
        }
    }

    #[test]
    fn flow_balances_sum_to_zero() {
        let mut rng = StdRng::seed_from_u64(31);
        for _ in 0..20 {
            let rhs = flow_rhs(10, &mut rng);
            assert_eq!(10, rhs.len());
            assert!(rhs.iter().sum::<f64>().abs() < 1e-9);
        }
    }
}
