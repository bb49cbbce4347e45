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

//! This module defines the most basic data types that are used throughout all
//! the code of our library (both at the abstraction and implementation levels).
//! These are also the types your client code is likely to work with: piecewise
//! linear functions, their convex envelopes, problem instances, and the outcome
//! of a resolution.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use derive_builder::Builder;

// ----------------------------------------------------------------------------
// --- PIECEWISE LINEAR FUNCTION ----------------------------------------------
// ----------------------------------------------------------------------------

/// A univariate piecewise-linear function given by its breakpoints. The
/// x-values are strictly increasing and the first and last of them double as
/// the lower and upper bound of the variable the function is attached to.
/// Outside of that range, the function keeps its boundary value.
#[derive(Debug, Clone, PartialEq)]
pub struct PwlFunction {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl PwlFunction {
    /// Creates a function from its breakpoints. This fails whenever the two
    /// lists differ in length, comprise less than two points, or the x-values
    /// are not strictly increasing.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, InstanceError> {
        if x.len() != y.len() {
            return Err(InstanceError::MismatchedBreakpoints);
        }
        if x.len() < 2 {
            return Err(InstanceError::TooFewBreakpoints);
        }
        if x.windows(2).any(|w| w[0] >= w[1]) {
            return Err(InstanceError::UnorderedBreakpoints);
        }
        Ok(Self { x, y })
    }

    /// The x-values of the breakpoints.
    pub fn breakpoints_x(&self) -> &[f64] {
        &self.x
    }
    /// The y-values of the breakpoints.
    pub fn breakpoints_y(&self) -> &[f64] {
        &self.y
    }
    /// The number of linear segments (one less than the number of breakpoints).
    pub fn nb_segments(&self) -> usize {
        self.x.len() - 1
    }
    /// The domain of the variable this function is attached to.
    pub fn bounds(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    /// Evaluates the function at the given point. When `jump_at_zero` is set
    /// and the domain starts at (or below) the origin, the function value at
    /// the left end of the domain is zero rather than y0: this models a fixed
    /// charge that is only incurred as soon as the variable becomes positive.
    ///
    /// The lookup bisects on strict greater-than, so a point falling exactly
    /// on a breakpoint is consistently evaluated on its right segment.
    pub fn evaluate(&self, point: f64, jump_at_zero: bool) -> f64 {
        let last = self.x.len() - 1;
        if point <= self.x[0] {
            if jump_at_zero && self.x[0] <= 0.0 {
                0.0
            } else {
                self.y[0]
            }
        } else if point >= self.x[last] {
            self.y[last]
        } else {
            let pos = self.x.partition_point(|&v| v <= point);
            let slope = (self.y[pos] - self.y[pos - 1]) / (self.x[pos] - self.x[pos - 1]);
            slope * (point - self.x[pos - 1]) + self.y[pos - 1]
        }
    }
}

// ----------------------------------------------------------------------------
// --- ENVELOPE ---------------------------------------------------------------
// ----------------------------------------------------------------------------

/// One linear piece of an envelope: a slope anchored at the segment's left
/// breakpoint. The affine map it stands for is
/// `x -> slope * (x - anchor_x) + anchor_y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub slope: f64,
    pub anchor_x: f64,
    pub anchor_y: f64,
}

/// The lower convex envelope of a piecewise-linear function restricted to a
/// sub-interval of its domain. It is itself a piecewise-linear function whose
/// breakpoints have strictly increasing x-values *and* strictly increasing
/// segment slopes, and whose end points coincide with the restricted function
/// (or with the jump-adjusted value at the origin).
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl Envelope {
    /// Wraps the given breakpoints. The x-values must be strictly increasing
    /// (checked in debug builds only).
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Self {
        debug_assert!(x.len() == y.len() && x.len() >= 2);
        debug_assert!(x.windows(2).all(|w| w[0] < w[1]));
        Self { x, y }
    }

    pub fn breakpoints_x(&self) -> &[f64] {
        &self.x
    }
    pub fn breakpoints_y(&self) -> &[f64] {
        &self.y
    }
    pub fn nb_breakpoints(&self) -> usize {
        self.x.len()
    }

    /// Iterates over the linear pieces of the envelope, each reported as a
    /// slope anchored at its left breakpoint.
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.x.windows(2).zip(self.y.windows(2)).map(|(xs, ys)| Segment {
            slope: (ys[1] - ys[0]) / (xs[1] - xs[0]),
            anchor_x: xs[0],
            anchor_y: ys[0],
        })
    }

    /// The index of the first breakpoint whose x-value is strictly greater
    /// than the given point. This is the position where the branching rule
    /// splits the envelope in two.
    pub fn position_after(&self, point: f64) -> usize {
        self.x.partition_point(|&v| v <= point)
    }

    /// Evaluates the envelope at the given point (boundary value outside of
    /// its interval).
    pub fn value_at(&self, point: f64) -> f64 {
        let last = self.x.len() - 1;
        if point <= self.x[0] {
            self.y[0]
        } else if point >= self.x[last] {
            self.y[last]
        } else {
            let pos = self.x.partition_point(|&v| v <= point);
            let slope = (self.y[pos] - self.y[pos - 1]) / (self.x[pos] - self.x[pos - 1]);
            slope * (point - self.x[pos - 1]) + self.y[pos - 1]
        }
    }
}

// ----------------------------------------------------------------------------
// --- PROBLEM CLASS ----------------------------------------------------------
// ----------------------------------------------------------------------------

/// The closed set of constraint shapes the solver knows how to deal with.
/// The three knapsack variants share a single aggregate equality while the
/// two network-flow variants impose one balance equality per node of a
/// complete directed graph. Only the discontinuous variant carries the
/// fixed-charge jump at the origin.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ProblemClass {
    Knapsack,
    ConcaveKnapsack,
    GlobalKnapsack,
    NetworkFlow,
    DiscontinuousNetworkFlow,
}

impl ProblemClass {
    /// True for the variants constrained by a single aggregate equality.
    pub fn is_knapsack(self) -> bool {
        matches!(
            self,
            ProblemClass::Knapsack | ProblemClass::ConcaveKnapsack | ProblemClass::GlobalKnapsack
        )
    }
    /// True when the objective functions have an implicit fixed charge: their
    /// value drops to zero at the origin.
    pub fn jump_at_zero(self) -> bool {
        matches!(self, ProblemClass::DiscontinuousNetworkFlow)
    }
}

impl std::fmt::Display for ProblemClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            ProblemClass::Knapsack => "knapsack",
            ProblemClass::ConcaveKnapsack => "concave-knapsack",
            ProblemClass::GlobalKnapsack => "global-knapsack",
            ProblemClass::NetworkFlow => "network-flow",
            ProblemClass::DiscontinuousNetworkFlow => "discontinuous-network-flow",
        };
        write!(f, "{tag}")
    }
}

impl FromStr for ProblemClass {
    type Err = InstanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "knapsack" => Ok(ProblemClass::Knapsack),
            "concave-knapsack" => Ok(ProblemClass::ConcaveKnapsack),
            "global-knapsack" => Ok(ProblemClass::GlobalKnapsack),
            "network flow" | "network-flow" => Ok(ProblemClass::NetworkFlow),
            "discontinuous network flow" | "discontinuous-network-flow" => {
                Ok(ProblemClass::DiscontinuousNetworkFlow)
            }
            _ => Err(InstanceError::UnknownProblem(s.to_string())),
        }
    }
}

// ----------------------------------------------------------------------------
// --- INSTANCE ---------------------------------------------------------------
// ----------------------------------------------------------------------------

/// A problem instance: one piecewise-linear cost per variable, the constraint
/// shape, and the right-hand side of the constraints (a single value for the
/// knapsack variants, one value per node for the network-flow variants).
#[derive(Debug, Clone)]
pub struct Instance {
    functions: Vec<PwlFunction>,
    problem: ProblemClass,
    rhs: Vec<f64>,
}

impl Instance {
    /// Assembles and validates an instance. Network-flow instances must have
    /// a square number of variables (one per arc of a complete directed
    /// graph) and a right-hand side entry per node; knapsack instances take a
    /// single right-hand side value. All functions must have the same number
    /// of segments.
    pub fn new(
        functions: Vec<PwlFunction>,
        problem: ProblemClass,
        rhs: Vec<f64>,
    ) -> Result<Self, InstanceError> {
        if functions.is_empty() {
            return Err(InstanceError::TooFewBreakpoints);
        }
        let segments = functions[0].nb_segments();
        if functions.iter().any(|f| f.nb_segments() != segments) {
            return Err(InstanceError::MixedSegmentCounts);
        }
        if problem.is_knapsack() {
            if rhs.len() != 1 {
                return Err(InstanceError::RhsShape);
            }
        } else {
            let side = integer_sqrt(functions.len()).ok_or(InstanceError::NotASquare)?;
            if rhs.len() != side {
                return Err(InstanceError::RhsShape);
            }
        }
        Ok(Self { functions, problem, rhs })
    }

    pub fn nb_variables(&self) -> usize {
        self.functions.len()
    }
    pub fn nb_segments(&self) -> usize {
        self.functions[0].nb_segments()
    }
    pub fn problem(&self) -> ProblemClass {
        self.problem
    }
    pub fn rhs(&self) -> &[f64] {
        &self.rhs
    }
    pub fn function(&self, i: usize) -> &PwlFunction {
        &self.functions[i]
    }
    pub fn functions(&self) -> &[PwlFunction] {
        &self.functions
    }
    /// The number of nodes of the flow network (the square root of the number
    /// of variables). Meaningless for knapsack instances.
    pub fn side(&self) -> usize {
        integer_sqrt(self.functions.len()).unwrap_or(0)
    }
}

fn integer_sqrt(n: usize) -> Option<usize> {
    let r = (n as f64).sqrt().round() as usize;
    if r * r == n {
        Some(r)
    } else {
        None
    }
}

// ----------------------------------------------------------------------------
// --- SEARCH NODE ------------------------------------------------------------
// ----------------------------------------------------------------------------

/// An open node of the branch-and-bound tree. It owns its linear relaxation
/// (together with the basis of the last re-solve, which seeds the warm start
/// of its children) and the current convex envelope of every variable over
/// this node's sub-domain.
///
/// # Note
/// The envelopes of the variables that were *not* branched on are shared with
/// the parent node through reference counting: a child never mutates them, it
/// only substitutes a fresh envelope at the branched index. A parent envelope
/// thus remains valid until every node referring to it has been fathomed.
#[derive(Clone)]
pub struct Node<L> {
    /// The linear relaxation of this node, solved to optimality.
    pub lp: L,
    /// The convex envelope of each variable over this node's sub-domain.
    pub envelopes: Vec<Arc<Envelope>>,
    /// The true function value of each variable at the relaxed optimum.
    /// Caching these avoids a re-evaluation when the node is branched on.
    pub values: Vec<f64>,
    /// The objective value of the relaxation: a lower bound on anything
    /// feasible within this node's sub-domain.
    pub lb: f64,
    /// The depth of this node in the search tree (the root sits at 0).
    pub depth: usize,
}

// ----------------------------------------------------------------------------
// --- PARAMETERS -------------------------------------------------------------
// ----------------------------------------------------------------------------

/// The knobs of a resolution: a wall-clock budget and the relative optimality
/// gap under which the search stops.
#[derive(Debug, Clone, Builder)]
#[builder(default)]
pub struct Parameters {
    /// The wall-clock budget for the complete resolution.
    pub time_limit: Duration,
    /// The relative gap `(ub - lb) / |ub|` deemed sufficient for termination.
    pub epsilon: f64,
}

impl Default for Parameters {
    fn default() -> Self {
        Self { time_limit: Duration::from_secs(1800), epsilon: 1e-5 }
    }
}

// ----------------------------------------------------------------------------
// --- OUTCOME ----------------------------------------------------------------
// ----------------------------------------------------------------------------

/// The reason why a resolution came to an end.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SolveStatus {
    /// The gap between the global bounds dropped below epsilon (possibly
    /// because the frontier ran empty, in which case the gap is zero).
    Optimal,
    /// The wall-clock budget was exhausted; the reported bounds are the best
    /// ones proved so far.
    TimeLimit,
    /// The root relaxation admits no feasible point.
    Infeasible,
    /// The memory guard tripped and the search was given up.
    MemoryLimit,
}

/// The elapsed time reported when the memory guard aborts a resolution. It
/// deliberately exceeds the customary 1800s budget by one second so that
/// aborted runs sort with the timeouts in downstream result tables.
pub const MEMORY_ABORT: Duration = Duration::from_secs(1801);

/// Wall-clock accounting of the four dominant sub-operations of a resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct Timings {
    /// Time spent constructing lower convex envelopes.
    pub envelope: Duration,
    /// Time spent building and amending linear models (copies, added rows,
    /// basis installs).
    pub model: Duration,
    /// Time spent inside the linear solver itself.
    pub lp: Duration,
    /// Time spent evaluating the piecewise-linear functions.
    pub evaluation: Duration,
}

/// Everything a resolution has to report: the termination status, the global
/// bounds and the point attaining the upper one, the bound proved at the root,
/// the number of explored nodes and the time accounting.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub elapsed: Duration,
    pub timings: Timings,
    /// The number of nodes explored: the root plus two children per
    /// branching iteration.
    pub node_count: usize,
    pub upper_bound: f64,
    pub lower_bound: f64,
    /// The best feasible point found (one value per variable).
    pub incumbent: Vec<f64>,
    /// The lower bound proved by the root relaxation alone.
    pub root_bound: f64,
}

impl SolveOutcome {
    /// The relative optimality gap this outcome certifies.
    pub fn gap(&self) -> f64 {
        (self.upper_bound - self.lower_bound) / self.upper_bound.abs()
    }

    /// The zeroed sentinel returned when the root relaxation is infeasible.
    pub(crate) fn infeasible() -> Self {
        Self {
            status: SolveStatus::Infeasible,
            elapsed: Duration::ZERO,
            timings: Timings::default(),
            node_count: 0,
            upper_bound: 0.0,
            lower_bound: 0.0,
            incumbent: vec![],
            root_bound: 0.0,
        }
    }
}

// ----------------------------------------------------------------------------
// --- ERRORS -----------------------------------------------------------------
// ----------------------------------------------------------------------------

/// The ways in which a problem description can be rejected before any solving
/// is attempted. All failures occurring *during* a resolution are reported
/// through the `SolveStatus` of the outcome instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InstanceError {
    #[error("problem class `{0}` is not recognized")]
    UnknownProblem(String),
    #[error("a piecewise-linear function needs at least two breakpoints")]
    TooFewBreakpoints,
    #[error("breakpoint x-values must be strictly increasing")]
    UnorderedBreakpoints,
    #[error("the x and y breakpoint lists must have the same length")]
    MismatchedBreakpoints,
    #[error("all functions of an instance must have the same number of segments")]
    MixedSegmentCounts,
    #[error("network-flow instances require a square number of variables")]
    NotASquare,
    #[error("the right-hand side length does not match the problem shape")]
    RhsShape,
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################


#[cfg(test)]
mod test_envelope_type {
    use crate::*;

    #[test]
    fn segments_report_slope_and_anchor() {
        let env = Envelope::new(vec![0.0, 2.0, 3.0], vec![0.0, -2.0, 0.0]);
        let segs: Vec<Segment> = env.segments().collect();
        assert_eq!(2, segs.len());
        assert_eq!(-1.0, segs[0].slope);
        assert_eq!((0.0, 0.0), (segs[0].anchor_x, segs[0].anchor_y));
        assert_eq!(2.0, segs[1].slope);
        assert_eq!((2.0, -2.0), (segs[1].anchor_x, segs[1].anchor_y));
    }
    #[test]
    fn position_after_is_a_right_bisection() {
        let env = Envelope::new(vec![0.0, 2.0, 3.0], vec![0.0, -2.0, 0.0]);
        assert_eq!(1, env.position_after(0.0));
        assert_eq!(1, env.position_after(1.0));
        assert_eq!(2, env.position_after(2.0));
        assert_eq!(3, env.position_after(5.0));
    }
    #[test]
    fn evaluating_an_envelope_at_its_breakpoints_is_exact() {
        let env = Envelope::new(vec![0.0, 2.0, 3.0], vec![0.0, -2.0, 0.0]);
        for (&x, &y) in env.breakpoints_x().iter().zip(env.breakpoints_y()) {
            assert_eq!(y, env.value_at(x));
        }
    }
}

#[cfg(test)]
mod test_instance {
    use crate::*;
    use std::str::FromStr;

    fn unit(lo: f64, hi: f64) -> PwlFunction {
        PwlFunction::new(vec![lo, hi], vec![0.0, 1.0]).unwrap()
    }

    #[test]
    fn problem_tags_parse_like_the_result_files_spell_them() {
        assert_eq!(Ok(ProblemClass::Knapsack), ProblemClass::from_str("knapsack"));
        assert_eq!(
            Ok(ProblemClass::DiscontinuousNetworkFlow),
            ProblemClass::from_str("discontinuous network flow")
        );
        assert_eq!(
            Ok(ProblemClass::NetworkFlow),
            ProblemClass::from_str("network-flow")
        );
        assert_eq!(
            Err(InstanceError::UnknownProblem("nonsense".to_string())),
            ProblemClass::from_str("nonsense")
        );
    }
    #[test]
    fn only_the_discontinuous_variant_jumps_at_zero() {
        assert!(ProblemClass::DiscontinuousNetworkFlow.jump_at_zero());
        assert!(!ProblemClass::NetworkFlow.jump_at_zero());
        assert!(!ProblemClass::Knapsack.jump_at_zero());
    }
    #[test]
    fn network_flow_requires_a_square_number_of_variables() {
        let funcs = vec![unit(0.0, 1.0); 3];
        assert_eq!(
            Err(InstanceError::NotASquare),
            Instance::new(funcs, ProblemClass::NetworkFlow, vec![1.0, -1.0]).map(|_| ())
        );
    }
    #[test]
    fn rhs_shape_is_checked_against_the_problem_class() {
        let funcs = vec![unit(0.0, 1.0); 4];
        assert!(Instance::new(funcs.clone(), ProblemClass::NetworkFlow, vec![1.0, -1.0]).is_ok());
        assert_eq!(
            Err(InstanceError::RhsShape),
            Instance::new(funcs.clone(), ProblemClass::NetworkFlow, vec![1.0]).map(|_| ())
        );
        assert!(Instance::new(funcs.clone(), ProblemClass::Knapsack, vec![2.0]).is_ok());
        assert_eq!(
            Err(InstanceError::RhsShape),
            Instance::new(funcs, ProblemClass::Knapsack, vec![2.0, 1.0]).map(|_| ())
        );
    }
}
