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

//! # PLOPT
//! PLOPT solves separable piecewise-linear optimization problems to certified
//! global optimality. Given one (possibly nonconvex) piecewise-linear cost
//! per variable and either a single aggregate equality (the knapsack
//! variants) or the balance equalities of a complete flow network, it runs a
//! spatial branch-and-bound: every node carries a linear relaxation built
//! from the lower convex envelopes of the costs, the search always expands
//! the node with the least bound, branches on the variable whose envelope is
//! the poorest at the relaxed optimum, and tightens only that variable's
//! envelope on the two sub-intervals. Children re-optimize with the dual
//! simplex starting from the parent's basis, which makes the per-node cost a
//! handful of pivots rather than a full solve.
//!
//! The search terminates with a feasible incumbent and a matching pair of
//! bounds whose relative gap is below the requested epsilon (or with the
//! best bounds proved when a time or memory budget runs out).
//!
//! ## Quick Example
//! The solver consumes a plain table of breakpoints: one (x, y) sequence per
//! variable. The snippet below minimizes two w-shaped costs tied together by
//! a knapsack equality and checks the certified optimum.
//!
//! ```
//! use plopt::*;
//!
//! let w = || PwlFunction::new(
//!     vec![0.0, 1.0, 2.0, 3.0, 4.0],
//!     vec![2.0, 0.0, 1.0, 0.0, 2.0],
//! ).unwrap();
//!
//! // two w-shaped costs, four units to split between them: both variables
//! // can sit in a valley (1 and 3), which costs nothing
//! let instance = Instance::new(
//!     vec![w(), w()],
//!     ProblemClass::Knapsack,
//!     vec![4.0],
//! ).unwrap();
//!
//! let outcome = minimize(&instance, Parameters::default());
//! assert_eq!(SolveStatus::Optimal, outcome.status);
//! assert!(outcome.upper_bound.abs() < 1e-6);
//! ```
//!
//! ## Plugging another linear solver
//! The search only talks to its linear programs through the `LinearModel`
//! trait (deep copy, appended rows, exposed basis, dual simplex re-solve).
//! The bundled `SimplexModel` implements it without any foreign dependency;
//! wrapping an industrial code instead is a matter of implementing that one
//! trait and handing the solver a frontier over your model type.

mod abstraction;
mod common;
mod implementation;

pub mod generator;

pub use abstraction::*;
pub use common::*;
pub use implementation::*;
