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

use crate::Node;

/// This trait abstracts away the implementation details of the solver
/// frontier. That is, a Frontier represents the ordered set of all open nodes
/// that remain to be explored, kept sorted by increasing lower bound.
///
/// # Note
/// The search relies on the assumption that `pop` always yields the open node
/// with the least lower bound: that bound *is* the global lower bound of the
/// problem. It also relies on `truncate` to drop every node whose bound
/// cannot beat the incumbent anymore.
pub trait Frontier {
    type Model;

    /// Inserts a node at the position dictated by its lower bound.
    fn push(&mut self, node: Node<Self::Model>);
    /// Removes and returns the node with the least lower bound.
    fn pop(&mut self) -> Option<Node<Self::Model>>;
    /// The least lower bound among the open nodes, if any.
    fn best_lb(&self) -> Option<f64>;
    /// Drops every node whose lower bound is greater than or equal to the
    /// given cutoff (those nodes are fathomed: nothing in their sub-domain
    /// can improve on the incumbent).
    fn truncate(&mut self, cutoff: f64);
    /// Yields the number of open nodes.
    fn len(&self) -> usize;
    /// Returns true iff there is no open node left (len == 0).
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
