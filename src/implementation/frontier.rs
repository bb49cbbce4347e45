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

//! This module provides the implementation of the solver frontier: the list
//! of open nodes, kept sorted by increasing lower bound.

use std::collections::VecDeque;

use crate::{Frontier, Node};

/// The frontier as a sorted sequence. Keeping the nodes in lower-bound order
/// gives the three operations the search needs at little cost: the global
/// lower bound is read off the front, best-first selection is a pop of the
/// front, and fathoming against a new incumbent is a single truncation of
/// the tail.
///
/// Nodes with equal bounds keep their insertion order (a new node lands
/// after its equals).
pub struct SortedFrontier<L> {
    nodes: VecDeque<Node<L>>,
}

impl<L> SortedFrontier<L> {
    pub fn new() -> Self {
        Self { nodes: VecDeque::new() }
    }
}

impl<L> Default for SortedFrontier<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L> Frontier for SortedFrontier<L> {
    type Model = L;

    fn push(&mut self, node: Node<L>) {
        let at = self.nodes.partition_point(|open| open.lb <= node.lb);
        self.nodes.insert(at, node);
    }

    fn pop(&mut self) -> Option<Node<L>> {
        self.nodes.pop_front()
    }

    fn best_lb(&self) -> Option<f64> {
        self.nodes.front().map(|node| node.lb)
    }

    fn truncate(&mut self, cutoff: f64) {
        let keep = self.nodes.partition_point(|open| open.lb < cutoff);
        self.nodes.truncate(keep);
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

// ############################################################################
// #### TESTS #################################################################
// ############################################################################

#[cfg(test)]
mod test_sorted_frontier {
    use crate::*;

    fn node(lb: f64) -> Node<()> {
        Node { lp: (), envelopes: vec![], values: vec![], lb, depth: 0 }
    }

    #[test]
    fn by_default_it_is_empty() {
        let frontier: SortedFrontier<()> = SortedFrontier::new();
        assert!(frontier.is_empty());
        assert_eq!(None, frontier.best_lb());
    }

    #[test]
    fn when_i_push_nodes_they_come_out_in_bound_order() {
        let mut frontier = SortedFrontier::new();
        frontier.push(node(3.0));
        frontier.push(node(1.0));
        frontier.push(node(2.0));
        assert_eq!(Some(1.0), frontier.best_lb());
        assert_eq!(1.0, frontier.pop().unwrap().lb);
        assert_eq!(2.0, frontier.pop().unwrap().lb);
        assert_eq!(3.0, frontier.pop().unwrap().lb);
        assert!(frontier.pop().is_none());
    }

    #[test]
    fn equal_bounds_preserve_the_insertion_order() {
        let mut frontier = SortedFrontier::new();
        let mut a = node(1.0);
        a.depth = 1;
        let mut b = node(1.0);
        b.depth = 2;
        frontier.push(a);
        frontier.push(b);
        assert_eq!(1, frontier.pop().unwrap().depth);
        assert_eq!(2, frontier.pop().unwrap().depth);
    }

    #[test]
    fn truncation_drops_every_node_at_or_above_the_cutoff() {
        let mut frontier = SortedFrontier::new();
        for lb in [1.0, 2.0, 3.0, 4.0, 5.0] {
            frontier.push(node(lb));
        }
        frontier.truncate(3.0);
        assert_eq!(2, frontier.len());
        assert_eq!(1.0, frontier.pop().unwrap().lb);
        assert_eq!(2.0, frontier.pop().unwrap().lb);
    }

    #[test]
    fn truncating_an_empty_frontier_is_a_noop() {
        let mut frontier: SortedFrontier<()> = SortedFrontier::new();
        frontier.truncate(0.0);
        assert!(frontier.is_empty());
    }

    #[test]
    fn after_every_insertion_the_frontier_stays_sorted() {
        let mut frontier = SortedFrontier::new();
        for lb in [5.0, 1.0, 4.0, 2.0, 3.0, 2.5] {
            frontier.push(node(lb));
        }
        let mut previous = f64::NEG_INFINITY;
        while let Some(n) = frontier.pop() {
            assert!(previous <= n.lb);
            previous = n.lb;
        }
    }
}
