// Copyright 2025 the Copse Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Internal node representation and rotation primitives.
//!
//! Nodes are owned top-down (`Box<Node<K, V>>`) with no parent back-links;
//! every algorithm in [`crate::tree`] is written as a recursive descent that
//! rebuilds the spine on the way back up, which is the idiomatic Rust
//! counterpart of the parent-pointer rebalancing described for this
//! structure (see the crate-level docs for the tradeoff).

use alloc::boxed::Box;

pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) left: Option<Box<Node<K, V>>>,
    pub(crate) right: Option<Box<Node<K, V>>>,
    height: u32,
}

impl<K, V> Node<K, V> {
    pub(crate) fn leaf(key: K, value: V) -> Box<Self> {
        Box::new(Self {
            key,
            value,
            left: None,
            right: None,
            height: 1,
        })
    }

    #[inline]
    pub(crate) fn height_of(node: &Option<Box<Node<K, V>>>) -> u32 {
        node.as_deref().map_or(0, |n| n.height)
    }

    #[inline]
    fn recompute_height(&mut self) {
        self.height = 1 + Self::height_of(&self.left).max(Self::height_of(&self.right));
    }

    #[inline]
    fn balance_factor(&self) -> i64 {
        i64::from(Self::height_of(&self.left)) - i64::from(Self::height_of(&self.right))
    }

    /// Recompute height and restore the AVL balance invariant at this node,
    /// performing an inner (double) rotation when the heavy child leans the
    /// opposite way. Returns the (possibly different) subtree root.
    pub(crate) fn rebalance(mut self: Box<Self>) -> Box<Self> {
        self.recompute_height();

        let balance = self.balance_factor();
        if balance > 1 {
            let left = self.left.as_deref().expect("balance > 1 implies a left child");
            if left.balance_factor() < 0 {
                self.left = Some(self.left.take().unwrap().rotate_left());
            }
            return self.rotate_right();
        }
        if balance < -1 {
            let right = self
                .right
                .as_deref()
                .expect("balance < -1 implies a right child");
            if right.balance_factor() > 0 {
                self.right = Some(self.right.take().unwrap().rotate_right());
            }
            return self.rotate_left();
        }
        self
    }

    /// Right rotation: promotes the left child to root.
    fn rotate_right(mut self: Box<Self>) -> Box<Self> {
        let mut pivot = self.left.take().expect("rotate_right requires a left child");
        self.left = pivot.right.take();
        self.recompute_height();
        pivot.right = Some(self);
        pivot.recompute_height();
        pivot
    }

    /// Left rotation: promotes the right child to root.
    fn rotate_left(mut self: Box<Self>) -> Box<Self> {
        let mut pivot = self.right.take().expect("rotate_left requires a right child");
        self.right = pivot.left.take();
        self.recompute_height();
        pivot.left = Some(self);
        pivot.recompute_height();
        pivot
    }
}
