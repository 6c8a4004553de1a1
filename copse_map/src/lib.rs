// Copyright 2025 the Copse Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Copse Map: a self-balancing (AVL) ordered key/value map.
//!
//! - Insert, look up, and erase entries in `O(log n)`, with the tree kept
//!   height-balanced after every mutation.
//! - Iterate ascending or descending via the standard [`DoubleEndedIterator`]
//!   protocol (`.iter().rev()`), rather than a separate pair of reverse
//!   accessors.
//! - Order by `K`'s own [`Ord`] impl by default, or plug in a
//!   [`Comparator`] for anything else (reverse order, ordering by a
//!   derived key, ...).
//!
//! `no_std` plus `alloc`: the map owns its nodes as a plain recursive
//! `Box` tree and does not keep parent pointers, so every algorithm is a
//! recursive descent that rebalances on the way back up.
//!
//! # Example
//!
//! ```rust
//! use copse_map::OrdMap;
//!
//! let mut map = OrdMap::new();
//! for key in [10, 5, 15, 3, 7, 12, 20] {
//!     map.insert(key, key * 10);
//! }
//! assert_eq!(map.size(), 7);
//! assert!(map.height() <= 3);
//!
//! let ascending: Vec<_> = map.iter().map(|(k, _)| *k).collect();
//! assert_eq!(ascending, vec![3, 5, 7, 10, 12, 15, 20]);
//!
//! map.erase(&10);
//! assert_eq!(map.at(&10), None);
//! ```

#![no_std]

extern crate alloc;

mod comparator;
mod iter;
mod node;
mod tree;

pub use comparator::{Comparator, FnComparator, OrdComparator};
pub use iter::{IntoIter, Iter};
pub use tree::OrdMap;
