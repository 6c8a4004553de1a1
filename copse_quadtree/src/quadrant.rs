// Copyright 2025 the Copse Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The recursive quadrant representation shared by the point and region
//! quadtrees.

use alloc::boxed::Box;
use core::fmt;

use crate::bounds::{Bounds, Coord};

/// One quadrant of the tree: either a leaf holding a value (and, for the
/// point variant, the one position stored there) or an internal node with
/// four children.
///
/// There is no parent back-reference; both trees rebuild the path to the
/// root recursively on the way back up, the same choice made for the
/// ordered map.
pub(crate) enum Quadrant<K, V> {
    Leaf {
        value: V,
        position: Option<(K, K)>,
    },
    Internal {
        ne: Box<Quadrant<K, V>>,
        nw: Box<Quadrant<K, V>>,
        sw: Box<Quadrant<K, V>>,
        se: Box<Quadrant<K, V>>,
    },
}

impl<K, V> Quadrant<K, V> {
    pub(crate) fn leaf(value: V) -> Self {
        Self::Leaf {
            value,
            position: None,
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }
}

/// Which of the four children contains a given point, and that child's
/// bounds.
pub(crate) enum ChildSlot {
    Ne,
    Nw,
    Sw,
    Se,
}

impl ChildSlot {
    pub(crate) fn locate<K: Coord>(bounds: &Bounds<K>, x: K, y: K) -> (Self, Bounds<K>) {
        let quads = bounds.split();
        let (cx, cy) = bounds.center();
        let slot = match (x >= cx, y >= cy) {
            (true, true) => Self::Ne,
            (false, true) => Self::Nw,
            (false, false) => Self::Sw,
            (true, false) => Self::Se,
        };
        let child_bounds = match slot {
            Self::Ne => quads.ne,
            Self::Nw => quads.nw,
            Self::Sw => quads.sw,
            Self::Se => quads.se,
        };
        (slot, child_bounds)
    }
}

/// Depth of the deepest leaf below `node` (0 for a leaf itself).
pub(crate) fn depth_of<K, V>(node: &Quadrant<K, V>) -> usize {
    match node {
        Quadrant::Leaf { .. } => 0,
        Quadrant::Internal { ne, nw, sw, se } => {
            1 + depth_of(ne).max(depth_of(nw)).max(depth_of(sw)).max(depth_of(se))
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Quadrant<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf { value, position } => f
                .debug_struct("Leaf")
                .field("value", value)
                .field("position", position)
                .finish(),
            Self::Internal { .. } => f.debug_struct("Internal").finish_non_exhaustive(),
        }
    }
}
