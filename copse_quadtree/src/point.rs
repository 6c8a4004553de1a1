// Copyright 2025 the Copse Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The point quadtree: stores at most one point per leaf, subdividing on
//! collision and merging empty or uniform-empty siblings back together on
//! removal.

use alloc::boxed::Box;
use bitflags::bitflags;
use core::fmt;

use crate::bounds::{Bounds, Coord};
use crate::quadrant::{depth_of, ChildSlot, Quadrant};

bitflags! {
    /// Behavior switches for [`PointQuadtree`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PointQuadtreeFlags: u32 {
        /// Reject re-inserts at an already-occupied position instead of
        /// overwriting the stored value.
        const NO_REPLACE = 1 << 0;
    }
}

/// A square-or-rectangular spatial container mapping distinct `(x, y)`
/// points to values of type `V`, with a default value returned for points
/// that hold nothing.
pub struct PointQuadtree<K, V> {
    bounds: Bounds<K>,
    root: Option<Box<Quadrant<K, V>>>,
    size: usize,
    depth: usize,
    default: V,
    flags: PointQuadtreeFlags,
}

impl<K, V> PointQuadtree<K, V>
where
    K: Coord,
    V: Clone,
{
    /// Create an empty tree over `bounds`, returning `default` for any
    /// point not yet inserted.
    pub fn new(bounds: Bounds<K>, default: V) -> Self {
        Self {
            bounds,
            root: None,
            size: 0,
            depth: 0,
            default,
            flags: PointQuadtreeFlags::empty(),
        }
    }

    pub fn set_behaviour_flags(&mut self, flags: PointQuadtreeFlags) {
        self.flags = flags;
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn default_value(&self) -> &V {
        &self.default
    }

    #[must_use]
    pub fn bounds(&self) -> &Bounds<K> {
        &self.bounds
    }

    /// Insert or update the value at `(x, y)`. A point outside the root's
    /// bounds is a no-op; this returns the tree's size either way.
    pub fn insert(&mut self, x: K, y: K, value: V) -> usize {
        if !self.bounds.contains(x, y) {
            return self.size;
        }
        let root = self
            .root
            .take()
            .unwrap_or_else(|| Box::new(Quadrant::leaf(self.default.clone())));
        let no_replace = self.flags.contains(PointQuadtreeFlags::NO_REPLACE);
        let (new_root, outcome) =
            insert_rec(root, &self.bounds, x, y, value, &self.default, no_replace);
        if matches!(outcome, InsertOutcome::Inserted) {
            self.size += 1;
        }
        self.depth = depth_of(&new_root);
        self.root = Some(new_root);
        self.size
    }

    /// Value stored at `(x, y)`, or the default if nothing is stored
    /// there.
    #[must_use]
    pub fn at(&self, x: K, y: K) -> &V {
        let Some(root) = self.root.as_deref() else {
            return &self.default;
        };
        if !self.bounds.contains(x, y) {
            return &self.default;
        }
        at_rec(root, &self.bounds, x, y, &self.default)
    }

    /// Coordinates of the first occupied leaf whose value equals `target`,
    /// searched in NE, NW, SW, SE order.
    #[must_use]
    pub fn find(&self, target: &V) -> Option<(K, K)>
    where
        V: PartialEq,
    {
        self.find_by(|v| v == target)
    }

    /// Like [`Self::find`] but with a user-supplied equality predicate.
    pub fn find_by<P>(&self, predicate: P) -> Option<(K, K)>
    where
        P: Fn(&V) -> bool,
    {
        let root = self.root.as_deref()?;
        find_rec(root, &self.bounds, &predicate)
    }

    /// Remove the point at `(x, y)`, if any. Returns whether a point was
    /// removed.
    pub fn remove(&mut self, x: K, y: K) -> bool {
        if !self.bounds.contains(x, y) {
            return false;
        }
        let Some(root) = self.root.take() else {
            return false;
        };
        let (new_root, removed) = remove_rec(root, &self.bounds, x, y, &self.default);
        if removed {
            self.size -= 1;
        }
        self.depth = depth_of(&new_root);
        self.root = Some(new_root);
        removed
    }

    /// Remove every point whose value matches `predicate`. Returns the
    /// number of points removed.
    pub fn remove_all<P>(&mut self, predicate: P) -> usize
    where
        P: Fn(&V) -> bool,
    {
        let Some(root) = self.root.take() else {
            return 0;
        };
        let (new_root, count) = remove_all_rec(root, &predicate, &self.default);
        self.size -= count;
        self.depth = depth_of(&new_root);
        self.root = Some(new_root);
        count
    }
}

impl<K: fmt::Debug, V> fmt::Debug for PointQuadtree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointQuadtree")
            .field("bounds", &self.bounds)
            .field("size", &self.size)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

enum InsertOutcome {
    Inserted,
    Replaced,
    Kept,
}

fn insert_rec<K, V>(
    node: Box<Quadrant<K, V>>,
    bounds: &Bounds<K>,
    x: K,
    y: K,
    value: V,
    default: &V,
    no_replace: bool,
) -> (Box<Quadrant<K, V>>, InsertOutcome)
where
    K: Coord,
    V: Clone,
{
    match *node {
        Quadrant::Leaf {
            value: leaf_value,
            position,
        } => match position {
            None => (
                Box::new(Quadrant::Leaf {
                    value,
                    position: Some((x, y)),
                }),
                InsertOutcome::Inserted,
            ),
            Some((px, py)) if same_point(px, py, x, y) => {
                if no_replace {
                    (
                        Box::new(Quadrant::Leaf {
                            value: leaf_value,
                            position: Some((px, py)),
                        }),
                        InsertOutcome::Kept,
                    )
                } else {
                    (
                        Box::new(Quadrant::Leaf {
                            value,
                            position: Some((px, py)),
                        }),
                        InsertOutcome::Replaced,
                    )
                }
            }
            Some((px, py)) => {
                let quads = bounds.split();
                let mut ne = Box::new(Quadrant::leaf(default.clone()));
                let mut nw = Box::new(Quadrant::leaf(default.clone()));
                let mut sw = Box::new(Quadrant::leaf(default.clone()));
                let mut se = Box::new(Quadrant::leaf(default.clone()));
                let (slot, _) = ChildSlot::locate(bounds, px, py);
                let displaced = Box::new(Quadrant::Leaf {
                    value: leaf_value,
                    position: Some((px, py)),
                });
                match slot {
                    ChildSlot::Ne => ne = displaced,
                    ChildSlot::Nw => nw = displaced,
                    ChildSlot::Sw => sw = displaced,
                    ChildSlot::Se => se = displaced,
                }
                let internal = Box::new(Quadrant::Internal { ne, nw, sw, se });
                insert_rec(internal, bounds, x, y, value, default, no_replace)
            }
        },
        Quadrant::Internal { ne, nw, sw, se } => {
            let (slot, child_bounds) = ChildSlot::locate(bounds, x, y);
            match slot {
                ChildSlot::Ne => {
                    let (new_ne, outcome) =
                        insert_rec(ne, &child_bounds, x, y, value, default, no_replace);
                    (Box::new(Quadrant::Internal { ne: new_ne, nw, sw, se }), outcome)
                }
                ChildSlot::Nw => {
                    let (new_nw, outcome) =
                        insert_rec(nw, &child_bounds, x, y, value, default, no_replace);
                    (Box::new(Quadrant::Internal { ne, nw: new_nw, sw, se }), outcome)
                }
                ChildSlot::Sw => {
                    let (new_sw, outcome) =
                        insert_rec(sw, &child_bounds, x, y, value, default, no_replace);
                    (Box::new(Quadrant::Internal { ne, nw, sw: new_sw, se }), outcome)
                }
                ChildSlot::Se => {
                    let (new_se, outcome) =
                        insert_rec(se, &child_bounds, x, y, value, default, no_replace);
                    (Box::new(Quadrant::Internal { ne, nw, sw, se: new_se }), outcome)
                }
            }
        }
    }
}

fn at_rec<'a, K: Coord, V>(
    node: &'a Quadrant<K, V>,
    bounds: &Bounds<K>,
    x: K,
    y: K,
    default: &'a V,
) -> &'a V {
    match node {
        Quadrant::Leaf { value, position } => match position {
            Some((px, py)) if same_point(*px, *py, x, y) => value,
            _ => default,
        },
        Quadrant::Internal { ne, nw, sw, se } => {
            let (slot, child_bounds) = ChildSlot::locate(bounds, x, y);
            match slot {
                ChildSlot::Ne => at_rec(ne, &child_bounds, x, y, default),
                ChildSlot::Nw => at_rec(nw, &child_bounds, x, y, default),
                ChildSlot::Sw => at_rec(sw, &child_bounds, x, y, default),
                ChildSlot::Se => at_rec(se, &child_bounds, x, y, default),
            }
        }
    }
}

fn find_rec<K: Coord, V>(
    node: &Quadrant<K, V>,
    bounds: &Bounds<K>,
    predicate: &dyn Fn(&V) -> bool,
) -> Option<(K, K)> {
    match node {
        Quadrant::Leaf { value, position } => {
            let pos = (*position)?;
            predicate(value).then_some(pos)
        }
        Quadrant::Internal { ne, nw, sw, se } => {
            let quads = bounds.split();
            find_rec(ne, &quads.ne, predicate)
                .or_else(|| find_rec(nw, &quads.nw, predicate))
                .or_else(|| find_rec(sw, &quads.sw, predicate))
                .or_else(|| find_rec(se, &quads.se, predicate))
        }
    }
}

fn remove_rec<K: Coord, V: Clone>(
    node: Box<Quadrant<K, V>>,
    bounds: &Bounds<K>,
    x: K,
    y: K,
    default: &V,
) -> (Box<Quadrant<K, V>>, bool) {
    match *node {
        Quadrant::Leaf { value, position } => match position {
            Some((px, py)) if same_point(px, py, x, y) => (
                Box::new(Quadrant::Leaf {
                    value: default.clone(),
                    position: None,
                }),
                true,
            ),
            _ => (Box::new(Quadrant::Leaf { value, position }), false),
        },
        Quadrant::Internal { ne, nw, sw, se } => {
            let (slot, child_bounds) = ChildSlot::locate(bounds, x, y);
            let (ne, nw, sw, se, removed) = match slot {
                ChildSlot::Ne => {
                    let (n, r) = remove_rec(ne, &child_bounds, x, y, default);
                    (n, nw, sw, se, r)
                }
                ChildSlot::Nw => {
                    let (n, r) = remove_rec(nw, &child_bounds, x, y, default);
                    (ne, n, sw, se, r)
                }
                ChildSlot::Sw => {
                    let (n, r) = remove_rec(sw, &child_bounds, x, y, default);
                    (ne, nw, n, se, r)
                }
                ChildSlot::Se => {
                    let (n, r) = remove_rec(se, &child_bounds, x, y, default);
                    (ne, nw, sw, n, r)
                }
            };
            let merged = try_merge(Box::new(Quadrant::Internal { ne, nw, sw, se }), default);
            (merged, removed)
        }
    }
}

fn remove_all_rec<K: Coord, V: Clone>(
    node: Box<Quadrant<K, V>>,
    predicate: &dyn Fn(&V) -> bool,
    default: &V,
) -> (Box<Quadrant<K, V>>, usize) {
    match *node {
        Quadrant::Leaf { value, position } => {
            if position.is_some() && predicate(&value) {
                (
                    Box::new(Quadrant::Leaf {
                        value: default.clone(),
                        position: None,
                    }),
                    1,
                )
            } else {
                (Box::new(Quadrant::Leaf { value, position }), 0)
            }
        }
        Quadrant::Internal { ne, nw, sw, se } => {
            let (ne, c1) = remove_all_rec(ne, predicate, default);
            let (nw, c2) = remove_all_rec(nw, predicate, default);
            let (sw, c3) = remove_all_rec(sw, predicate, default);
            let (se, c4) = remove_all_rec(se, predicate, default);
            let merged = try_merge(Box::new(Quadrant::Internal { ne, nw, sw, se }), default);
            (merged, c1 + c2 + c3 + c4)
        }
    }
}

/// Detach an internal node's children when the merge rule applies: four
/// empty leaves collapse to one empty leaf; three empty leaves promote the
/// surviving sibling in place of the internal node.
fn try_merge<K, V: Clone>(node: Box<Quadrant<K, V>>, default: &V) -> Box<Quadrant<K, V>> {
    let Quadrant::Internal { ne, nw, sw, se } = *node else {
        return node;
    };
    if !(ne.is_leaf() && nw.is_leaf() && sw.is_leaf() && se.is_leaf()) {
        return Box::new(Quadrant::Internal { ne, nw, sw, se });
    }

    let is_empty = |q: &Quadrant<K, V>| matches!(q, Quadrant::Leaf { position: None, .. });
    let empties =
        [&ne, &nw, &sw, &se].into_iter().filter(|c| is_empty(c)).count();

    if empties == 4 {
        return Box::new(Quadrant::Leaf {
            value: default.clone(),
            position: None,
        });
    }
    if empties == 3 {
        if !is_empty(&ne) {
            return ne;
        }
        if !is_empty(&nw) {
            return nw;
        }
        if !is_empty(&sw) {
            return sw;
        }
        return se;
    }
    Box::new(Quadrant::Internal { ne, nw, sw, se })
}

#[inline]
fn same_point<K: PartialEq>(px: K, py: K, x: K, y: K) -> bool {
    px == x && py == y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bounds;

    fn tree() -> PointQuadtree<i64, char> {
        let bounds = Bounds::new(-10, -10, 10, 10).unwrap();
        PointQuadtree::new(bounds, '.')
    }

    #[test]
    fn insert_and_find() {
        let mut t = tree();
        t.insert(5, 5, 'a');
        t.insert(3, 3, 'b');
        assert_eq!(*t.at(5, 5), 'a');
        assert_eq!(*t.at(3, 3), 'b');
        assert_eq!(t.find(&'b'), Some((3, 3)));
        assert_eq!(t.find(&'c'), None);
        assert_eq!(t.size(), 2);
    }

    #[test]
    fn no_replace_flag_keeps_first_value() {
        let mut t = tree();
        t.insert(5, 5, 100);
        t.insert(5, 5, 200);
        assert_eq!(*t.at(5, 5), 200);

        let mut t = PointQuadtree::new(Bounds::new(-10, -10, 10, 10).unwrap(), 0);
        t.set_behaviour_flags(PointQuadtreeFlags::NO_REPLACE);
        t.insert(5, 5, 100);
        t.insert(5, 5, 200);
        assert_eq!(*t.at(5, 5), 100);
    }

    #[test]
    fn remove_restores_default_and_merges() {
        let mut t = tree();
        t.insert(5, 5, 'a');
        t.insert(-5, -5, 'b');
        assert_eq!(t.size(), 2);
        assert!(t.remove(5, 5));
        assert_eq!(*t.at(5, 5), '.');
        assert!(t.remove(-5, -5));
        assert_eq!(t.size(), 0);
        // Every point has been removed; the tree must have merged all the
        // way back down to a single empty leaf.
        assert_eq!(t.depth(), 0);
    }

    #[test]
    fn remove_all_by_predicate() {
        let mut t = tree();
        t.insert(1, 1, 10);
        t.insert(2, 2, 20);
        t.insert(-1, -1, 10);
        let removed = t.remove_all(|v| *v == 10);
        assert_eq!(removed, 2);
        assert_eq!(t.size(), 1);
    }

    #[test]
    fn insert_outside_bounds_is_a_no_op() {
        let mut t = tree();
        assert_eq!(t.insert(1000, 1000, 'z'), 0);
        assert_eq!(t.size(), 0);
    }
}
