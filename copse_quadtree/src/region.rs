// Copyright 2025 the Copse Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The region quadtree: a Boolean-valued quadtree that subdivides to push
//! a changed value down one unit cell at a time and merges uniform
//! quadrants back together eagerly, so the tree never holds four
//! equal-valued leaf siblings.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::bounds::{Bounds, Coord};
use crate::quadrant::{depth_of, ChildSlot, Quadrant};

/// A Boolean-valued quadtree over a grid of unit cells.
pub struct RegionQuadtree<K> {
    bounds: Bounds<K>,
    root: Option<Box<Quadrant<K, bool>>>,
    true_count: usize,
    depth: usize,
}

impl<K: Coord> RegionQuadtree<K> {
    /// Create an all-`false` region over `bounds`.
    pub fn new(bounds: Bounds<K>) -> Self {
        Self {
            bounds,
            root: None,
            true_count: 0,
            depth: 0,
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of cells currently `true`.
    #[must_use]
    pub fn size(&self) -> usize {
        self.true_count
    }

    #[must_use]
    pub fn bounds(&self) -> &Bounds<K> {
        &self.bounds
    }

    #[must_use]
    pub fn at(&self, x: K, y: K) -> bool {
        let Some(root) = self.root.as_deref() else {
            return false;
        };
        if !self.bounds.contains(x, y) {
            return false;
        }
        at_rec(root, &self.bounds, x, y)
    }

    /// Set or clear the cell containing `(x, y)`. Returns the new total
    /// count of `true` cells (outside-bounds points are a no-op).
    pub fn insert(&mut self, x: K, y: K, value: bool) -> usize {
        if !self.bounds.contains(x, y) {
            return self.true_count;
        }
        let root = self
            .root
            .take()
            .unwrap_or_else(|| Box::new(Quadrant::leaf(false)));
        let (new_root, delta) = insert_rec(root, &self.bounds, x, y, value);
        self.true_count = (self.true_count as i64 + delta) as usize;
        self.depth = depth_of(&new_root);
        self.root = Some(new_root);
        self.true_count
    }

    pub fn set(&mut self, x: K, y: K) -> usize {
        self.insert(x, y, true)
    }

    pub fn unset(&mut self, x: K, y: K) -> usize {
        self.insert(x, y, false)
    }

    /// Set every unit cell whose center lies inside `polygon` (even-odd
    /// fill rule) to `true`.
    pub fn set_region(&mut self, polygon: &[(K, K)]) -> usize {
        self.fill_region(polygon, true)
    }

    /// Clear every unit cell whose center lies inside `polygon`.
    pub fn unset_region(&mut self, polygon: &[(K, K)]) -> usize {
        self.fill_region(polygon, false)
    }

    fn fill_region(&mut self, polygon: &[(K, K)], value: bool) -> usize {
        let mut count = self.true_count;
        for (x, y) in unit_cells_in_bounds(&self.bounds) {
            if point_in_polygon(polygon, x, y) {
                count = self.insert(x, y, value);
            }
        }
        count
    }

    /// A row-major `0`/`1` grid of the whole bounds, one row per text
    /// line, northernmost row first.
    #[must_use]
    pub fn render_grid(&self) -> String {
        let rows = unit_rows_descending(&self.bounds);
        let mut out = String::new();
        for row_y in rows {
            let mut x = self.bounds.left;
            while x < self.bounds.right {
                out.push(if self.at(x, row_y) { '1' } else { '0' });
                x = x + K::ONE;
            }
            out.push('\n');
        }
        out
    }
}

impl<K: fmt::Debug> fmt::Debug for RegionQuadtree<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionQuadtree")
            .field("bounds", &self.bounds)
            .field("true_count", &self.true_count)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

fn at_rec<K: Coord>(node: &Quadrant<K, bool>, bounds: &Bounds<K>, x: K, y: K) -> bool {
    match node {
        Quadrant::Leaf { value, .. } => *value,
        Quadrant::Internal { ne, nw, sw, se } => {
            let (slot, child_bounds) = ChildSlot::locate(bounds, x, y);
            match slot {
                ChildSlot::Ne => at_rec(ne, &child_bounds, x, y),
                ChildSlot::Nw => at_rec(nw, &child_bounds, x, y),
                ChildSlot::Sw => at_rec(sw, &child_bounds, x, y),
                ChildSlot::Se => at_rec(se, &child_bounds, x, y),
            }
        }
    }
}

/// Returns the net change in `true`-cell count as `delta`.
fn insert_rec<K: Coord>(
    node: Box<Quadrant<K, bool>>,
    bounds: &Bounds<K>,
    x: K,
    y: K,
    value: bool,
) -> (Box<Quadrant<K, bool>>, i64) {
    match *node {
        Quadrant::Leaf {
            value: leaf_value, ..
        } => {
            if leaf_value == value {
                (Box::new(Quadrant::leaf(leaf_value)), 0)
            } else if bounds.is_unit() {
                let delta = if value { 1 } else { -1 };
                (Box::new(Quadrant::leaf(value)), delta)
            } else {
                let ne = Box::new(Quadrant::leaf(leaf_value));
                let nw = Box::new(Quadrant::leaf(leaf_value));
                let sw = Box::new(Quadrant::leaf(leaf_value));
                let se = Box::new(Quadrant::leaf(leaf_value));
                let internal = Box::new(Quadrant::Internal { ne, nw, sw, se });
                insert_rec(internal, bounds, x, y, value)
            }
        }
        Quadrant::Internal { ne, nw, sw, se } => {
            let (slot, child_bounds) = ChildSlot::locate(bounds, x, y);
            let (ne, nw, sw, se, delta) = match slot {
                ChildSlot::Ne => {
                    let (n, d) = insert_rec(ne, &child_bounds, x, y, value);
                    (n, nw, sw, se, d)
                }
                ChildSlot::Nw => {
                    let (n, d) = insert_rec(nw, &child_bounds, x, y, value);
                    (ne, n, sw, se, d)
                }
                ChildSlot::Sw => {
                    let (n, d) = insert_rec(sw, &child_bounds, x, y, value);
                    (ne, nw, n, se, d)
                }
                ChildSlot::Se => {
                    let (n, d) = insert_rec(se, &child_bounds, x, y, value);
                    (ne, nw, sw, n, d)
                }
            };
            let merged = try_merge_uniform(Box::new(Quadrant::Internal { ne, nw, sw, se }));
            (merged, delta)
        }
    }
}

/// Collapse an internal node whose four children are leaves of the same
/// value into a single leaf.
fn try_merge_uniform<K>(node: Box<Quadrant<K, bool>>) -> Box<Quadrant<K, bool>> {
    let Quadrant::Internal { ne, nw, sw, se } = *node else {
        return node;
    };
    if let (
        Quadrant::Leaf { value: a, .. },
        Quadrant::Leaf { value: b, .. },
        Quadrant::Leaf { value: c, .. },
        Quadrant::Leaf { value: d, .. },
    ) = (&*ne, &*nw, &*sw, &*se)
    {
        if a == b && b == c && c == d {
            return Box::new(Quadrant::leaf(*a));
        }
    }
    Box::new(Quadrant::Internal { ne, nw, sw, se })
}

fn unit_cells_in_bounds<K: Coord>(bounds: &Bounds<K>) -> Vec<(K, K)> {
    let mut cells = Vec::new();
    let mut y = bounds.bottom;
    while y < bounds.top {
        let mut x = bounds.left;
        while x < bounds.right {
            cells.push((x, y));
            x = x + K::ONE;
        }
        y = y + K::ONE;
    }
    cells
}

fn unit_rows_descending<K: Coord>(bounds: &Bounds<K>) -> Vec<K> {
    let mut rows = Vec::new();
    let mut y = bounds.bottom;
    while y < bounds.top {
        rows.push(y);
        y = y + K::ONE;
    }
    rows.reverse();
    rows
}

/// Even-odd (ray casting) point-in-polygon test, computed with exact
/// integer arithmetic to avoid floating-point edge cases on grid-aligned
/// polygons.
fn point_in_polygon<K: Coord>(polygon: &[(K, K)], px: K, py: K) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let px = px.to_i128();
    let py = py.to_i128();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (polygon[i].0.to_i128(), polygon[i].1.to_i128());
        let (xj, yj) = (polygon[j].0.to_i128(), polygon[j].1.to_i128());
        if (yi > py) != (yj > py) {
            let num = (xj - xi) * (py - yi);
            let den = yj - yi;
            let crosses = if den > 0 {
                (px - xi) * den < num
            } else {
                (px - xi) * den > num
            };
            if crosses {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> RegionQuadtree<i64> {
        RegionQuadtree::new(Bounds::new(0, 0, 4, 4).unwrap())
    }

    #[test]
    fn setting_every_cell_merges_to_a_single_leaf() {
        let mut r = region();
        let mut count = 0;
        for y in 0..4 {
            for x in 0..4 {
                count = r.set(x, y);
            }
        }
        assert_eq!(count, 16);
        assert_eq!(r.size(), 16);
        assert_eq!(r.depth(), 0);
        assert!(r.at(0, 0));
        assert!(r.at(3, 3));
    }

    #[test]
    fn no_internal_node_has_four_equal_leaf_children() {
        let mut r = region();
        r.set(0, 0);
        r.set(1, 1);
        r.set(2, 2);
        // Mixed true/false cells force subdivision; verify via the
        // public surface that the tree still reports the right counts
        // (the uniform-merge invariant itself is enforced structurally
        // by try_merge_uniform on every mutation).
        assert_eq!(r.size(), 3);
        assert!(r.at(0, 0));
        assert!(!r.at(0, 1));
    }

    #[test]
    fn polygon_fill_sets_interior_cells() {
        let mut r = region();
        let triangle = [(0i64, 0i64), (0, 4), (4, 0)];
        let count = r.set_region(&triangle);
        assert!(count > 0);
        assert!(r.at(0, 0));
        assert!(!r.at(3, 3));
    }

    #[test]
    fn render_grid_has_one_row_per_line() {
        let mut r = region();
        r.set(0, 3);
        let grid = r.render_grid();
        assert_eq!(grid.lines().count(), 4);
        assert!(grid.lines().next().unwrap().starts_with('1'));
    }
}
