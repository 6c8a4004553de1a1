// Copyright 2025 the Copse Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pluggable key ordering.

use core::cmp::Ordering;
use core::marker::PhantomData;

/// A strict weak ordering over `K`, captured as a value rather than a bare
/// function pointer so zero-sized comparators (the common case) cost
/// nothing at runtime.
pub trait Comparator<K: ?Sized> {
    /// Compare two keys. Must be a strict weak ordering: irreflexive,
    /// asymmetric, and transitive.
    fn compare(&self, a: &K, b: &K) -> Ordering;
}

/// The default comparator: delegates to `K`'s own [`Ord`] implementation.
///
/// Zero-sized, so [`OrdMap`][crate::OrdMap]`<K, V>` (no third type parameter)
/// carries no extra state over a plain tree of nodes.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrdComparator<K: ?Sized>(PhantomData<fn(&K)>);

impl<K: Ord + ?Sized> Comparator<K> for OrdComparator<K> {
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// Wraps a closure or function pointer as a [`Comparator`].
///
/// Use this when the ordering can't be expressed as `K: Ord` (for example,
/// reverse order, or ordering by a derived key).
#[derive(Clone, Copy, Debug, Default)]
pub struct FnComparator<F>(pub F);

impl<K: ?Sized, F> Comparator<K> for FnComparator<F>
where
    F: Fn(&K, &K) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &K, b: &K) -> Ordering {
        (self.0)(a, b)
    }
}
