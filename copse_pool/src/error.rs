// Copyright 2025 the Copse Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Implementation faults surfaced by [`crate::Pool::join_all`].
//!
//! A task that panics is caught at the point it runs and logged; it
//! never reaches here (see [`crate::Pool::submit`]'s docs). This error
//! exists for the one fault that *isn't* recoverable in place: a worker
//! thread itself dying instead of returning normally.

/// A fault observed while joining pool worker threads.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// A worker thread did not return normally from [`std::thread::JoinHandle::join`].
    #[error("a pool worker thread panicked outside of a submitted task")]
    WorkerThreadPanicked,
}
