// Copyright 2025 the Copse Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Copse Pool: a process-global bounded worker pool.
//!
//! [`Pool::submit`] spawns a new OS thread for a task as long as fewer
//! than the pool's bound are active; once saturated, tasks wait in a
//! FIFO backlog and are picked up by whichever worker finishes next. A
//! panicking task is caught and logged; it neither leaks its thread nor
//! disturbs any other task. Pools are cheap to clone and share the same
//! backlog and workers, and [`Pool::global`] hands out a single
//! process-wide instance sized to the hardware's parallelism.
//!
//! # Example
//!
//! ```rust
//! use copse_pool::Pool;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let pool = Pool::new(4);
//! let total = Arc::new(AtomicUsize::new(0));
//! for i in 0..10 {
//!     let total = Arc::clone(&total);
//!     pool.submit(move || {
//!         total.fetch_add(i, Ordering::SeqCst);
//!     });
//! }
//! pool.join_all().unwrap();
//! assert_eq!(total.load(Ordering::SeqCst), 45);
//! ```

mod error;
mod pool;

pub use error::PoolError;
pub use pool::Pool;
