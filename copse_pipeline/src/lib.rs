// Copyright 2025 the Copse Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Copse Pipeline: a staged concurrent pipeline with one dedicated
//! worker thread per stage.
//!
//! Each stage has a one-slot inbox; `feed` pushes onto a shared FIFO
//! that only stage 0 drains. Items move through the pipeline
//! concurrently across stages (stage `i` may be working on item *n*
//! while stage `i + 1` works on item *n - 1*), but each stage processes
//! its own inputs strictly in the order they arrived.
//!
//! # Example
//!
//! ```rust
//! use copse_pipeline::Pipeline;
//!
//! let pipeline = Pipeline::new();
//! pipeline.add_stage(|x: i32| x + 1);
//! pipeline.add_stage(|x: i32| x * 2);
//!
//! for i in 0..4 {
//!     pipeline.feed(i).unwrap();
//! }
//! pipeline.wait_end().unwrap();
//! ```

mod error;
mod pipeline;

pub use error::PipelineError;
pub use pipeline::Pipeline;
