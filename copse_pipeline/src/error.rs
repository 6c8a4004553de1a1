// Copyright 2025 the Copse Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Implementation faults surfaced by a running pipeline.
//!
//! Everything else (duplicate-free feed ordering, quiescence) is a
//! logical property enforced by construction; these are the two ways a
//! stage's worker can actually fail.

/// A fault raised by a pipeline worker.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A stage's transform panicked; that worker has exited and will
    /// process no further items.
    #[error("stage {stage} transform panicked: {message}")]
    StageTransformPanicked {
        /// Index of the stage whose transform panicked.
        stage: usize,
        /// The panic payload, downcast to a string where possible.
        message: String,
    },

    /// `feed` was called after `stop()` had already been invoked.
    #[error("pipeline has been stopped; feed() no longer accepts input")]
    PipelineStopped,
}
