// Copyright (c) 2025 Billfold Contributors.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use thiserror::Error;

/// Typed failures the engine reports back to callers. Anything else that
/// bubbles up (SQLite faults, bad on-disk data) is an infrastructure error
/// and travels as a plain `anyhow::Error` with operation context attached.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad input or an operation that would violate chronological ordering.
    /// Never retried automatically.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A record or fallback the operation depends on does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}
