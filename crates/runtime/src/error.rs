// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the runtime crate
//!
//! These never cross into the instrumented program: configuration errors
//! are reported as a warning on standard error and the offending feature is
//! disabled; I/O errors during emission are swallowed outright.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors, surfaced as warnings only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unparseable sample rate '{value}'")]
    BadSampleRate { value: String },

    #[error("failed to open output file '{path}': {reason}")]
    OutputOpen { path: String, reason: String },

    #[error("collector URL must use http:// or https://: '{url}'")]
    BadUrlScheme { url: String },

    #[error("collector URL contains forbidden character {ch:?}")]
    ForbiddenUrlCharacter { ch: char },
}
