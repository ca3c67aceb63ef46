//! Runtime reporter for instrumented programs
//!
//! This crate is the shared library linked into a program the instrumentor
//! rewrote. Probes call the `trace2pass_` entry points; the runtime
//! deduplicates per call site, samples, and delivers accepted events to a
//! local stream and, when configured, to a collector endpoint.
//!
//! # Overview
//!
//! - [`ffi`]: the C-ABI entry points, one per check kind, plus the
//!   sampling oracle and lifecycle/configuration symbols
//! - [`config`]: process-wide configuration from `TRACE2PASS_SAMPLE_RATE`,
//!   `TRACE2PASS_OUTPUT`, `TRACE2PASS_COLLECTOR_URL`
//! - [`bloom`] / [`pure_cache`]: per-thread dedup and pure-call memoization
//! - [`sampling`]: the per-thread sampling oracle
//! - [`report`] / [`sink`]: record construction and two-channel delivery
//!
//! # Thread Safety
//!
//! Bloom filters, the pure cache, and the sampling generator are
//! thread-local; the only shared mutable state is the configuration, read
//! lock-free (sample rate) or under the emission mutex (stream, collector
//! URL). Two threads may each report the first occurrence of the same site;
//! one thread never reports a site twice.
//!
//! # Failure Semantics
//!
//! The runtime never aborts the host and never alters its control flow.
//! Configuration problems warn on standard error and disable the feature;
//! stream and collector I/O errors are swallowed without retry.

pub mod bloom;
pub mod config;
pub mod error;
pub mod ffi;
pub mod hash;
pub mod pure_cache;
pub mod report;
pub mod sampling;
pub mod sink;

pub use config::{
    finalize, initialize, sample_rate, set_collector_url, set_output_file, set_sample_rate,
    DEFAULT_SAMPLE_RATE, ENV_COLLECTOR_URL, ENV_OUTPUT, ENV_SAMPLE_RATE,
};
pub use error::{ConfigError, ConfigResult};
pub use report::{CheckKind, Payload, Report};
pub use sampling::should_sample;
