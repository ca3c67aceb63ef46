// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Report delivery
//!
//! Two channels driven from the same record under one process-wide mutex:
//! the collector POST first (when configured), then the human-readable
//! stream write, then a flush. Events from one thread reach the stream in
//! issue order; no ordering is promised across threads or between channels.
//!
//! Every failure on this path is swallowed. The runtime must never abort
//! or slow the host beyond the emission itself; a lost report is
//! acceptable, a crashed host program is not. Collector failures are not
//! retried — per-site dedup means the next distinct site will try again.

use crate::config::lock_sink;
use crate::report::Report;

/// Deliver one accepted report to the configured channels.
pub fn emit(report: &Report) {
    let mut sink = lock_sink();

    if let Some(url) = sink.collector_url.clone() {
        post_to_collector(&url, report);
    }

    let _ = sink.stream.write_all_and_flush(&report.to_stream_text());
}

/// POST the JSON record; failures are silently dropped, no retry.
fn post_to_collector(url: &str, report: &Report) {
    let body = report.to_json().to_string();
    let _ = ureq::post(url)
        .set("Content-Type", "application/json")
        .send_string(&body);
}
