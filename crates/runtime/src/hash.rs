// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Hash functions and identifier derivation
//!
//! Two fixed mixers: the 31-multiplier byte mixer keyed by program counter
//! (dedup hashes, call-site ids, report ids) and djb2 for function names in
//! the pure-call cache. Both are part of the wire-level contract: changing
//! them would re-key every deployed bloom filter and cache.

/// Mix a string into a seed with the 31-multiplier byte mixer.
pub fn mix_str(seed: u64, s: &str) -> u64 {
    s.bytes()
        .fold(seed, |h, b| h.wrapping_mul(31).wrapping_add(u64::from(b)))
}

/// Dedup hash for one probe site: program counter mixed with the check
/// kind's short tag.
pub fn hash_report(pc: u64, tag: &str) -> u64 {
    mix_str(pc, tag)
}

/// djb2 string hash; keys the pure-call cache by function name.
pub fn hash_string(s: &str) -> u64 {
    s.bytes()
        .fold(5381u64, |h, b| h.wrapping_mul(33).wrapping_add(u64::from(b)))
}

/// Stable call-site identifier: the low 32 bits of the site's dedup hash,
/// rendered in hex. Identical for every event from the same probe within
/// one process lifetime.
pub fn call_site_id(pc: u64, tag: &str) -> String {
    format!("{:08x}", hash_report(pc, tag) & 0xffff_ffff)
}

/// Report identifier: the call-site id re-mixed with the timestamp, so the
/// same site reporting at two different seconds stays distinguishable.
pub fn report_id(call_site: &str, timestamp: &str) -> String {
    format!("{:016x}", mix_str(mix_str(0, call_site), timestamp))
}
