// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-thread bloom dedup
//!
//! A 1024-word bit set per thread, seeded empty at thread start. Once a
//! site's hash is inserted, later events with the same hash on that thread
//! are silently dropped. False-positive drops across distinct sites are the
//! accepted cost of constant-memory dedup; the filter never reports
//! spuriously, it only suppresses.

use std::cell::RefCell;

/// Number of 64-bit words in the filter.
pub const BLOOM_WORDS: usize = 1024;

/// Fixed-size bloom filter over site hashes.
pub struct BloomFilter {
    words: Box<[u64; BLOOM_WORDS]>,
}

impl Default for BloomFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl BloomFilter {
    pub fn new() -> Self {
        Self {
            words: Box::new([0; BLOOM_WORDS]),
        }
    }

    fn position(hash: u64) -> (usize, u64) {
        let word = ((hash >> 6) as usize) % BLOOM_WORDS;
        let bit = 1u64 << (hash & 63);
        (word, bit)
    }

    pub fn contains(&self, hash: u64) -> bool {
        let (word, bit) = Self::position(hash);
        self.words[word] & bit != 0
    }

    pub fn insert(&mut self, hash: u64) {
        let (word, bit) = Self::position(hash);
        self.words[word] |= bit;
    }

    /// Insert `hash`; returns whether it was absent before (a first
    /// occurrence worth reporting).
    pub fn check_and_insert(&mut self, hash: u64) -> bool {
        if self.contains(hash) {
            return false;
        }
        self.insert(hash);
        true
    }
}

thread_local! {
    static SEEN_REPORTS: RefCell<BloomFilter> = RefCell::new(BloomFilter::new());
}

/// Record `hash` in the calling thread's filter; true iff this is the
/// thread's first occurrence.
pub fn first_occurrence(hash: u64) -> bool {
    SEEN_REPORTS.with(|filter| filter.borrow_mut().check_and_insert(hash))
}
