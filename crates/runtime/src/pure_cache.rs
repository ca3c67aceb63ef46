// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Per-thread pure-call memoization
//!
//! A 1024-slot direct-mapped table keyed by function-name hash and the two
//! argument values. A slot records the first observed result for its
//! `(function, arg0, arg1)` triple; a later differing result at a matching
//! key is an inconsistency. A collision (matching slot, different key)
//! overwrites the slot — degraded coverage, never a spurious report.

use std::cell::RefCell;

/// Number of direct-mapped slots per thread.
pub const PURE_CACHE_SLOTS: usize = 1024;

#[derive(Debug, Clone, Copy, Default)]
struct Entry {
    func_hash: u64,
    arg0: i64,
    arg1: i64,
    result: i64,
    valid: bool,
}

/// Outcome of recording one pure-call observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First sighting of this triple (or a slot takeover); recorded, no
    /// report.
    First,
    /// Same triple, same result as before.
    Consistent,
    /// Same triple, different result: the prior sample contradicts this one.
    Inconsistent { previous: i64 },
}

/// Direct-mapped memoization table.
pub struct PureCache {
    slots: Box<[Entry; PURE_CACHE_SLOTS]>,
}

impl Default for PureCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PureCache {
    pub fn new() -> Self {
        Self {
            slots: Box::new([Entry::default(); PURE_CACHE_SLOTS]),
        }
    }

    fn slot_index(func_hash: u64, arg0: i64, arg1: i64) -> usize {
        let combined = func_hash ^ (arg0 as u64) ^ ((arg1 as u64) << 16);
        (combined as usize) % PURE_CACHE_SLOTS
    }

    /// Record one observation and classify it.
    pub fn observe(&mut self, func_hash: u64, arg0: i64, arg1: i64, result: i64) -> Observation {
        let entry = &mut self.slots[Self::slot_index(func_hash, arg0, arg1)];

        let key_matches = entry.valid
            && entry.func_hash == func_hash
            && entry.arg0 == arg0
            && entry.arg1 == arg1;

        if key_matches {
            if entry.result == result {
                Observation::Consistent
            } else {
                Observation::Inconsistent {
                    previous: entry.result,
                }
            }
        } else {
            *entry = Entry {
                func_hash,
                arg0,
                arg1,
                result,
                valid: true,
            };
            Observation::First
        }
    }
}

thread_local! {
    static PURE_CACHE: RefCell<PureCache> = RefCell::new(PureCache::new());
}

/// Record an observation in the calling thread's cache.
pub fn observe(func_hash: u64, arg0: i64, arg1: i64, result: i64) -> Observation {
    PURE_CACHE.with(|cache| cache.borrow_mut().observe(func_hash, arg0, arg1, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_string;

    #[test]
    fn test_first_observation_recorded_silently() {
        let mut cache = PureCache::new();
        let h = hash_string("pure_sum");
        assert_eq!(cache.observe(h, 20, 22, 42), Observation::First);
    }

    #[test]
    fn test_consistent_repeat_is_silent() {
        let mut cache = PureCache::new();
        let h = hash_string("pure_sum");
        cache.observe(h, 20, 22, 42);
        assert_eq!(cache.observe(h, 20, 22, 42), Observation::Consistent);
        assert_eq!(cache.observe(h, 20, 22, 42), Observation::Consistent);
    }

    #[test]
    fn test_differing_result_is_inconsistent_with_first_sample() {
        let mut cache = PureCache::new();
        let h = hash_string("pure_sum");
        cache.observe(h, 20, 22, 42);
        assert_eq!(
            cache.observe(h, 20, 22, 1),
            Observation::Inconsistent { previous: 42 }
        );
        // The slot keeps the first-observed result.
        assert_eq!(
            cache.observe(h, 20, 22, 7),
            Observation::Inconsistent { previous: 42 }
        );
    }

    #[test]
    fn test_different_arguments_use_their_own_samples() {
        let mut cache = PureCache::new();
        let h = hash_string("pure_sum");
        assert_eq!(cache.observe(h, 1, 2, 3), Observation::First);
        assert_eq!(cache.observe(h, 2, 2, 4), Observation::First);
        assert_eq!(cache.observe(h, 1, 2, 3), Observation::Consistent);
    }

    #[test]
    fn test_slot_collision_overwrites_quietly() {
        let mut cache = PureCache::new();
        // Same slot, different function hash: arg values chosen equal so the
        // index collides when the hashes do modulo the table size.
        let a = 0u64;
        let b = PURE_CACHE_SLOTS as u64; // same index, different key
        assert_eq!(cache.observe(a, 0, 0, 10), Observation::First);
        assert_eq!(cache.observe(b, 0, 0, 20), Observation::First);
        // The takeover evicted the first key; re-observing it is First
        // again, never a report.
        assert_eq!(cache.observe(a, 0, 0, 11), Observation::First);
    }

    #[test]
    fn test_thread_local_caches_are_independent() {
        let h = hash_string("f");
        assert_eq!(observe(h, 1, 1, 2), Observation::First);
        assert_eq!(observe(h, 1, 1, 3), Observation::Inconsistent { previous: 2 });

        let handle = std::thread::spawn(move || observe(h, 1, 1, 3));
        assert_eq!(handle.join().unwrap(), Observation::First);
    }
}
