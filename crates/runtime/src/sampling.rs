// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! The sampling oracle
//!
//! Truthy iff a per-thread pseudo-random draw in [0, 1) is strictly below
//! the configured rate. Thread-safe without a shared lock: each thread owns
//! its generator, seeded at first use from the wall clock XOR the thread
//! identifier XOR a stack address.

use std::cell::RefCell;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::{ensure_init, sample_rate};

thread_local! {
    static RNG: RefCell<Option<SmallRng>> = const { RefCell::new(None) };
}

fn seed() -> u64 {
    let clock = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0);

    let mut hasher = DefaultHasher::new();
    std::thread::current().id().hash(&mut hasher);
    let thread = hasher.finish();

    let marker = 0u8;
    let stack = std::ptr::addr_of!(marker) as usize as u64;

    clock ^ thread ^ stack
}

/// Decide whether the current event should be sampled.
pub fn should_sample() -> bool {
    ensure_init();
    let rate = sample_rate();
    if rate >= 1.0 {
        return true;
    }
    if rate <= 0.0 {
        return false;
    }
    RNG.with(|cell| {
        let mut slot = cell.borrow_mut();
        let rng = slot.get_or_insert_with(|| SmallRng::seed_from_u64(seed()));
        rng.random::<f64>() < rate
    })
}
