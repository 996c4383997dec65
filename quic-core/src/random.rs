// Copyright (c) The quic-core Authors.
// SPDX-License-Identifier: Apache-2.0

//! Randomness for connection IDs, PATH_CHALLENGE data, and stateless reset
//! tokens. Backed by `ring`'s CSPRNG, the same primitive the packet key
//! hierarchy (§4.2) already depends on for AEAD sealing.

use ring::rand::{SecureRandom, SystemRandom};

#[derive(Debug, Default)]
pub struct Random {
    rng: SystemRandom,
}

impl Random {
    pub fn new() -> Self {
        Self { rng: SystemRandom::new() }
    }

    pub fn fill(&self, dest: &mut [u8]) {
        self.rng
            .fill(dest)
            .expect("the system entropy source is unavailable");
    }

    pub fn gen_array<const N: usize>(&self) -> [u8; N] {
        let mut out = [0u8; N];
        self.fill(&mut out);
        out
    }
}
