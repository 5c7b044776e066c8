// PowerAuth Crypto Library
// Copyright 2016 Wultra s.r.o.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The two counter flavors that index derived signing keys
//!
//! The legacy family indexes signatures with a monotonic 64-bit integer; the
//! current family with a rolling hash chain over an opaque 16-byte value.
//! Both materialize to exactly 16 bytes for signing, and both advance by one
//! deterministic step per accepted signature, so client and server stay in
//! lockstep as long as the surrounding service serializes advancement per
//! activation. Out-of-sync recovery belongs to that service; [`look_ahead`]
//! gives it the deterministic window it needs.
//!
//! [`look_ahead`]: Counter::look_ahead

use crate::errors::ProtocolError;
use crate::primitives::{self, BLOCK_SIZE};
use rand_core::{CryptoRng, RngCore};

/// Counter material for one activation, tagged by protocol family.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Counter {
    /// Legacy numeric counter. Starts at zero on both sides and increments
    /// by one per accepted signature. Kept for wire compatibility only; new
    /// activations should use the hash chain.
    V2(u64),
    /// Hash-chain counter: an opaque 16-byte value replaced by the truncated
    /// SHA-256 of itself on every step.
    V3([u8; BLOCK_SIZE]),
}

impl Counter {
    /// Initializes a hash-chain counter from 16 random bytes. The seed is
    /// agreed during activation and shared with the peer under the transport
    /// key.
    pub fn init_v3<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Counter::V3(primitives::random_bytes(rng))
    }

    /// Initializes a legacy numeric counter at zero.
    #[deprecated(note = "the numeric counter is a legacy surface; use `init_v3`")]
    pub fn init_v2() -> Self {
        Counter::V2(0)
    }

    /// Builds a hash-chain counter from peer-supplied material, rejecting
    /// anything that is not exactly 16 bytes.
    pub fn v3_from_slice(input: &[u8]) -> Result<Self, ProtocolError> {
        let bytes: [u8; BLOCK_SIZE] = input
            .try_into()
            .map_err(|_| ProtocolError::InvalidCounterError)?;
        Ok(Counter::V3(bytes))
    }

    /// Materializes the counter for signing: the numeric counter as a
    /// right-aligned big-endian value, the hash-chain value verbatim.
    pub fn ctr_data(&self) -> [u8; BLOCK_SIZE] {
        match self {
            Counter::V2(ctr) => {
                let mut bytes = [0u8; BLOCK_SIZE];
                bytes[8..].copy_from_slice(&ctr.to_be_bytes());
                bytes
            }
            Counter::V3(ctr_data) => *ctr_data,
        }
    }

    /// Advances the counter by one step. Called by both sides once a
    /// signature has been accepted.
    pub fn advance(&mut self) {
        match self {
            Counter::V2(ctr) => *ctr = ctr.wrapping_add(1),
            Counter::V3(ctr_data) => {
                let digest = primitives::sha256(ctr_data);
                ctr_data.copy_from_slice(&digest[..BLOCK_SIZE]);
            }
        }
    }

    /// Advances the counter by `n` steps.
    pub fn advance_by(&mut self, n: u64) {
        for _ in 0..n {
            self.advance();
        }
    }

    /// Materializes the current value and the next `window` values, in
    /// order. The server-side verifier walks this window when the client has
    /// run ahead.
    pub fn look_ahead(&self, window: usize) -> Vec<[u8; BLOCK_SIZE]> {
        let mut cursor = self.clone();
        let mut materializations = Vec::with_capacity(window + 1);
        materializations.push(cursor.ctr_data());
        for _ in 0..window {
            cursor.advance();
            materializations.push(cursor.ctr_data());
        }
        materializations
    }

    /// Whether this counter belongs to the legacy numeric family.
    pub fn is_legacy(&self) -> bool {
        matches!(self, Counter::V2(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_counter_materialization() {
        let counter = Counter::V2(42);
        assert_eq!(
            hex::encode(counter.ctr_data()),
            "0000000000000000000000000000002a"
        );
    }

    #[test]
    fn numeric_counter_advances_by_one() {
        let mut counter = Counter::V2(0);
        counter.advance();
        counter.advance();
        assert_eq!(counter, Counter::V2(2));
        counter.advance_by(40);
        assert_eq!(counter, Counter::V2(42));
    }

    #[test]
    fn hash_chain_is_reproducible() {
        let seed = hex::decode("0123456789abcdef0123456789abcdef").unwrap();
        let mut counter = Counter::v3_from_slice(&seed).unwrap();
        counter.advance();
        assert_eq!(
            hex::encode(counter.ctr_data()),
            "223e0a160af9da0a03e6dd2c4719c56f"
        );
        counter.advance();
        assert_eq!(
            hex::encode(counter.ctr_data()),
            "1a3781d6b29c194c9564bf7448e00399"
        );
        let mut tenth = Counter::v3_from_slice(&seed).unwrap();
        tenth.advance_by(10);
        assert_eq!(
            hex::encode(tenth.ctr_data()),
            "ec801fea4f9a13e595575ad170ea10dd"
        );
    }

    #[test]
    fn look_ahead_starts_at_current_value() {
        let seed = [7u8; 16];
        let counter = Counter::V3(seed);
        let window = counter.look_ahead(3);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0], seed);
        let mut expected = counter.clone();
        expected.advance();
        assert_eq!(window[1], expected.ctr_data());
    }

    #[test]
    fn rejects_malformed_chain_material() {
        assert!(Counter::v3_from_slice(&[0u8; 15]).is_err());
        assert!(Counter::v3_from_slice(&[0u8; 17]).is_err());
    }
}
