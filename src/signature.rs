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

//! Multi-factor request signatures
//!
//! A request signature is computed over an already-formatted signature base
//! string supplied by the caller, under an ordered list of one to three
//! factor keys (possession, then knowledge, then biometry). Each factor
//! contributes one component: its key is first stretched with the counter
//! material, chained through the keys of the preceding factors, and the
//! resulting HMAC over the data is folded to an 8-digit decimal, so a full
//! signature reads like `"12345678-90123456"`.
//!
//! The chaining step below indexes the key list with `j + 1` while the outer
//! loop is zero-based. That asymmetry is part of the wire contract shared
//! with every deployed peer; both sides of every activation compute it the
//! same way, and the known-answer tests pin it.

use crate::counter::Counter;
use crate::errors::ProtocolError;
use crate::kdf::SecretKey;
use crate::primitives::{self, BLOCK_SIZE};
use subtle::ConstantTimeEq;

/// Decimal digits contributed by each factor key.
pub const SIGNATURE_LENGTH: usize = 8;

/// Maximum number of factor keys in one signature.
pub const MAX_SIGNATURE_KEYS: usize = 3;

const DECIMAL_MODULUS: u32 = 100_000_000;

/// Computes the signature of `data` under the ordered factor keys and the
/// given counter.
///
/// Fails with [`ProtocolError::InvalidKeyCountError`] unless one to three
/// keys are supplied.
pub fn compute_signature(
    data: &[u8],
    keys: &[SecretKey],
    counter: &Counter,
) -> Result<String, ProtocolError> {
    compute_signature_for_ctr_data(data, keys, &counter.ctr_data())
}

/// Computes the signature for raw counter material held by the surrounding
/// service, e.g. while it walks a verification look-ahead window.
///
/// The material must be exactly 16 bytes
/// ([`ProtocolError::InvalidCounterError`] otherwise).
pub fn compute_signature_for_ctr_data(
    data: &[u8],
    keys: &[SecretKey],
    ctr_data: &[u8],
) -> Result<String, ProtocolError> {
    if keys.is_empty() || keys.len() > MAX_SIGNATURE_KEYS {
        return Err(ProtocolError::InvalidKeyCountError);
    }
    if ctr_data.len() != BLOCK_SIZE {
        return Err(ProtocolError::InvalidCounterError);
    }

    let mut components = Vec::with_capacity(keys.len());
    for i in 0..keys.len() {
        let mut derived_key = primitives::hmac_sha256(keys[i].as_bytes(), ctr_data)?;
        for j in 0..i {
            // Wire contract: the chain reuses the key list starting at the
            // second entry, not at `j`.
            let inner_key = primitives::hmac_sha256(keys[j + 1].as_bytes(), ctr_data)?;
            derived_key = primitives::hmac_sha256(&inner_key, &derived_key)?;
        }
        let mac = primitives::hmac_sha256(&derived_key, data)?;
        components.push(decimal_component(&mac));
    }
    Ok(components.join("-"))
}

/// Verifies a candidate signature by recomputation and constant-time
/// comparison. Returns `Ok(false)` on mismatch; errors only signal malformed
/// inputs.
pub fn verify_signature(
    data: &[u8],
    signature: &str,
    keys: &[SecretKey],
    counter: &Counter,
) -> Result<bool, ProtocolError> {
    verify_signature_for_ctr_data(data, signature, keys, &counter.ctr_data())
}

/// Verifies a candidate signature against raw counter material.
pub fn verify_signature_for_ctr_data(
    data: &[u8],
    signature: &str,
    keys: &[SecretKey],
    ctr_data: &[u8],
) -> Result<bool, ProtocolError> {
    let expected = compute_signature_for_ctr_data(data, keys, ctr_data)?;
    Ok(expected.as_bytes().ct_eq(signature.as_bytes()).into())
}

/// Folds a MAC into one zero-padded decimal component: the trailing four
/// bytes as a big-endian integer, sign bit masked, reduced mod 10^8.
fn decimal_component(mac: &[u8; 32]) -> String {
    let index = mac.len() - 4;
    let number = u32::from_be_bytes([mac[index], mac[index + 1], mac[index + 2], mac[index + 3]]);
    format!("{:08}", (number & 0x7FFF_FFFF) % DECIMAL_MODULUS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const DATA: &[u8] = b"POST&/pa/signature/validate&bm9uY2U=&Ym9keQ==";

    fn possession() -> SecretKey {
        SecretKey::from_bytes(&hex::decode("0f0e0d0c0b0a09080706050403020100").unwrap()).unwrap()
    }

    fn knowledge() -> SecretKey {
        SecretKey::from_bytes(&hex::decode("101112131415161718191a1b1c1d1e1f").unwrap()).unwrap()
    }

    fn biometry() -> SecretKey {
        SecretKey::from_bytes(&hex::decode("202122232425262728292a2b2c2d2e2f").unwrap()).unwrap()
    }

    fn chain_counter() -> Counter {
        Counter::v3_from_slice(&hex::decode("00000000000000000000000000000001").unwrap()).unwrap()
    }

    #[test]
    fn single_factor_known_answer() {
        let signature = compute_signature(DATA, &[possession()], &chain_counter()).unwrap();
        assert_eq!(signature, "87714236");
    }

    #[test]
    fn two_factor_numeric_counter_known_answer() {
        let signature =
            compute_signature(DATA, &[possession(), knowledge()], &Counter::V2(42)).unwrap();
        assert_eq!(signature, "37386061-95692756");
    }

    #[test]
    fn three_factor_known_answer() {
        let signature = compute_signature(
            DATA,
            &[possession(), knowledge(), biometry()],
            &chain_counter(),
        )
        .unwrap();
        assert_eq!(signature, "87714236-16498146-58285533");
    }

    #[test]
    fn component_shape() {
        for count in 1..=3 {
            let keys: Vec<_> = [possession(), knowledge(), biometry()]
                .into_iter()
                .take(count)
                .collect();
            let signature = compute_signature(DATA, &keys, &chain_counter()).unwrap();
            assert_eq!(signature.len(), SIGNATURE_LENGTH * count + (count - 1));
            for component in signature.split('-') {
                assert_eq!(component.len(), SIGNATURE_LENGTH);
                assert!(component.bytes().all(|b| b.is_ascii_digit()));
            }
        }
    }

    #[test]
    fn rejects_bad_key_counts() {
        assert!(matches!(
            compute_signature(DATA, &[], &chain_counter()),
            Err(ProtocolError::InvalidKeyCountError)
        ));
        let four = vec![possession(), knowledge(), biometry(), possession()];
        assert!(matches!(
            compute_signature(DATA, &four, &chain_counter()),
            Err(ProtocolError::InvalidKeyCountError)
        ));
    }

    #[test]
    fn rejects_short_counter_material() {
        assert!(matches!(
            compute_signature_for_ctr_data(DATA, &[possession()], &[0u8; 15]),
            Err(ProtocolError::InvalidCounterError)
        ));
    }

    #[test]
    fn verification_roundtrip_and_rejection() {
        let keys = [possession(), knowledge()];
        let counter = chain_counter();
        let signature = compute_signature(DATA, &keys, &counter).unwrap();
        assert!(verify_signature(DATA, &signature, &keys, &counter).unwrap());

        // any perturbation of the inputs must fail verification
        assert!(!verify_signature(b"POST&/pa/other&bm9uY2U=&Ym9keQ==", &signature, &keys, &counter).unwrap());
        assert!(!verify_signature(DATA, &signature, &[possession()], &counter).unwrap());
        let mut advanced = counter.clone();
        advanced.advance();
        assert!(!verify_signature(DATA, &signature, &keys, &advanced).unwrap());
        assert!(!verify_signature(DATA, "00000000-00000000", &keys, &counter).unwrap());
    }

    proptest! {
        #[test]
        fn signatures_are_deterministic(
            data in proptest::collection::vec(any::<u8>(), 0..256),
            seed in any::<[u8; 16]>(),
            key in any::<[u8; 16]>()
        ) {
            let keys = [SecretKey::new(key)];
            let counter = Counter::V3(seed);
            let first = compute_signature(&data, &keys, &counter).unwrap();
            let second = compute_signature(&data, &keys, &counter).unwrap();
            prop_assert_eq!(&first, &second);
            prop_assert!(verify_signature(&data, &first, &keys, &counter).unwrap());
        }
    }
}
