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

//! A list of error types which are produced during an execution of the protocol
use displaydoc::Display;
use thiserror::Error;

/// Represents an error in the manipulation of internal cryptographic data
#[derive(Debug, Display, Error)]
pub enum InternalError {
    /// Invalid length for {name}: expected {len}, but is actually {actual_len}.
    SizeError {
        /// name
        name: &'static str,
        /// length
        len: usize,
        /// actual
        actual_len: usize,
    },
    /// Data for an unpadded cipher call is not a multiple of the cipher block size
    BlockAlignmentError,
    /// Key material was rejected by the underlying primitive
    InvalidKeyError,
    /// The underlying cryptographic provider reported a failure
    CryptoFailureError,
    /// Could not decode a point on the curve
    PointError,
    /// The random source failed to produce distinct derivation indexes
    RngExhaustionError,
}

/// Represents an error in protocol handling
#[derive(Debug, Display, Error)]
pub enum ProtocolError {
    /// Internal error during cryptographic processing: {0}
    CryptoError(InternalError),
    /// Number of signature keys must be between one and three
    InvalidKeyCountError,
    /// Counter material must be exactly sixteen bytes
    InvalidCounterError,
    /// MAC of the received message did not match
    MacMismatchError,
    /// Signature presented by the peer did not verify
    SignatureMismatchError,
    /// The received message is structurally invalid
    InvalidMessageError,
    /// Structural violation in the activation handshake
    HandshakeError,
}

// This is meant to express future(ly) non-trivial ways of converting the
// internal error into a ProtocolError
impl From<InternalError> for ProtocolError {
    fn from(e: InternalError) -> ProtocolError {
        ProtocolError::CryptoError(e)
    }
}

pub(crate) mod utils {
    use super::*;

    pub fn check_slice_size<'a>(
        slice: &'a [u8],
        expected_len: usize,
        arg_name: &'static str,
    ) -> Result<&'a [u8], InternalError> {
        if slice.len() != expected_len {
            return Err(InternalError::SizeError {
                name: arg_name,
                len: expected_len,
                actual_len: slice.len(),
            });
        }
        Ok(slice)
    }
}
