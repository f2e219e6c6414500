// SPDX-License-Identifier: MIT OR Apache-2.0

//! Encoding and decoding of policy and group listing documents in [CBOR] format.
//!
//! [CBOR]: https://cbor.io/
use std::io::Read;

use ciborium::de::Error as DeserializeError;
use ciborium::ser::Error as SerializeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Encode a document as CBOR.
pub fn encode_cbor<T: Serialize>(document: &T) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(document, &mut bytes)?;
    Ok(bytes)
}

/// Decode a CBOR document.
pub fn decode_cbor<T, R>(reader: R) -> Result<T, DecodeError>
where
    T: for<'a> Deserialize<'a>,
    R: Read,
{
    Ok(ciborium::from_reader::<T, R>(reader)?)
}

/// Writing a CBOR document failed.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The underlying writer failed.
    #[error("failed writing document: {0}")]
    Io(std::io::Error),

    /// The document contains a value serde can not represent in CBOR.
    #[error("failed encoding document: {0}")]
    Value(String),
}

impl From<SerializeError<std::io::Error>> for EncodeError {
    fn from(err: SerializeError<std::io::Error>) -> Self {
        match err {
            SerializeError::Io(err) => Self::Io(err),
            SerializeError::Value(description) => Self::Value(description),
        }
    }
}

/// Reading a CBOR document failed.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The underlying reader failed.
    #[error("failed reading document: {0}")]
    Io(std::io::Error),

    /// The bytes are not valid CBOR, at the given offset.
    #[error("malformed document at byte {0}")]
    Syntax(usize),

    /// The bytes are valid CBOR but do not have the shape of the expected document.
    ///
    /// Carries the offset of the offending item if it is known.
    #[error("unexpected value in document at {0:?}: {1}")]
    Semantic(Option<usize>, String),

    /// The document is nested too deeply.
    #[error("document nested too deeply")]
    RecursionLimitExceeded,
}

impl From<DeserializeError<std::io::Error>> for DecodeError {
    fn from(err: DeserializeError<std::io::Error>) -> Self {
        match err {
            DeserializeError::Io(err) => Self::Io(err),
            DeserializeError::Syntax(offset) => Self::Syntax(offset),
            DeserializeError::Semantic(offset, description) => Self::Semantic(offset, description),
            DeserializeError::RecursionLimitExceeded => Self::RecursionLimitExceeded,
        }
    }
}
