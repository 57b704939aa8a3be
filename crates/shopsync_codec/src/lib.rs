//! # shopsync codec
//!
//! Record values and the CBOR payload codec for shopsync.
//!
//! This crate provides:
//! - [`Value`], the dynamic value held by record fields
//! - [`Record`], an ordered string-keyed map of values
//! - CBOR encoding of any serde type, used for deferred job payloads
//!
//! ## Usage
//!
//! ```
//! use shopsync_codec::{from_cbor, to_cbor, Record};
//!
//! let record = Record::new().with("name", "Shoes").with("level", 2i64);
//! let bytes = to_cbor(&record).unwrap();
//! let decoded: Record = from_cbor(&bytes).unwrap();
//! assert_eq!(record, decoded);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod record;
mod value;

pub use error::{CodecError, CodecResult};
pub use record::Record;
pub use value::Value;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes a serde value to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the value cannot be serialized.
pub fn to_cbor<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::ser::into_writer(value, &mut buffer)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buffer)
}

/// Decodes CBOR bytes into a serde value.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR for `T`.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::de::from_reader(bytes).map_err(|e| CodecError::decoding_failed(e.to_string()))
}

/// Trait for types that can be encoded to a CBOR payload.
pub trait Encode {
    /// Encode this value to CBOR bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from a CBOR payload.
pub trait Decode: Sized {
    /// Decode this value from CBOR bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl<T: Serialize> Encode for T {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_cbor(self)
    }
}

impl<T: DeserializeOwned> Decode for T {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_cbor(bytes)
    }
}
