//! Canonical message envelope
//!
//! A [`MessageData`] is the protocol-neutral form of one object value:
//! addressing, a value type tag, a value count and a byte payload whose length
//! is always `count * value_type.size()`. The invariant is checked by every
//! constructor, so code holding a `MessageData` can read the payload without
//! re-validating it.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::{Addressing, Error, Result};

/// Value type tag of a message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    None,
    Int,
    Float,
    String,
}

impl ValueType {
    /// Size in bytes of one value of this type
    pub const fn size(self) -> usize {
        match self {
            ValueType::None => 0,
            ValueType::Int | ValueType::Float => 4,
            ValueType::String => 1,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::None => "none",
            ValueType::Int => "int32",
            ValueType::Float => "float32",
            ValueType::String => "string",
        };
        f.write_str(name)
    }
}

/// Addressed, typed object value.
///
/// Equality, ordering and hashing look at addressing, value type, value count
/// and payload size only, never at payload bytes, so messages can key caches
/// without hashing their content. Compare [`MessageData::payload`] when the
/// actual values matter.
#[derive(Debug, Clone)]
pub struct MessageData {
    addressing: Addressing,
    value_type: ValueType,
    value_count: u16,
    payload: Bytes,
}

impl MessageData {
    /// Build a message from an already encoded payload, validating its length
    pub fn new(
        addressing: Addressing,
        value_type: ValueType,
        value_count: u16,
        payload: impl Into<Bytes>,
    ) -> Result<Self> {
        let payload = payload.into();
        let expected = value_count as usize * value_type.size();
        if payload.len() != expected || (value_type == ValueType::None && value_count != 0) {
            return Err(Error::InvalidPayload {
                value_type,
                value_count,
                expected,
                actual: payload.len(),
            });
        }
        Ok(Self {
            addressing,
            value_type,
            value_count,
            payload,
        })
    }

    /// Build a message owning a private copy of `payload`
    pub fn copy_from(
        addressing: Addressing,
        value_type: ValueType,
        value_count: u16,
        payload: &[u8],
    ) -> Result<Self> {
        Self::new(addressing, value_type, value_count, Bytes::copy_from_slice(payload))
    }

    /// Zero-value message, used for polls and heartbeats
    pub fn empty(addressing: Addressing) -> Self {
        Self {
            addressing,
            value_type: ValueType::None,
            value_count: 0,
            payload: Bytes::new(),
        }
    }

    pub fn from_floats(addressing: Addressing, values: &[f32]) -> Self {
        let mut buf = BytesMut::with_capacity(values.len() * 4);
        for v in values {
            buf.put_f32_le(*v);
        }
        Self {
            addressing,
            value_type: ValueType::Float,
            value_count: values.len() as u16,
            payload: buf.freeze(),
        }
    }

    pub fn from_ints(addressing: Addressing, values: &[i32]) -> Self {
        let mut buf = BytesMut::with_capacity(values.len() * 4);
        for v in values {
            buf.put_i32_le(*v);
        }
        Self {
            addressing,
            value_type: ValueType::Int,
            value_count: values.len() as u16,
            payload: buf.freeze(),
        }
    }

    /// String message; strings longer than `u16::MAX` bytes are truncated
    pub fn from_string(addressing: Addressing, value: &str) -> Self {
        let mut end = value.len().min(u16::MAX as usize);
        while !value.is_char_boundary(end) {
            end -= 1;
        }
        Self {
            addressing,
            value_type: ValueType::String,
            value_count: end as u16,
            payload: Bytes::copy_from_slice(&value.as_bytes()[..end]),
        }
    }

    pub fn addressing(&self) -> Addressing {
        self.addressing
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn value_count(&self) -> u16 {
        self.value_count
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }

    /// True for poll / heartbeat messages that carry no value
    pub fn is_empty(&self) -> bool {
        self.value_count == 0
    }

    /// Same value, different addressing
    pub fn with_addressing(&self, addressing: Addressing) -> Self {
        Self {
            addressing,
            ..self.clone()
        }
    }

    /// Float values, or a type mismatch error
    pub fn floats(&self) -> Result<Vec<f32>> {
        self.expect_type(ValueType::Float)?;
        Ok(self
            .payload
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// Int values, or a type mismatch error
    pub fn ints(&self) -> Result<Vec<i32>> {
        self.expect_type(ValueType::Int)?;
        Ok(self
            .payload
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    /// String value, or a type mismatch error
    pub fn string(&self) -> Result<String> {
        self.expect_type(ValueType::String)?;
        Ok(String::from_utf8_lossy(&self.payload).into_owned())
    }

    /// Numeric values widened to f64; empty for string and valueless messages
    pub fn numeric_values(&self) -> Vec<f64> {
        match self.value_type {
            ValueType::Float => self
                .floats()
                .map(|v| v.into_iter().map(f64::from).collect())
                .unwrap_or_default(),
            ValueType::Int => self
                .ints()
                .map(|v| v.into_iter().map(f64::from).collect())
                .unwrap_or_default(),
            ValueType::None | ValueType::String => Vec::new(),
        }
    }

    /// Float value at `index`, if this is a float message long enough
    pub fn float_at(&self, index: usize) -> Option<f32> {
        if self.value_type != ValueType::Float {
            return None;
        }
        let bytes = self.payload.get(index * 4..index * 4 + 4)?;
        Some(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Int value at `index`, if this is an int message long enough
    pub fn int_at(&self, index: usize) -> Option<i32> {
        if self.value_type != ValueType::Int {
            return None;
        }
        let bytes = self.payload.get(index * 4..index * 4 + 4)?;
        Some(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn expect_type(&self, expected: ValueType) -> Result<()> {
        if self.value_type == expected {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                expected,
                actual: self.value_type,
            })
        }
    }

    fn key(&self) -> (Addressing, ValueType, u16, usize) {
        (
            self.addressing,
            self.value_type,
            self.value_count,
            self.payload.len(),
        )
    }
}

impl PartialEq for MessageData {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for MessageData {}

impl PartialOrd for MessageData {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MessageData {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl Hash for MessageData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for MessageData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.addressing)?;
        match self.value_type {
            ValueType::None => f.write_str("()"),
            ValueType::String => write!(f, "{:?}", String::from_utf8_lossy(&self.payload)),
            ValueType::Float => write!(f, "{:?}", self.floats().unwrap_or_default()),
            ValueType::Int => write!(f, "{:?}", self.ints().unwrap_or_default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_length_is_validated() {
        let addr = Addressing::channel(1);
        assert!(MessageData::new(addr, ValueType::Float, 2, vec![0u8; 8]).is_ok());
        let err = MessageData::new(addr, ValueType::Float, 2, vec![0u8; 7]).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidPayload {
                value_type: ValueType::Float,
                value_count: 2,
                expected: 8,
                actual: 7
            }
        );
        assert!(MessageData::new(addr, ValueType::None, 1, Vec::new()).is_err());
    }

    #[test]
    fn test_float_accessors() {
        let msg = MessageData::from_floats(Addressing::new(2, 1), &[0.25, -1.5]);
        assert_eq!(msg.value_count(), 2);
        assert_eq!(msg.payload_size(), 8);
        assert_eq!(msg.floats().unwrap(), vec![0.25, -1.5]);
        assert_eq!(msg.float_at(1), Some(-1.5));
        assert_eq!(msg.float_at(2), None);
        assert!(msg.ints().is_err());
    }

    #[test]
    fn test_string_roundtrip() {
        let msg = MessageData::from_string(Addressing::channel(4), "Vocals");
        assert_eq!(msg.value_type(), ValueType::String);
        assert_eq!(msg.value_count(), 6);
        assert_eq!(msg.string().unwrap(), "Vocals");
    }

    #[test]
    fn test_equality_ignores_payload_bytes() {
        let addr = Addressing::channel(1);
        let a = MessageData::from_floats(addr, &[1.0]);
        let b = MessageData::from_floats(addr, &[2.0]);
        assert_eq!(a, b);
        assert_ne!(a.payload(), b.payload());
        let c = MessageData::from_ints(addr, &[1]);
        assert_ne!(a, c);
    }

    #[test]
    fn test_copy_from_owns_payload() {
        let mut source = 7i32.to_le_bytes().to_vec();
        let msg = MessageData::copy_from(Addressing::NONE, ValueType::Int, 1, &source).unwrap();
        source[0] = 0;
        assert_eq!(msg.int_at(0), Some(7));
    }

    #[test]
    fn test_numeric_values() {
        let ints = MessageData::from_ints(Addressing::NONE, &[3, -2]);
        assert_eq!(ints.numeric_values(), vec![3.0, -2.0]);
        assert!(MessageData::empty(Addressing::NONE).numeric_values().is_empty());
        assert!(MessageData::empty(Addressing::NONE).is_empty());
    }
}
