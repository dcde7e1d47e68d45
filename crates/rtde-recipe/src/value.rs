use bytes::{Buf, BufMut, BytesMut};
use serde::Serialize;

use crate::error::{RecipeError, Result};
use crate::types::FieldType;

/// A typed field value. One variant per [`FieldType`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    UInt8(u8),
    UInt32(u32),
    UInt64(u64),
    Int32(i32),
    Double(f64),
    Vector3d([f64; 3]),
    Vector6d([f64; 6]),
    Vector6Int32([i32; 6]),
    Vector6UInt32([u32; 6]),
    String(String),
}

impl FieldValue {
    /// The type of this value.
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::UInt8(_) => FieldType::UInt8,
            FieldValue::UInt32(_) => FieldType::UInt32,
            FieldValue::UInt64(_) => FieldType::UInt64,
            FieldValue::Int32(_) => FieldType::Int32,
            FieldValue::Double(_) => FieldType::Double,
            FieldValue::Vector3d(_) => FieldType::Vector3d,
            FieldValue::Vector6d(_) => FieldType::Vector6d,
            FieldValue::Vector6Int32(_) => FieldType::Vector6Int32,
            FieldValue::Vector6UInt32(_) => FieldType::Vector6UInt32,
            FieldValue::String(_) => FieldType::String,
        }
    }

    /// The zero value of a type.
    pub fn zero(ty: FieldType) -> Self {
        match ty {
            FieldType::Bool => FieldValue::Bool(false),
            FieldType::UInt8 => FieldValue::UInt8(0),
            FieldType::UInt32 => FieldValue::UInt32(0),
            FieldType::UInt64 => FieldValue::UInt64(0),
            FieldType::Int32 => FieldValue::Int32(0),
            FieldType::Double => FieldValue::Double(0.0),
            FieldType::Vector3d => FieldValue::Vector3d([0.0; 3]),
            FieldType::Vector6d => FieldValue::Vector6d([0.0; 6]),
            FieldType::Vector6Int32 => FieldValue::Vector6Int32([0; 6]),
            FieldType::Vector6UInt32 => FieldValue::Vector6UInt32([0; 6]),
            FieldType::String => FieldValue::String(String::new()),
        }
    }

    /// Parse a value of type `ty` from text.
    ///
    /// Vectors are comma-separated, optionally wrapped in brackets:
    /// `[0.1, 0.2, 0.3]`. Booleans accept `true`/`false`/`1`/`0`.
    pub fn parse(ty: FieldType, text: &str) -> Result<Self> {
        let invalid = || RecipeError::InvalidValue {
            ty,
            value: text.to_string(),
        };
        let trimmed = text.trim();

        let value = match ty {
            FieldType::Bool => match trimmed {
                "true" | "1" => FieldValue::Bool(true),
                "false" | "0" => FieldValue::Bool(false),
                _ => return Err(invalid()),
            },
            FieldType::UInt8 => FieldValue::UInt8(trimmed.parse().map_err(|_| invalid())?),
            FieldType::UInt32 => FieldValue::UInt32(trimmed.parse().map_err(|_| invalid())?),
            FieldType::UInt64 => FieldValue::UInt64(trimmed.parse().map_err(|_| invalid())?),
            FieldType::Int32 => FieldValue::Int32(trimmed.parse().map_err(|_| invalid())?),
            FieldType::Double => FieldValue::Double(trimmed.parse().map_err(|_| invalid())?),
            FieldType::Vector3d => FieldValue::Vector3d(parse_array(trimmed).ok_or_else(invalid)?),
            FieldType::Vector6d => FieldValue::Vector6d(parse_array(trimmed).ok_or_else(invalid)?),
            FieldType::Vector6Int32 => {
                FieldValue::Vector6Int32(parse_array(trimmed).ok_or_else(invalid)?)
            }
            FieldType::Vector6UInt32 => {
                FieldValue::Vector6UInt32(parse_array(trimmed).ok_or_else(invalid)?)
            }
            FieldType::String => FieldValue::String(text.to_string()),
        };
        Ok(value)
    }

    /// Numeric scalar as `f64`, if this is a scalar.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Bool(v) => Some(f64::from(u8::from(*v))),
            FieldValue::UInt8(v) => Some(f64::from(*v)),
            FieldValue::UInt32(v) => Some(f64::from(*v)),
            FieldValue::UInt64(v) => Some(*v as f64),
            FieldValue::Int32(v) => Some(f64::from(*v)),
            FieldValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Vector elements as `f64`, if this is a vector.
    pub fn as_vector(&self) -> Option<Vec<f64>> {
        match self {
            FieldValue::Vector3d(v) => Some(v.to_vec()),
            FieldValue::Vector6d(v) => Some(v.to_vec()),
            FieldValue::Vector6Int32(v) => Some(v.iter().map(|x| f64::from(*x)).collect()),
            FieldValue::Vector6UInt32(v) => Some(v.iter().map(|x| f64::from(*x)).collect()),
            _ => None,
        }
    }

    /// Text content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Append the big-endian encoding of this value.
    pub(crate) fn encode(&self, field: &str, dst: &mut BytesMut) -> Result<()> {
        match self {
            FieldValue::Bool(v) => dst.put_u8(u8::from(*v)),
            FieldValue::UInt8(v) => dst.put_u8(*v),
            FieldValue::UInt32(v) => dst.put_u32(*v),
            FieldValue::UInt64(v) => dst.put_u64(*v),
            FieldValue::Int32(v) => dst.put_i32(*v),
            FieldValue::Double(v) => dst.put_f64(*v),
            FieldValue::Vector3d(v) => v.iter().for_each(|x| dst.put_f64(*x)),
            FieldValue::Vector6d(v) => v.iter().for_each(|x| dst.put_f64(*x)),
            FieldValue::Vector6Int32(v) => v.iter().for_each(|x| dst.put_i32(*x)),
            FieldValue::Vector6UInt32(v) => v.iter().for_each(|x| dst.put_u32(*x)),
            FieldValue::String(s) => {
                let len = u8::try_from(s.len()).map_err(|_| RecipeError::StringTooLong {
                    field: field.to_string(),
                    len: s.len(),
                })?;
                dst.put_u8(len);
                dst.put_slice(s.as_bytes());
            }
        }
        Ok(())
    }

    /// Decode one value of type `ty` from the front of `src`, advancing it.
    pub(crate) fn decode(ty: FieldType, field: &str, src: &mut &[u8]) -> Result<Self> {
        let need = match ty.size() {
            Some(size) => size,
            None => 1 + usize::from(src.first().copied().unwrap_or(0)),
        };
        if src.remaining() < need {
            return Err(RecipeError::MalformedPayload(format!(
                "field '{field}' ({ty}) needs {need} bytes, {} left",
                src.remaining()
            )));
        }

        let value = match ty {
            FieldType::Bool => FieldValue::Bool(src.get_u8() != 0),
            FieldType::UInt8 => FieldValue::UInt8(src.get_u8()),
            FieldType::UInt32 => FieldValue::UInt32(src.get_u32()),
            FieldType::UInt64 => FieldValue::UInt64(src.get_u64()),
            FieldType::Int32 => FieldValue::Int32(src.get_i32()),
            FieldType::Double => FieldValue::Double(src.get_f64()),
            FieldType::Vector3d => FieldValue::Vector3d(std::array::from_fn(|_| src.get_f64())),
            FieldType::Vector6d => FieldValue::Vector6d(std::array::from_fn(|_| src.get_f64())),
            FieldType::Vector6Int32 => {
                FieldValue::Vector6Int32(std::array::from_fn(|_| src.get_i32()))
            }
            FieldType::Vector6UInt32 => {
                FieldValue::Vector6UInt32(std::array::from_fn(|_| src.get_u32()))
            }
            FieldType::String => {
                let len = usize::from(src.get_u8());
                let text = std::str::from_utf8(&src[..len]).map_err(|err| {
                    RecipeError::MalformedPayload(format!("field '{field}' is not UTF-8: {err}"))
                })?;
                let value = FieldValue::String(text.to_string());
                src.advance(len);
                value
            }
        };
        Ok(value)
    }
}

fn parse_array<T: std::str::FromStr + Copy + Default, const N: usize>(text: &str) -> Option<[T; N]> {
    let inner = text
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(text);

    let mut out = [T::default(); N];
    let mut parts = inner.split(',');
    for slot in out.iter_mut() {
        *slot = parts.next()?.trim().parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::$variant(value)
                }
            }
        )*
    };
}

impl_from!(
    bool => Bool,
    u8 => UInt8,
    u32 => UInt32,
    u64 => UInt64,
    i32 => Int32,
    f64 => Double,
    [f64; 3] => Vector3d,
    [f64; 6] => Vector6d,
    [i32; 6] => Vector6Int32,
    [u32; 6] => Vector6UInt32,
    String => String,
);

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}
