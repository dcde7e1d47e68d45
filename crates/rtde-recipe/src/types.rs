//! The type registry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{RecipeError, Result};

/// Field types the controller reports during recipe setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    /// Boolean, one byte (0 or 1).
    Bool,
    /// Unsigned 8-bit integer.
    UInt8,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Unsigned 64-bit integer.
    UInt64,
    /// Signed 32-bit integer.
    Int32,
    /// IEEE 754 double.
    Double,
    /// Three doubles.
    Vector3d,
    /// Six doubles.
    Vector6d,
    /// Six signed 32-bit integers.
    Vector6Int32,
    /// Six unsigned 32-bit integers.
    Vector6UInt32,
    /// UTF-8 text with a one-byte length prefix.
    String,
}

/// Static lookup from wire names to types.
const REGISTRY: [(&str, FieldType); 11] = [
    ("BOOL", FieldType::Bool),
    ("UINT8", FieldType::UInt8),
    ("UINT32", FieldType::UInt32),
    ("UINT64", FieldType::UInt64),
    ("INT32", FieldType::Int32),
    ("DOUBLE", FieldType::Double),
    ("VECTOR3D", FieldType::Vector3d),
    ("VECTOR6D", FieldType::Vector6d),
    ("VECTOR6INT32", FieldType::Vector6Int32),
    ("VECTOR6UINT32", FieldType::Vector6UInt32),
    ("STRING", FieldType::String),
];

impl FieldType {
    /// Resolve a type from the name the controller uses for it.
    pub fn from_name(name: &str) -> Result<Self> {
        REGISTRY
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, ty)| *ty)
            .ok_or_else(|| RecipeError::UnknownType(name.to_string()))
    }

    /// The wire name of this type.
    pub fn name(self) -> &'static str {
        REGISTRY
            .iter()
            .find(|(_, ty)| *ty == self)
            .map(|(name, _)| *name)
            .unwrap_or("UNKNOWN")
    }

    /// Encoded size in bytes, or `None` for variable-length strings.
    pub const fn size(self) -> Option<usize> {
        match self {
            FieldType::Bool | FieldType::UInt8 => Some(1),
            FieldType::UInt32 | FieldType::Int32 => Some(4),
            FieldType::UInt64 | FieldType::Double => Some(8),
            FieldType::Vector3d => Some(24),
            FieldType::Vector6d => Some(48),
            FieldType::Vector6Int32 | FieldType::Vector6UInt32 => Some(24),
            FieldType::String => None,
        }
    }

    /// Every registered type.
    pub fn all() -> impl Iterator<Item = FieldType> {
        REGISTRY.iter().map(|(_, ty)| *ty)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldType {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}
