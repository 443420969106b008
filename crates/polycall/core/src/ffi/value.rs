// LibPolyCall
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Cross-language values
//!
//! Every value owns its payload; nothing borrows across the call boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::FfiError;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum FfiValue {
    #[default]
    Void,
    Bool(bool),
    I32(i32),
    I64(i64),
    U64(u64),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Array(Vec<FfiValue>),
}

impl FfiValue {
    pub fn ffi_type(&self) -> FfiType {
        match self {
            FfiValue::Void => FfiType::Void,
            FfiValue::Bool(_) => FfiType::Bool,
            FfiValue::I32(_) => FfiType::I32,
            FfiValue::I64(_) => FfiType::I64,
            FfiValue::U64(_) => FfiType::U64,
            FfiValue::F64(_) => FfiType::F64,
            FfiValue::String(_) => FfiType::String,
            FfiValue::Bytes(_) => FfiType::Bytes,
            FfiValue::Array(_) => FfiType::Array,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FfiValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            FfiValue::I32(v) => Some(v as i64),
            FfiValue::I64(v) => Some(v),
            FfiValue::U64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            FfiValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, FfiValue::Void)
    }
}

impl From<bool> for FfiValue {
    fn from(v: bool) -> Self {
        FfiValue::Bool(v)
    }
}

impl From<i32> for FfiValue {
    fn from(v: i32) -> Self {
        FfiValue::I32(v)
    }
}

impl From<i64> for FfiValue {
    fn from(v: i64) -> Self {
        FfiValue::I64(v)
    }
}

impl From<u64> for FfiValue {
    fn from(v: u64) -> Self {
        FfiValue::U64(v)
    }
}

impl From<f64> for FfiValue {
    fn from(v: f64) -> Self {
        FfiValue::F64(v)
    }
}

impl From<&str> for FfiValue {
    fn from(v: &str) -> Self {
        FfiValue::String(v.to_string())
    }
}

impl From<String> for FfiValue {
    fn from(v: String) -> Self {
        FfiValue::String(v)
    }
}

impl From<Vec<u8>> for FfiValue {
    fn from(v: Vec<u8>) -> Self {
        FfiValue::Bytes(v)
    }
}

/// Declared type of a parameter or return value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FfiType {
    Void,
    Bool,
    I32,
    I64,
    U64,
    F64,
    String,
    Bytes,
    Array,
    /// Accepts any value
    Any,
}

impl FfiType {
    pub fn accepts(self, value: &FfiValue) -> bool {
        self == FfiType::Any || self == value.ffi_type()
    }

    pub fn name(self) -> &'static str {
        match self {
            FfiType::Void => "void",
            FfiType::Bool => "bool",
            FfiType::I32 => "i32",
            FfiType::I64 => "i64",
            FfiType::U64 => "u64",
            FfiType::F64 => "f64",
            FfiType::String => "string",
            FfiType::Bytes => "bytes",
            FfiType::Array => "array",
            FfiType::Any => "any",
        }
    }
}

impl fmt::Display for FfiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FfiType {
    type Err = FfiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "void" => Ok(FfiType::Void),
            "bool" | "boolean" => Ok(FfiType::Bool),
            "i32" | "int" => Ok(FfiType::I32),
            "i64" | "long" => Ok(FfiType::I64),
            "u64" => Ok(FfiType::U64),
            "f64" | "double" => Ok(FfiType::F64),
            "string" | "str" => Ok(FfiType::String),
            "bytes" => Ok(FfiType::Bytes),
            "array" => Ok(FfiType::Array),
            "any" => Ok(FfiType::Any),
            other => Err(FfiError::InvalidParameter(format!("unknown type '{}'", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types() {
        assert_eq!(FfiValue::from(7i32).ffi_type(), FfiType::I32);
        assert_eq!(FfiValue::from("hi").ffi_type(), FfiType::String);
        assert_eq!(FfiValue::default(), FfiValue::Void);
        assert!(FfiType::Any.accepts(&FfiValue::Bytes(vec![1])));
        assert!(!FfiType::I64.accepts(&FfiValue::I32(1)));
    }

    #[test]
    fn test_accessors() {
        assert_eq!(FfiValue::U64(u64::MAX).as_i64(), None);
        assert_eq!(FfiValue::I32(-3).as_i64(), Some(-3));
        assert_eq!(FfiValue::from("x").as_str(), Some("x"));
        assert_eq!(FfiValue::Bool(true).as_bool(), Some(true));
    }

    #[test]
    fn test_type_names() {
        assert_eq!("Boolean".parse::<FfiType>().unwrap(), FfiType::Bool);
        assert_eq!(FfiType::Bytes.to_string(), "bytes");
        assert!("pointer".parse::<FfiType>().is_err());
    }
}
