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

//! Function signatures in the textual form `(i32, string) -> bool`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{FfiError, FfiResult};
use super::value::{FfiType, FfiValue};
use polycall_common::Reportable;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub params: Vec<FfiType>,
    pub return_type: FfiType,
}

impl FunctionSignature {
    pub fn new(params: Vec<FfiType>, return_type: FfiType) -> Self {
        Self { params, return_type }
    }

    /// `(any...) -> any` style signature with `arity` untyped parameters
    pub fn untyped(arity: usize) -> Self {
        Self::new(vec![FfiType::Any; arity], FfiType::Any)
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Validate argument count and types
    pub fn check_args(&self, args: &[FfiValue]) -> FfiResult<()> {
        if args.len() != self.params.len() {
            return Err(FfiError::ArgumentCount {
                expected: self.params.len(),
                found: args.len(),
            }
            .report());
        }

        for (index, (expected, arg)) in self.params.iter().zip(args).enumerate() {
            if !expected.accepts(arg) {
                return Err(FfiError::TypeMismatch {
                    position: format!("argument {}", index),
                    expected: expected.to_string(),
                    found: arg.ffi_type().to_string(),
                }
                .report());
            }
        }
        Ok(())
    }

    pub fn check_return(&self, value: &FfiValue) -> FfiResult<()> {
        if self.return_type.accepts(value) {
            Ok(())
        } else {
            Err(FfiError::TypeMismatch {
                position: "return value".into(),
                expected: self.return_type.to_string(),
                found: value.ffi_type().to_string(),
            }
            .report())
        }
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<&str> = self.params.iter().map(|p| p.name()).collect();
        write!(f, "({}) -> {}", params.join(", "), self.return_type)
    }
}

impl FromStr for FunctionSignature {
    type Err = FfiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| FfiError::InvalidSignature {
            signature: s.to_string(),
            reason: reason.to_string(),
        };

        let (params, ret) = s.split_once("->").ok_or_else(|| invalid("missing '->'"))?;
        let params = params.trim();
        let inner = params
            .strip_prefix('(')
            .and_then(|p| p.strip_suffix(')'))
            .ok_or_else(|| invalid("parameters must be parenthesised"))?;

        let params = if inner.trim().is_empty() {
            Vec::new()
        } else {
            inner
                .split(',')
                .map(|p| p.parse::<FfiType>().map_err(|e| invalid(&e.to_string())))
                .collect::<Result<Vec<_>, _>>()?
        };
        if params.contains(&FfiType::Void) {
            return Err(invalid("void is not a parameter type"));
        }

        let return_type = ret.parse::<FfiType>().map_err(|e| invalid(&e.to_string()))?;
        Ok(Self { params, return_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let signature: FunctionSignature = "(i32, string) -> bool".parse().unwrap();
        assert_eq!(signature.params, vec![FfiType::I32, FfiType::String]);
        assert_eq!(signature.return_type, FfiType::Bool);
        assert_eq!(signature.to_string(), "(i32, string) -> bool");

        let nullary: FunctionSignature = " ( ) ->void".parse().unwrap();
        assert_eq!(nullary.arity(), 0);
        assert_eq!(nullary.to_string(), "() -> void");
    }

    #[test]
    fn test_parse_errors() {
        assert!("i32 -> bool".parse::<FunctionSignature>().is_err());
        assert!("(i32)".parse::<FunctionSignature>().is_err());
        assert!("(i32, widget) -> bool".parse::<FunctionSignature>().is_err());
        assert!("(void) -> bool".parse::<FunctionSignature>().is_err());
    }

    #[test]
    fn test_argument_checks() {
        let signature: FunctionSignature = "(i32, any) -> string".parse().unwrap();
        assert!(signature.check_args(&[FfiValue::I32(1), FfiValue::Bool(true)]).is_ok());
        assert!(matches!(signature.check_args(&[FfiValue::I32(1)]), Err(FfiError::ArgumentCount { expected: 2, found: 1 })));
        assert!(matches!(
            signature.check_args(&[FfiValue::I64(1), FfiValue::Void]),
            Err(FfiError::TypeMismatch { .. })
        ));
        assert!(signature.check_return(&FfiValue::from("ok")).is_ok());
        assert!(signature.check_return(&FfiValue::Void).is_err());
    }
}
