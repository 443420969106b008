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

//! Language bridges
//!
//! A [`LanguageBridge`] owns the functions exported by one language runtime
//! and the conversion between [`FfiValue`] and that runtime's native
//! representation. [`NativeBridge`] is the in-process implementation.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::envelope::{decode_value, encode_value};
use super::error::{FfiError, FfiResult};
use super::signature::FunctionSignature;
use super::value::{FfiType, FfiValue};
use polycall_common::Reportable;

/// Host function callable through a bridge
pub type NativeFunction = Arc<dyn Fn(&[FfiValue]) -> Result<FfiValue, String> + Send + Sync>;

pub trait LanguageBridge: Send + Sync {
    /// Language tag this bridge serves, e.g. `"c"` or `"python"`
    fn language(&self) -> &str;

    fn register_function(&self, name: &str, signature: FunctionSignature, function: NativeFunction) -> FfiResult<()>;

    fn call_function(&self, name: &str, args: &[FfiValue]) -> FfiResult<FfiValue>;

    fn has_function(&self, name: &str) -> bool;

    /// Marshal a value into the runtime's native byte representation
    fn convert_to_native(&self, value: &FfiValue) -> FfiResult<Vec<u8>>;

    /// Unmarshal native bytes, checking the result against `expected`
    fn convert_from_native(&self, native: &[u8], expected: FfiType) -> FfiResult<FfiValue>;
}

struct RegisteredFunction {
    signature: FunctionSignature,
    function: NativeFunction,
}

pub struct NativeBridge {
    language: String,
    type_checking: bool,
    functions: RwLock<HashMap<String, RegisteredFunction>>,
}

impl NativeBridge {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            type_checking: true,
            functions: RwLock::new(HashMap::new()),
        }
    }

    /// Disable signature checks on arguments and results
    pub fn without_type_checking(mut self) -> Self {
        self.type_checking = false;
        self
    }

    /// Convenience wrapper around [`LanguageBridge::register_function`]
    pub fn register<F>(&self, name: &str, signature: &str, function: F) -> FfiResult<()>
    where
        F: Fn(&[FfiValue]) -> Result<FfiValue, String> + Send + Sync + 'static,
    {
        let signature: FunctionSignature = signature.parse().map_err(|e: FfiError| e.report())?;
        self.register_function(name, signature, Arc::new(function))
    }

    pub fn signature(&self, name: &str) -> Option<FunctionSignature> {
        self.functions.read().get(name).map(|f| f.signature.clone())
    }

    pub fn function_count(&self) -> usize {
        self.functions.read().len()
    }
}

impl LanguageBridge for NativeBridge {
    fn language(&self) -> &str {
        &self.language
    }

    fn register_function(&self, name: &str, signature: FunctionSignature, function: NativeFunction) -> FfiResult<()> {
        if name.is_empty() {
            return Err(FfiError::InvalidParameter("function name cannot be empty".into()).report());
        }

        let mut functions = self.functions.write();
        if functions.contains_key(name) {
            return Err(FfiError::AlreadyRegistered(format!("{} function '{}'", self.language, name)).report());
        }
        debug!(language = %self.language, function = name, %signature, "native function registered");
        functions.insert(name.to_string(), RegisteredFunction { signature, function });
        Ok(())
    }

    fn call_function(&self, name: &str, args: &[FfiValue]) -> FfiResult<FfiValue> {
        let (signature, function) = {
            let functions = self.functions.read();
            let entry = functions.get(name).ok_or_else(|| {
                FfiError::FunctionNotFound {
                    language: self.language.clone(),
                    name: name.to_string(),
                }
                .report()
            })?;
            (entry.signature.clone(), Arc::clone(&entry.function))
        };

        if self.type_checking {
            signature.check_args(args)?;
        }

        let result = function(args).map_err(|reason| {
            FfiError::CallFailed {
                function: name.to_string(),
                reason,
            }
            .report()
        })?;

        if self.type_checking {
            signature.check_return(&result)?;
        }
        Ok(result)
    }

    fn has_function(&self, name: &str) -> bool {
        self.functions.read().contains_key(name)
    }

    fn convert_to_native(&self, value: &FfiValue) -> FfiResult<Vec<u8>> {
        encode_value(value)
    }

    fn convert_from_native(&self, native: &[u8], expected: FfiType) -> FfiResult<FfiValue> {
        let value: FfiValue = decode_value(native)?;
        if !expected.accepts(&value) {
            return Err(FfiError::TypeMismatch {
                position: "native value".into(),
                expected: expected.to_string(),
                found: value.ffi_type().to_string(),
            }
            .report());
        }
        Ok(value)
    }
}

impl fmt::Debug for NativeBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeBridge")
            .field("language", &self.language)
            .field("functions", &self.function_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge() -> NativeBridge {
        let bridge = NativeBridge::new("c");
        bridge
            .register("add", "(i32, i32) -> i32", |args| match args {
                [FfiValue::I32(a), FfiValue::I32(b)] => a.checked_add(*b).map(FfiValue::I32).ok_or_else(|| "overflow".to_string()),
                _ => Err("bad arguments".into()),
            })
            .unwrap();
        bridge
    }

    #[test]
    fn test_call_registered_function() {
        let bridge = bridge();
        assert_eq!(bridge.call_function("add", &[FfiValue::I32(2), FfiValue::I32(3)]).unwrap(), FfiValue::I32(5));
        assert!(bridge.has_function("add"));
        assert_eq!(bridge.signature("add").unwrap().to_string(), "(i32, i32) -> i32");
    }

    #[test]
    fn test_call_failures() {
        let bridge = bridge();
        assert!(matches!(bridge.call_function("sub", &[]), Err(FfiError::FunctionNotFound { .. })));
        assert!(matches!(bridge.call_function("add", &[FfiValue::I32(1)]), Err(FfiError::ArgumentCount { .. })));
        assert!(matches!(
            bridge.call_function("add", &[FfiValue::I32(i32::MAX), FfiValue::I32(1)]),
            Err(FfiError::CallFailed { ref reason, .. }) if reason == "overflow"
        ));
    }

    #[test]
    fn test_duplicate_registration() {
        let bridge = bridge();
        let result = bridge.register("add", "(any) -> any", |_| Ok(FfiValue::Void));
        assert!(matches!(result, Err(FfiError::AlreadyRegistered(_))));
        assert_eq!(bridge.function_count(), 1);
    }

    #[test]
    fn test_unchecked_bridge_skips_signature() {
        let bridge = NativeBridge::new("js").without_type_checking();
        bridge.register("loose", "(i32) -> i32", |_| Ok(FfiValue::from("text"))).unwrap();
        assert_eq!(bridge.call_function("loose", &[]).unwrap(), FfiValue::from("text"));
    }

    #[test]
    fn test_native_conversion() {
        let bridge = bridge();
        let native = bridge.convert_to_native(&FfiValue::I64(-9)).unwrap();
        assert_eq!(bridge.convert_from_native(&native, FfiType::I64).unwrap(), FfiValue::I64(-9));
        assert!(matches!(bridge.convert_from_native(&native, FfiType::String), Err(FfiError::TypeMismatch { .. })));
    }
}
