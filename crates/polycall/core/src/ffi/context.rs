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

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use super::bridge::LanguageBridge;
use super::error::{FfiError, FfiResult};
use super::value::FfiValue;
use polycall_common::Reportable;

/// Table of language bridges, keyed by language tag
#[derive(Default)]
pub struct FfiContext {
    bridges: RwLock<HashMap<String, Arc<dyn LanguageBridge>>>,
}

impl FfiContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_bridge(&self, bridge: Arc<dyn LanguageBridge>) -> FfiResult<()> {
        let language = bridge.language().to_string();
        if language.is_empty() {
            return Err(FfiError::InvalidParameter("bridge language cannot be empty".into()).report());
        }

        let mut bridges = self.bridges.write();
        if bridges.contains_key(&language) {
            return Err(FfiError::AlreadyRegistered(format!("language bridge '{}'", language)).report());
        }
        debug!(language = %language, "language bridge registered");
        bridges.insert(language, bridge);
        Ok(())
    }

    pub fn unregister_bridge(&self, language: &str) -> FfiResult<Arc<dyn LanguageBridge>> {
        self.bridges
            .write()
            .remove(language)
            .ok_or_else(|| FfiError::UnknownLanguage(language.to_string()).report())
    }

    pub fn bridge(&self, language: &str) -> Option<Arc<dyn LanguageBridge>> {
        self.bridges.read().get(language).cloned()
    }

    pub fn languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self.bridges.read().keys().cloned().collect();
        languages.sort();
        languages
    }

    /// Invoke `function_name` through the bridge for `target_language`.
    ///
    /// The table lock is released before the call runs.
    pub fn ffi_call_function(&self, target_language: &str, function_name: &str, args: &[FfiValue]) -> FfiResult<FfiValue> {
        let bridge = self
            .bridge(target_language)
            .ok_or_else(|| FfiError::UnknownLanguage(target_language.to_string()).report())?;
        trace!(language = target_language, function = function_name, args = args.len(), "ffi call");
        bridge.call_function(function_name, args)
    }
}

impl std::fmt::Debug for FfiContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FfiContext").field("languages", &self.languages()).finish()
    }
}
