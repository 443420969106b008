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

//! DOP components
//!
//! A component pairs a data model (its config and memory regions) with an
//! optional behaviour model that the registry invokes under isolation.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::policy::DopSecurityPolicy;
use crate::ffi::FfiValue;

/// Registration parameters for a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentConfig {
    /// Unique within a registry
    pub component_id: String,
    pub display_name: String,
    pub language: String,
    pub version: String,
    pub policy: DopSecurityPolicy,
}

impl ComponentConfig {
    pub fn new(component_id: impl Into<String>, display_name: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            component_id: component_id.into(),
            display_name: display_name.into(),
            language: language.into(),
            version: "1.0.0".to_string(),
            policy: DopSecurityPolicy::default(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_policy(mut self, policy: DopSecurityPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentState {
    Ready,
    /// An invocation is in flight
    Running,
    Suspended,
    /// Set after an isolation breach during invocation
    Error,
    Destroyed,
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComponentState::Ready => "ready",
            ComponentState::Running => "running",
            ComponentState::Suspended => "suspended",
            ComponentState::Error => "error",
            ComponentState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Behaviour model of a component
pub trait ComponentBehavior: Send + Sync {
    /// Check arguments before the call; the validator half of the adapter
    fn validate(&self, _method: &str, _args: &[FfiValue]) -> Result<(), String> {
        Ok(())
    }

    fn invoke(&self, method: &str, args: &[FfiValue]) -> Result<FfiValue, String>;
}

/// Snapshot of a registered component
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    pub component_id: String,
    pub display_name: String,
    pub language: String,
    pub version: String,
    pub policy: DopSecurityPolicy,
    pub state: ComponentState,
    pub total_memory_allocated: usize,
    pub region_count: usize,
    pub has_behavior: bool,
}
