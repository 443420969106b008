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

//! Access Control List
//!
//! Ordered pattern rules mapping `(function, language, context)` to the
//! permissions a call requires. Patterns are an exact string or the
//! wildcard `*`; the first enabled matching entry wins.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{SecurityError, SecurityOutcome};
use super::permissions::PermissionSet;
use polycall_common::Reportable;

/// Pattern that matches any value, including an absent context
pub const WILDCARD: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclEntry {
    pub function_pattern: String,
    pub language_pattern: String,
    pub context_pattern: String,
    pub required_permissions: PermissionSet,
    pub enabled: bool,
}

impl AclEntry {
    pub fn new(function_pattern: impl Into<String>, language_pattern: impl Into<String>, context_pattern: impl Into<String>, required_permissions: PermissionSet) -> Self {
        Self {
            function_pattern: function_pattern.into(),
            language_pattern: language_pattern.into(),
            context_pattern: context_pattern.into(),
            required_permissions,
            enabled: true,
        }
    }

    pub fn matches(&self, function_name: &str, source_language: &str, source_context: Option<&str>) -> bool {
        pattern_matches(&self.function_pattern, Some(function_name))
            && pattern_matches(&self.language_pattern, Some(source_language))
            && pattern_matches(&self.context_pattern, source_context)
    }

    fn same_patterns(&self, function_pattern: &str, language_pattern: &str, context_pattern: &str) -> bool {
        self.function_pattern == function_pattern && self.language_pattern == language_pattern && self.context_pattern == context_pattern
    }
}

fn pattern_matches(pattern: &str, value: Option<&str>) -> bool {
    pattern == WILDCARD || value == Some(pattern)
}

/// Outcome of an ACL lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub allowed: bool,
    pub required_permissions: PermissionSet,
    pub message: Option<String>,
}

#[derive(Debug, Default)]
struct AclState {
    entries: Vec<AclEntry>,
    default_deny: bool,
}

#[derive(Debug, Default)]
pub struct AccessControlList {
    state: Mutex<AclState>,
}

impl AccessControlList {
    pub fn new(default_deny: bool) -> Self {
        Self {
            state: Mutex::new(AclState {
                entries: Vec::new(),
                default_deny,
            }),
        }
    }

    /// Evaluate the list for one call.
    ///
    /// No match falls back to `default_deny`: deny with a message, or
    /// allow requiring only `EXECUTE`.
    pub fn check_function_access(&self, function_name: &str, source_language: &str, source_context: Option<&str>) -> AccessDecision {
        let state = self.state.lock();

        if let Some(entry) = state.entries.iter().find(|e| e.enabled && e.matches(function_name, source_language, source_context)) {
            return AccessDecision {
                allowed: true,
                required_permissions: entry.required_permissions,
                message: None,
            };
        }

        if state.default_deny {
            AccessDecision {
                allowed: false,
                required_permissions: PermissionSet::empty(),
                message: Some(format!(
                    "No ACL entry grants '{}' to language '{}' (context '{}'); default policy is deny",
                    function_name,
                    source_language,
                    source_context.unwrap_or("none")
                )),
            }
        } else {
            AccessDecision {
                allowed: true,
                required_permissions: PermissionSet::EXECUTE,
                message: None,
            }
        }
    }

    /// Append an entry. A second entry with the same pattern triple is rejected.
    pub fn add_entry(&self, entry: AclEntry) -> SecurityOutcome<()> {
        if entry.function_pattern.is_empty() || entry.language_pattern.is_empty() || entry.context_pattern.is_empty() {
            return Err(SecurityError::InvalidParameter("ACL patterns cannot be empty".into()).report());
        }

        let mut state = self.state.lock();
        if state
            .entries
            .iter()
            .any(|e| e.same_patterns(&entry.function_pattern, &entry.language_pattern, &entry.context_pattern))
        {
            return Err(SecurityError::AlreadyExists(format!(
                "ACL entry ({}, {}, {})",
                entry.function_pattern, entry.language_pattern, entry.context_pattern
            ))
            .report());
        }

        debug!(
            function = %entry.function_pattern,
            language = %entry.language_pattern,
            context = %entry.context_pattern,
            required = %entry.required_permissions,
            "ACL entry added"
        );
        state.entries.push(entry);
        Ok(())
    }

    pub fn remove_entry(&self, function_pattern: &str, language_pattern: &str, context_pattern: &str) -> SecurityOutcome<AclEntry> {
        let mut state = self.state.lock();
        let index = state
            .entries
            .iter()
            .position(|e| e.same_patterns(function_pattern, language_pattern, context_pattern))
            .ok_or_else(|| SecurityError::NotFound(format!("ACL entry ({}, {}, {})", function_pattern, language_pattern, context_pattern)).report())?;
        Ok(state.entries.remove(index))
    }

    pub fn set_entry_enabled(&self, function_pattern: &str, language_pattern: &str, context_pattern: &str, enabled: bool) -> SecurityOutcome<()> {
        let mut state = self.state.lock();
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.same_patterns(function_pattern, language_pattern, context_pattern))
            .ok_or_else(|| SecurityError::NotFound(format!("ACL entry ({}, {}, {})", function_pattern, language_pattern, context_pattern)).report())?;
        entry.enabled = enabled;
        Ok(())
    }

    pub fn set_default_deny(&self, default_deny: bool) {
        self.state.lock().default_deny = default_deny;
    }

    pub fn default_deny(&self) -> bool {
        self.state.lock().default_deny
    }

    /// Snapshot of the list in evaluation order
    pub fn entries(&self) -> Vec<AclEntry> {
        self.state.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
