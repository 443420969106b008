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

//! Per-component isolation policy

use serde::{Deserialize, Serialize};

use crate::security::PermissionSet;

/// Default memory ceiling for a component
pub const DEFAULT_MAX_MEMORY: usize = 16 * 1024 * 1024;
/// Default execution-time ceiling for a single invocation
pub const DEFAULT_MAX_EXECUTION_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum DopIsolationLevel {
    None,
    Basic,
    #[default]
    Standard,
    Strict,
    /// Nothing permitted; the component is inert
    Paranoid,
}

impl DopIsolationLevel {
    /// Default capability mask for the level
    pub fn default_permissions(self) -> PermissionSet {
        match self {
            DopIsolationLevel::None => PermissionSet::all(),
            DopIsolationLevel::Basic => PermissionSet::all() - PermissionSet::PRIVILEGED,
            DopIsolationLevel::Standard => {
                PermissionSet::READ
                    | PermissionSet::WRITE
                    | PermissionSet::EXECUTE
                    | PermissionSet::MEMORY_READ
                    | PermissionSet::MEMORY_WRITE
                    | PermissionSet::ALLOCATE
                    | PermissionSet::SHARE
                    | PermissionSet::INVOKE_LOCAL
                    | PermissionSet::INVOKE_REMOTE
            }
            DopIsolationLevel::Strict => {
                PermissionSet::READ
                    | PermissionSet::EXECUTE
                    | PermissionSet::MEMORY_READ
                    | PermissionSet::MEMORY_WRITE
                    | PermissionSet::ALLOCATE
                    | PermissionSet::INVOKE_LOCAL
            }
            DopIsolationLevel::Paranoid => PermissionSet::empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DopSecurityPolicy {
    pub isolation_level: DopIsolationLevel,
    pub allowed_permissions: PermissionSet,
    /// Always wins over `allowed_permissions`
    pub denied_permissions: PermissionSet,
    pub max_memory_usage: usize,
    /// 0 disables the check
    pub max_execution_time_ms: u64,
    pub audit_enabled: bool,
}

impl DopSecurityPolicy {
    pub fn for_level(level: DopIsolationLevel) -> Self {
        Self {
            isolation_level: level,
            allowed_permissions: level.default_permissions(),
            denied_permissions: PermissionSet::empty(),
            max_memory_usage: DEFAULT_MAX_MEMORY,
            max_execution_time_ms: DEFAULT_MAX_EXECUTION_MS,
            audit_enabled: level >= DopIsolationLevel::Standard,
        }
    }

    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.max_memory_usage = bytes;
        self
    }

    pub fn with_execution_limit(mut self, ms: u64) -> Self {
        self.max_execution_time_ms = ms;
        self
    }

    pub fn allow(mut self, permissions: PermissionSet) -> Self {
        self.allowed_permissions |= permissions;
        self
    }

    pub fn deny(mut self, permissions: PermissionSet) -> Self {
        self.denied_permissions |= permissions;
        self
    }

    pub fn with_audit(mut self, enabled: bool) -> Self {
        self.audit_enabled = enabled;
        self
    }

    /// Apply the level's hard rules. Paranoid clears every allowance.
    pub(crate) fn normalized(mut self) -> Self {
        if self.isolation_level == DopIsolationLevel::Paranoid {
            self.allowed_permissions = PermissionSet::empty();
        }
        self
    }

    pub fn effective_permissions(&self) -> PermissionSet {
        self.allowed_permissions - self.denied_permissions
    }

    pub fn permits(&self, permission: PermissionSet) -> bool {
        !permission.is_empty() && self.effective_permissions().contains(permission)
    }
}

impl Default for DopSecurityPolicy {
    fn default() -> Self {
        Self::for_level(DopIsolationLevel::default())
    }
}

/// Permission implied by a named operation
pub fn permission_for_operation(operation: &str) -> Option<PermissionSet> {
    let normalized = operation.trim().to_ascii_lowercase();
    let alias = match normalized.as_str() {
        "memory_allocate" | "alloc" => "allocate",
        "memory_share" => "share",
        "invoke" | "call" => "invoke_local",
        "remote_call" => "invoke_remote",
        "file" | "file_io" => "file_access",
        "net" => "network",
        "admin" => "privileged",
        other => other,
    };
    PermissionSet::by_name(alias)
}
