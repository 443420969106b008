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

//! Zero-trust security layer: permissions, ACL, audit trail and the
//! per-call security context.

pub mod acl;
pub mod audit;
pub mod context;
pub mod error;
pub mod permissions;

pub use acl::{AccessControlList, AccessDecision, AclEntry, WILDCARD};
pub use audit::{AuditCallback, AuditConfig, AuditEvent, AuditLevel, AuditLog, MAX_AUDIT_ENTRIES, SecurityResult};
pub use context::{IsolationLevel, SecurityContext, SecurityLevel, SecurityPolicy};
pub use error::{SecurityError, SecurityOutcome};
pub use permissions::{PermissionBitmap, PermissionSet};
