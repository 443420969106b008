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

//! # LibPolyCall Core
//!
//! Cross-language call bridge with zero-trust security and isolated
//! components.
//!
//! - [`memory`]: fixed-size pool allocator and permissioned regions
//! - [`security`]: permissions, ACL, audit log and the security context
//! - [`dop`]: component registry enforcing memory and time ceilings
//! - [`ffi`]: values, signatures and per-language bridges
//! - [`protocol`]: messages and transports
//! - [`bridge`]: the protocol bridge tying messages to FFI calls

pub mod bridge;
pub mod dop;
pub mod ffi;
pub mod memory;
pub mod protocol;
pub mod security;

pub use bridge::{BridgeConfig, BridgeError, ProtocolBridge};
pub use dop::{ComponentConfig, DopError, DopIsolationLevel, DopRegistry, DopSecurityPolicy};
pub use ffi::{FfiContext, FfiValue, LanguageBridge, NativeBridge};
pub use memory::{MemoryPool, MemoryRegion};
pub use protocol::{LoopbackTransport, MessageTransport, ProtocolMessage};
pub use security::{AuditLog, PermissionSet, SecurityContext, SecurityPolicy};
