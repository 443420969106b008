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

//! Data-oriented component isolation: per-component policies, memory
//! budgets and behaviour invocation.

mod component;
mod error;
mod policy;
mod registry;

pub use component::{ComponentBehavior, ComponentConfig, ComponentInfo, ComponentState};
pub use error::{DopError, DopResult};
pub use policy::{DEFAULT_MAX_EXECUTION_MS, DEFAULT_MAX_MEMORY, DopIsolationLevel, DopSecurityPolicy, permission_for_operation};
pub use registry::{DEFAULT_MAX_COMPONENTS, DEFAULT_POOL_SIZE, DopRegistry, RegistryConfig};
