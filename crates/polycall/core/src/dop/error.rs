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

use polycall_common::{ErrorKind, ErrorSource, Reportable, Severity};
use thiserror::Error;

use crate::memory::MemoryError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DopError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Component '{0}' is already registered")]
    DuplicateComponent(String),

    #[error("Component '{0}' not found")]
    ComponentNotFound(String),

    #[error("Region {0} not found")]
    RegionNotFound(u64),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Component '{component}' is not permitted to {operation}")]
    PermissionDenied { component: String, operation: String },

    #[error("Isolation breach by '{component}': {requested} bytes requested with {allocated} of {limit} bytes in use")]
    MemoryCeiling {
        component: String,
        requested: usize,
        allocated: usize,
        limit: usize,
    },

    #[error("Isolation breach by '{component}': call took {elapsed_ms} ms, limit {limit_ms} ms")]
    ExecutionTime { component: String, elapsed_ms: u64, limit_ms: u64 },

    #[error("Component '{component}' failed in '{method}': {reason}")]
    Behavior { component: String, method: String, reason: String },

    #[error(transparent)]
    Memory(#[from] MemoryError),
}

impl Reportable for DopError {
    fn kind(&self) -> ErrorKind {
        match self {
            // Duplicate ids are rejected as a bad argument
            DopError::InvalidParameter(_) | DopError::DuplicateComponent(_) => ErrorKind::InvalidParameter,
            DopError::ComponentNotFound(_) | DopError::RegionNotFound(_) => ErrorKind::NotFound,
            DopError::InvalidState(_) => ErrorKind::InvalidState,
            DopError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            DopError::MemoryCeiling { .. } | DopError::ExecutionTime { .. } => ErrorKind::IsolationBreach,
            DopError::Behavior { .. } => ErrorKind::Internal,
            DopError::Memory(inner) => inner.kind(),
        }
    }

    fn origin(&self) -> ErrorSource {
        match self {
            DopError::Memory(_) => ErrorSource::Memory,
            _ => ErrorSource::Dop,
        }
    }

    fn severity(&self) -> Severity {
        match self {
            DopError::Memory(inner) => inner.severity(),
            other => other.kind().default_severity(),
        }
    }
}

pub type DopResult<T> = Result<T, DopError>;
