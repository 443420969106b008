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

use polycall_common::{ErrorKind, ErrorSource, Reportable};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Permission denied for '{subject}': {reason}")]
    PermissionDenied { subject: String, reason: String },

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Permission id {id} out of range (capacity {capacity})")]
    PermissionOutOfRange { id: usize, capacity: usize },

    #[error("Audit sink failure: {reason}")]
    AuditSink { reason: String },
}

impl Reportable for SecurityError {
    fn kind(&self) -> ErrorKind {
        match self {
            SecurityError::InvalidParameter(_) | SecurityError::PermissionOutOfRange { .. } => ErrorKind::InvalidParameter,
            SecurityError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            SecurityError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            SecurityError::NotFound(_) => ErrorKind::NotFound,
            SecurityError::AuditSink { .. } => ErrorKind::Internal,
        }
    }

    fn origin(&self) -> ErrorSource {
        match self {
            SecurityError::AuditSink { .. } => ErrorSource::Audit,
            _ => ErrorSource::Security,
        }
    }
}

/// Result alias for fallible security operations. The access-check outcome
/// itself is the [`SecurityResult`](super::SecurityResult) record.
pub type SecurityOutcome<T> = Result<T, SecurityError>;
