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

use crate::dop::DopError;
use crate::ffi::FfiError;
use crate::protocol::ProtocolError;
use crate::security::SecurityError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{0} already registered")]
    AlreadyRegistered(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Access to '{function}' denied: {reason}")]
    AccessDenied { function: String, reason: String },

    #[error("No converter from '{source_type}' to '{target_type}'")]
    NoConverter { source_type: String, target_type: String },

    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    #[error("Remote call failed ({kind}): {message}")]
    Remote { kind: ErrorKind, message: String },

    #[error(transparent)]
    Security(#[from] SecurityError),

    #[error(transparent)]
    Dop(#[from] DopError),

    #[error(transparent)]
    Ffi(#[from] FfiError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl Reportable for BridgeError {
    fn kind(&self) -> ErrorKind {
        match self {
            BridgeError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            BridgeError::AlreadyRegistered(_) => ErrorKind::AlreadyExists,
            BridgeError::NotFound(_) | BridgeError::NoConverter { .. } => ErrorKind::NotFound,
            BridgeError::InvalidState(_) => ErrorKind::InvalidState,
            BridgeError::AccessDenied { .. } => ErrorKind::PermissionDenied,
            BridgeError::ConversionFailed(_) => ErrorKind::ConversionFailed,
            BridgeError::Remote { kind, .. } => *kind,
            BridgeError::Security(inner) => inner.kind(),
            BridgeError::Dop(inner) => inner.kind(),
            BridgeError::Ffi(inner) => inner.kind(),
            BridgeError::Protocol(inner) => inner.kind(),
        }
    }

    fn origin(&self) -> ErrorSource {
        match self {
            BridgeError::Security(inner) => inner.origin(),
            BridgeError::Dop(inner) => inner.origin(),
            BridgeError::Ffi(inner) => inner.origin(),
            BridgeError::Protocol(inner) => inner.origin(),
            _ => ErrorSource::Bridge,
        }
    }

    fn severity(&self) -> Severity {
        match self {
            BridgeError::Dop(inner) => inner.severity(),
            other => other.kind().default_severity(),
        }
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
