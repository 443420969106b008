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
pub enum ProtocolError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("No endpoint named '{0}'")]
    EndpointNotFound(String),

    #[error("Request to '{endpoint}' timed out after {timeout_ms} ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    #[error("Transport failure: {0}")]
    Transport(String),
}

impl Reportable for ProtocolError {
    fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::InvalidMessage(_) => ErrorKind::InvalidParameter,
            ProtocolError::EndpointNotFound(_) => ErrorKind::NotFound,
            ProtocolError::Timeout { .. } => ErrorKind::Timeout,
            ProtocolError::Transport(_) => ErrorKind::Internal,
        }
    }

    fn origin(&self) -> ErrorSource {
        ErrorSource::Protocol
    }
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
