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
pub enum FfiError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("No language bridge registered for '{0}'")]
    UnknownLanguage(String),

    #[error("Function '{name}' not registered in {language} bridge")]
    FunctionNotFound { language: String, name: String },

    #[error("{0} already registered")]
    AlreadyRegistered(String),

    #[error("Expected {expected} argument(s), found {found}")]
    ArgumentCount { expected: usize, found: usize },

    #[error("Type mismatch at {position}: expected {expected}, found {found}")]
    TypeMismatch { position: String, expected: String, found: String },

    #[error("Invalid signature '{signature}': {reason}")]
    InvalidSignature { signature: String, reason: String },

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("Call to '{function}' failed: {reason}")]
    CallFailed { function: String, reason: String },
}

impl Reportable for FfiError {
    fn kind(&self) -> ErrorKind {
        match self {
            FfiError::InvalidParameter(_) | FfiError::ArgumentCount { .. } | FfiError::InvalidSignature { .. } => ErrorKind::InvalidParameter,
            FfiError::UnknownLanguage(_) | FfiError::FunctionNotFound { .. } => ErrorKind::NotFound,
            FfiError::AlreadyRegistered(_) => ErrorKind::AlreadyExists,
            FfiError::TypeMismatch { .. } | FfiError::Serialization(_) => ErrorKind::ConversionFailed,
            FfiError::CallFailed { .. } => ErrorKind::Internal,
        }
    }

    fn origin(&self) -> ErrorSource {
        ErrorSource::Ffi
    }
}

pub type FfiResult<T> = Result<T, FfiError>;
