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

//! Error Taxonomy
//!
//! Shared classification for every error raised by the core: what kind of
//! failure it is, which subsystem raised it and how loudly it must be
//! reported. Subsystems keep their own `thiserror` enums and implement
//! [`Reportable`] to plug into the common reporting side-channel.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Kind of failure, independent of the subsystem that raised it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidParameter,
    OutOfMemory,
    AlreadyExists,
    AlreadyInitialized,
    NotFound,
    InvalidState,
    PermissionDenied,
    IsolationBreach,
    Timeout,
    ConversionFailed,
    /// Block validation failed (bad magic number)
    Corruption,
    Internal,
}

impl ErrorKind {
    /// Stable numeric code, used on the wire as `error_code` metadata
    pub fn code(self) -> u32 {
        match self {
            ErrorKind::InvalidParameter => 1,
            ErrorKind::OutOfMemory => 2,
            ErrorKind::AlreadyExists => 3,
            ErrorKind::AlreadyInitialized => 4,
            ErrorKind::NotFound => 5,
            ErrorKind::InvalidState => 6,
            ErrorKind::PermissionDenied => 7,
            ErrorKind::IsolationBreach => 8,
            ErrorKind::Timeout => 9,
            ErrorKind::ConversionFailed => 10,
            ErrorKind::Corruption => 11,
            ErrorKind::Internal => 99,
        }
    }

    /// Inverse of [`code`](Self::code)
    pub fn from_code(code: u32) -> Option<Self> {
        const ALL: [ErrorKind; 12] = [
            ErrorKind::InvalidParameter,
            ErrorKind::OutOfMemory,
            ErrorKind::AlreadyExists,
            ErrorKind::AlreadyInitialized,
            ErrorKind::NotFound,
            ErrorKind::InvalidState,
            ErrorKind::PermissionDenied,
            ErrorKind::IsolationBreach,
            ErrorKind::Timeout,
            ErrorKind::ConversionFailed,
            ErrorKind::Corruption,
            ErrorKind::Internal,
        ];
        ALL.into_iter().find(|k| k.code() == code)
    }

    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::OutOfMemory => "out_of_memory",
            ErrorKind::AlreadyExists => "already_exists",
            ErrorKind::AlreadyInitialized => "already_initialized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::IsolationBreach => "isolation_breach",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ConversionFailed => "conversion_failed",
            ErrorKind::Corruption => "corruption",
            ErrorKind::Internal => "internal",
        }
    }

    /// Default severity for this kind of failure
    pub fn default_severity(self) -> Severity {
        match self {
            ErrorKind::NotFound | ErrorKind::AlreadyExists | ErrorKind::AlreadyInitialized => Severity::Warning,
            ErrorKind::Corruption => Severity::Fatal,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Subsystem that raised an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSource {
    Memory,
    Security,
    Audit,
    Dop,
    Ffi,
    Protocol,
    Bridge,
}

impl fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorSource::Memory => "memory",
            ErrorSource::Security => "security",
            ErrorSource::Audit => "audit",
            ErrorSource::Dop => "dop",
            ErrorSource::Ffi => "ffi",
            ErrorSource::Protocol => "protocol",
            ErrorSource::Bridge => "bridge",
        };
        f.write_str(name)
    }
}

/// Reporting severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(name)
    }
}

/// Error that can be pushed through the reporting side-channel
pub trait Reportable: std::error::Error {
    /// Failure classification
    fn kind(&self) -> ErrorKind;

    /// Subsystem that raised the error
    fn origin(&self) -> ErrorSource;

    fn severity(&self) -> Severity {
        self.kind().default_severity()
    }

    fn code(&self) -> u32 {
        self.kind().code()
    }

    /// Emit the error as a structured log event and hand it back for propagation
    fn report(self) -> Self
    where
        Self: Sized,
    {
        emit(self.origin(), self.kind(), self.severity(), &self.to_string());
        self
    }
}

/// Structured record of a reported failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorContext {
    pub source: ErrorSource,
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: String,
}

impl ErrorContext {
    pub fn from_error<E: Reportable>(err: &E) -> Self {
        Self {
            source: err.origin(),
            kind: err.kind(),
            severity: err.severity(),
            message: err.to_string(),
        }
    }

    pub fn code(&self) -> u32 {
        self.kind.code()
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}:{}] {}", self.source, self.kind, self.severity, self.message)
    }
}

fn emit(source: ErrorSource, kind: ErrorKind, severity: Severity, message: &str) {
    let code = kind.code();
    match severity {
        Severity::Info => info!(%source, %kind, code, %severity, "{}", message),
        Severity::Warning => warn!(%source, %kind, code, %severity, "{}", message),
        Severity::Error => error!(%source, %kind, code, %severity, "{}", message),
        Severity::Fatal => error!(%source, %kind, code, %severity, fatal = true, "{}", message),
    }
    debug!(target: "polycall::error", %source, code, "error reported");
}
