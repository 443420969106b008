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

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Out of memory: requested {requested} bytes, largest free block {available} bytes")]
    OutOfMemory { requested: usize, available: usize },

    #[error("Block header corrupted at offset {offset:#x}")]
    Corruption { offset: usize },

    #[error("Double free of block at offset {offset:#x}")]
    DoubleFree { offset: usize },

    #[error("Block at offset {offset:#x} is locked")]
    Locked { offset: usize },

    #[error("Reset refused: {count} persistent block(s) still in use")]
    PersistentBlocks { count: usize },

    #[error("Region {region} is already shared with '{shared_with}'")]
    AlreadyShared { region: u64, shared_with: String },

    #[error("Region {region} is not shared with '{component}'")]
    NotShared { region: u64, component: String },

    #[error("Access out of bounds: offset {offset} + {len} bytes exceeds region size {size}")]
    OutOfBounds { offset: usize, len: usize, size: usize },
}

impl Reportable for MemoryError {
    fn kind(&self) -> ErrorKind {
        match self {
            MemoryError::InvalidParameter(_) | MemoryError::OutOfBounds { .. } => ErrorKind::InvalidParameter,
            MemoryError::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            MemoryError::Corruption { .. } => ErrorKind::Corruption,
            MemoryError::DoubleFree { .. }
            | MemoryError::Locked { .. }
            | MemoryError::PersistentBlocks { .. }
            | MemoryError::AlreadyShared { .. } => ErrorKind::InvalidState,
            MemoryError::NotShared { .. } => ErrorKind::NotFound,
        }
    }

    fn origin(&self) -> ErrorSource {
        ErrorSource::Memory
    }

    fn severity(&self) -> Severity {
        match self {
            // Exhaustion is an expected, caller-checked outcome
            MemoryError::OutOfMemory { .. } => Severity::Warning,
            other => other.kind().default_severity(),
        }
    }
}

pub type MemoryResult<T> = Result<T, MemoryError>;
