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

//! Message converters between payload types

use std::fmt;
use std::sync::Arc;

/// Output of a converter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversionResult {
    pub success: bool,
    pub data: Vec<u8>,
    pub error_message: Option<String>,
}

impl ConversionResult {
    pub fn ok(data: Vec<u8>) -> Self {
        Self {
            success: true,
            data,
            error_message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Vec::new(),
            error_message: Some(message.into()),
        }
    }
}

pub type ConverterFn = Arc<dyn Fn(&[u8]) -> ConversionResult + Send + Sync>;

/// Converter registered for one ordered `(source_type, target_type)` pair
#[derive(Clone)]
pub struct MessageConverter {
    pub source_type: String,
    pub target_type: String,
    pub convert: ConverterFn,
}

impl MessageConverter {
    pub fn handles(&self, source_type: &str, target_type: &str) -> bool {
        self.source_type == source_type && self.target_type == target_type
    }
}

impl fmt::Debug for MessageConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageConverter")
            .field("source_type", &self.source_type)
            .field("target_type", &self.target_type)
            .finish()
    }
}
