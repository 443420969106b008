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

use serde::{Deserialize, Serialize};
use std::time::Duration;

use polycall_common::config::{env_override, env_string};

pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;
pub const MAX_PATTERN_LENGTH: usize = 256;
pub const MAX_ENDPOINT_LENGTH: usize = 256;

/// Protocol bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Deadline for a remote call, in milliseconds
    pub timeout_ms: u64,
    pub max_pattern_length: usize,
    pub max_endpoint_length: usize,
    /// Caller language assumed when a message carries no `source_language`
    pub default_source_language: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_pattern_length: MAX_PATTERN_LENGTH,
            max_endpoint_length: MAX_ENDPOINT_LENGTH,
            default_source_language: "c".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by `POLYCALL_BRIDGE_TIMEOUT_MS` and
    /// `POLYCALL_BRIDGE_SOURCE_LANGUAGE`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        env_override("POLYCALL_BRIDGE_TIMEOUT_MS", &mut config.timeout_ms);
        env_string("POLYCALL_BRIDGE_SOURCE_LANGUAGE", &mut config.default_source_language);
        config
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
