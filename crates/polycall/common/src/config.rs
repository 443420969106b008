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

//! Environment overrides for configuration structs

use std::str::FromStr;
use tracing::warn;

/// Read `key` from the environment and parse it, keeping `current` when the
/// variable is absent or malformed.
pub fn env_override<T: FromStr>(key: &str, current: &mut T) {
    if let Ok(raw) = std::env::var(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *current = value,
            Err(_) => warn!(key, value = %raw, "ignoring malformed environment override"),
        }
    }
}

/// Boolean override accepting `1/0`, `true/false`, `yes/no`, `on/off`
pub fn env_flag(key: &str, current: &mut bool) {
    if let Ok(raw) = std::env::var(key) {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => *current = true,
            "0" | "false" | "no" | "off" => *current = false,
            _ => warn!(key, value = %raw, "ignoring malformed boolean override"),
        }
    }
}

/// String override; empty values are ignored
pub fn env_string(key: &str, current: &mut String) {
    if let Ok(raw) = std::env::var(key) {
        if !raw.trim().is_empty() {
            *current = raw.trim().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_variable_keeps_default() {
        let mut value = 42u64;
        env_override("POLYCALL_TEST_SURELY_UNSET_VARIABLE", &mut value);
        assert_eq!(value, 42);
    }

    #[test]
    fn test_override_parses_value() {
        // SAFETY: test-local variable name, not read by any other test
        unsafe { std::env::set_var("POLYCALL_TEST_OVERRIDE_U64", " 512 ") };
        let mut value = 1u64;
        env_override("POLYCALL_TEST_OVERRIDE_U64", &mut value);
        assert_eq!(value, 512);
    }

    #[test]
    fn test_malformed_flag_is_ignored() {
        // SAFETY: test-local variable name, not read by any other test
        unsafe { std::env::set_var("POLYCALL_TEST_FLAG", "maybe") };
        let mut flag = true;
        env_flag("POLYCALL_TEST_FLAG", &mut flag);
        assert!(flag);
    }
}
