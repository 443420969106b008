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

//! Routing Table
//!
//! Priority-ordered `(pattern, endpoint)` rules. Rules are kept sorted by
//! descending priority; equal priorities keep insertion order.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{BridgeError, BridgeResult};
use polycall_common::Reportable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub source_pattern: String,
    pub target_endpoint: String,
    pub priority: i32,
}

impl RoutingRule {
    /// `*` matches every path, a trailing `*` matches by prefix, anything
    /// else matches the exact path or its sub-paths.
    pub fn matches(&self, path: &str) -> bool {
        let pattern = self.source_pattern.as_str();
        if pattern == "*" {
            return true;
        }
        if let Some(prefix) = pattern.strip_suffix('*') {
            return path.starts_with(prefix);
        }
        match path.strip_prefix(pattern) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || pattern.ends_with('/'),
            None => false,
        }
    }
}

#[derive(Debug)]
pub struct RoutingTable {
    rules: Mutex<Vec<RoutingRule>>,
    max_pattern_length: usize,
    max_endpoint_length: usize,
}

impl RoutingTable {
    pub fn new(max_pattern_length: usize, max_endpoint_length: usize) -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            max_pattern_length,
            max_endpoint_length,
        }
    }

    pub fn add_rule(&self, source_pattern: &str, target_endpoint: &str, priority: i32) -> BridgeResult<()> {
        self.check_lengths(source_pattern, target_endpoint)?;

        let mut rules = self.rules.lock();
        if rules.iter().any(|r| r.source_pattern == source_pattern && r.target_endpoint == target_endpoint) {
            return Err(BridgeError::AlreadyRegistered(format!("route {} -> {}", source_pattern, target_endpoint)).report());
        }

        let index = rules.iter().position(|r| r.priority < priority).unwrap_or(rules.len());
        rules.insert(
            index,
            RoutingRule {
                source_pattern: source_pattern.to_string(),
                target_endpoint: target_endpoint.to_string(),
                priority,
            },
        );
        debug!(pattern = source_pattern, endpoint = target_endpoint, priority, "routing rule added");
        Ok(())
    }

    pub fn remove_rule(&self, source_pattern: &str, target_endpoint: &str) -> BridgeResult<RoutingRule> {
        self.check_lengths(source_pattern, target_endpoint)?;

        let mut rules = self.rules.lock();
        let index = rules
            .iter()
            .position(|r| r.source_pattern == source_pattern && r.target_endpoint == target_endpoint)
            .ok_or_else(|| BridgeError::NotFound(format!("route {} -> {}", source_pattern, target_endpoint)).report())?;
        Ok(rules.remove(index))
    }

    /// Endpoint of the highest-priority rule matching `path`, copied out
    /// before the lock is released
    pub fn route(&self, path: &str) -> Option<String> {
        self.rules.lock().iter().find(|r| r.matches(path)).map(|r| r.target_endpoint.clone())
    }

    pub fn rules(&self) -> Vec<RoutingRule> {
        self.rules.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.rules.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.rules.lock().clear();
    }

    fn check_lengths(&self, source_pattern: &str, target_endpoint: &str) -> BridgeResult<()> {
        if source_pattern.is_empty() || target_endpoint.is_empty() {
            return Err(BridgeError::InvalidParameter("pattern and endpoint are required".into()).report());
        }
        if source_pattern.len() > self.max_pattern_length {
            return Err(BridgeError::InvalidParameter(format!(
                "pattern of {} bytes exceeds maximum of {}",
                source_pattern.len(),
                self.max_pattern_length
            ))
            .report());
        }
        if target_endpoint.len() > self.max_endpoint_length {
            return Err(BridgeError::InvalidParameter(format!(
                "endpoint of {} bytes exceeds maximum of {}",
                target_endpoint.len(),
                self.max_endpoint_length
            ))
            .report());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn table() -> RoutingTable {
        RoutingTable::new(256, 256)
    }

    #[test]
    fn test_priority_order_with_ties() {
        let table = table();
        for (i, priority) in [5, 1, 9, 5].into_iter().enumerate() {
            table.add_rule(&format!("/r{}", i), "ep", priority).unwrap();
        }

        let rules = table.rules();
        let priorities: Vec<i32> = rules.iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![9, 5, 5, 1]);
        assert_eq!(rules[1].source_pattern, "/r0");
        assert_eq!(rules[2].source_pattern, "/r3");
    }

    #[test]
    fn test_higher_priority_wins() {
        let table = table();
        table.add_rule("/a", "ep1", 10).unwrap();
        table.add_rule("/a", "ep2", 20).unwrap();
        assert_eq!(table.route("/a/x").as_deref(), Some("ep2"));
        assert_eq!(table.route("/ab"), None);
    }

    #[test]
    fn test_pattern_forms() {
        let rule = |pattern: &str| RoutingRule {
            source_pattern: pattern.to_string(),
            target_endpoint: "ep".to_string(),
            priority: 0,
        };
        assert!(rule("*").matches("/anything"));
        assert!(rule("/api*").matches("/apiv2/x"));
        assert!(rule("/api").matches("/api"));
        assert!(rule("/api/").matches("/api/x"));
        assert!(!rule("/api").matches("/apiv2"));
    }

    #[test]
    fn test_length_limits_and_removal() {
        let table = RoutingTable::new(8, 4);
        assert!(matches!(table.add_rule("/too/long/pattern", "ep", 1), Err(BridgeError::InvalidParameter(_))));
        assert!(matches!(table.add_rule("/ok", "endpoint", 1), Err(BridgeError::InvalidParameter(_))));
        assert!(matches!(table.add_rule("", "ep", 1), Err(BridgeError::InvalidParameter(_))));

        table.add_rule("/ok", "ep", 1).unwrap();
        assert!(matches!(table.add_rule("/ok", "ep", 3), Err(BridgeError::AlreadyRegistered(_))));
        assert_eq!(table.remove_rule("/ok", "ep").unwrap().priority, 1);
        assert!(matches!(table.remove_rule("/ok", "ep"), Err(BridgeError::NotFound(_))));
        assert!(table.is_empty());
    }

    proptest! {
        #[test]
        fn prop_rules_sorted_stably(priorities in proptest::collection::vec(-20i32..20, 0..40)) {
            let table = table();
            for (i, priority) in priorities.iter().enumerate() {
                table.add_rule(&format!("/r{}", i), "ep", *priority).unwrap();
            }

            let mut expected: Vec<(i32, usize)> = priorities.iter().copied().zip(0..).collect();
            expected.sort_by(|a, b| b.0.cmp(&a.0));

            let actual: Vec<(i32, usize)> = table
                .rules()
                .iter()
                .map(|r| (r.priority, r.source_pattern[2..].parse().unwrap()))
                .collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
