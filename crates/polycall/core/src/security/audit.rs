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

//! Audit Log
//!
//! Bounded ring buffer of security events with console, file and callback
//! sinks. Once full, new events silently overwrite the oldest.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::{SecurityError, SecurityOutcome};
use super::permissions::PermissionSet;
use polycall_common::Reportable;
use polycall_common::config::{env_override, env_string};

/// Default ring buffer capacity
pub const MAX_AUDIT_ENTRIES: usize = 1024;

/// Audit verbosity. `Error` keeps only denials, `Warning` adds events
/// tagged "warning", `Info` and above keep everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum AuditLevel {
    None,
    Error,
    Warning,
    #[default]
    Info,
    Debug,
    Trace,
}

impl FromStr for AuditLevel {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(AuditLevel::None),
            "error" => Ok(AuditLevel::Error),
            "warning" | "warn" => Ok(AuditLevel::Warning),
            "info" => Ok(AuditLevel::Info),
            "debug" => Ok(AuditLevel::Debug),
            "trace" => Ok(AuditLevel::Trace),
            other => Err(SecurityError::InvalidParameter(format!("unknown audit level '{}'", other))),
        }
    }
}

/// Audit log configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    pub level: AuditLevel,
    /// Ring buffer capacity
    pub capacity: usize,
    pub log_to_console: bool,
    pub log_to_file: bool,
    pub file_path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            level: AuditLevel::Info,
            capacity: MAX_AUDIT_ENTRIES,
            log_to_console: true,
            log_to_file: false,
            file_path: None,
        }
    }
}

impl AuditConfig {
    /// Defaults overridden by `POLYCALL_AUDIT_LEVEL`, `POLYCALL_AUDIT_CAPACITY`
    /// and `POLYCALL_AUDIT_FILE`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        env_override("POLYCALL_AUDIT_LEVEL", &mut config.level);
        env_override("POLYCALL_AUDIT_CAPACITY", &mut config.capacity);

        let mut file = String::new();
        env_string("POLYCALL_AUDIT_FILE", &mut file);
        if !file.is_empty() {
            config.log_to_file = true;
            config.file_path = Some(PathBuf::from(file));
        }
        config
    }
}

/// Outcome of an access check, as recorded in the audit trail
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecurityResult {
    pub allowed: bool,
    pub required_permissions: PermissionSet,
    /// Equal to `required_permissions` when the call was denied
    pub missing_permissions: PermissionSet,
    pub error_message: Option<String>,
}

impl SecurityResult {
    pub fn allow(required_permissions: PermissionSet) -> Self {
        Self {
            allowed: true,
            required_permissions,
            missing_permissions: PermissionSet::empty(),
            error_message: None,
        }
    }

    pub fn deny(required_permissions: PermissionSet, message: impl Into<String>) -> Self {
        Self {
            allowed: false,
            required_permissions,
            missing_permissions: required_permissions,
            error_message: Some(message.into()),
        }
    }
}

/// A single security-relevant event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub source_language: String,
    pub target_language: String,
    pub function_name: String,
    pub action: String,
    pub result: SecurityResult,
    pub details: Option<String>,
}

impl AuditEvent {
    pub fn new(action: impl Into<String>, function_name: impl Into<String>, result: SecurityResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source_language: String::new(),
            target_language: String::new(),
            function_name: function_name.into(),
            action: action.into(),
            result,
            details: None,
        }
    }

    pub fn with_languages(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_language = source.into();
        self.target_language = target.into();
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn is_denied(&self) -> bool {
        !self.result.allowed
    }

    /// Tagged as a warning in its action or details
    pub fn is_warning(&self) -> bool {
        self.action.to_ascii_lowercase().contains("warning")
            || self.details.as_deref().is_some_and(|d| d.to_ascii_lowercase().contains("warning"))
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} -> {} {}",
            if self.result.allowed { "ALLOWED" } else { "DENIED" },
            self.action,
            if self.source_language.is_empty() { "?" } else { &self.source_language },
            if self.target_language.is_empty() { "?" } else { &self.target_language },
            self.function_name,
        )?;
        if let Some(message) = &self.result.error_message {
            write!(f, " ({})", message)?;
        }
        if let Some(details) = &self.details {
            write!(f, " [{}]", details)?;
        }
        Ok(())
    }
}

/// Callback fired for every accepted event, outside the log's lock
pub type AuditCallback = Arc<dyn Fn(&AuditEvent) + Send + Sync>;

struct AuditState {
    entries: Vec<Option<AuditEvent>>,
    write_index: usize,
    len: usize,
    level: AuditLevel,
    log_to_console: bool,
    file: Option<BufWriter<File>>,
    callback: Option<AuditCallback>,
}

pub struct AuditLog {
    capacity: usize,
    state: Mutex<AuditState>,
}

impl AuditLog {
    pub fn new(config: AuditConfig) -> SecurityOutcome<Self> {
        if config.capacity == 0 {
            return Err(SecurityError::InvalidParameter("audit capacity cannot be zero".into()).report());
        }

        let log = Self {
            capacity: config.capacity,
            state: Mutex::new(AuditState {
                entries: vec![None; config.capacity],
                write_index: 0,
                len: 0,
                level: config.level,
                log_to_console: config.log_to_console,
                file: None,
                callback: None,
            }),
        };

        if config.log_to_file {
            let path = config
                .file_path
                .as_deref()
                .ok_or_else(|| SecurityError::InvalidParameter("log_to_file set without a file path".into()).report())?;
            log.open_file(path)?;
        }
        Ok(log)
    }

    /// Record an event if the configured level accepts it.
    ///
    /// Returns whether the event was kept.
    pub fn log_event(&self, event: AuditEvent) -> bool {
        let callback = {
            let mut state = self.state.lock();
            if !accepts(state.level, &event) {
                return false;
            }

            if state.log_to_console {
                if event.is_denied() {
                    warn!(target: "polycall::audit", event_id = %event.id, "{}", event);
                } else {
                    info!(target: "polycall::audit", event_id = %event.id, "{}", event);
                }
            }

            if let Some(file) = state.file.as_mut() {
                if let Err(e) = writeln!(file, "{} {}", event.timestamp.to_rfc3339(), event) {
                    SecurityError::AuditSink { reason: e.to_string() }.report();
                }
            }

            let callback = state.callback.clone().map(|cb| (cb, event.clone()));

            let index = state.write_index;
            state.entries[index] = Some(event);
            state.write_index = (index + 1) % self.capacity;
            state.len = (state.len + 1).min(self.capacity);
            callback
        };

        if let Some((callback, event)) = callback {
            callback(&event);
        }
        true
    }

    /// Buffered events, oldest first
    pub fn entries(&self) -> Vec<AuditEvent> {
        let state = self.state.lock();
        let start = if state.len < self.capacity { 0 } else { state.write_index };
        (0..state.len)
            .filter_map(|i| state.entries[(start + i) % self.capacity].clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn level(&self) -> AuditLevel {
        self.state.lock().level
    }

    pub fn set_level(&self, level: AuditLevel) {
        self.state.lock().level = level;
    }

    pub fn set_console(&self, enabled: bool) {
        self.state.lock().log_to_console = enabled;
    }

    pub fn console_enabled(&self) -> bool {
        self.state.lock().log_to_console
    }

    pub fn set_callback(&self, callback: AuditCallback) {
        self.state.lock().callback = Some(callback);
    }

    pub fn clear_callback(&self) {
        self.state.lock().callback = None;
    }

    /// Start appending events to `path`, replacing any open file
    pub fn open_file(&self, path: &Path) -> SecurityOutcome<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| SecurityError::AuditSink {
                reason: format!("cannot open {}: {}", path.display(), e),
            }
            .report())?;

        let previous = self.state.lock().file.replace(BufWriter::new(file));
        if let Some(mut previous) = previous {
            let _ = previous.flush();
        }
        debug!(path = %path.display(), "audit file sink opened");
        Ok(())
    }

    pub fn close_file(&self) -> SecurityOutcome<()> {
        let file = self.state.lock().file.take();
        match file {
            Some(mut file) => file.flush().map_err(|e| SecurityError::AuditSink { reason: e.to_string() }.report()),
            None => Ok(()),
        }
    }

    pub fn flush(&self) -> SecurityOutcome<()> {
        let mut state = self.state.lock();
        match state.file.as_mut() {
            Some(file) => file.flush().map_err(|e| SecurityError::AuditSink { reason: e.to_string() }.report()),
            None => Ok(()),
        }
    }

    /// Drop every buffered event
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.iter_mut().for_each(|slot| *slot = None);
        state.write_index = 0;
        state.len = 0;
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        let config = AuditConfig::default();
        Self {
            capacity: config.capacity,
            state: Mutex::new(AuditState {
                entries: vec![None; config.capacity],
                write_index: 0,
                len: 0,
                level: config.level,
                log_to_console: config.log_to_console,
                file: None,
                callback: None,
            }),
        }
    }
}

impl fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditLog").field("capacity", &self.capacity).field("len", &self.len()).finish()
    }
}

impl Drop for AuditLog {
    fn drop(&mut self) {
        if let Some(file) = self.state.get_mut().file.as_mut() {
            let _ = file.flush();
        }
    }
}

fn accepts(level: AuditLevel, event: &AuditEvent) -> bool {
    match level {
        AuditLevel::None => false,
        AuditLevel::Error => event.is_denied(),
        AuditLevel::Warning => event.is_denied() || event.is_warning(),
        AuditLevel::Info | AuditLevel::Debug | AuditLevel::Trace => true,
    }
}
