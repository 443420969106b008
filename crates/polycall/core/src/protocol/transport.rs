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

//! Message transports

#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::error::{ProtocolError, ProtocolResult};
use super::message::ProtocolMessage;
use polycall_common::Reportable;

/// Sends a request and waits for its response
#[cfg_attr(test, automock)]
pub trait MessageTransport: Send + Sync {
    /// Deliver `message` to `endpoint`, waiting at most `timeout`
    fn send_message(&self, endpoint: &str, message: ProtocolMessage, timeout: Duration) -> ProtocolResult<ProtocolMessage>;
}

/// Anything able to answer a protocol message
pub trait MessageHandler: Send + Sync {
    fn handle_message(&self, message: &ProtocolMessage) -> ProtocolMessage;
}

/// In-process transport delivering straight to registered handlers
#[derive(Default)]
pub struct LoopbackTransport {
    endpoints: RwLock<HashMap<String, Arc<dyn MessageHandler>>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `endpoint`, replacing any previous binding
    pub fn connect(&self, endpoint: impl Into<String>, handler: Arc<dyn MessageHandler>) {
        let endpoint = endpoint.into();
        debug!(endpoint = %endpoint, "loopback endpoint connected");
        self.endpoints.write().insert(endpoint, handler);
    }

    pub fn disconnect(&self, endpoint: &str) -> bool {
        self.endpoints.write().remove(endpoint).is_some()
    }

    pub fn endpoints(&self) -> Vec<String> {
        let mut endpoints: Vec<String> = self.endpoints.read().keys().cloned().collect();
        endpoints.sort();
        endpoints
    }
}

impl MessageTransport for LoopbackTransport {
    /// Runs the handler on the calling thread. A handler that overran the
    /// deadline still completes, but its response is discarded.
    fn send_message(&self, endpoint: &str, message: ProtocolMessage, timeout: Duration) -> ProtocolResult<ProtocolMessage> {
        let handler = self
            .endpoints
            .read()
            .get(endpoint)
            .cloned()
            .ok_or_else(|| ProtocolError::EndpointNotFound(endpoint.to_string()).report())?;

        let started = Instant::now();
        let response = handler.handle_message(&message);
        let elapsed = started.elapsed();

        if elapsed > timeout {
            warn!(endpoint, elapsed_ms = elapsed.as_millis() as u64, "loopback handler overran deadline");
            return Err(ProtocolError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }
            .report());
        }
        Ok(response)
    }
}
