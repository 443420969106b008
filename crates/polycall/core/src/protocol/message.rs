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

//! Protocol Messages
//!
//! The wire-level message object the bridge routes. Only the accessors
//! below are part of the contract; no byte layout is promised.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Metadata keys the bridge reads and writes
pub mod keys {
    pub const LANGUAGE: &str = "language";
    pub const SOURCE_LANGUAGE: &str = "source_language";
    pub const CONTEXT: &str = "context";
    pub const COMPONENT: &str = "component";
    pub const ERROR: &str = "error";
    pub const ERROR_CODE: &str = "error_code";
    pub const ERROR_KIND: &str = "error_kind";
    pub const ERROR_MESSAGE: &str = "error_message";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    Request,
    Response,
    Error,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PayloadFormat {
    #[default]
    Binary,
    Json,
    Text,
}

impl PayloadFormat {
    pub fn name(self) -> &'static str {
        match self {
            PayloadFormat::Binary => "binary",
            PayloadFormat::Json => "json",
            PayloadFormat::Text => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    id: Uuid,
    /// Id of the request this message answers
    in_reply_to: Option<Uuid>,
    message_type: MessageType,
    format: PayloadFormat,
    path: String,
    payload: Vec<u8>,
    metadata: BTreeMap<String, String>,
}

impl ProtocolMessage {
    pub fn new(message_type: MessageType) -> Self {
        Self {
            id: Uuid::new_v4(),
            in_reply_to: None,
            message_type,
            format: PayloadFormat::default(),
            path: String::new(),
            payload: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Request addressed to `path`
    pub fn request(path: impl Into<String>) -> Self {
        let mut message = Self::new(MessageType::Request);
        message.path = path.into();
        message
    }

    /// Empty response correlated with `request`
    pub fn response_to(request: &ProtocolMessage) -> Self {
        let mut message = Self::new(MessageType::Response);
        message.in_reply_to = Some(request.id);
        message.path = request.path.clone();
        message
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn in_reply_to(&self) -> Option<Uuid> {
        self.in_reply_to
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn set_message_type(&mut self, message_type: MessageType) {
        self.message_type = message_type;
    }

    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }

    pub fn data(&self) -> &[u8] {
        &self.payload
    }

    pub fn set_data(&mut self, payload: Vec<u8>, format: PayloadFormat) {
        self.payload = payload;
        self.format = format;
    }

    pub fn take_data(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.payload)
    }

    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    pub fn metadata_map(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_metadata(key, value);
        self
    }

    pub fn with_data(mut self, payload: Vec<u8>, format: PayloadFormat) -> Self {
        self.set_data(payload, format);
        self
    }

    /// True when tagged `error=true`
    pub fn is_error(&self) -> bool {
        self.message_type == MessageType::Error || self.metadata(keys::ERROR) == Some("true")
    }
}

impl fmt::Display for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} [{}; {} bytes]",
            self.message_type,
            if self.path.is_empty() { "<no path>" } else { &self.path },
            self.format.name(),
            self.payload.len()
        )
    }
}
