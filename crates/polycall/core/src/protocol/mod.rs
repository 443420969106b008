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

//! Protocol message object and transports consumed by the bridge.

mod error;
mod message;
mod transport;

pub use error::{ProtocolError, ProtocolResult};
pub use message::{MessageType, PayloadFormat, ProtocolMessage, keys};
pub use transport::{LoopbackTransport, MessageHandler, MessageTransport};

#[cfg(test)]
pub use transport::MockMessageTransport;
