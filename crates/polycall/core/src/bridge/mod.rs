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

//! Protocol bridge: routes protocol messages to FFI calls and remote
//! functions, with converters for non-binary payloads.

mod config;
mod converter;
mod error;
mod protocol_bridge;
mod remote;
mod routing;

pub use config::{BridgeConfig, DEFAULT_TIMEOUT_MS, MAX_ENDPOINT_LENGTH, MAX_PATTERN_LENGTH};
pub use converter::{ConversionResult, ConverterFn, MessageConverter};
pub use error::{BridgeError, BridgeResult};
pub use protocol_bridge::ProtocolBridge;
pub use remote::RemoteFunction;
pub use routing::{RoutingRule, RoutingTable};
