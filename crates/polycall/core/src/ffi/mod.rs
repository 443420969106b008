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

//! FFI call surface: values, signatures, language bridges and the
//! binary argument envelope.

mod bridge;
mod context;
mod envelope;
mod error;
mod signature;
mod value;

pub use bridge::{LanguageBridge, NativeBridge, NativeFunction};
pub use context::FfiContext;
pub use envelope::{ArgumentEnvelope, decode_value, encode_value};
pub use error::{FfiError, FfiResult};
pub use signature::FunctionSignature;
pub use value::{FfiType, FfiValue};
