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

//! Binary argument envelope: an argument count followed by the values,
//! encoded with bincode's standard configuration.

use serde::{Deserialize, Serialize};

use super::error::{FfiError, FfiResult};
use super::value::FfiValue;
use polycall_common::Reportable;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentEnvelope {
    pub argument_count: u64,
    pub values: Vec<FfiValue>,
}

impl ArgumentEnvelope {
    pub fn new(values: Vec<FfiValue>) -> Self {
        Self {
            argument_count: values.len() as u64,
            values,
        }
    }

    pub fn encode(&self) -> FfiResult<Vec<u8>> {
        encode_value(self)
    }

    /// Decode and check the declared count against the values present
    pub fn decode(bytes: &[u8]) -> FfiResult<Self> {
        let envelope: Self = decode_value(bytes)?;
        if envelope.argument_count != envelope.values.len() as u64 {
            return Err(FfiError::Serialization(format!(
                "envelope declares {} argument(s) but carries {}",
                envelope.argument_count,
                envelope.values.len()
            ))
            .report());
        }
        Ok(envelope)
    }

    pub fn into_values(self) -> Vec<FfiValue> {
        self.values
    }
}

/// Encode any serde value with the standard bincode configuration
pub fn encode_value<T: Serialize>(value: &T) -> FfiResult<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode::config::standard()).map_err(|e| FfiError::Serialization(e.to_string()).report())
}

/// Decode a value, rejecting trailing bytes
pub fn decode_value<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> FfiResult<T> {
    let (value, consumed) =
        bincode::serde::decode_from_slice(bytes, bincode::config::standard()).map_err(|e| FfiError::Serialization(e.to_string()).report())?;
    if consumed != bytes.len() {
        return Err(FfiError::Serialization(format!("{} trailing byte(s)", bytes.len() - consumed)).report());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_preserves_arguments() {
        let envelope = ArgumentEnvelope::new(vec![
            FfiValue::I32(42),
            FfiValue::from("payment"),
            FfiValue::Array(vec![FfiValue::F64(1.5), FfiValue::Bytes(vec![0, 255])]),
        ]);
        let bytes = envelope.encode().unwrap();
        let decoded = ArgumentEnvelope::decode(&bytes).unwrap();
        assert_eq!(decoded.argument_count, 3);
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let forged = ArgumentEnvelope {
            argument_count: 5,
            values: vec![FfiValue::Void],
        };
        let bytes = encode_value(&forged).unwrap();
        assert!(matches!(ArgumentEnvelope::decode(&bytes), Err(FfiError::Serialization(_))));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(ArgumentEnvelope::decode(&[0xFF, 0xFF, 0xFF]).is_err());

        let mut bytes = ArgumentEnvelope::new(vec![]).encode().unwrap();
        bytes.push(0);
        assert!(ArgumentEnvelope::decode(&bytes).is_err());
    }
}
