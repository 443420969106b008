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

//! Permission Sets
//!
//! The closed set of capabilities a caller or component can hold, plus an
//! id-addressed bitmap for per-principal grants.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{SecurityError, SecurityOutcome};
use polycall_common::Reportable;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct PermissionSet: u32 {
        const READ          = 1 << 0;
        const WRITE         = 1 << 1;
        const EXECUTE       = 1 << 2;
        const MEMORY_READ   = 1 << 3;
        const MEMORY_WRITE  = 1 << 4;
        const ALLOCATE      = 1 << 5;
        const SHARE         = 1 << 6;
        const INVOKE_LOCAL  = 1 << 7;
        const INVOKE_REMOTE = 1 << 8;
        const FILE_ACCESS   = 1 << 9;
        const NETWORK       = 1 << 10;
        const PRIVILEGED    = 1 << 11;
    }
}

const NAMES: [(&str, PermissionSet); 12] = [
    ("read", PermissionSet::READ),
    ("write", PermissionSet::WRITE),
    ("execute", PermissionSet::EXECUTE),
    ("memory_read", PermissionSet::MEMORY_READ),
    ("memory_write", PermissionSet::MEMORY_WRITE),
    ("allocate", PermissionSet::ALLOCATE),
    ("share", PermissionSet::SHARE),
    ("invoke_local", PermissionSet::INVOKE_LOCAL),
    ("invoke_remote", PermissionSet::INVOKE_REMOTE),
    ("file_access", PermissionSet::FILE_ACCESS),
    ("network", PermissionSet::NETWORK),
    ("privileged", PermissionSet::PRIVILEGED),
];

impl PermissionSet {
    /// Number of named permission bits
    pub const COUNT: usize = NAMES.len();

    /// Look up a single permission by name, ignoring ASCII case
    pub fn by_name(name: &str) -> Option<Self> {
        NAMES.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, p)| *p)
    }

    /// Name of a single-bit set; `None` for empty or combined sets
    pub fn name(self) -> Option<&'static str> {
        NAMES.iter().find(|(_, p)| *p == self).map(|(n, _)| *n)
    }

    /// Permission at bit position `id`
    pub fn from_id(id: usize) -> SecurityOutcome<Self> {
        NAMES
            .get(id)
            .map(|(_, p)| *p)
            .ok_or_else(|| SecurityError::PermissionOutOfRange { id, capacity: Self::COUNT }.report())
    }

    pub fn names(self) -> Vec<&'static str> {
        NAMES.iter().filter(|(_, p)| self.contains(*p)).map(|(n, _)| *n).collect()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("none");
        }
        f.write_str(&self.names().join("|"))
    }
}

/// Fixed-capacity bitmap of permission ids
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionBitmap {
    words: Vec<u64>,
    capacity: usize,
}

impl PermissionBitmap {
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
            capacity,
        }
    }

    /// Seed a bitmap from the named bits of a [`PermissionSet`]
    pub fn from_set(set: PermissionSet, capacity: usize) -> Self {
        let mut bitmap = Self::new(capacity.max(PermissionSet::COUNT));
        for id in 0..PermissionSet::COUNT {
            if set.bits() & (1 << id) != 0 {
                bitmap.words[0] |= 1 << id;
            }
        }
        bitmap
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Set bit `id`. Returns whether the bit changed.
    pub fn grant(&mut self, id: usize) -> SecurityOutcome<bool> {
        let (word, mask) = self.locate(id)?;
        let changed = self.words[word] & mask == 0;
        self.words[word] |= mask;
        Ok(changed)
    }

    /// Clear bit `id`. Returns whether the bit changed.
    pub fn revoke(&mut self, id: usize) -> SecurityOutcome<bool> {
        let (word, mask) = self.locate(id)?;
        let changed = self.words[word] & mask != 0;
        self.words[word] &= !mask;
        Ok(changed)
    }

    pub fn check(&self, id: usize) -> SecurityOutcome<bool> {
        let (word, mask) = self.locate(id)?;
        Ok(self.words[word] & mask != 0)
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Named permissions currently granted
    pub fn to_set(&self) -> PermissionSet {
        let low = self.words.first().copied().unwrap_or(0) as u32;
        PermissionSet::from_bits_truncate(low)
    }

    fn locate(&self, id: usize) -> SecurityOutcome<(usize, u64)> {
        if id >= self.capacity {
            return Err(SecurityError::PermissionOutOfRange { id, capacity: self.capacity }.report());
        }
        Ok((id / 64, 1u64 << (id % 64)))
    }
}
