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

//! Memory Regions
//!
//! A region is a named, permissioned allocation owned by one component.
//! It may be lent to at most one other component at a time.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{MemoryError, MemoryResult};
use super::pool::PoolPtr;
use polycall_common::Reportable;

bitflags! {
    /// Access bits checked by [`MemoryRegion::verify_permissions`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct RegionAccess: u32 {
        const READ    = 1 << 0;
        const WRITE   = 1 << 1;
        const EXECUTE = 1 << 2;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct RegionFlags: u32 {
        /// Zeroed when released
        const SECURE     = 1 << 0;
        /// Contents are frozen; writes are rejected
        const LOCKED     = 1 << 1;
        const PERSISTENT = 1 << 2;
        const ISOLATED   = 1 << 3;
        /// Set while `shared_with` is occupied
        const SHARED     = 1 << 4;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub u64);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub id: RegionId,
    pub name: String,
    pub owner: String,
    pub shared_with: Option<String>,
    pub ptr: PoolPtr,
    pub size: usize,
    pub permissions: RegionAccess,
    pub flags: RegionFlags,
}

impl MemoryRegion {
    pub fn new(id: RegionId, name: impl Into<String>, owner: impl Into<String>, ptr: PoolPtr, size: usize, permissions: RegionAccess, flags: RegionFlags) -> Self {
        Self {
            id,
            name: name.into(),
            owner: owner.into(),
            shared_with: None,
            ptr,
            size,
            permissions,
            flags: flags - RegionFlags::SHARED,
        }
    }

    /// True when `component` is the owner or the current borrower
    pub fn is_accessible_by(&self, component: &str) -> bool {
        self.owner == component || self.shared_with.as_deref() == Some(component)
    }

    /// Only the owner or the single `shared_with` component passes, and
    /// only for access bits the region grants.
    pub fn verify_permissions(&self, component: &str, required: RegionAccess) -> bool {
        if !self.is_accessible_by(component) {
            return false;
        }
        if required.contains(RegionAccess::WRITE) && self.flags.contains(RegionFlags::LOCKED) {
            return false;
        }
        self.permissions.contains(required)
    }

    /// Lend the region to `component`.
    ///
    /// Sharing again with the current borrower is a no-op. A different
    /// borrower requires [`unshare`](Self::unshare) first.
    pub fn share_with(&mut self, component: &str) -> MemoryResult<()> {
        if component.is_empty() || component == self.owner {
            return Err(MemoryError::InvalidParameter(format!("{} cannot be shared with '{}'", self.id, component)).report());
        }
        match self.shared_with.as_deref() {
            Some(current) if current == component => Ok(()),
            Some(current) => Err(MemoryError::AlreadyShared {
                region: self.id.0,
                shared_with: current.to_string(),
            }
            .report()),
            None => {
                self.shared_with = Some(component.to_string());
                self.flags.insert(RegionFlags::SHARED);
                Ok(())
            }
        }
    }

    pub fn unshare(&mut self, component: &str) -> MemoryResult<()> {
        if self.shared_with.as_deref() != Some(component) {
            return Err(MemoryError::NotShared {
                region: self.id.0,
                component: component.to_string(),
            }
            .report());
        }
        self.shared_with = None;
        self.flags.remove(RegionFlags::SHARED);
        Ok(())
    }

    /// Validate that `len` bytes at `offset` fall inside the region
    pub fn check_bounds(&self, offset: usize, len: usize) -> MemoryResult<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(MemoryError::OutOfBounds { offset, len, size: self.size }.report()),
        }
    }
}
