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

//! # Memory Module
//!
//! Arena allocator used by every other component for deterministic
//! allocation, release and leak detection, plus the permissioned
//! [`MemoryRegion`] view that the DOP registry hands to components.

mod error;
mod pool;
mod region;

pub use error::{MemoryError, MemoryResult};
pub use pool::{ALIGNMENT, AllocFlags, BlockInfo, HEADER_SIZE, MIN_BLOCK_SIZE, MemoryPool, PoolPtr, PoolStats, align_size};
pub use region::{MemoryRegion, RegionAccess, RegionFlags, RegionId};
