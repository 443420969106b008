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

//! Arena Memory Pool
//!
//! A contiguous byte arena carved into blocks. Every block starts with an
//! in-band header carrying a magic number; the block table and the
//! free/used lists are kept out of band, keyed by block offset.
//!
//! A pool takes no lock. It is owned by a single thread or component;
//! callers that share one must wrap it in their own mutex (the DOP
//! registry does exactly that).

use bitflags::bitflags;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};
use zeroize::Zeroize;

use super::error::{MemoryError, MemoryResult};
use polycall_common::Reportable;

/// Payload alignment in bytes
pub const ALIGNMENT: usize = 16;
/// Size of the in-band block header
pub const HEADER_SIZE: usize = 32;
/// Smallest payload worth splitting off as its own block
pub const MIN_BLOCK_SIZE: usize = 16;

const MAGIC_LIVE: u32 = 0x504F_4C59;
const MAGIC_FREE: u32 = 0x4652_4545;

bitflags! {
    /// Per-allocation behaviour flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AllocFlags: u32 {
        /// Zero-fill the payload on allocation
        const ZERO_INIT  = 1 << 0;
        /// Zero the payload when the block is freed
        const SECURE     = 1 << 1;
        /// Block cannot be reallocated
        const LOCKED     = 1 << 2;
        /// Block survives nothing but an explicit free; blocks `reset`
        const PERSISTENT = 1 << 3;
    }
}

/// Handle to a live allocation: the payload offset inside the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolPtr(usize);

impl PoolPtr {
    pub fn offset(self) -> usize {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn from_offset(offset: usize) -> Self {
        PoolPtr(offset)
    }
}

/// Round `size` up to [`ALIGNMENT`]
pub fn align_size(size: usize) -> Option<usize> {
    size.checked_add(ALIGNMENT - 1).map(|s| s & !(ALIGNMENT - 1))
}

#[derive(Debug, Clone)]
struct BlockHeader {
    /// Usable payload bytes following the header
    capacity: usize,
    /// Aligned size requested by the caller (0 while free)
    size: usize,
    flags: AllocFlags,
    is_free: bool,
}

/// Description of a live block, used for leak reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub ptr: PoolPtr,
    pub size: usize,
    pub flags: AllocFlags,
}

/// Read-only snapshot of pool counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub total_size: usize,
    /// Bytes handed out over the pool's lifetime
    pub allocated: usize,
    /// Bytes returned over the pool's lifetime
    pub freed: usize,
    /// Bytes currently handed out
    pub current: usize,
    pub peak: usize,
    pub allocation_count: u64,
    pub free_count: u64,
    pub failed_allocations: u64,
    pub free_bytes: usize,
    pub largest_free_block: usize,
    pub used_blocks: usize,
    pub free_blocks: usize,
}

/// First-fit arena allocator
pub struct MemoryPool {
    arena: Vec<u8>,
    blocks: BTreeMap<usize, BlockHeader>,
    free_list: BTreeSet<usize>,
    used_list: BTreeSet<usize>,
    stats: PoolStats,
}

impl MemoryPool {
    /// Create a pool whose arena holds at least `size` bytes
    pub fn new(size: usize) -> MemoryResult<Self> {
        if size == 0 {
            return Err(MemoryError::InvalidParameter("pool size cannot be zero".into()).report());
        }

        let total = size
            .max(HEADER_SIZE + MIN_BLOCK_SIZE)
            .checked_add(ALIGNMENT - 1)
            .map(|s| s & !(ALIGNMENT - 1))
            .ok_or_else(|| MemoryError::InvalidParameter(format!("pool size {} overflows", size)).report())?;

        let mut arena = Vec::new();
        arena
            .try_reserve_exact(total)
            .map_err(|_| MemoryError::OutOfMemory { requested: total, available: 0 }.report())?;
        arena.resize(total, 0);

        let mut pool = Self {
            arena,
            blocks: BTreeMap::new(),
            free_list: BTreeSet::new(),
            used_list: BTreeSet::new(),
            stats: PoolStats {
                total_size: total,
                ..PoolStats::default()
            },
        };
        pool.install_whole_arena_block();
        debug!(total_size = total, "memory pool created");
        Ok(pool)
    }

    /// Allocate `size` bytes (rounded up to [`ALIGNMENT`])
    pub fn alloc(&mut self, size: usize, flags: AllocFlags) -> MemoryResult<PoolPtr> {
        if size == 0 {
            return Err(MemoryError::InvalidParameter("allocation size cannot be zero".into()).report());
        }
        let aligned = align_size(size).ok_or_else(|| MemoryError::InvalidParameter(format!("allocation size {} overflows", size)).report())?;

        let candidate = self
            .free_list
            .iter()
            .copied()
            .find(|start| self.blocks.get(start).is_some_and(|b| b.capacity >= aligned));

        let Some(start) = candidate else {
            self.stats.failed_allocations += 1;
            return Err(MemoryError::OutOfMemory {
                requested: aligned,
                available: self.largest_free_block(),
            }
            .report());
        };

        self.free_list.remove(&start);
        let capacity = self.blocks.get(&start).map(|b| b.capacity).unwrap_or_default();

        let remainder = capacity - aligned;
        let capacity = if remainder >= HEADER_SIZE + MIN_BLOCK_SIZE {
            let split_start = start + HEADER_SIZE + aligned;
            self.insert_free_block(split_start, remainder - HEADER_SIZE);
            aligned
        } else {
            capacity
        };

        self.blocks.insert(
            start,
            BlockHeader {
                capacity,
                size: aligned,
                flags,
                is_free: false,
            },
        );
        self.used_list.insert(start);
        self.write_header(start, MAGIC_LIVE, flags, capacity);

        let payload = start + HEADER_SIZE;
        if flags.contains(AllocFlags::ZERO_INIT) {
            self.arena[payload..payload + capacity].fill(0);
        }

        self.stats.allocated += aligned;
        self.stats.current += aligned;
        self.stats.peak = self.stats.peak.max(self.stats.current);
        self.stats.allocation_count += 1;

        Ok(PoolPtr(payload))
    }

    /// Release a block. Corruption and double frees are reported and leave
    /// the pool untouched.
    pub fn free(&mut self, ptr: PoolPtr) -> MemoryResult<()> {
        let start = self.live_block_start(ptr)?;
        let Some(header) = self.blocks.get_mut(&start) else {
            return Err(MemoryError::Corruption { offset: ptr.0 }.report());
        };

        let capacity = header.capacity;
        let size = header.size;
        let flags = header.flags;
        header.is_free = true;
        header.size = 0;
        header.flags = AllocFlags::empty();

        let payload = start + HEADER_SIZE;
        if flags.contains(AllocFlags::SECURE) {
            self.arena[payload..payload + capacity].zeroize();
        }

        self.used_list.remove(&start);
        self.free_list.insert(start);
        self.write_header(start, MAGIC_FREE, AllocFlags::empty(), capacity);

        self.stats.current -= size;
        self.stats.freed += size;
        self.stats.free_count += 1;

        self.coalesce(start);
        Ok(())
    }

    /// Resize a block.
    ///
    /// `None` behaves as [`alloc`](Self::alloc); a zero `new_size` behaves
    /// as [`free`](Self::free) and yields `None`.
    pub fn realloc(&mut self, ptr: Option<PoolPtr>, new_size: usize) -> MemoryResult<Option<PoolPtr>> {
        let Some(ptr) = ptr else {
            return self.alloc(new_size, AllocFlags::empty()).map(Some);
        };
        if new_size == 0 {
            self.free(ptr)?;
            return Ok(None);
        }

        let start = self.live_block_start(ptr)?;
        let (capacity, size, flags) = match self.blocks.get(&start) {
            Some(h) => (h.capacity, h.size, h.flags),
            None => return Err(MemoryError::Corruption { offset: ptr.0 }.report()),
        };
        if flags.contains(AllocFlags::LOCKED) {
            return Err(MemoryError::Locked { offset: ptr.0 }.report());
        }

        let aligned = align_size(new_size).ok_or_else(|| MemoryError::InvalidParameter(format!("allocation size {} overflows", new_size)).report())?;

        if aligned <= capacity {
            let payload = start + HEADER_SIZE;
            if flags.contains(AllocFlags::SECURE) && aligned < capacity {
                self.arena[payload + aligned..payload + capacity].zeroize();
            }

            let remainder = capacity - aligned;
            let new_capacity = if remainder >= HEADER_SIZE + MIN_BLOCK_SIZE {
                let split_start = start + HEADER_SIZE + aligned;
                self.insert_free_block(split_start, remainder - HEADER_SIZE);
                self.coalesce(split_start);
                aligned
            } else {
                capacity
            };

            if let Some(header) = self.blocks.get_mut(&start) {
                header.capacity = new_capacity;
                header.size = aligned;
            }
            self.write_header(start, MAGIC_LIVE, flags, new_capacity);

            if aligned > size {
                self.stats.allocated += aligned - size;
                self.stats.current += aligned - size;
                self.stats.peak = self.stats.peak.max(self.stats.current);
            } else {
                self.stats.freed += size - aligned;
                self.stats.current -= size - aligned;
            }
            return Ok(Some(ptr));
        }

        let new_ptr = self.alloc(aligned, flags)?;
        let src = ptr.0;
        let dst = new_ptr.0;
        self.arena.copy_within(src..src + size, dst);
        self.free(ptr)?;
        Ok(Some(new_ptr))
    }

    /// Discard every block and start over with one whole-arena free block.
    ///
    /// Refused while any persistent block is in use.
    pub fn reset(&mut self) -> MemoryResult<()> {
        let persistent = self
            .used_list
            .iter()
            .filter(|start| self.blocks.get(start).is_some_and(|b| b.flags.contains(AllocFlags::PERSISTENT)))
            .count();
        if persistent > 0 {
            return Err(MemoryError::PersistentBlocks { count: persistent }.report());
        }

        let secure: Vec<(usize, usize)> = self
            .used_list
            .iter()
            .filter_map(|start| {
                self.blocks
                    .get(start)
                    .filter(|b| b.flags.contains(AllocFlags::SECURE))
                    .map(|b| (start + HEADER_SIZE, b.capacity))
            })
            .collect();
        for (payload, capacity) in secure {
            self.arena[payload..payload + capacity].zeroize();
        }

        self.blocks.clear();
        self.free_list.clear();
        self.used_list.clear();
        self.stats.current = 0;
        self.install_whole_arena_block();
        debug!(total_size = self.stats.total_size, "memory pool reset");
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let mut stats = self.stats.clone();
        stats.free_bytes = self
            .free_list
            .iter()
            .filter_map(|start| self.blocks.get(start))
            .map(|b| b.capacity)
            .sum();
        stats.largest_free_block = self.largest_free_block();
        stats.used_blocks = self.used_list.len();
        stats.free_blocks = self.free_list.len();
        stats
    }

    /// Size of a live allocation
    pub fn allocation_size(&self, ptr: PoolPtr) -> MemoryResult<usize> {
        let start = self.live_block_start(ptr)?;
        self.blocks.get(&start).map(|b| b.size).ok_or(MemoryError::Corruption { offset: ptr.0 })
    }

    pub fn allocation_flags(&self, ptr: PoolPtr) -> MemoryResult<AllocFlags> {
        let start = self.live_block_start(ptr)?;
        self.blocks.get(&start).map(|b| b.flags).ok_or(MemoryError::Corruption { offset: ptr.0 })
    }

    /// Payload of a live allocation
    pub fn slice(&self, ptr: PoolPtr) -> MemoryResult<&[u8]> {
        let size = self.allocation_size(ptr)?;
        Ok(&self.arena[ptr.0..ptr.0 + size])
    }

    pub fn slice_mut(&mut self, ptr: PoolPtr) -> MemoryResult<&mut [u8]> {
        let size = self.allocation_size(ptr)?;
        Ok(&mut self.arena[ptr.0..ptr.0 + size])
    }

    /// Every block still in use
    pub fn leak_report(&self) -> Vec<BlockInfo> {
        self.used_list
            .iter()
            .filter_map(|start| {
                self.blocks.get(start).map(|b| BlockInfo {
                    ptr: PoolPtr(start + HEADER_SIZE),
                    size: b.size,
                    flags: b.flags,
                })
            })
            .collect()
    }

    pub fn total_size(&self) -> usize {
        self.stats.total_size
    }

    // Private helper methods
    fn install_whole_arena_block(&mut self) {
        let capacity = self.arena.len() - HEADER_SIZE;
        self.insert_free_block(0, capacity);
    }

    fn insert_free_block(&mut self, start: usize, capacity: usize) {
        self.blocks.insert(
            start,
            BlockHeader {
                capacity,
                size: 0,
                flags: AllocFlags::empty(),
                is_free: true,
            },
        );
        self.free_list.insert(start);
        self.write_header(start, MAGIC_FREE, AllocFlags::empty(), capacity);
    }

    fn largest_free_block(&self) -> usize {
        self.free_list
            .iter()
            .filter_map(|start| self.blocks.get(start))
            .map(|b| b.capacity)
            .max()
            .unwrap_or(0)
    }

    /// Resolve and validate the header of a live block
    fn live_block_start(&self, ptr: PoolPtr) -> MemoryResult<usize> {
        let Some(start) = ptr.0.checked_sub(HEADER_SIZE) else {
            return Err(MemoryError::InvalidParameter(format!("pointer {:#x} does not belong to this pool", ptr.0)).report());
        };
        if ptr.0 >= self.arena.len() {
            return Err(MemoryError::InvalidParameter(format!("pointer {:#x} does not belong to this pool", ptr.0)).report());
        }

        let magic = self.read_magic(start);
        match self.blocks.get(&start) {
            Some(header) if header.is_free => Err(MemoryError::DoubleFree { offset: ptr.0 }.report()),
            Some(_) if magic == MAGIC_LIVE => Ok(start),
            Some(_) => Err(MemoryError::Corruption { offset: ptr.0 }.report()),
            // Block was absorbed by a neighbour after being freed
            None if magic == MAGIC_FREE => Err(MemoryError::DoubleFree { offset: ptr.0 }.report()),
            None => Err(MemoryError::Corruption { offset: ptr.0 }.report()),
        }
    }

    fn coalesce(&mut self, start: usize) {
        let Some(capacity) = self.blocks.get(&start).map(|b| b.capacity) else {
            return;
        };

        let next = start + HEADER_SIZE + capacity;
        if self.free_list.contains(&next) {
            if let Some(next_block) = self.blocks.remove(&next) {
                self.free_list.remove(&next);
                if let Some(block) = self.blocks.get_mut(&start) {
                    block.capacity += HEADER_SIZE + next_block.capacity;
                }
            }
        }

        let previous = self.blocks.range(..start).next_back().map(|(&addr, b)| (addr, b.is_free));
        if let Some((prev_start, true)) = previous {
            if let Some(current) = self.blocks.remove(&start) {
                self.free_list.remove(&start);
                if let Some(prev) = self.blocks.get_mut(&prev_start) {
                    prev.capacity += HEADER_SIZE + current.capacity;
                }
            }
        }
    }

    fn write_header(&mut self, start: usize, magic: u32, flags: AllocFlags, capacity: usize) {
        let header = &mut self.arena[start..start + HEADER_SIZE];
        header[0..4].copy_from_slice(&magic.to_le_bytes());
        header[4..8].copy_from_slice(&flags.bits().to_le_bytes());
        header[8..16].copy_from_slice(&(capacity as u64).to_le_bytes());
    }

    fn read_magic(&self, start: usize) -> u32 {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&self.arena[start..start + 4]);
        u32::from_le_bytes(bytes)
    }

    #[cfg(test)]
    fn corrupt_header(&mut self, ptr: PoolPtr) {
        let start = ptr.0 - HEADER_SIZE;
        self.arena[start..start + 4].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
    }
}

impl std::fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryPool")
            .field("total_size", &self.stats.total_size)
            .field("current", &self.stats.current)
            .field("used_blocks", &self.used_list.len())
            .field("free_blocks", &self.free_list.len())
            .finish()
    }
}

impl Drop for MemoryPool {
    fn drop(&mut self) {
        if !self.used_list.is_empty() {
            warn!(
                leaked_blocks = self.used_list.len(),
                leaked_bytes = self.stats.current,
                "memory pool dropped with live allocations"
            );
        }
    }
}
