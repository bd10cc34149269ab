//! Fixed-size direct-mapped cell table.
//!
//! Each 64-bit key hashes to exactly one slot; collisions overwrite the
//! previous occupant without chaining. The table size is always a power of
//! two so slot selection is a mask, not a modulo.
//!
//! ## Architecture
//!
//! ```text
//!   slot_of(key) = mix64(key) & (capacity - 1)
//!
//!   index:   0          1          2          3
//!          ┌──────────┬──────────┬──────────┬──────────┐
//!   cells  │ key: 0   │ key: 17  │ key: 0   │ key: 42  │
//!          │ expires  │ expires  │ expires  │ expires  │
//!          └──────────┴──────────┴──────────┴──────────┘
//!
//!   key == 0 marks an empty slot; it never matches a real key, so readers
//!   need no separate occupancy bit.
//! ```
//!
//! ## Operations
//! - `slot_of(key)`: O(1) mask-based slot selection
//! - `get(index)` / `commit(index, key, expires_at)`: O(1) slot access
//!
//! The table stores only per-slot metadata (key and expiry). Attribute
//! payloads live in parallel arrays indexed by the same slot, see
//! [`AttributeArray`](crate::store::attribute::AttributeArray).

use std::time::SystemTime;

/// Metadata for one slot: the owning key and its expiry instant.
///
/// A fresh table holds `key == 0` and epoch expiry in every slot, which
/// classifies as a miss for any real key.
#[derive(Debug, Clone, Copy)]
pub struct CellSlot {
    /// Key currently mapped to this slot; `0` means empty.
    pub key: u64,
    /// Instant after which the slot's values are stale.
    pub expires_at: SystemTime,
}

impl CellSlot {
    /// Returns `true` if `now` has reached this slot's expiry.
    #[inline]
    pub fn expired(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }
}

/// Direct-mapped table of [`CellSlot`]s with power-of-two capacity.
#[derive(Debug, Clone)]
pub struct CellTable {
    cells: Box<[CellSlot]>,
    mask: u64,
}

impl CellTable {
    /// Creates a table with the least power-of-two capacity that holds
    /// `requested` slots (at minimum 1).
    pub fn new(requested: usize) -> Self {
        let capacity = requested.max(1).next_power_of_two();
        let empty = CellSlot {
            key: 0,
            expires_at: SystemTime::UNIX_EPOCH,
        };
        Self {
            cells: vec![empty; capacity].into_boxed_slice(),
            mask: (capacity - 1) as u64,
        }
    }

    /// Returns the number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Returns the slot index for `key`.
    #[inline]
    pub fn slot_of(&self, key: u64) -> usize {
        (mix64(key) & self.mask) as usize
    }

    /// Returns the slot at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> &CellSlot {
        &self.cells[index]
    }

    /// Assigns `key` and `expires_at` to the slot at `index`, evicting
    /// whatever occupied it.
    #[inline]
    pub fn commit(&mut self, index: usize, key: u64, expires_at: SystemTime) {
        self.cells[index] = CellSlot { key, expires_at };
    }
}

/// 64-bit finalizer mix (Murmur3 fmix64).
///
/// Distributes sequential integer keys across the table; the low bits of the
/// result are usable directly as a mask index.
#[inline]
pub fn mix64(mut key: u64) -> u64 {
    key ^= key >> 33;
    key = key.wrapping_mul(0xff51_afd7_ed55_8ccd);
    key ^= key >> 33;
    key = key.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    key ^= key >> 33;
    key
}
