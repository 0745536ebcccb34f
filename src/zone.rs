//! Zone table, open-zone page buffers and TL tables (spec.md §3, §4.2).
//!
//! State-machine transitions themselves live on `Ftl` in `ftl.rs`/`zns.rs`
//! so they can reach the allocators and NAND device; this module only
//! defines the data each zone carries, as an explicit tagged variant
//! (spec.md §9 design note: "the source's scattered numeric comparisons
//! obscure illegal transitions").

use alloc::vec::Vec;

use crate::allocator::{BlockId, OpenId};
use crate::config::{DEG_ZONE, MAX_OPEN_ZONE, NPAGE, NZONE, ZONE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneState {
    Empty,
    Open,
    Full,
    TlOpen,
}

#[derive(Debug, Clone)]
pub struct ZoneRecord {
    pub state: ZoneState,
    pub slba: u32,
    pub wp: u32,
    pub fbg: Option<BlockId>,
    pub open_id: Option<OpenId>,
}

impl ZoneRecord {
    fn new(zone_number: u32) -> Self {
        let slba = zone_number * ZONE_SIZE as u32;
        Self { state: ZoneState::Empty, slba, wp: slba, fbg: None, open_id: None }
    }
}

/// Bitmap of `DEG_ZONE * NPAGE` destination pages a TL-open must still
/// materialise from the source zone.
#[derive(Debug, Clone)]
pub struct TlBitmap {
    bits: Vec<bool>,
}

impl TlBitmap {
    pub fn from_bits(bits: Vec<bool>) -> Self {
        debug_assert_eq!(bits.len(), DEG_ZONE * NPAGE);
        Self { bits }
    }

    pub fn all_zero() -> Self {
        Self { bits: alloc::vec![false; DEG_ZONE * NPAGE] }
    }

    pub fn get(&self, page_offset: usize) -> bool {
        self.bits[page_offset]
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }
}

pub struct ZoneTable {
    zones: Vec<ZoneRecord>,
    /// One page-sized buffer per open-id slot, holding the partially-filled
    /// page for the slot's current `p_offset`.
    open_buffers: Vec<Vec<u8>>,
    /// TL bitmap per open-id slot (only meaningful while the owning zone is TL_OPEN).
    tl_bitmaps: Vec<TlBitmap>,
    /// Relative sector offset within the zone that TL-open has materialised up to.
    tl_wp: Vec<u32>,
    /// New FBG allocated for a TL-open destination, pending the TL_OPEN -> FULL swap.
    tl_dest_fbg: Vec<Option<BlockId>>,
}

impl ZoneTable {
    pub fn new(page_bytes: usize) -> Self {
        Self {
            zones: (0..NZONE as u32).map(ZoneRecord::new).collect(),
            open_buffers: (0..MAX_OPEN_ZONE).map(|_| alloc::vec![0u8; page_bytes]).collect(),
            tl_bitmaps: (0..MAX_OPEN_ZONE).map(|_| TlBitmap::all_zero()).collect(),
            tl_wp: alloc::vec![0u32; NZONE],
            tl_dest_fbg: alloc::vec![None; NZONE],
        }
    }

    pub fn zone(&self, zone_number: u32) -> &ZoneRecord {
        &self.zones[zone_number as usize]
    }

    pub fn zone_mut(&mut self, zone_number: u32) -> &mut ZoneRecord {
        &mut self.zones[zone_number as usize]
    }

    pub fn open_buffer(&self, open_id: OpenId) -> &[u8] {
        &self.open_buffers[open_id as usize]
    }

    pub fn open_buffer_mut(&mut self, open_id: OpenId) -> &mut [u8] {
        &mut self.open_buffers[open_id as usize]
    }

    pub fn tl_bitmap(&self, open_id: OpenId) -> &TlBitmap {
        &self.tl_bitmaps[open_id as usize]
    }

    pub fn set_tl_bitmap(&mut self, open_id: OpenId, bitmap: TlBitmap) {
        self.tl_bitmaps[open_id as usize] = bitmap;
    }

    pub fn tl_wp(&self, zone_number: u32) -> u32 {
        self.tl_wp[zone_number as usize]
    }

    pub fn set_tl_wp(&mut self, zone_number: u32, wp: u32) {
        self.tl_wp[zone_number as usize] = wp;
    }

    pub fn tl_dest_fbg(&self, zone_number: u32) -> Option<BlockId> {
        self.tl_dest_fbg[zone_number as usize]
    }

    pub fn set_tl_dest_fbg(&mut self, zone_number: u32, fbg: Option<BlockId>) {
        self.tl_dest_fbg[zone_number as usize] = fbg;
    }

    pub fn open_zone_count(&self) -> usize {
        self.zones.iter().filter(|z| matches!(z.state, ZoneState::Open | ZoneState::TlOpen)).count()
    }
}
