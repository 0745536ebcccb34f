//! The FTL context object. Per spec.md §9's own design note, every piece of
//! global mutable state the original firmware keeps as process-wide statics
//! (page map, vcount, zone table, misc metadata, queues) is grouped here and
//! passed explicitly, rather than reached through a global.

use alloc::vec::Vec;

use crate::allocator::{FbgQueue, OpenIdQueue};
use crate::config::{BYTES_PER_PAGE, MAX_OPEN_ZONE, NUM_BANKS, PAGES_PER_BLK, VBLKS_PER_BANK, VC_MAX};
use crate::dram::{BadBlockBitmap, MiscMetaTable, PageMap, VCount, VcountTable};
use crate::error::FtlError;
use crate::hal::{NandDevice, ProgramOutcome};
use crate::stats::Stats;
use crate::zone::ZoneTable;

/// `lpn = lba / SECTORS_PER_PAGE`, `bank = lpn mod NUM_BANKS` (random region only).
pub fn bank_of_lpn(lpn: u32) -> usize {
    (lpn as usize) % NUM_BANKS
}

/// `vblock = vpn / PAGES_PER_BLK`, `page = vpn mod PAGES_PER_BLK`.
pub fn split_vpn(vpn: u32) -> (usize, usize) {
    ((vpn as usize) / PAGES_PER_BLK, (vpn as usize) % PAGES_PER_BLK)
}

pub fn join_vpn(vblock: usize, page: usize) -> u32 {
    (vblock * PAGES_PER_BLK + page) as u32
}

pub struct Ftl<N: NandDevice> {
    pub(crate) nand: N,
    pub(crate) page_map: PageMap,
    pub(crate) vcount: VcountTable,
    pub(crate) misc: MiscMetaTable,
    pub(crate) bad_blocks: BadBlockBitmap,
    pub(crate) fbg_queue: FbgQueue,
    pub(crate) open_id_queue: OpenIdQueue,
    pub(crate) zones: ZoneTable,
    pub(crate) stats: Stats,
    /// First `rand_write_blks` blocks dequeued from the FBG queue at boot
    /// seed the random region (spec.md §4.3); the rest stay in the queue
    /// for the zoned engine.
    pub(crate) rand_write_blks: usize,
    pub(crate) rd_buf_ptr: usize,
    pub(crate) wr_buf_ptr: usize,
    pub(crate) formatted: bool,
}

impl<N: NandDevice> Ftl<N> {
    /// Build a fresh FTL context and perform the boot-time bad-block scan,
    /// FBG seeding and zone-table init (`ftl_open`/`zns_init` in the
    /// original). `initial_free_blk_cnt` resolves the REDESIGN FLAG in
    /// spec.md §9 ("`init_metadata_sram` sets `free_blk_cnt = 8`
    /// regardless of `rand_write_blks` or bad-block count"): callers pick
    /// it explicitly instead of it being hardcoded.
    pub fn new(nand: N, initial_free_blk_cnt: u32) -> Result<Self, FtlError> {
        let mut ftl = Self {
            nand,
            page_map: PageMap::new(),
            vcount: VcountTable::new(),
            misc: MiscMetaTable::new(initial_free_blk_cnt),
            bad_blocks: BadBlockBitmap::new(),
            fbg_queue: FbgQueue::new(),
            open_id_queue: OpenIdQueue::new(),
            zones: ZoneTable::new(BYTES_PER_PAGE),
            stats: Stats::new(),
            rand_write_blks: 0,
            rd_buf_ptr: 0,
            wr_buf_ptr: 0,
            formatted: false,
        };
        ftl.boot()?;
        Ok(ftl)
    }

    fn boot(&mut self) -> Result<(), FtlError> {
        self.scan_bad_blocks();
        self.boot_load_or_format()?;
        self.search_bad_blk_zone();

        // First eight dequeues from the FBG seed the random region.
        let mut last = 0u32;
        for _ in 0..8 {
            last = self.fbg_queue.dequeue().expect("not enough free blocks to seed the random region");
        }
        self.rand_write_blks = last as usize + 1;

        for id in 0..MAX_OPEN_ZONE as u8 {
            self.open_id_queue.enqueue(id);
        }
        Ok(())
    }

    /// Turn a program/erase outcome into a `Result`, logging a runtime
    /// bad-block event at the point it was detected (spec.md §7, error kind
    /// (c)). The bitmap itself is updated by `scan_bad_blocks` the next time
    /// this device boots, once the controller's own scan list reflects it.
    pub(crate) fn check_program(&mut self, outcome: ProgramOutcome, bank: usize, vblock: usize) -> Result<(), FtlError> {
        match outcome {
            ProgramOutcome::Ok => Ok(()),
            ProgramOutcome::RuntimeBadBlock => {
                log::error!("runtime bad block at bank {bank} vblock {vblock}");
                Err(FtlError::RuntimeBadBlock { bank, vblock })
            }
        }
    }

    /// Marks every `(bank, vblock)` the NAND device reports bad, and every
    /// reserved/meta block, `Ineligible` in the vcount table, mirroring
    /// `build_bad_blk_list` + the meta-block vcount init.
    fn scan_bad_blocks(&mut self) {
        for bank in 0..NUM_BANKS {
            for vblock in 0..VBLKS_PER_BANK {
                if self.nand.is_bad_block(bank, vblock) {
                    self.bad_blocks.mark_bad(bank, vblock);
                    self.vcount.set(bank, vblock, VCount::Ineligible);
                    log::warn!("bank {bank} vblock {vblock} marked bad at boot scan");
                }
            }
        }
    }

    /// Enqueues every block that is good across every bank (spec.md §4.3).
    fn search_bad_blk_zone(&mut self) {
        for vblock in 0..VBLKS_PER_BANK {
            let good_everywhere = (0..NUM_BANKS).all(|bank| self.vcount.get(bank, vblock) != VCount::Ineligible);
            if good_everywhere {
                self.fbg_queue.enqueue(vblock as u32);
            }
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn rand_write_blks(&self) -> usize {
        self.rand_write_blks
    }

    pub fn nand(&self) -> &N {
        &self.nand
    }

    pub fn nand_mut(&mut self) -> &mut N {
        &mut self.nand
    }

    /// Consume the FTL context, handing back the underlying NAND device
    /// (e.g. to simulate a reboot against the same physical image).
    pub fn into_nand(self) -> N {
        self.nand
    }

    /// Live mappings accounted for in `bank` (spec.md §8 invariant 2).
    pub fn vcount_live_mappings(&self, bank: usize) -> u32 {
        self.vcount.live_mappings(bank)
    }

    /// Whether `(bank, vblock)` is eligible for allocation, i.e. not a bad,
    /// meta or GC-reserve block.
    pub fn vcount_is_eligible(&self, bank: usize, vblock: usize) -> bool {
        self.vcount.get(bank, vblock) != crate::dram::VCount::Ineligible
    }

    /// The state of `zone_number`, for test and diagnostic use.
    pub fn zone_state(&self, zone_number: u32) -> &crate::zone::ZoneState {
        &self.zones.zone(zone_number).state
    }

    /// Dequeue a block from the FBG queue, failing with `OutOfFreeBlocks`
    /// instead of panicking: allocation against an empty queue is a runtime
    /// condition a caller (OPEN transition, IZC, TL-open) must already be
    /// checking for per spec.md §3, but we do not want a starved allocator
    /// to crash the whole FTL.
    pub(crate) fn dequeue_fbg(&mut self) -> Result<u32, FtlError> {
        self.fbg_queue.dequeue().ok_or(FtlError::OutOfFreeBlocks)
    }

    pub(crate) fn dequeue_open_id(&mut self) -> Result<u8, FtlError> {
        self.open_id_queue.dequeue().ok_or(FtlError::TooManyOpenZones)
    }

    /// Erase `fbg` across every bank of the given bank-group and return it
    /// to the FBG queue (used by `zns_reset`).
    pub(crate) fn erase_and_release_fbg(&mut self, banks: Vec<usize>, fbg: u32) -> Result<(), FtlError> {
        for bank in banks {
            let outcome = self.nand.erase_block(bank, fbg as usize);
            self.check_program(outcome, bank, fbg as usize)?;
        }
        self.fbg_queue.enqueue(fbg);
        Ok(())
    }
}

/// Sanity check mirroring the original's `sizeof(misc_metadata) <= BYTES_PER_PAGE`
/// assertion: the persisted misc-metadata record (per bank) must fit in one page.
pub(crate) fn misc_metadata_fits_one_page() -> bool {
    let approx_bytes = 4 * 5 + 4 * crate::config::MAPBLKS_PER_BANK + 4 * PAGES_PER_BLK;
    approx_bytes <= BYTES_PER_PAGE
}

const _: () = assert!(VC_MAX == 0xCDCD);
