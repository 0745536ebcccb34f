//! Low-level format and the format-mark check that gates it (spec.md §4.5,
//! §6 "Persisted layout").
//!
//! Open Question (spec.md §9): the original firmware calls `format()`
//! unconditionally (`if (TRUE)`) instead of testing the format mark, so its
//! `load_metadata` recovery path is dead code. We resolve this by actually
//! branching on `check_format_mark`, which is what makes `load_metadata`
//! reachable at all; see `DESIGN.md` for the rationale.

use crate::config::{BYTES_PER_PAGE, MAPBLKS_PER_BANK, MISCBLK_VBN, NUM_BANKS, PAGES_PER_BLK, SCAN_LIST_VBN, VBLKS_PER_BANK};
use crate::dram::VCount;
use crate::error::FtlError;
use crate::ftl::{join_vpn, Ftl};
use crate::hal::NandDevice;

/// Index, within a bank, of the GC reserve block: immediately after the
/// fixed meta blocks (scan list, misc log, map blocks).
pub(crate) const GC_RESERVE_VBN: usize = crate::config::META_BLKS_PER_BANK;
const FORMAT_MARK_PAGE: usize = PAGES_PER_BLK - 1;
const FORMAT_MARK_BYTE: u8 = 0xA5;

impl<N: NandDevice> Ftl<N> {
    pub(crate) fn boot_load_or_format(&mut self) -> Result<(), FtlError> {
        if self.check_format_mark() {
            log::info!("format mark present, loading persisted metadata");
            self.load_metadata();
            Ok(())
        } else {
            log::info!("no format mark, performing low-level format");
            self.format()
        }
    }

    /// Erases the meta blocks, the GC reserve and the user pool for every
    /// bank, and initialises the vcount/misc-metadata tables to their
    /// freshly-formatted state.
    fn format(&mut self) -> Result<(), FtlError> {
        for bank in 0..NUM_BANKS {
            for vblock in 0..=GC_RESERVE_VBN {
                self.vcount.set(bank, vblock, VCount::Ineligible);
                if !self.bad_blocks.is_bad(bank, vblock) {
                    let outcome = self.nand.erase_block(bank, vblock);
                    self.check_program(outcome, bank, vblock)?;
                }
            }

            let misc = self.misc.bank_mut(bank);
            misc.gc_vblock = GC_RESERVE_VBN;
            misc.cur_miscblk_vpn = 0;
            for vpn in misc.cur_mapblk_vpn.iter_mut() {
                *vpn = 0;
            }

            for vblock in (GC_RESERVE_VBN + 1)..VBLKS_PER_BANK {
                if self.bad_blocks.is_bad(bank, vblock) {
                    self.vcount.set(bank, vblock, VCount::Ineligible);
                } else {
                    let outcome = self.nand.erase_block(bank, vblock);
                    self.check_program(outcome, bank, vblock)?;
                    self.vcount.set(bank, vblock, VCount::Valid(0));
                }
            }
            self.misc.bank_mut(bank).cur_write_vpn = join_vpn(GC_RESERVE_VBN + 1, 0);
        }
        self.write_format_mark()
    }

    fn write_format_mark(&mut self) -> Result<(), FtlError> {
        let marker = alloc::vec![FORMAT_MARK_BYTE; BYTES_PER_PAGE];
        let outcome = self.nand.program_page(0, SCAN_LIST_VBN, FORMAT_MARK_PAGE, &marker);
        self.check_program(outcome, 0, SCAN_LIST_VBN)?;
        self.formatted = true;
        Ok(())
    }

    fn check_format_mark(&mut self) -> bool {
        let mut buf = alloc::vec![0u8; BYTES_PER_PAGE];
        self.nand.read_page(0, SCAN_LIST_VBN, FORMAT_MARK_PAGE, &mut buf);
        buf.iter().all(|&b| b == FORMAT_MARK_BYTE)
    }
}

const _: () = assert!(MAPBLKS_PER_BANK >= 1);
const _: () = assert!(MISCBLK_VBN == 1);
