//! Hardware abstraction traits the FTL core is generic over.
//!
//! The real NAND controller, SATA command surface, DRAM accessors, UART and
//! interrupt glue are all external collaborators (spec.md §1, §6) — this
//! crate never talks to registers directly. Instead, following
//! `stm32-rs-stm32-fmc`'s `FmcPeripheral` pattern, it defines the narrow
//! trait surface it actually needs and is generic over it, so production
//! code implements these traits against real hardware and tests implement
//! them against an in-memory double.

use crate::config::BYTES_PER_PAGE;

/// Outcome of a page read, distinguishing a clean read from one the
/// controller's ECC could not correct (spec.md §7, error kind (b)).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Ok,
    UncorrectableEcc,
}

/// Outcome of a program or erase, distinguishing success from a runtime
/// bad-block event the controller detected during the operation (spec.md
/// §7, error kind (c)). The controller is responsible for persisting the
/// bad mark itself; the FTL only logs and surfaces the error, and picks the
/// block up as ineligible again via `is_bad_block` at the next boot scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramOutcome {
    Ok,
    RuntimeBadBlock,
}

/// The raw NAND primitives consumed by the FTL (spec.md §6).
///
/// All addressing is `(bank, vblock, page[, sect_offset])`; a "sector" is
/// `BYTES_PER_SECTOR` bytes and a "page" is `SECTORS_PER_PAGE` sectors.
pub trait NandDevice {
    /// Erase the block `vblock` in `bank`. Blocks until the controller is
    /// idle (`flash_finish`, spec.md §5) before returning.
    fn erase_block(&mut self, bank: usize, vblock: usize) -> ProgramOutcome;

    /// Program a full page from `data` (must be exactly `BYTES_PER_PAGE`).
    fn program_page(&mut self, bank: usize, vblock: usize, page: usize, data: &[u8]) -> ProgramOutcome;

    /// Program `data.len()` bytes (a whole number of sectors) starting at
    /// sector `sect_offset` within the page, leaving the rest of the page
    /// untouched on this call (the caller is responsible for having already
    /// programmed or planning to program the remaining sectors — NAND pages
    /// can only be programmed once per erase cycle, so callers must not
    /// issue overlapping partial programs to the same page).
    fn program_page_partial(
        &mut self,
        bank: usize,
        vblock: usize,
        page: usize,
        sect_offset: usize,
        data: &[u8],
    ) -> ProgramOutcome;

    /// Read a full page into `out` (must be exactly `BYTES_PER_PAGE`).
    fn read_page(&mut self, bank: usize, vblock: usize, page: usize, out: &mut [u8]) -> ReadOutcome;

    /// Read `out.len()` bytes (a whole number of sectors) starting at sector
    /// `sect_offset` within the page.
    fn read_page_partial(
        &mut self,
        bank: usize,
        vblock: usize,
        page: usize,
        sect_offset: usize,
        out: &mut [u8],
    ) -> ReadOutcome;

    /// Copy a page within the same bank without round-tripping through the
    /// host-visible DRAM buffers, used by garbage collection and IZC.
    fn copyback(&mut self, bank: usize, src_vblock: usize, src_page: usize, dst_vblock: usize, dst_page: usize);

    /// Whether `(bank, vblock)` was marked bad by the vendor scan list or a
    /// prior runtime bad-block event.
    fn is_bad_block(&self, bank: usize, vblock: usize) -> bool;
}

/// Host-visible read/write DMA buffers plus the two flow-control predicates
/// from spec.md §5: the command path busy-waits until the host has
/// consumed/freed the buffer slot it is about to reuse.
pub trait HostIo {
    /// Bytes the host placed in write-buffer slot `slot` (length `>=` one page).
    fn write_buf(&self, slot: usize) -> &[u8];
    /// Mutable view of read-buffer slot `slot` to fill for the host to consume.
    fn read_buf_mut(&mut self, slot: usize) -> &mut [u8];

    /// The host's current write-buffer consumer pointer (`SATA_WBUF_PTR`).
    fn wbuf_consumer_ptr(&self) -> usize;
    /// The host's current read-buffer consumer pointer (`SATA_RBUF_PTR`).
    fn rbuf_consumer_ptr(&self) -> usize;

    /// Busy-wait until the host has consumed write-buffer slot `slot`, i.e.
    /// until `wbuf_consumer_ptr() != slot`. A real implementation polls
    /// hardware state; a test double can simply never block.
    fn wait_wbuf_free(&mut self, slot: usize) {
        while self.wbuf_consumer_ptr() == slot {}
    }
    /// Busy-wait until the host has freed read-buffer slot `slot`.
    fn wait_rbuf_free(&mut self, slot: usize) {
        while self.rbuf_consumer_ptr() == slot {}
    }
}

/// A page-sized scratch buffer, reused across operations the way the
/// original firmware reuses its fixed `FTL_BUF`/`TEMP_BUF` DRAM regions.
pub fn page_scratch() -> alloc::vec::Vec<u8> {
    alloc::vec![0u8; BYTES_PER_PAGE]
}
