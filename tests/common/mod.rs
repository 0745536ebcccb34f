//! In-memory `NandDevice`/`HostIo` doubles for integration tests, in the
//! spirit of `stm32-rs-stm32-fmc`'s `DummyFMC`: enough behaviour to drive the
//! FTL core end to end, none of the real timing or electrical detail.

use hybrid_ftl::config::{BYTES_PER_PAGE, NUM_BANKS, NUM_RD_BUFFERS, NUM_WR_BUFFERS, PAGES_PER_BLK, VBLKS_PER_BANK};
use hybrid_ftl::hal::{HostIo, NandDevice, ProgramOutcome, ReadOutcome};

pub struct MockNand {
    /// `[bank][vblock]`, each a flat `PAGES_PER_BLK * BYTES_PER_PAGE` buffer.
    blocks: Vec<Vec<Vec<u8>>>,
    bad: Vec<Vec<bool>>,
    /// `(bank, vblock)` pairs whose next program/erase reports a runtime
    /// bad-block event instead of succeeding.
    force_runtime_bad: Vec<Vec<bool>>,
}

impl MockNand {
    pub fn new() -> Self {
        Self {
            blocks: (0..NUM_BANKS)
                .map(|_| (0..VBLKS_PER_BANK).map(|_| vec![0xFFu8; PAGES_PER_BLK * BYTES_PER_PAGE]).collect())
                .collect(),
            bad: vec![vec![false; VBLKS_PER_BANK]; NUM_BANKS],
            force_runtime_bad: vec![vec![false; VBLKS_PER_BANK]; NUM_BANKS],
        }
    }

    pub fn mark_bad(&mut self, bank: usize, vblock: usize) {
        self.bad[bank][vblock] = true;
    }

    /// Make the next program or erase issued against `(bank, vblock)` report
    /// a runtime bad-block event, then leave the block marked bad as a real
    /// controller's persisted scan list would.
    pub fn force_runtime_bad(&mut self, bank: usize, vblock: usize) {
        self.force_runtime_bad[bank][vblock] = true;
    }

    fn page_range(page: usize) -> core::ops::Range<usize> {
        page * BYTES_PER_PAGE..(page + 1) * BYTES_PER_PAGE
    }

    fn program_outcome(&mut self, bank: usize, vblock: usize) -> ProgramOutcome {
        if self.force_runtime_bad[bank][vblock] {
            self.force_runtime_bad[bank][vblock] = false;
            self.bad[bank][vblock] = true;
            ProgramOutcome::RuntimeBadBlock
        } else {
            ProgramOutcome::Ok
        }
    }
}

impl NandDevice for MockNand {
    fn erase_block(&mut self, bank: usize, vblock: usize) -> ProgramOutcome {
        self.blocks[bank][vblock].fill(0xFF);
        self.program_outcome(bank, vblock)
    }

    fn program_page(&mut self, bank: usize, vblock: usize, page: usize, data: &[u8]) -> ProgramOutcome {
        assert_eq!(data.len(), BYTES_PER_PAGE);
        self.blocks[bank][vblock][Self::page_range(page)].copy_from_slice(data);
        self.program_outcome(bank, vblock)
    }

    fn program_page_partial(
        &mut self,
        bank: usize,
        vblock: usize,
        page: usize,
        sect_offset: usize,
        data: &[u8],
    ) -> ProgramOutcome {
        let base = page * BYTES_PER_PAGE + sect_offset * hybrid_ftl::config::BYTES_PER_SECTOR;
        self.blocks[bank][vblock][base..base + data.len()].copy_from_slice(data);
        self.program_outcome(bank, vblock)
    }

    fn read_page(&mut self, bank: usize, vblock: usize, page: usize, out: &mut [u8]) -> ReadOutcome {
        assert_eq!(out.len(), BYTES_PER_PAGE);
        out.copy_from_slice(&self.blocks[bank][vblock][Self::page_range(page)]);
        ReadOutcome::Ok
    }

    fn read_page_partial(
        &mut self,
        bank: usize,
        vblock: usize,
        page: usize,
        sect_offset: usize,
        out: &mut [u8],
    ) -> ReadOutcome {
        let base = page * BYTES_PER_PAGE + sect_offset * hybrid_ftl::config::BYTES_PER_SECTOR;
        out.copy_from_slice(&self.blocks[bank][vblock][base..base + out.len()]);
        ReadOutcome::Ok
    }

    fn copyback(&mut self, bank: usize, src_vblock: usize, src_page: usize, dst_vblock: usize, dst_page: usize) {
        let src = self.blocks[bank][src_vblock][Self::page_range(src_page)].to_vec();
        self.blocks[bank][dst_vblock][Self::page_range(dst_page)].copy_from_slice(&src);
    }

    fn is_bad_block(&self, bank: usize, vblock: usize) -> bool {
        self.bad[bank][vblock]
    }
}

pub struct MockHost {
    wbuf: Vec<Vec<u8>>,
    rbuf: Vec<Vec<u8>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            wbuf: (0..NUM_WR_BUFFERS).map(|_| vec![0u8; BYTES_PER_PAGE]).collect(),
            rbuf: (0..NUM_RD_BUFFERS).map(|_| vec![0u8; BYTES_PER_PAGE]).collect(),
        }
    }

    pub fn fill_wbuf(&mut self, slot: usize, data: &[u8]) {
        self.wbuf[slot][..data.len()].copy_from_slice(data);
    }

    pub fn fill_wbuf_at(&mut self, slot: usize, offset: usize, data: &[u8]) {
        self.wbuf[slot][offset..offset + data.len()].copy_from_slice(data);
    }

    pub fn rbuf(&self, slot: usize) -> &[u8] {
        &self.rbuf[slot]
    }
}

impl HostIo for MockHost {
    fn write_buf(&self, slot: usize) -> &[u8] {
        &self.wbuf[slot]
    }

    fn read_buf_mut(&mut self, slot: usize) -> &mut [u8] {
        &mut self.rbuf[slot]
    }

    fn wbuf_consumer_ptr(&self) -> usize {
        usize::MAX
    }

    fn rbuf_consumer_ptr(&self) -> usize {
        usize::MAX
    }
}
