//! The page-mapped random-write engine (spec.md §4.1): reads and writes
//! against the random region, the partial-write merge policy, write-frontier
//! advance and greedy garbage collection.

use crate::config::{BYTES_PER_PAGE, BYTES_PER_SECTOR, NUM_LPAGES, PAGES_PER_BLK, SECTORS_PER_PAGE};
use crate::dram::VCount;
use crate::error::FtlError;
use crate::ftl::{bank_of_lpn, join_vpn, split_vpn, Ftl};
use crate::hal::{page_scratch, HostIo, NandDevice, ReadOutcome};

impl<N: NandDevice> Ftl<N> {
    /// Read `num_sectors` sectors starting at `lba` into read-buffer slot
    /// `rbuf_slot`. A never-written lpn reads back as zeros.
    pub fn read<H: HostIo>(
        &mut self,
        host: &mut H,
        rbuf_slot: usize,
        lba: u32,
        num_sectors: u32,
    ) -> Result<(), FtlError> {
        let lpn = lba / SECTORS_PER_PAGE as u32;
        if lpn as usize >= NUM_LPAGES {
            return Err(FtlError::BadLpn(lpn));
        }
        let sect_offset = (lba % SECTORS_PER_PAGE as u32) as usize;
        let bank = bank_of_lpn(lpn);
        let num_sectors = num_sectors as usize;

        let Some(vpn) = self.page_map.get(lpn) else {
            host.read_buf_mut(rbuf_slot)[..num_sectors * BYTES_PER_SECTOR].fill(0xFF);
            return Ok(());
        };
        let (vblock, page) = split_vpn(vpn);
        let dest = &mut host.read_buf_mut(rbuf_slot)[..num_sectors * BYTES_PER_SECTOR];
        let outcome = if sect_offset == 0 && num_sectors == SECTORS_PER_PAGE {
            self.nand.read_page(bank, vblock, page, dest)
        } else {
            self.nand.read_page_partial(bank, vblock, page, sect_offset, dest)
        };
        if outcome == ReadOutcome::UncorrectableEcc {
            log::error!("uncorrectable read at bank {bank} vblock {vblock} page {page}");
            return Err(FtlError::UncorrectableRead { bank, vblock, page });
        }
        Ok(())
    }

    /// Write `num_sectors` sectors starting at `lba` from write-buffer slot
    /// `wbuf_slot`.
    ///
    /// When the lpn already has a mapping, the existing page is merged with
    /// the new sectors before being reprogrammed in full — NAND pages can
    /// only be programmed once per erase, so a partial update must carry the
    /// untouched bytes of the old page forward. Two merge strategies mirror
    /// the original: a short, unaligned write (`num_sectors <= 8` with a
    /// nonzero page offset) reads the whole old page once and copies around
    /// the hole; any other partial write reads the left and right holes
    /// independently. A never-written lpn has nothing to preserve, so the
    /// partial write is programmed as-is, leaving the rest of the page
    /// unprogrammed.
    pub fn write<H: HostIo>(
        &mut self,
        host: &mut H,
        wbuf_slot: usize,
        lba: u32,
        num_sectors: u32,
    ) -> Result<(), FtlError> {
        let lpn = lba / SECTORS_PER_PAGE as u32;
        if lpn as usize >= NUM_LPAGES {
            return Err(FtlError::BadLpn(lpn));
        }
        let mut page_offset = (lba % SECTORS_PER_PAGE as u32) as usize;
        let mut column_cnt = num_sectors as usize;
        let bank = bank_of_lpn(lpn);
        let old_vpn = self.page_map.get(lpn);

        let mut full_page = alloc::vec![0u8; BYTES_PER_PAGE];
        {
            let src = &host.write_buf(wbuf_slot)[..column_cnt * BYTES_PER_SECTOR];
            full_page[page_offset * BYTES_PER_SECTOR..(page_offset + column_cnt) * BYTES_PER_SECTOR]
                .copy_from_slice(src);
        }

        if let Some(old_vpn) = old_vpn {
            let (old_vblock, old_page) = split_vpn(old_vpn);
            if column_cnt != SECTORS_PER_PAGE {
                if column_cnt <= 8 && page_offset != 0 {
                    let mut scratch = page_scratch();
                    let outcome = self.nand.read_page(bank, old_vblock, old_page, &mut scratch);
                    if outcome == ReadOutcome::UncorrectableEcc {
                        log::error!("uncorrectable read at bank {bank} vblock {old_vblock} page {old_page}");
                        return Err(FtlError::UncorrectableRead { bank, vblock: old_vblock, page: old_page });
                    }
                    let lhole = page_offset * BYTES_PER_SECTOR;
                    full_page[..lhole].copy_from_slice(&scratch[..lhole]);
                    let rhole_base = (page_offset + column_cnt) * BYTES_PER_SECTOR;
                    full_page[rhole_base..].copy_from_slice(&scratch[rhole_base..]);
                } else {
                    if page_offset != 0 {
                        let lhole = page_offset * BYTES_PER_SECTOR;
                        let mut buf = alloc::vec![0u8; lhole];
                        let outcome = self.nand.read_page_partial(bank, old_vblock, old_page, 0, &mut buf);
                        if outcome == ReadOutcome::UncorrectableEcc {
                            log::error!("uncorrectable read at bank {bank} vblock {old_vblock} page {old_page}");
                            return Err(FtlError::UncorrectableRead { bank, vblock: old_vblock, page: old_page });
                        }
                        full_page[..lhole].copy_from_slice(&buf);
                    }
                    let rhole_base = (page_offset + column_cnt) * BYTES_PER_SECTOR;
                    if rhole_base < BYTES_PER_PAGE {
                        let mut buf = alloc::vec![0u8; BYTES_PER_PAGE - rhole_base];
                        let outcome = self.nand.read_page_partial(
                            bank,
                            old_vblock,
                            old_page,
                            page_offset + column_cnt,
                            &mut buf,
                        );
                        if outcome == ReadOutcome::UncorrectableEcc {
                            log::error!("uncorrectable read at bank {bank} vblock {old_vblock} page {old_page}");
                            return Err(FtlError::UncorrectableRead { bank, vblock: old_vblock, page: old_page });
                        }
                        full_page[rhole_base..].copy_from_slice(&buf);
                    }
                }
            }
            self.vcount.decr(bank, old_vblock);
            page_offset = 0;
            column_cnt = SECTORS_PER_PAGE;
        }

        let write_vpn = self.misc.bank(bank).cur_write_vpn;
        let (new_vblock, new_page) = split_vpn(write_vpn);
        let outcome = if page_offset == 0 && column_cnt == SECTORS_PER_PAGE {
            self.nand.program_page(bank, new_vblock, new_page, &full_page)
        } else {
            let slice = &full_page[page_offset * BYTES_PER_SECTOR..(page_offset + column_cnt) * BYTES_PER_SECTOR];
            self.nand.program_page_partial(bank, new_vblock, new_page, page_offset, slice)
        };
        self.check_program(outcome, bank, new_vblock)?;

        self.page_map.set(lpn, Some(write_vpn));
        self.misc.bank_mut(bank).lpn_list_of_cur_vblock[new_page] = lpn;
        self.vcount.incr(bank, new_vblock);
        self.stats.bank_mut(bank).nand_write += 1;
        self.stats.bank_mut(bank).host_write += 1;
        self.stats.bank_mut(bank).page_wcount += 1;

        self.assign_new_write_vpn(bank)
    }

    /// Advance the write frontier of `bank`, closing the current block and
    /// kicking off garbage collection when the bank runs down to its last
    /// free block. Triggers at the *penultimate* page of a block, since the
    /// last page is reserved for persisting the block's inverse map.
    fn assign_new_write_vpn(&mut self, bank: usize) -> Result<(), FtlError> {
        let write_vpn = self.misc.bank(bank).cur_write_vpn;
        let (mut vblock, page) = split_vpn(write_vpn);

        if page == PAGES_PER_BLK - 2 {
            let lpn_list = self.misc.bank(bank).lpn_list_of_cur_vblock.clone();
            let mut buf = alloc::vec![0u8; BYTES_PER_PAGE];
            for (i, lpn) in lpn_list.iter().enumerate() {
                buf[i * 4..i * 4 + 4].copy_from_slice(&lpn.to_le_bytes());
            }
            let sectors_needed = (4 * PAGES_PER_BLK).div_ceil(BYTES_PER_SECTOR);
            let outcome = self.nand.program_page_partial(
                bank,
                vblock,
                PAGES_PER_BLK - 1,
                0,
                &buf[..sectors_needed * BYTES_PER_SECTOR],
            );
            self.check_program(outcome, bank, vblock)?;
            self.misc.bank_mut(bank).lpn_list_of_cur_vblock.iter_mut().for_each(|lpn| *lpn = 0);

            self.misc.bank_mut(bank).free_blk_cnt -= 1;
            if self.misc.bank(bank).free_blk_cnt == 1 {
                return self.garbage_collection(bank);
            }

            vblock += 1;
            while self.vcount.get(bank, vblock) == VCount::Ineligible {
                vblock += 1;
            }
        }

        self.misc.bank_mut(bank).cur_write_vpn =
            if vblock != write_vpn as usize / PAGES_PER_BLK { join_vpn(vblock, 0) } else { write_vpn + 1 };
        Ok(())
    }

    /// Greedy garbage collection: reclaim the bank's block with the fewest
    /// live pages, copying forward everything still referenced by the page
    /// map and swapping the victim in as the new GC reserve.
    fn garbage_collection(&mut self, bank: usize) -> Result<(), FtlError> {
        self.stats.bank_mut(bank).gc_cnt += 1;

        let vt_vblock = self.victim_vblock(bank);
        let vcount = self.vcount.get(bank, vt_vblock).as_count().expect("victim vblock has no valid vcount");
        let gc_vblock = self.misc.bank(bank).gc_vblock;
        log::info!("bank {bank} garbage collection starting, victim vblock {vt_vblock} ({vcount} live pages)");

        let mut inv_map = alloc::vec![0u8; BYTES_PER_PAGE];
        let outcome = self.nand.read_page(bank, vt_vblock, PAGES_PER_BLK - 1, &mut inv_map);
        if outcome == ReadOutcome::UncorrectableEcc {
            log::error!("uncorrectable read at bank {bank} vblock {vt_vblock} page {}", PAGES_PER_BLK - 1);
            return Err(FtlError::UncorrectableRead { bank, vblock: vt_vblock, page: PAGES_PER_BLK - 1 });
        }

        let mut free_vpn = join_vpn(gc_vblock, 0);
        for src_page in 0..PAGES_PER_BLK - 1 {
            let off = src_page * 4;
            let src_lpn = u32::from_le_bytes(inv_map[off..off + 4].try_into().unwrap());
            if self.page_map.get(src_lpn) != Some(join_vpn(vt_vblock, src_page)) {
                continue;
            }
            let (dst_vblock, dst_page) = split_vpn(free_vpn);
            self.nand.copyback(bank, vt_vblock, src_page, dst_vblock, dst_page);
            self.stats.bank_mut(bank).gc_write += 1;
            self.page_map.set(src_lpn, Some(free_vpn));
            self.misc.bank_mut(bank).lpn_list_of_cur_vblock[dst_page] = src_lpn;
            free_vpn += 1;
        }

        let outcome = self.nand.erase_block(bank, vt_vblock);
        self.check_program(outcome, bank, vt_vblock)?;

        self.vcount.set(bank, vt_vblock, VCount::Ineligible);
        self.vcount.set(bank, gc_vblock, VCount::Valid(vcount));
        self.misc.bank_mut(bank).cur_write_vpn = free_vpn;
        self.misc.bank_mut(bank).gc_vblock = vt_vblock;
        self.misc.bank_mut(bank).free_blk_cnt += 1;
        log::info!("bank {bank} garbage collection done, reclaimed vblock {vt_vblock} now free_blk_cnt {}", self.misc.bank(bank).free_blk_cnt);
        Ok(())
    }

    fn victim_vblock(&self, bank: usize) -> usize {
        (0..self.rand_write_blks)
            .filter_map(|vblock| self.vcount.get(bank, vblock).as_count().map(|count| (count, vblock)))
            .min_by_key(|&(count, _)| count)
            .map(|(_, vblock)| vblock)
            .expect("bank has no eligible garbage collection victim")
    }
}
