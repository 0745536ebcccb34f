//! Misc-block and map-block persistent logging, and power-off recovery
//! (spec.md §4.5).

use alloc::vec::Vec;

use crate::config::{
    BYTES_PER_PAGE, MAPBLKS_PER_BANK, MISCBLK_VBN, NUM_BANKS, NUM_LPAGES, PAGES_PER_BLK, VBLKS_PER_BANK,
};
use crate::dram::VCount;
use crate::error::FtlError;
use crate::ftl::{bank_of_lpn, Ftl};
use crate::hal::NandDevice;

const ENTRIES_PER_PAGE: usize = BYTES_PER_PAGE / 4;

fn lpns_for_bank(bank: usize) -> impl Iterator<Item = u32> {
    (bank..NUM_LPAGES).step_by(NUM_BANKS).map(|lpn| lpn as u32)
}

impl<N: NandDevice> Ftl<N> {
    /// `ftl_flush`: persist misc metadata and the page map for every bank.
    pub fn flush(&mut self) -> Result<(), FtlError> {
        self.logging_misc_metadata()?;
        self.logging_pmap_table()
    }

    fn logging_misc_metadata(&mut self) -> Result<(), FtlError> {
        for bank in 0..NUM_BANKS {
            let mut buf = alloc::vec![0xFFu8; BYTES_PER_PAGE];
            let misc = self.misc.bank(bank).clone_for_log();
            misc.encode_into(&mut buf);
            let vcounts: Vec<u16> = (0..VBLKS_PER_BANK).map(|v| self.vcount.get(bank, v).to_raw()).collect();
            let vc_off = MiscLogHeader::ENCODED_LEN;
            for (i, vc) in vcounts.iter().enumerate() {
                let off = vc_off + i * 2;
                buf[off..off + 2].copy_from_slice(&vc.to_le_bytes());
            }

            let page = self.misc.bank(bank).cur_miscblk_vpn as usize % PAGES_PER_BLK;
            let outcome = self.nand.program_page(bank, MISCBLK_VBN, page, &buf);
            self.check_program(outcome, bank, MISCBLK_VBN)?;

            let next = self.misc.bank(bank).cur_miscblk_vpn + 1;
            if next as usize % PAGES_PER_BLK == 0 {
                let outcome = self.nand.erase_block(bank, MISCBLK_VBN);
                self.check_program(outcome, bank, MISCBLK_VBN)?;
                self.misc.bank_mut(bank).cur_miscblk_vpn = 0;
            } else {
                self.misc.bank_mut(bank).cur_miscblk_vpn = next;
            }
        }
        Ok(())
    }

    fn logging_pmap_table(&mut self) -> Result<(), FtlError> {
        for bank in 0..NUM_BANKS {
            let entries: Vec<u32> =
                lpns_for_bank(bank).map(|lpn| self.page_map.get(lpn).unwrap_or(0xFFFF_FFFF)).collect();

            let mut written = 0usize;
            for mapblk in 0..MAPBLKS_PER_BANK {
                if written >= entries.len() {
                    break;
                }
                let chunk_len = ENTRIES_PER_PAGE.min(entries.len() - written);
                let mut buf = alloc::vec![0xFFu8; BYTES_PER_PAGE];
                for (i, e) in entries[written..written + chunk_len].iter().enumerate() {
                    buf[i * 4..i * 4 + 4].copy_from_slice(&e.to_le_bytes());
                }

                let mapblk_vbn = 2 + mapblk;
                let page = self.misc.bank(bank).cur_mapblk_vpn[mapblk] as usize % PAGES_PER_BLK;
                let outcome = self.nand.program_page(bank, mapblk_vbn, page, &buf);
                self.check_program(outcome, bank, mapblk_vbn)?;

                let next = self.misc.bank(bank).cur_mapblk_vpn[mapblk] + 1;
                if next as usize % PAGES_PER_BLK == 0 {
                    let outcome = self.nand.erase_block(bank, mapblk_vbn);
                    self.check_program(outcome, bank, mapblk_vbn)?;
                    self.misc.bank_mut(bank).cur_mapblk_vpn[mapblk] = 0;
                } else {
                    self.misc.bank_mut(bank).cur_mapblk_vpn[mapblk] = next;
                }

                written += chunk_len;
            }
        }
        Ok(())
    }

    /// `load_metadata`: scan the misc block backward to find the latest
    /// checkpoint per bank, then reload the page map from the map blocks.
    pub(crate) fn load_metadata(&mut self) {
        self.load_misc_metadata();
        self.load_pmap_table();
    }

    fn load_misc_metadata(&mut self) {
        for bank in 0..NUM_BANKS {
            let mut buf = alloc::vec![0u8; BYTES_PER_PAGE];
            let mut found = None;
            for page in (0..PAGES_PER_BLK).rev() {
                self.nand.read_page(bank, MISCBLK_VBN, page, &mut buf);
                if !buf.iter().all(|&b| b == 0xFF) {
                    found = Some(page);
                    break;
                }
            }
            let Some(page) = found else {
                continue;
            };
            let misc = MiscLogHeader::decode_from(&buf);
            let bank_misc = self.misc.bank_mut(bank);
            bank_misc.cur_write_vpn = misc.cur_write_vpn;
            bank_misc.cur_miscblk_vpn = page as u32 + 1;
            bank_misc.cur_mapblk_vpn = misc.cur_mapblk_vpn;
            bank_misc.gc_vblock = misc.gc_vblock as usize;
            bank_misc.free_blk_cnt = misc.free_blk_cnt;

            let vc_off = MiscLogHeader::ENCODED_LEN;
            for vblock in 0..VBLKS_PER_BANK {
                let off = vc_off + vblock * 2;
                let raw = u16::from_le_bytes([buf[off], buf[off + 1]]);
                self.vcount.set(bank, vblock, VCount::from_raw(raw));
            }
        }
    }

    fn load_pmap_table(&mut self) {
        for bank in 0..NUM_BANKS {
            let lpns: Vec<u32> = lpns_for_bank(bank).collect();
            let mut cursor = 0usize;
            for mapblk in 0..MAPBLKS_PER_BANK {
                if cursor >= lpns.len() {
                    break;
                }
                let committed_pages = self.misc.bank(bank).cur_mapblk_vpn[mapblk] as usize;
                let mapblk_vbn = 2 + mapblk;
                let mut buf = alloc::vec![0u8; BYTES_PER_PAGE];
                for page in 0..committed_pages {
                    self.nand.read_page(bank, mapblk_vbn, page, &mut buf);
                    for i in 0..ENTRIES_PER_PAGE {
                        if cursor >= lpns.len() {
                            break;
                        }
                        let off = i * 4;
                        let raw = u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]]);
                        let vpn = if raw == 0xFFFF_FFFF { None } else { Some(raw) };
                        self.page_map.set(lpns[cursor], vpn);
                        cursor += 1;
                    }
                }
            }
        }
    }
}

/// On-NAND encoding of one bank's misc-metadata checkpoint, used by both the
/// flush and the recovery scan.
struct MiscLogHeader {
    cur_write_vpn: u32,
    cur_mapblk_vpn: [u32; MAPBLKS_PER_BANK],
    gc_vblock: u32,
    free_blk_cnt: u32,
}

impl MiscLogHeader {
    const ENCODED_LEN: usize = 4 * (3 + MAPBLKS_PER_BANK);

    fn encode_into(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.cur_write_vpn.to_le_bytes());
        let mut off = 4;
        for vpn in &self.cur_mapblk_vpn {
            buf[off..off + 4].copy_from_slice(&vpn.to_le_bytes());
            off += 4;
        }
        buf[off..off + 4].copy_from_slice(&self.gc_vblock.to_le_bytes());
        off += 4;
        buf[off..off + 4].copy_from_slice(&self.free_blk_cnt.to_le_bytes());
    }

    fn decode_from(buf: &[u8]) -> Self {
        let cur_write_vpn = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let mut cur_mapblk_vpn = [0u32; MAPBLKS_PER_BANK];
        let mut off = 4;
        for vpn in &mut cur_mapblk_vpn {
            *vpn = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
            off += 4;
        }
        let gc_vblock = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        off += 4;
        let free_blk_cnt = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        Self { cur_write_vpn, cur_mapblk_vpn, gc_vblock, free_blk_cnt }
    }
}

impl crate::dram::MiscMeta {
    fn clone_for_log(&self) -> MiscLogHeader {
        MiscLogHeader {
            cur_write_vpn: self.cur_write_vpn,
            cur_mapblk_vpn: self.cur_mapblk_vpn,
            gc_vblock: self.gc_vblock as u32,
            free_blk_cnt: self.free_blk_cnt,
        }
    }
}
