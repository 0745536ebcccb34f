//! Top-level command dispatch: wires a decoded `HostCommand` to the random
//! and zoned engines and unpacks the administrative commands' payloads
//! (spec.md §6).

use alloc::vec::Vec;

use crate::config::{BYTES_PER_SECTOR, DEG_ZONE, NPAGE, NZONE, RAND_ZONE_END};
use crate::error::FtlError;
use crate::ftl::Ftl;
use crate::hal::{HostIo, NandDevice};
use crate::host::HostCommand;
use crate::zone::{TlBitmap, ZoneState};

/// One entry of a `GetZoneDescriptors` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneDescriptor {
    pub zone_number: u32,
    pub state: ZoneState,
    pub slba: u32,
    pub wp: u32,
}

impl<N: NandDevice> Ftl<N> {
    /// Execute a decoded host command. `GetZoneDescriptors` returns its
    /// descriptors directly; every other command returns an empty vector.
    pub fn execute<H: HostIo>(
        &mut self,
        host: &mut H,
        cmd: HostCommand,
        wbuf_slot: usize,
        rbuf_slot: usize,
    ) -> Result<Vec<ZoneDescriptor>, FtlError> {
        match cmd {
            HostCommand::RandomIo { lba, num_sectors, write } => {
                if write {
                    host.wait_wbuf_free(wbuf_slot);
                    self.write(host, wbuf_slot, lba, num_sectors)?;
                } else {
                    host.wait_rbuf_free(rbuf_slot);
                    self.read(host, rbuf_slot, lba, num_sectors)?;
                }
                Ok(Vec::new())
            }
            HostCommand::ZonedIo { lba, num_sectors, write } => {
                let zone_lba = lba - RAND_ZONE_END as u32;
                if write {
                    host.wait_wbuf_free(wbuf_slot);
                    self.zns_write(host, wbuf_slot, zone_lba, num_sectors)?;
                } else {
                    host.wait_rbuf_free(rbuf_slot);
                    self.zns_read(host, rbuf_slot, zone_lba, num_sectors)?;
                }
                Ok(Vec::new())
            }
            HostCommand::DumpStats => {
                host.wait_rbuf_free(rbuf_slot);
                self.dump_stats(host, rbuf_slot);
                Ok(Vec::new())
            }
            HostCommand::ZoneReset => {
                host.wait_wbuf_free(wbuf_slot);
                let zone = read_u32_payload(host, wbuf_slot, 7, 0);
                self.zns_reset(zone)?;
                Ok(Vec::new())
            }
            HostCommand::GetZoneDescriptors => {
                host.wait_wbuf_free(wbuf_slot);
                let zone_number = read_u32_payload(host, wbuf_slot, 7, 0);
                let count = read_u32_payload(host, wbuf_slot, 7, 1);
                Ok(self.zone_descriptors(zone_number, count))
            }
            HostCommand::Izc => {
                host.wait_wbuf_free(wbuf_slot);
                let src = read_u32_payload(host, wbuf_slot, 1, 0);
                let dst = read_u32_payload(host, wbuf_slot, 1, 1);
                let copy_len = read_u32_payload(host, wbuf_slot, 1, 2) as usize;
                let indices: Vec<u32> = (0..copy_len).map(|i| read_u32_payload(host, wbuf_slot, 1, 3 + i)).collect();
                self.zns_izc(src, dst, &indices)?;
                Ok(Vec::new())
            }
            HostCommand::TlOpen => {
                host.wait_wbuf_free(wbuf_slot);
                let src = read_u32_payload(host, wbuf_slot, 3, 0);
                let base = 3 * BYTES_PER_SECTOR + 4;
                let bits: Vec<bool> = {
                    let buf = host.write_buf(wbuf_slot);
                    (0..DEG_ZONE * NPAGE).map(|k| buf[base + k] != 0).collect()
                };
                self.zns_tl_open(src, TlBitmap::from_bits(bits))?;
                Ok(Vec::new())
            }
        }
    }

    fn dump_stats<H: HostIo>(&self, host: &mut H, rbuf_slot: usize) {
        let buf = host.read_buf_mut(rbuf_slot);
        for (bank, stats) in self.stats.all().iter().enumerate() {
            let off = bank * 20;
            buf[off..off + 4].copy_from_slice(&stats.gc_cnt.to_le_bytes());
            buf[off + 4..off + 8].copy_from_slice(&stats.gc_write.to_le_bytes());
            buf[off + 8..off + 12].copy_from_slice(&stats.host_write.to_le_bytes());
            buf[off + 12..off + 16].copy_from_slice(&stats.nand_write.to_le_bytes());
            buf[off + 16..off + 20].copy_from_slice(&stats.page_wcount.to_le_bytes());
        }
    }

    fn zone_descriptors(&self, zone_number: u32, count: u32) -> Vec<ZoneDescriptor> {
        (0..count)
            .filter_map(|i| {
                let z = zone_number + i;
                if z as usize >= NZONE {
                    return None;
                }
                let rec = self.zones.zone(z);
                Some(ZoneDescriptor { zone_number: z, state: rec.state, slba: rec.slba, wp: rec.wp })
            })
            .collect()
    }
}

/// Magic commands carry their payload in the write buffer at
/// `magic_lba * BYTES_PER_SECTOR`, as fixed 32-bit little-endian words
/// (spec.md §6).
fn read_u32_payload<H: HostIo>(host: &H, wbuf_slot: usize, magic_lba: u32, word_index: usize) -> u32 {
    let base = magic_lba as usize * BYTES_PER_SECTOR + word_index * 4;
    let buf = host.write_buf(wbuf_slot);
    u32::from_le_bytes(buf[base..base + 4].try_into().unwrap())
}
