//! Internal Zone Compaction (spec.md §4.4): device-internal copy from a
//! FULL source zone into an EMPTY destination zone, selecting pages by an
//! explicit index list instead of copying the whole zone.

use crate::config::{DEG_ZONE, MAX_OPEN_ZONE, NPAGE, NUM_FCG, NZONE};
use crate::error::{FtlError, ProtocolViolation};
use crate::ftl::Ftl;
use crate::hal::{page_scratch, NandDevice, ReadOutcome};
use crate::zone::ZoneState;

impl<N: NandDevice> Ftl<N> {
    /// `zns_izc(src, dest, list)`: `list[i]` is the page index within
    /// `src`'s bank-group to copy into destination page `i`. Completes the
    /// destination to FULL only when `list` covers the whole zone
    /// (`DEG_ZONE * NPAGE` entries); a shorter list leaves the destination
    /// OPEN for further host writes at the next sequential `wp`.
    pub fn zns_izc(&mut self, src: u32, dest: u32, indices: &[u32]) -> Result<(), FtlError> {
        if src as usize >= NZONE || dest as usize >= NZONE {
            return Err(FtlError::BadZone(src.max(dest)));
        }
        if src == dest {
            return Err(FtlError::ProtocolViolation(ProtocolViolation::IzcWrongState));
        }
        if self.zones.zone(src).state != ZoneState::Full || self.zones.zone(dest).state != ZoneState::Empty {
            return Err(FtlError::ProtocolViolation(ProtocolViolation::IzcWrongState));
        }
        if self.zones.open_zone_count() >= MAX_OPEN_ZONE {
            return Err(FtlError::TooManyOpenZones);
        }

        let dest_fbg = self.dequeue_fbg()?;
        let dest_open_id = self.dequeue_open_id()?;
        {
            let d = self.zones.zone_mut(dest);
            d.state = ZoneState::Open;
            d.fbg = Some(dest_fbg);
            d.open_id = Some(dest_open_id);
        }

        let src_fbg = self.zones.zone(src).fbg.expect("FULL zone must carry an fbg");
        let src_c_fcg = src as usize % NUM_FCG;
        let dest_c_fcg = dest as usize % NUM_FCG;

        for (i, &src_page_idx) in indices.iter().enumerate() {
            let src_page_idx = src_page_idx as usize;
            let src_bank = src_c_fcg * DEG_ZONE + (src_page_idx % DEG_ZONE);
            let src_page = (src_page_idx / DEG_ZONE) % NPAGE;
            let dst_bank = dest_c_fcg * DEG_ZONE + (i % DEG_ZONE);
            let dst_page = (i / DEG_ZONE) % NPAGE;

            let mut page = page_scratch();
            let outcome = self.nand.read_page(src_bank, src_fbg as usize, src_page, &mut page);
            if outcome == ReadOutcome::UncorrectableEcc {
                log::error!("uncorrectable read at bank {src_bank} vblock {src_fbg} page {src_page}");
                return Err(FtlError::UncorrectableRead { bank: src_bank, vblock: src_fbg as usize, page: src_page });
            }
            let outcome = self.nand.program_page(dst_bank, dest_fbg as usize, dst_page, &page);
            self.check_program(outcome, dst_bank, dest_fbg as usize)?;
            self.stats.bank_mut(dst_bank).nand_write += 1;

            self.zones.zone_mut(dest).wp += crate::config::NSECT as u32;
        }

        self.zns_reset(src)?;

        if indices.len() == DEG_ZONE * NPAGE {
            self.zns_close_to_full(dest);
        }
        Ok(())
    }
}
