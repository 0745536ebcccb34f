//! Zone state-machine transitions and sequential-write enforcement
//! (spec.md §4.2). `zone.rs` defines what a zone carries; this module
//! defines how it moves between states, since that needs the allocators
//! and the NAND device that live on `Ftl`.

use alloc::vec::Vec;

use crate::config::{BYTES_PER_SECTOR, DEG_ZONE, NPAGE, NSECT, NUM_FCG, NZONE, ZONE_SIZE};
use crate::error::{FtlError, ProtocolViolation};
use crate::ftl::Ftl;
use crate::hal::{page_scratch, HostIo, NandDevice, ReadOutcome};
use crate::zone::{TlBitmap, ZoneState};

/// Decoded components of a zone-relative LBA (spec.md §3).
#[derive(Debug, Clone, Copy)]
pub struct ZoneAddr {
    pub c_sect: usize,
    pub b_offset: usize,
    pub p_offset: usize,
    pub c_fcg: usize,
    pub c_zone: usize,
    pub c_bank: usize,
}

pub fn decode_zone_lba(lba: u32) -> ZoneAddr {
    let lba = lba as usize;
    let c_sect = lba % NSECT;
    let b_offset = (lba / NSECT) % DEG_ZONE;
    let p_offset = (lba / NSECT / DEG_ZONE) % NPAGE;
    let c_fcg = (lba / NSECT / DEG_ZONE / NPAGE) % NUM_FCG;
    let c_zone = lba / NSECT / DEG_ZONE / NPAGE;
    let c_bank = c_fcg * DEG_ZONE + b_offset;
    ZoneAddr { c_sect, b_offset, p_offset, c_fcg, c_zone, c_bank }
}

fn bank_group(zone_number: u32) -> Vec<usize> {
    let c_fcg = zone_number as usize % NUM_FCG;
    (0..DEG_ZONE).map(|b| c_fcg * DEG_ZONE + b).collect()
}

impl<N: NandDevice> Ftl<N> {
    /// `zns_write`/sector-granular dispatch: LBAs within one call may span
    /// several sectors, but sequentiality and page-flush are per-sector
    /// conditions, so each sector is handled independently.
    pub fn zns_write<H: HostIo>(
        &mut self,
        host: &mut H,
        wbuf_slot: usize,
        lba: u32,
        num_sectors: u32,
    ) -> Result<(), FtlError> {
        for i in 0..num_sectors {
            self.zns_write_sector(host, wbuf_slot, i as usize, lba + i)?;
        }
        Ok(())
    }

    pub fn zns_read<H: HostIo>(
        &mut self,
        host: &mut H,
        rbuf_slot: usize,
        lba: u32,
        num_sectors: u32,
    ) -> Result<(), FtlError> {
        for i in 0..num_sectors {
            self.zns_read_sector(host, rbuf_slot, i as usize, lba + i)?;
        }
        Ok(())
    }

    fn zns_write_sector<H: HostIo>(
        &mut self,
        host: &mut H,
        wbuf_slot: usize,
        sector_in_call: usize,
        lba: u32,
    ) -> Result<(), FtlError> {
        let addr = decode_zone_lba(lba);
        if addr.c_zone >= NZONE {
            return Err(FtlError::BadZone(addr.c_zone as u32));
        }
        let zone_number = addr.c_zone as u32;
        let state = self.zones.zone(zone_number).state;

        match state {
            ZoneState::Empty => {
                if self.zones.open_zone_count() >= crate::config::MAX_OPEN_ZONE {
                    return Err(FtlError::TooManyOpenZones);
                }
                let fbg = self.dequeue_fbg()?;
                let open_id = self.dequeue_open_id()?;
                let z = self.zones.zone_mut(zone_number);
                z.state = ZoneState::Open;
                z.fbg = Some(fbg);
                z.open_id = Some(open_id);
            }
            ZoneState::Open => {}
            ZoneState::Full => return Err(FtlError::ProtocolViolation(ProtocolViolation::WriteToFullZone)),
            ZoneState::TlOpen => return self.tl_open_write_sector(host, wbuf_slot, sector_in_call, lba, addr),
        }

        let z = self.zones.zone(zone_number);
        let wp = z.wp;
        let fbg = z.fbg.expect("OPEN zone must carry an fbg");
        let open_id = z.open_id.expect("OPEN zone must carry an open-id");
        if lba != wp {
            return Err(FtlError::ProtocolViolation(ProtocolViolation::OutOfOrderWrite { expected: wp, got: lba }));
        }

        let sector_off = sector_in_call * BYTES_PER_SECTOR;
        let sector_bytes = &host.write_buf(wbuf_slot)[sector_off..sector_off + BYTES_PER_SECTOR];
        let buf = self.zones.open_buffer_mut(open_id);
        buf[addr.c_sect * BYTES_PER_SECTOR..(addr.c_sect + 1) * BYTES_PER_SECTOR].copy_from_slice(sector_bytes);

        if addr.c_sect == NSECT - 1 {
            let page_buf = self.zones.open_buffer(open_id).to_vec();
            let outcome = self.nand.program_page(addr.c_bank, fbg as usize, addr.p_offset, &page_buf);
            self.check_program(outcome, addr.c_bank, fbg as usize)?;
            self.stats.bank_mut(addr.c_bank).nand_write += 1;
        }

        self.stats.bank_mut(addr.c_bank).host_write += 1;
        let z = self.zones.zone_mut(zone_number);
        z.wp += 1;
        if z.wp == z.slba + ZONE_SIZE as u32 {
            self.zns_close_to_full(zone_number);
        }
        Ok(())
    }

    fn zns_read_sector<H: HostIo>(
        &mut self,
        host: &mut H,
        rbuf_slot: usize,
        sector_in_call: usize,
        lba: u32,
    ) -> Result<(), FtlError> {
        let addr = decode_zone_lba(lba);
        if addr.c_zone >= NZONE {
            return Err(FtlError::BadZone(addr.c_zone as u32));
        }
        let zone_number = addr.c_zone as u32;
        let z = self.zones.zone(zone_number);
        let state = z.state;
        let wp = z.wp;
        let fbg = z.fbg;
        let open_id = z.open_id;

        let dest_off = sector_in_call * BYTES_PER_SECTOR;
        match state {
            ZoneState::Empty => {
                host.read_buf_mut(rbuf_slot)[dest_off..dest_off + BYTES_PER_SECTOR].fill(0xFF);
                Ok(())
            }
            ZoneState::Open => {
                if lba >= wp {
                    host.read_buf_mut(rbuf_slot)[dest_off..dest_off + BYTES_PER_SECTOR].fill(0xFF);
                    return Ok(());
                }
                let wp_addr = decode_zone_lba(wp.saturating_sub(1));
                let sector_bytes: [u8; BYTES_PER_SECTOR] = if addr.p_offset == wp_addr.p_offset
                    && addr.b_offset == wp_addr.b_offset
                {
                    let open_id = open_id.expect("OPEN zone must carry an open-id");
                    let buf = self.zones.open_buffer(open_id);
                    buf[addr.c_sect * BYTES_PER_SECTOR..(addr.c_sect + 1) * BYTES_PER_SECTOR].try_into().unwrap()
                } else {
                    let fbg = fbg.expect("OPEN zone must carry an fbg");
                    self.read_zone_sector(addr.c_bank, fbg, addr.p_offset, addr.c_sect)?
                };
                host.read_buf_mut(rbuf_slot)[dest_off..dest_off + BYTES_PER_SECTOR].copy_from_slice(&sector_bytes);
                Ok(())
            }
            ZoneState::Full => {
                let fbg = fbg.expect("FULL zone must carry an fbg");
                let sector_bytes = self.read_zone_sector(addr.c_bank, fbg, addr.p_offset, addr.c_sect)?;
                host.read_buf_mut(rbuf_slot)[dest_off..dest_off + BYTES_PER_SECTOR].copy_from_slice(&sector_bytes);
                Ok(())
            }
            ZoneState::TlOpen => {
                let tl_wp = self.zones.tl_wp(zone_number);
                let dest_fbg = self.zones.tl_dest_fbg(zone_number).expect("TL_OPEN zone must carry a destination fbg");
                let src_fbg = fbg.expect("TL_OPEN zone must retain its source fbg");
                let fbg = if lba < tl_wp { dest_fbg } else { src_fbg };
                let sector_bytes = self.read_zone_sector(addr.c_bank, fbg, addr.p_offset, addr.c_sect)?;
                host.read_buf_mut(rbuf_slot)[dest_off..dest_off + BYTES_PER_SECTOR].copy_from_slice(&sector_bytes);
                Ok(())
            }
        }
    }

    fn read_zone_sector(
        &mut self,
        bank: usize,
        fbg: u32,
        p_offset: usize,
        c_sect: usize,
    ) -> Result<[u8; BYTES_PER_SECTOR], FtlError> {
        let mut page = page_scratch();
        let outcome = self.nand.read_page(bank, fbg as usize, p_offset, &mut page);
        if outcome == ReadOutcome::UncorrectableEcc {
            log::error!("uncorrectable read at bank {bank} vblock {fbg} page {p_offset}");
            return Err(FtlError::UncorrectableRead { bank, vblock: fbg as usize, page: p_offset });
        }
        Ok(page[c_sect * BYTES_PER_SECTOR..(c_sect + 1) * BYTES_PER_SECTOR].try_into().unwrap())
    }

    fn tl_open_write_sector<H: HostIo>(
        &mut self,
        host: &mut H,
        wbuf_slot: usize,
        sector_in_call: usize,
        lba: u32,
        addr: ZoneAddr,
    ) -> Result<(), FtlError> {
        let zone_number = addr.c_zone as u32;
        let open_id = self.zones.zone(zone_number).open_id.expect("TL_OPEN zone must carry an open-id");
        let dest_fbg =
            self.zones.tl_dest_fbg(zone_number).expect("TL_OPEN zone must carry a destination fbg");
        let tl_wp = self.zones.tl_wp(zone_number);

        let page_index = (lba as usize) / NSECT;
        if self.zones.tl_bitmap(open_id).get(page_index) {
            return Err(FtlError::ProtocolViolation(ProtocolViolation::WriteToTlReservedPage));
        }
        if lba != tl_wp {
            return Err(FtlError::ProtocolViolation(ProtocolViolation::OutOfOrderWrite { expected: tl_wp, got: lba }));
        }

        let sector_off = sector_in_call * BYTES_PER_SECTOR;
        let sector_bytes = &host.write_buf(wbuf_slot)[sector_off..sector_off + BYTES_PER_SECTOR];
        let buf = self.zones.open_buffer_mut(open_id);
        buf[addr.c_sect * BYTES_PER_SECTOR..(addr.c_sect + 1) * BYTES_PER_SECTOR].copy_from_slice(sector_bytes);

        if addr.c_sect == NSECT - 1 {
            let page_buf = self.zones.open_buffer(open_id).to_vec();
            let outcome = self.nand.program_page(addr.c_bank, dest_fbg as usize, addr.p_offset, &page_buf);
            self.check_program(outcome, addr.c_bank, dest_fbg as usize)?;
            self.stats.bank_mut(addr.c_bank).nand_write += 1;
            self.zones.open_buffer_mut(open_id).fill(0);
        }

        self.stats.bank_mut(addr.c_bank).host_write += 1;
        self.zones.set_tl_wp(zone_number, tl_wp + 1);

        if addr.c_sect == NSECT - 1 {
            self.fill_tl(zone_number)?;
        }
        Ok(())
    }

    /// Drains every contiguous run of bitmap-set pages starting at the
    /// current `TL_wp`, copying each directly from the source FBG into the
    /// destination FBG. Bounded by the zone's total page count (REDESIGN
    /// FLAG: the source recurses to the same depth; a loop here removes the
    /// unbounded stack growth).
    pub(crate) fn fill_tl(&mut self, zone_number: u32) -> Result<(), FtlError> {
        let open_id = self.zones.zone(zone_number).open_id.expect("TL_OPEN zone must carry an open-id");
        let src_fbg = self.zones.zone(zone_number).fbg.expect("TL_OPEN zone must retain its source fbg");
        let dest_fbg =
            self.zones.tl_dest_fbg(zone_number).expect("TL_OPEN zone must carry a destination fbg");
        let c_fcg = zone_number as usize % NUM_FCG;

        loop {
            let tl_wp = self.zones.tl_wp(zone_number);
            if tl_wp as usize >= DEG_ZONE * NSECT * NPAGE {
                break;
            }
            let page_index = tl_wp as usize / NSECT;
            if !self.zones.tl_bitmap(open_id).get(page_index) {
                break;
            }

            let b_offset = page_index % DEG_ZONE;
            let p_offset = (page_index / DEG_ZONE) % NPAGE;
            let bank = c_fcg * DEG_ZONE + b_offset;

            let mut page = page_scratch();
            let outcome = self.nand.read_page(bank, src_fbg as usize, p_offset, &mut page);
            if outcome == ReadOutcome::UncorrectableEcc {
                log::error!("uncorrectable read at bank {bank} vblock {src_fbg} page {p_offset}");
                return Err(FtlError::UncorrectableRead { bank, vblock: src_fbg as usize, page: p_offset });
            }
            let outcome = self.nand.program_page(bank, dest_fbg as usize, p_offset, &page);
            self.check_program(outcome, bank, dest_fbg as usize)?;
            self.stats.bank_mut(bank).nand_write += 1;
            self.zones.set_tl_wp(zone_number, tl_wp + NSECT as u32);
        }

        if self.zones.tl_wp(zone_number) as usize >= DEG_ZONE * NSECT * NPAGE {
            self.complete_tl_open(zone_number)?;
        }
        Ok(())
    }

    /// Transitions OPEN/TL_OPEN -> FULL: returns the open-id, clears the
    /// page buffer and drops `OPEN_ZONE` (derived from zone state, so
    /// nothing further to decrement).
    pub(crate) fn zns_close_to_full(&mut self, zone_number: u32) {
        let z = self.zones.zone_mut(zone_number);
        z.state = ZoneState::Full;
        let open_id = z.open_id.take().expect("FULL transition requires an open-id");
        self.zones.open_buffer_mut(open_id).fill(0);
        self.open_id_queue.enqueue(open_id);
    }

    /// `zns_reset`: FULL -> EMPTY. Erases the zone's FBG across its whole
    /// bank-group and returns it to the free-block queue.
    pub fn zns_reset(&mut self, zone_number: u32) -> Result<(), FtlError> {
        if zone_number as usize >= NZONE {
            return Err(FtlError::BadZone(zone_number));
        }
        if self.zones.zone(zone_number).state != ZoneState::Full {
            return Err(FtlError::ProtocolViolation(ProtocolViolation::IzcWrongState));
        }
        let z = self.zones.zone_mut(zone_number);
        let fbg = z.fbg.take().expect("FULL zone must carry an fbg");
        z.state = ZoneState::Empty;
        z.wp = z.slba;

        self.erase_and_release_fbg(bank_group(zone_number), fbg)
    }

    /// FULL -> TL_OPEN: allocate a destination FBG and an open-id, stage the
    /// bitmap, then immediately drain any bitmap-set run starting at page 0.
    pub fn zns_tl_open(&mut self, zone_number: u32, bitmap: TlBitmap) -> Result<(), FtlError> {
        if zone_number as usize >= NZONE {
            return Err(FtlError::BadZone(zone_number));
        }
        if self.zones.zone(zone_number).state != ZoneState::Full {
            return Err(FtlError::ProtocolViolation(ProtocolViolation::TlOpenWrongState));
        }
        if self.zones.open_zone_count() >= crate::config::MAX_OPEN_ZONE {
            return Err(FtlError::TooManyOpenZones);
        }

        let dest_fbg = self.dequeue_fbg()?;
        let open_id = self.dequeue_open_id()?;
        self.zones.set_tl_bitmap(open_id, bitmap);
        self.zones.set_tl_wp(zone_number, 0);
        self.zones.set_tl_dest_fbg(zone_number, Some(dest_fbg));
        let z = self.zones.zone_mut(zone_number);
        z.state = ZoneState::TlOpen;
        z.open_id = Some(open_id);

        self.fill_tl(zone_number)
    }

    /// TL_OPEN -> FULL, once `TL_wp` has reached the end of the zone: erase
    /// the old source FBG across the bank-group (the equivalent of
    /// `zns_reset` against the pre-swap `fbg`, done inline here since the
    /// zone is still TL_OPEN rather than FULL at this point — see
    /// DESIGN.md), then swap in the destination FBG.
    fn complete_tl_open(&mut self, zone_number: u32) -> Result<(), FtlError> {
        let old_fbg = self.zones.zone(zone_number).fbg.expect("TL_OPEN zone must retain its source fbg");
        let dest_fbg =
            self.zones.tl_dest_fbg(zone_number).expect("TL_OPEN zone must carry a destination fbg");
        let open_id = self.zones.zone_mut(zone_number).open_id.take().expect("TL_OPEN zone must carry an open-id");

        self.erase_and_release_fbg(bank_group(zone_number), old_fbg)?;

        let z = self.zones.zone_mut(zone_number);
        z.fbg = Some(dest_fbg);
        z.state = ZoneState::Full;
        z.wp = z.slba + ZONE_SIZE as u32;

        self.zones.set_tl_dest_fbg(zone_number, None);
        self.open_id_queue.enqueue(open_id);
        Ok(())
    }
}
