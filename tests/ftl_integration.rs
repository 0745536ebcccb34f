mod common;

use common::{MockHost, MockNand};
use hybrid_ftl::config::{BYTES_PER_SECTOR, DEG_ZONE, NPAGE, NSECT, RAND_ZONE_END, SECTORS_PER_PAGE, ZONE_SIZE};
use hybrid_ftl::zone::ZoneState;
use hybrid_ftl::{Ftl, FtlError, HostCommand};

fn new_ftl() -> Ftl<MockNand> {
    Ftl::new(MockNand::new(), 8).unwrap()
}

fn sector_pattern(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

#[test]
fn random_write_then_read_round_trips() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();

    let data = sector_pattern(0xAB, SECTORS_PER_PAGE * BYTES_PER_SECTOR);
    host.fill_wbuf(0, &data);
    ftl.write(&mut host, 0, 0, SECTORS_PER_PAGE as u32).unwrap();

    ftl.read(&mut host, 0, 0, SECTORS_PER_PAGE as u32).unwrap();
    assert_eq!(host.rbuf(0)[..data.len()], data[..]);
}

#[test]
fn unwritten_lpn_reads_as_0xff() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();

    ftl.read(&mut host, 0, SECTORS_PER_PAGE as u32 * 4, SECTORS_PER_PAGE as u32).unwrap();
    assert!(host.rbuf(0)[..SECTORS_PER_PAGE * BYTES_PER_SECTOR].iter().all(|&b| b == 0xFF));
}

#[test]
fn partial_write_merges_with_old_page_content() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();

    let full = sector_pattern(0x11, SECTORS_PER_PAGE * BYTES_PER_SECTOR);
    host.fill_wbuf(0, &full);
    ftl.write(&mut host, 0, 0, SECTORS_PER_PAGE as u32).unwrap();

    // Overwrite sector 2 only.
    let patch = sector_pattern(0x99, BYTES_PER_SECTOR);
    host.fill_wbuf(0, &patch);
    ftl.write(&mut host, 0, 2, 1).unwrap();

    ftl.read(&mut host, 0, 0, SECTORS_PER_PAGE as u32).unwrap();
    let got = host.rbuf(0)[..SECTORS_PER_PAGE * BYTES_PER_SECTOR].to_vec();
    assert_eq!(got[..2 * BYTES_PER_SECTOR], full[..2 * BYTES_PER_SECTOR]);
    assert_eq!(got[2 * BYTES_PER_SECTOR..3 * BYTES_PER_SECTOR], patch[..]);
    assert_eq!(got[3 * BYTES_PER_SECTOR..], full[3 * BYTES_PER_SECTOR..]);
}

#[test]
fn repeated_writes_to_one_lpn_force_garbage_collection() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();

    let page = sector_pattern(0x42, SECTORS_PER_PAGE * BYTES_PER_SECTOR);
    host.fill_wbuf(0, &page);

    // Enough rewrites of a single lpn to exhaust every free block in its bank.
    for _ in 0..2000 {
        ftl.write(&mut host, 0, 0, SECTORS_PER_PAGE as u32).unwrap();
    }

    assert!(ftl.stats().bank(0).gc_cnt >= 1);

    ftl.read(&mut host, 0, 0, SECTORS_PER_PAGE as u32).unwrap();
    assert_eq!(host.rbuf(0)[..page.len()], page[..]);
}

#[test]
fn vcount_tracks_live_mappings_per_bank() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();

    let page = sector_pattern(0x07, SECTORS_PER_PAGE * BYTES_PER_SECTOR);
    for lpn in 0..8u32 {
        host.fill_wbuf(0, &page);
        ftl.write(&mut host, 0, lpn * SECTORS_PER_PAGE as u32, SECTORS_PER_PAGE as u32).unwrap();
    }

    for bank in 0..hybrid_ftl::config::NUM_BANKS {
        let live = (0..8u32).filter(|&lpn| lpn as usize % hybrid_ftl::config::NUM_BANKS == bank).count() as u32;
        assert_eq!(ftl.vcount_live_mappings(bank), live);
    }
}

#[test]
fn zone_fills_sequentially_then_transitions_to_full() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();
    let data = sector_pattern(0x5A, BYTES_PER_SECTOR);

    for i in 0..ZONE_SIZE as u32 {
        host.fill_wbuf(0, &data);
        ftl.zns_write(&mut host, 0, i, 1).unwrap();

        if i < ZONE_SIZE as u32 - 1 {
            assert_eq!(*ftl.zone_state(0), ZoneState::Open);
        }
    }

    assert_eq!(*ftl.zone_state(0), ZoneState::Full);

    // A page at or below the write pointer reads back from NAND.
    ftl.zns_read(&mut host, 0, 0, 1).unwrap();
    assert_eq!(host.rbuf(0)[..BYTES_PER_SECTOR], data[..]);
}

#[test]
fn out_of_order_zone_write_is_rejected() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();
    let data = sector_pattern(0x5A, BYTES_PER_SECTOR);
    host.fill_wbuf(0, &data);

    // First sector opens the zone at wp == slba.
    ftl.zns_write(&mut host, 0, 0, 1).unwrap();
    let err = ftl.zns_write(&mut host, 0, NSECT as u32, 1).unwrap_err();
    assert!(matches!(err, FtlError::ProtocolViolation(_)));

    // The correct next sector still succeeds.
    ftl.zns_write(&mut host, 0, 1, 1).unwrap();
}

#[test]
fn max_open_zones_is_enforced() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();
    let data = sector_pattern(0x01, BYTES_PER_SECTOR);
    host.fill_wbuf(0, &data);

    for z in 0..hybrid_ftl::config::MAX_OPEN_ZONE {
        ftl.zns_write(&mut host, 0, (z * ZONE_SIZE) as u32, 1).unwrap();
    }

    let err = ftl.zns_write(&mut host, 0, (hybrid_ftl::config::MAX_OPEN_ZONE * ZONE_SIZE) as u32, 1).unwrap_err();
    assert!(matches!(err, FtlError::TooManyOpenZones));
}

#[test]
fn zns_reset_erases_fbg_and_returns_zone_to_empty() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();
    let data = sector_pattern(0x01, BYTES_PER_SECTOR);

    for i in 0..ZONE_SIZE as u32 {
        host.fill_wbuf(0, &data);
        ftl.zns_write(&mut host, 0, i, 1).unwrap();
    }
    assert_eq!(*ftl.zone_state(0), ZoneState::Full);

    ftl.zns_reset(0).unwrap();
    assert_eq!(*ftl.zone_state(0), ZoneState::Empty);

    // Resetting an already-EMPTY zone is a protocol violation, not a panic.
    let err = ftl.zns_reset(0).unwrap_err();
    assert!(matches!(err, FtlError::ProtocolViolation(_)));
}

#[test]
fn tl_open_with_all_zero_bitmap_leaves_content_unchanged() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();
    let data = sector_pattern(0x33, BYTES_PER_SECTOR);

    for i in 0..ZONE_SIZE as u32 {
        host.fill_wbuf(0, &data);
        ftl.zns_write(&mut host, 0, i, 1).unwrap();
    }
    assert_eq!(*ftl.zone_state(0), ZoneState::Full);

    let bitmap = hybrid_ftl::zone::TlBitmap::from_bits(vec![false; DEG_ZONE * NPAGE]);
    ftl.zns_tl_open(0, bitmap).unwrap();
    assert_eq!(*ftl.zone_state(0), ZoneState::TlOpen);

    for i in 0..ZONE_SIZE as u32 {
        host.fill_wbuf(0, &data);
        ftl.zns_write(&mut host, 0, i, 1).unwrap();
    }
    assert_eq!(*ftl.zone_state(0), ZoneState::Full);

    ftl.zns_read(&mut host, 0, 0, 1).unwrap();
    assert_eq!(host.rbuf(0)[..BYTES_PER_SECTOR], data[..]);
}

#[test]
fn tl_open_single_bit_fills_exactly_one_page_from_source() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();
    let data = sector_pattern(0x44, BYTES_PER_SECTOR);

    for i in 0..ZONE_SIZE as u32 {
        host.fill_wbuf(0, &data);
        ftl.zns_write(&mut host, 0, i, 1).unwrap();
    }

    let mut bits = vec![false; DEG_ZONE * NPAGE];
    bits[3] = true;
    ftl.zns_tl_open(0, hybrid_ftl::zone::TlBitmap::from_bits(bits)).unwrap();

    // fill_tl only drains a *leading* run starting at TL_wp == 0; a single
    // bit at page 3 leaves the zone waiting on host writes for pages 0..3.
    assert_eq!(*ftl.zone_state(0), ZoneState::TlOpen);

    let patch = sector_pattern(0x55, BYTES_PER_SECTOR);
    for i in 0..(3 * NSECT) as u32 {
        host.fill_wbuf(0, &patch);
        ftl.zns_write(&mut host, 0, i, 1).unwrap();
    }

    // Writing through page 2 makes TL_wp reach page 3, whose bitmap bit is
    // set: fill_tl drains it automatically from the source, advancing past
    // it without any host write landing there directly.
    ftl.zns_read(&mut host, 0, 3 * NSECT as u32, 1).unwrap();
    assert_eq!(host.rbuf(0)[..BYTES_PER_SECTOR], data[..]);
    assert_eq!(*ftl.zone_state(0), ZoneState::TlOpen);
}

#[test]
fn izc_full_copy_reproduces_source_then_resets_it() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();
    let data = sector_pattern(0x77, BYTES_PER_SECTOR);

    for i in 0..ZONE_SIZE as u32 {
        host.fill_wbuf(0, &data);
        ftl.zns_write(&mut host, 0, i, 1).unwrap();
    }

    let indices: Vec<u32> = (0..(DEG_ZONE * NPAGE) as u32).collect();
    ftl.zns_izc(0, 1, &indices).unwrap();

    assert_eq!(*ftl.zone_state(0), ZoneState::Empty);
    assert_eq!(*ftl.zone_state(1), ZoneState::Full);

    ftl.zns_read(&mut host, 0, ZONE_SIZE as u32, 1).unwrap();
    assert_eq!(host.rbuf(0)[..BYTES_PER_SECTOR], data[..]);
}

#[test]
fn izc_partial_copy_leaves_destination_open_for_further_writes() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();
    let data = sector_pattern(0x66, BYTES_PER_SECTOR);

    for i in 0..ZONE_SIZE as u32 {
        host.fill_wbuf(0, &data);
        ftl.zns_write(&mut host, 0, i, 1).unwrap();
    }

    let indices: Vec<u32> = (0..(DEG_ZONE * NPAGE - 1) as u32).collect();
    ftl.zns_izc(0, 1, &indices).unwrap();
    assert_eq!(*ftl.zone_state(1), ZoneState::Open);

    // 511 of 512 pages were copied in; the zone's last page (8 sectors)
    // still needs a host write to complete it.
    let patch = sector_pattern(0x88, BYTES_PER_SECTOR);
    let last_page_start = ZONE_SIZE as u32 + (ZONE_SIZE as u32 - NSECT as u32);
    for s in 0..NSECT as u32 {
        host.fill_wbuf(0, &patch);
        ftl.zns_write(&mut host, 0, last_page_start + s, 1).unwrap();
    }
    assert_eq!(*ftl.zone_state(1), ZoneState::Full);
}

#[test]
fn dispatch_routes_random_and_zoned_commands_by_lba() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();
    let data = sector_pattern(0x12, BYTES_PER_SECTOR);
    host.fill_wbuf(0, &data);

    let write_cmd = HostCommand::decode(0, 1, true);
    ftl.execute(&mut host, write_cmd, 0, 0).unwrap();
    let read_cmd = HostCommand::decode(0, 1, false);
    ftl.execute(&mut host, read_cmd, 0, 0).unwrap();
    assert_eq!(host.rbuf(0)[..BYTES_PER_SECTOR], data[..]);

    host.fill_wbuf(0, &data);
    let zoned_write = HostCommand::decode(RAND_ZONE_END as u32, 1, true);
    ftl.execute(&mut host, zoned_write, 0, 0).unwrap();
    assert_eq!(*ftl.zone_state(0), ZoneState::Open);
}

#[test]
fn dispatch_get_zone_descriptors_reports_current_state() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();
    // GetZoneDescriptors' payload (zone_number, count) lives at byte offset
    // `magic_lba * BYTES_PER_SECTOR` in the write buffer, magic_lba == 7.
    host.fill_wbuf_at(0, 7 * BYTES_PER_SECTOR, &[0, 0, 0, 0, 2, 0, 0, 0]);

    let descriptors = ftl.execute(&mut host, HostCommand::GetZoneDescriptors, 0, 0).unwrap();
    assert_eq!(descriptors.len(), 2);
    assert_eq!(descriptors[0].zone_number, 0);
    assert_eq!(descriptors[1].zone_number, 1);
}

#[test]
fn format_mark_gates_format_vs_recovery() {
    let mut ftl = new_ftl();
    let mut host = MockHost::new();
    let data = sector_pattern(0xEE, SECTORS_PER_PAGE * BYTES_PER_SECTOR);
    host.fill_wbuf(0, &data);
    ftl.write(&mut host, 0, 0, SECTORS_PER_PAGE as u32).unwrap();
    ftl.flush().unwrap();

    // Re-booting over the same (already-formatted) NAND image must recover
    // the page map rather than silently reformatting over it.
    let mut recovered = Ftl::new(ftl.into_nand(), 8).unwrap();
    recovered.read(&mut host, 1, 0, SECTORS_PER_PAGE as u32).unwrap();
    assert_eq!(host.rbuf(1)[..data.len()], data[..]);
}

#[test]
fn bad_block_at_boot_is_excluded_from_fbg_queue() {
    let mut nand = MockNand::new();
    nand.mark_bad(0, 10);
    let ftl = Ftl::new(nand, 8).unwrap();
    assert!(!ftl.vcount_is_eligible(0, 10));
}

#[test]
fn runtime_bad_block_on_program_surfaces_as_error() {
    let mut nand = MockNand::new();
    // bank 0's first random-write vblock, per the format layout: right after
    // the meta blocks and the GC reserve.
    let first_write_vblock = hybrid_ftl::config::META_BLKS_PER_BANK + 1;
    nand.force_runtime_bad(0, first_write_vblock);
    let mut ftl = Ftl::new(nand, 8).unwrap();
    let mut host = MockHost::new();

    let data = sector_pattern(0x13, SECTORS_PER_PAGE * BYTES_PER_SECTOR);
    host.fill_wbuf(0, &data);
    let err = ftl.write(&mut host, 0, 0, SECTORS_PER_PAGE as u32).unwrap_err();
    assert!(matches!(err, FtlError::RuntimeBadBlock { bank: 0, vblock } if vblock == first_write_vblock));
}
