//! Flash geometry. The original firmware fixes every one of these with a
//! `#define`; we keep that shape as `pub const` items rather than a runtime
//! config struct, since the geometry is a property of the NAND package and
//! controller wiring, not something chosen per boot.

/// Size in bytes of one host-addressable sector.
pub const BYTES_PER_SECTOR: usize = 512;
/// Sectors held by a single NAND page.
pub const SECTORS_PER_PAGE: usize = 8;
/// Bytes held by a single NAND page.
pub const BYTES_PER_PAGE: usize = BYTES_PER_SECTOR * SECTORS_PER_PAGE;
/// Pages per virtual block (one block spans all planes of one die, one bank).
pub const PAGES_PER_BLK: usize = 128;

/// Independent NAND dies operating in parallel.
pub const NUM_BANKS: usize = 8;
/// Virtual blocks per bank.
pub const VBLKS_PER_BANK: usize = 64;
/// Total virtual blocks across all banks.
pub const NUM_VBLKS: usize = NUM_BANKS * VBLKS_PER_BANK;

/// Sentinel vcount marking a bad, reserved/meta, or GC-reserve block.
/// Kept as a real sentinel because the vcount table's on-DRAM encoding is a
/// fixed-width `u16`; everywhere the value crosses an API boundary it is
/// re-expressed as `Option`/an enum instead (see `dram::Vcount`).
pub const VC_MAX: u16 = 0xCDCD;

/// Block #0 holds the vendor scan list and firmware image.
pub const SCAN_LIST_VBN: usize = 0;
/// Block #1 holds the misc/vcount metadata log.
pub const MISCBLK_VBN: usize = 1;
/// Blocks #2..#2+MAPBLKS_PER_BANK hold the paged-out page map.
pub const MAPBLKS_PER_BANK: usize = 2;
/// Reserved (non-user) blocks at the head of every bank: scan list, misc log,
/// map blocks.
pub const META_BLKS_PER_BANK: usize = 1 + 1 + MAPBLKS_PER_BANK;

/// Host read/write buffer ring depth (SATA DMA buffer slots).
pub const NUM_RD_BUFFERS: usize = 4;
pub const NUM_WR_BUFFERS: usize = 4;

// --- Zoned region geometry -------------------------------------------------

/// Sectors per zone page; equal to the page geometry above.
pub const NSECT: usize = SECTORS_PER_PAGE;
/// Pages per zone block; equal to one virtual block.
pub const NPAGE: usize = PAGES_PER_BLK;
/// Banks spanned by one zone (one "bank group").
pub const DEG_ZONE: usize = 4;
/// Independent bank groups, each capable of hosting its own zones in parallel.
pub const NUM_FCG: usize = NUM_BANKS / DEG_ZONE;
/// Sectors in one zone: `DEG_ZONE` banks worth of `NPAGE` pages of `NSECT` sectors.
pub const ZONE_SIZE: usize = DEG_ZONE * NPAGE * NSECT;
/// Number of zones in the zoned region.
pub const NZONE: usize = 10;
/// LBA at which the zoned region begins; everything below is page-mapped.
pub const RAND_ZONE_END: usize = 6 * ZONE_SIZE;
/// Total host-visible logical sectors.
pub const NUM_LSECTORS: usize = RAND_ZONE_END + NZONE * ZONE_SIZE;
/// Logical pages in the random-write region.
pub const NUM_LPAGES: usize = RAND_ZONE_END / SECTORS_PER_PAGE;

/// Maximum zones that may be OPEN or TL_OPEN simultaneously; bounded by the
/// number of page-buffer slots in DRAM.
pub const MAX_OPEN_ZONE: usize = 4;
/// Capacity of the FBG free-block queue: one slot per block available to a
/// bank group.
pub const NBLK: usize = VBLKS_PER_BANK;

const _: () = assert!(NUM_BANKS % DEG_ZONE == 0, "DEG_ZONE must evenly divide NUM_BANKS");
const _: () = assert!(RAND_ZONE_END % SECTORS_PER_PAGE == 0);
