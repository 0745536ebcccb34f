use core::fmt::{self, Display};

/// Errors raised by the FTL core.
///
/// Configuration-assertion variants correspond to the spec's "fatal,
/// precondition-violating" error kind: callers are expected to treat them as
/// unrecoverable. The other variants are recoverable/advisory and are
/// returned to the caller rather than propagated as a panic, so a host-side
/// integration can log and carry on the way the original ISR does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtlError {
    /// A bank index was outside `[0, NUM_BANKS)`.
    BadBank(usize),
    /// A logical page number was outside the random region.
    BadLpn(u32),
    /// A virtual page number violated the `META_BLKS_PER_BANK <= vpn < rand_write_blks * PAGES_PER_BLK` invariant.
    BadVpn(u32),
    /// A zone number was outside `[0, NZONE)`.
    BadZone(u32),
    /// The FBG free-block queue was empty when a caller needed a block.
    OutOfFreeBlocks,
    /// `OPEN_ZONE` was already at `MAX_OPEN_ZONE`.
    TooManyOpenZones,
    /// A read hit a page the NAND controller reported as uncorrectable.
    UncorrectableRead { bank: usize, vblock: usize, page: usize },
    /// A program or erase failed against a block outside the known bad-block set.
    RuntimeBadBlock { bank: usize, vblock: usize },
    /// A zoned-protocol violation: out-of-order sector, write to a FULL zone,
    /// write to a bitmap-set page during TL_OPEN, IZC/TL-open against zones
    /// in the wrong state. The spec requires these be quietly dropped rather
    /// than propagated to the host, but the FTL still reports them so a
    /// caller can count/log without the command path deadlocking.
    ProtocolViolation(ProtocolViolation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolViolation {
    OutOfOrderWrite { expected: u32, got: u32 },
    WriteToFullZone,
    WriteToTlReservedPage,
    IzcWrongState,
    TlOpenWrongState,
}

impl Display for FtlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadBank(b) => write!(f, "bank {b} out of range"),
            Self::BadLpn(lpn) => write!(f, "lpn {lpn} out of range"),
            Self::BadVpn(vpn) => write!(f, "vpn {vpn} violates vpn range invariant"),
            Self::BadZone(z) => write!(f, "zone {z} out of range"),
            Self::OutOfFreeBlocks => write!(f, "FBG free-block queue is empty"),
            Self::TooManyOpenZones => write!(f, "OPEN_ZONE already at MAX_OPEN_ZONE"),
            Self::UncorrectableRead { bank, vblock, page } => {
                write!(f, "uncorrectable read at bank {bank} vblock {vblock} page {page}")
            }
            Self::RuntimeBadBlock { bank, vblock } => {
                write!(f, "runtime bad block at bank {bank} vblock {vblock}")
            }
            Self::ProtocolViolation(v) => write!(f, "zoned protocol violation: {v:?}"),
        }
    }
}

impl core::error::Error for FtlError {}
