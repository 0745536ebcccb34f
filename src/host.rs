//! Host command surface (spec.md §6).
//!
//! The wire protocol overloads a handful of sentinel `(lba, num_sectors)`
//! pairs as administrative commands. `HostCommand::decode` is the one place
//! that overloading is known; every other module only ever sees the decoded
//! enum (REDESIGN FLAG: "a clean reimplementation exposes them as distinct
//! administrative commands rather than overloading the data path").

use crate::config::RAND_ZONE_END;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCommand {
    /// Ordinary read/write against the page-mapped random region.
    RandomIo { lba: u32, num_sectors: u32, write: bool },
    /// Ordinary read/write against the zoned region.
    ZonedIo { lba: u32, num_sectors: u32, write: bool },
    /// Dump per-bank statistics on read.
    DumpStats,
    /// Reset a zone (payload: `u32 zone`, read from the write buffer at offset `lba * BYTES_PER_SECTOR`).
    ZoneReset,
    /// Get zone descriptors (payload: `u32 zone_number, u32 count`).
    GetZoneDescriptors,
    /// Internal zone compaction (payload: `u32 src, u32 dst, u32 copy_len, u32 list[copy_len]`).
    Izc,
    /// TL open (payload: `u32 src, u8 bitmap[DEG_ZONE * NPAGE]`).
    TlOpen,
}

impl HostCommand {
    pub fn decode(lba: u32, num_sectors: u32, write: bool) -> Self {
        match (lba, num_sectors) {
            (7, 7) => Self::DumpStats,
            (7, 11) => Self::ZoneReset,
            (7, 13) => Self::GetZoneDescriptors,
            (1, 31) => Self::Izc,
            (3, 29) => Self::TlOpen,
            _ if (lba as usize) < RAND_ZONE_END => Self::RandomIo { lba, num_sectors, write },
            _ => Self::ZonedIo { lba, num_sectors, write },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_commands_take_priority_over_range() {
        assert_eq!(HostCommand::decode(7, 7, false), HostCommand::DumpStats);
        assert_eq!(HostCommand::decode(7, 11, true), HostCommand::ZoneReset);
        assert_eq!(HostCommand::decode(7, 13, false), HostCommand::GetZoneDescriptors);
        assert_eq!(HostCommand::decode(1, 31, true), HostCommand::Izc);
        assert_eq!(HostCommand::decode(3, 29, true), HostCommand::TlOpen);
    }

    #[test]
    fn ordinary_lbas_split_on_rand_zone_end() {
        assert_eq!(
            HostCommand::decode(0, 1, true),
            HostCommand::RandomIo { lba: 0, num_sectors: 1, write: true }
        );
        assert_eq!(
            HostCommand::decode(RAND_ZONE_END as u32, 1, false),
            HostCommand::ZonedIo { lba: RAND_ZONE_END as u32, num_sectors: 1, write: false }
        );
    }
}
