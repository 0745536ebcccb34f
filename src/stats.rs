//! Per-bank counters (spec.md §6 "Stats").

use alloc::vec::Vec;

use crate::config::NUM_BANKS;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BankStats {
    pub gc_cnt: u32,
    pub gc_write: u32,
    pub host_write: u32,
    pub nand_write: u32,
    pub page_wcount: u32,
}

#[derive(Debug, Clone)]
pub struct Stats {
    per_bank: Vec<BankStats>,
}

impl Stats {
    pub fn new() -> Self {
        Self { per_bank: alloc::vec![BankStats::default(); NUM_BANKS] }
    }

    pub fn bank(&self, bank: usize) -> &BankStats {
        &self.per_bank[bank]
    }

    pub(crate) fn bank_mut(&mut self, bank: usize) -> &mut BankStats {
        &mut self.per_bank[bank]
    }

    pub fn all(&self) -> &[BankStats] {
        &self.per_bank
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}
