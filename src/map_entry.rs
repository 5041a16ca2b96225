//! `MapEntry`: one virtual-address-range mapping inside a process, owning
//! a shared handle to the [`crate::dso::Dso`] backing it.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dso::Dso;

#[derive(Debug, Clone)]
pub struct MapEntry {
    pub start_addr: u64,
    pub len: u64,
    pub pgoff: u64,
    pub time_installed: u64,
    pub dso: Rc<RefCell<Dso>>,
}

impl MapEntry {
    pub fn end_addr(&self) -> u64 {
        self.start_addr.saturating_add(self.len)
    }

    pub fn contains(&self, addr: u64) -> bool {
        self.start_addr <= addr && addr < self.end_addr()
    }
}
