use std::{cell::RefCell, collections::HashMap};

use ptemeta_core::{PageGeometry, PageIndex, TableId, UnsetRead, Va};

use crate::{Error, SimConfig, SimFaults};

/// Metadata stored for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stored {
    /// Packed inline word.
    Inline(u64),

    /// Encoded header and payload.
    Structured(Vec<u8>),
}

#[derive(Debug, Default)]
struct SimTable {
    expanded: bool,
    pages: HashMap<PageIndex, Stored>,
}

/// In-memory collaborator state.
pub struct SimCollaborator {
    config: SimConfig,
    geometry: PageGeometry,
    tables: RefCell<HashMap<TableId, SimTable>>,
}

impl SimCollaborator {
    pub fn new(config: SimConfig, geometry: PageGeometry) -> Self {
        Self {
            config,
            geometry,
            tables: RefCell::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn is_expanded(&self, va: Va) -> bool {
        self.tables
            .borrow()
            .get(&self.geometry.table_of(va))
            .is_some_and(|table| table.expanded)
    }

    pub fn stored(&self, va: Va) -> Option<Stored> {
        let (table, slot) = self.locate(va);
        self.tables.borrow().get(&table)?.pages.get(&slot).cloned()
    }

    pub fn enable(&self, va: Va) -> Result<(), Error> {
        let (table, _) = self.locate(va);
        let mut tables = self.tables.borrow_mut();
        let state = tables.entry(table).or_default();

        if state.expanded && !self.config.faults.contains(SimFaults::PERMISSIVE_ENABLE) {
            return Err(Error::AlreadyExpanded);
        }

        self.expand(table, state);
        Ok(())
    }

    pub fn disable(&self, va: Va) -> Result<(), Error> {
        let (table, _) = self.locate(va);
        let mut tables = self.tables.borrow_mut();

        let state = match tables.get_mut(&table) {
            Some(state) if state.expanded => state,
            _ => return Err(Error::NotExpanded),
        };

        state.expanded = false;
        if !self.config.faults.contains(SimFaults::STICKY_METADATA) {
            state.pages.clear();
        }

        tracing::trace!(%table, "sim: table torn down");
        Ok(())
    }

    pub fn set(&self, va: Va, stored: Stored) -> Result<(), Error> {
        let (table, slot) = self.locate(va);
        let mut tables = self.tables.borrow_mut();
        let state = tables.entry(table).or_default();

        if !state.expanded {
            if !self.config.auto_expand_on_set {
                return Err(Error::NoTable);
            }

            self.expand(table, state);
        }

        state.pages.insert(slot, stored);
        Ok(())
    }

    pub fn get_inline(&self, va: Va) -> Result<u64, Error> {
        let (table, slot) = self.locate(va);
        let tables = self.tables.borrow();

        let state = match tables.get(&table) {
            Some(state) if state.expanded => state,
            _ => return Err(Error::NoData),
        };

        match state.pages.get(&slot) {
            Some(Stored::Inline(word)) => Ok(self.corrupt_word(*word)),
            Some(Stored::Structured(_)) => Err(Error::Malformed),
            None => match self.config.unset_read {
                UnsetRead::Zeroed => Ok(0),
                UnsetRead::NoData => Err(Error::NoData),
            },
        }
    }

    pub fn get_structured(&self, va: Va, buffer: &mut [u8]) -> Result<(), Error> {
        let (table, slot) = self.locate(va);
        let tables = self.tables.borrow();

        let state = match tables.get(&table) {
            Some(state) if state.expanded => state,
            _ => return Err(Error::NoData),
        };

        let stored = match state.pages.get(&slot) {
            Some(Stored::Structured(stored)) => stored,
            Some(Stored::Inline(_)) => return Err(Error::Malformed),
            None => return Err(Error::NoData),
        };

        if buffer.len() < stored.len() {
            return Err(Error::Malformed);
        }

        buffer[..stored.len()].copy_from_slice(stored);
        buffer[stored.len()..].fill(0);

        if self.config.faults.contains(SimFaults::CORRUPT_PAYLOAD)
            && let Some(last) = buffer[..stored.len()].last_mut()
        {
            *last ^= 0xff;
        }

        Ok(())
    }

    /// Validates a structured buffer against the configured layout.
    pub fn check_structured(&self, buffer: &[u8]) -> Result<(), Error> {
        let (header, payload) = self
            .config
            .header_layout
            .read_header(buffer)
            .map_err(|_| Error::Malformed)?;

        if header.length as usize != payload.len() {
            return Err(Error::Malformed);
        }

        Ok(())
    }

    fn locate(&self, va: Va) -> (TableId, PageIndex) {
        let table = self.geometry.table_of(va);
        let slot = if self.config.faults.contains(SimFaults::SHARED_SLOT) {
            PageIndex(0)
        }
        else {
            self.geometry.page_index(va)
        };

        (table, slot)
    }

    fn expand(&self, table: TableId, state: &mut SimTable) {
        if !self.config.expansion_cost.is_zero() {
            std::thread::sleep(self.config.expansion_cost);
        }

        state.expanded = true;
        tracing::trace!(%table, "sim: table expanded");
    }

    fn corrupt_word(&self, word: u64) -> u64 {
        if self.config.faults.contains(SimFaults::CORRUPT_PAYLOAD) {
            word ^ 1
        }
        else {
            word
        }
    }
}
