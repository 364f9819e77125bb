use std::time::Duration;

use ptemeta_core::{HeaderLayout, ModelConfig, UnsetRead, host_page_size};
use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Deliberate contract violations of the simulated collaborator.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct SimFaults: u8 {
        /// Retrieved metadata differs from what was stored.
        const CORRUPT_PAYLOAD = 1 << 0;

        /// All pages of a table share one metadata slot.
        const SHARED_SLOT = 1 << 1;

        /// Disabling a table keeps its metadata.
        const STICKY_METADATA = 1 << 2;

        /// Enabling an expanded table succeeds.
        const PERMISSIVE_ENABLE = 1 << 3;
    }
}

/// Page size used when the host does not report one.
const FALLBACK_PAGE_SIZE: u64 = 4096;

/// Configuration of the simulated collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Page size in bytes. Defaults to the page size of the host.
    pub page_size: u64,

    /// Whether `set` on an unexpanded table expands it.
    pub auto_expand_on_set: bool,

    /// Outcome of reading an unset page on an expanded table.
    pub unset_read: UnsetRead,

    /// Header layout accepted for structured metadata.
    pub header_layout: HeaderLayout,

    /// Time spent expanding a table.
    pub expansion_cost: Duration,

    /// Injected faults.
    pub faults: SimFaults,
}

impl Default for SimConfig {
    fn default() -> Self {
        let model = ModelConfig::default();

        Self {
            page_size: host_page_size().unwrap_or(FALLBACK_PAGE_SIZE),
            auto_expand_on_set: model.auto_expand_on_set,
            unset_read: model.unset_read,
            header_layout: HeaderLayout::default(),
            expansion_cost: Duration::from_micros(50),
            faults: SimFaults::empty(),
        }
    }
}

impl SimConfig {
    /// Sets the page size.
    pub fn with_page_size(self, page_size: u64) -> Self {
        Self { page_size, ..self }
    }

    /// Adopts the contract choices of a model configuration.
    pub fn with_model(self, model: ModelConfig) -> Self {
        Self {
            auto_expand_on_set: model.auto_expand_on_set,
            unset_read: model.unset_read,
            ..self
        }
    }

    /// Sets whether `set` on an unexpanded table expands it.
    pub fn with_auto_expand_on_set(self, auto_expand_on_set: bool) -> Self {
        Self {
            auto_expand_on_set,
            ..self
        }
    }

    /// Sets the outcome of reading an unset page.
    pub fn with_unset_read(self, unset_read: UnsetRead) -> Self {
        Self { unset_read, ..self }
    }

    /// Sets the accepted header layout.
    pub fn with_header_layout(self, header_layout: HeaderLayout) -> Self {
        Self {
            header_layout,
            ..self
        }
    }

    /// Sets the time spent expanding a table.
    pub fn with_expansion_cost(self, expansion_cost: Duration) -> Self {
        Self {
            expansion_cost,
            ..self
        }
    }

    /// Sets the injected faults.
    pub fn with_faults(self, faults: SimFaults) -> Self {
        Self { faults, ..self }
    }
}
