use ptemeta_core::{
    ErrnoClassifier, HeaderLayout, ModelConfig, PageGeometry, PteMetaError,
    pattern::{PatternFn, low_byte},
};
use serde::{Deserialize, Serialize};

/// Configuration of a [`ScenarioRunner`](crate::ScenarioRunner) and of the
/// scenario catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Page size in bytes, or `None` for the page size of the host.
    pub page_size: Option<u64>,

    /// Whether regions are pinned in physical memory.
    pub pin_memory: bool,

    /// Header layout of structured metadata.
    pub header_layout: HeaderLayout,

    /// Iterations of the stress scenarios.
    pub stress_iterations: u32,

    /// Contract choices for scenarios that do not depend on them.
    pub model: ModelConfig,

    /// Classification of raw error numbers.
    pub classifier: ErrnoClassifier,

    /// Pattern stamped into every region.
    #[serde(skip, default = "default_pattern")]
    pub pattern: PatternFn,
}

fn default_pattern() -> PatternFn {
    low_byte
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            page_size: None,
            pin_memory: true,
            header_layout: HeaderLayout::default(),
            stress_iterations: 10_000,
            model: ModelConfig::default(),
            classifier: ErrnoClassifier::default(),
            pattern: default_pattern(),
        }
    }
}

impl HarnessConfig {
    /// Returns the page geometry.
    pub fn geometry(&self) -> Result<PageGeometry, PteMetaError> {
        match self.page_size {
            Some(page_size) => PageGeometry::new(page_size),
            None => PageGeometry::host(),
        }
    }

    /// Sets the page size.
    pub fn with_page_size(self, page_size: u64) -> Self {
        Self {
            page_size: Some(page_size),
            ..self
        }
    }

    /// Sets whether regions are pinned.
    pub fn with_pinning(self, pin_memory: bool) -> Self {
        Self { pin_memory, ..self }
    }

    /// Sets the header layout of structured metadata.
    pub fn with_header_layout(self, header_layout: HeaderLayout) -> Self {
        Self {
            header_layout,
            ..self
        }
    }

    /// Sets the iterations of the stress scenarios.
    pub fn with_stress_iterations(self, stress_iterations: u32) -> Self {
        Self {
            stress_iterations,
            ..self
        }
    }

    /// Sets the contract choices for contract-neutral scenarios.
    pub fn with_model(self, model: ModelConfig) -> Self {
        Self { model, ..self }
    }

    /// Replaces the error classifier.
    pub fn with_classifier(self, classifier: ErrnoClassifier) -> Self {
        Self { classifier, ..self }
    }

    /// Replaces the pattern.
    pub fn with_pattern(self, pattern: PatternFn) -> Self {
        Self { pattern, ..self }
    }
}
