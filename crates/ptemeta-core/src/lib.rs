//! Core functionality for exercising per-PTE metadata.

pub mod arena;
pub mod codec;
mod core;
mod driver;
mod error;
pub mod model;
mod outcome;
pub mod pattern;
pub mod stats;

#[cfg(test)]
mod client_tests;

use std::{
    cell::{Ref, RefCell},
    time::{Duration, Instant},
};

pub use self::{
    arena::{MemoryRegion, PageArena},
    codec::{
        HeaderLayout, InlineMeta, InlineTag, InlineWord, Mdp, MetadataValue, StructuredHeader,
        StructuredMeta,
    },
    core::{Errno, PageGeometry, PageIndex, TableId, Va, host_page_size},
    driver::PteMetaDriver,
    error::{CodecError, PteMetaError, StateViolation},
    model::{Call, Lifecycle, ModelConfig, PageTableModel, Prediction, UnsetRead},
    outcome::{
        ClassifierRule, ErrnoClassifier, ErrorKind, Operation, OperationKind, OperationOutcome,
        OutcomeClass,
    },
    pattern::PatternOracle,
    stats::{StatsCollector, Summary},
};

/// Typed access to the four metadata operations.
///
/// Wraps a [`PteMetaDriver`], classifies raw error numbers into
/// [`ErrorKind`]s and times every call, including failed ones.
///
/// Calls that the collaborator rejected are reported as the inner
/// [`OperationOutcome`]. The outer `Result` carries failures that happen on
/// the harness side, such as a value that cannot be encoded or a buffer
/// that cannot be decoded.
pub struct MetaClient<Driver>
where
    Driver: PteMetaDriver,
{
    driver: Driver,
    classifier: ErrnoClassifier,
    layout: HeaderLayout,
    stats: RefCell<StatsCollector>,
}

impl<Driver> MetaClient<Driver>
where
    Driver: PteMetaDriver,
{
    /// Creates a new client with the default classifier and the
    /// [`HeaderLayout::Compact`] structured layout.
    pub fn new(driver: Driver) -> Self {
        Self {
            driver,
            classifier: ErrnoClassifier::default(),
            layout: HeaderLayout::default(),
            stats: RefCell::new(StatsCollector::new()),
        }
    }

    /// Replaces the error classifier.
    pub fn with_classifier(self, classifier: ErrnoClassifier) -> Self {
        Self { classifier, ..self }
    }

    /// Sets the header layout of structured metadata.
    pub fn with_header_layout(self, layout: HeaderLayout) -> Self {
        Self { layout, ..self }
    }

    /// Returns the driver.
    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    /// Returns the error classifier.
    pub fn classifier(&self) -> &ErrnoClassifier {
        &self.classifier
    }

    /// Returns the header layout of structured metadata.
    pub fn header_layout(&self) -> HeaderLayout {
        self.layout
    }

    /// Returns the timings recorded so far.
    pub fn stats(&self) -> Ref<'_, StatsCollector> {
        self.stats.borrow()
    }

    /// Takes the timings recorded so far, leaving an empty collector.
    pub fn take_stats(&self) -> StatsCollector {
        self.stats.take()
    }

    /// Records a timing that was measured outside the client.
    pub fn record(&self, name: &'static str, duration: Duration) {
        self.stats.borrow_mut().record(name, duration);
    }

    /// Expands the page table mapping `va`.
    pub fn enable(&self, va: Va) -> OperationOutcome<()> {
        self.timed(va, Operation::Enable, || self.driver.enable(va))
    }

    /// Tears down the metadata of the page table mapping `va`.
    pub fn disable(&self, va: Va) -> OperationOutcome<()> {
        self.timed(va, Operation::Disable, || self.driver.disable(va))
    }

    /// Attaches metadata to the page containing `va`.
    ///
    /// The encoding mode follows the variant of `value`.
    pub fn set(
        &self,
        va: Va,
        value: &MetadataValue,
    ) -> Result<OperationOutcome<()>, PteMetaError> {
        match value {
            MetadataValue::Inline(meta) => self.set_inline(va, *meta),
            MetadataValue::Structured(meta) => self.set_structured(va, meta),
        }
    }

    /// Attaches inline metadata to the page containing `va`.
    pub fn set_inline(
        &self,
        va: Va,
        meta: InlineMeta,
    ) -> Result<OperationOutcome<()>, PteMetaError> {
        let word = meta.encode()?;

        Ok(self.timed(va, Operation::Set(Mdp::Inline), || {
            self.driver.set_inline(va, word)
        }))
    }

    /// Attaches structured metadata to the page containing `va`.
    pub fn set_structured(
        &self,
        va: Va,
        meta: &StructuredMeta,
    ) -> Result<OperationOutcome<()>, PteMetaError> {
        let buffer = meta.encode(self.layout)?;

        Ok(self.timed(va, Operation::Set(Mdp::Structured), || {
            self.driver.set_structured(va, &buffer)
        }))
    }

    /// Retrieves the metadata of the page containing `va`.
    ///
    /// `payload_len` sizes the buffer for structured metadata and is ignored
    /// for inline metadata.
    pub fn get(
        &self,
        va: Va,
        mdp: Mdp,
        payload_len: usize,
    ) -> Result<OperationOutcome<MetadataValue>, PteMetaError> {
        match mdp {
            Mdp::Inline => Ok(self.get_inline(va).map(MetadataValue::Inline)),
            Mdp::Structured => Ok(self
                .get_structured(va, payload_len)?
                .map(MetadataValue::Structured)),
        }
    }

    /// Retrieves the inline metadata of the page containing `va`.
    pub fn get_inline(&self, va: Va) -> OperationOutcome<InlineMeta> {
        self.timed(va, Operation::Get(Mdp::Inline), || self.driver.get_inline(va))
            .map(InlineMeta::decode)
    }

    /// Retrieves the structured metadata of the page containing `va`.
    ///
    /// The buffer handed to the collaborator holds the header and exactly
    /// `payload_len` payload bytes.
    pub fn get_structured(
        &self,
        va: Va,
        payload_len: usize,
    ) -> Result<OperationOutcome<StructuredMeta>, PteMetaError> {
        let mut buffer = vec![0u8; self.layout.header_len() + payload_len];

        let outcome = self.timed(va, Operation::Get(Mdp::Structured), || {
            self.driver.get_structured(va, &mut buffer)
        });

        match outcome {
            Ok(()) => Ok(Ok(StructuredMeta::decode(&buffer, self.layout)?)),
            Err(kind) => Ok(Err(kind)),
        }
    }

    fn timed<T>(
        &self,
        va: Va,
        operation: Operation,
        f: impl FnOnce() -> Result<T, Errno>,
    ) -> OperationOutcome<T> {
        let start = Instant::now();
        let result = f();
        let elapsed = start.elapsed();

        self.record(operation.name(), elapsed);

        match result {
            Ok(value) => {
                tracing::trace!(%va, %operation, ?elapsed, "call succeeded");
                Ok(value)
            }
            Err(errno) => {
                let kind = self.classifier.classify(operation, errno);
                tracing::trace!(%va, %operation, %errno, %kind, ?elapsed, "call failed");
                Err(kind)
            }
        }
    }
}
