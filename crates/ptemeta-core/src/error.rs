use crate::{
    Errno, HeaderLayout, Lifecycle, MetadataValue, Operation, OutcomeClass, PageIndex, TableId, Va,
};

/// An error that can occur while exercising the metadata collaborator.
///
/// Every variant except [`Io`](Self::Io) is a verdict about the
/// collaborator and ends the scenario that produced it.
#[derive(thiserror::Error, Debug)]
pub enum PteMetaError {
    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The memory region could not be allocated, aligned or pinned.
    #[error("Failed to allocate {pages} page(s): {source}")]
    Allocation {
        /// Number of pages requested.
        pages: usize,

        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// Ordinary page contents changed.
    #[error(
        "Pattern mismatch {stage} at offset {offset:#x} \
         (expected {expected:#04x}, observed {observed:#04x})"
    )]
    PatternMismatch {
        /// Stage at which the mismatch was observed.
        stage: String,

        /// Offset of the first mismatching byte.
        offset: usize,

        /// Byte produced by the pattern.
        expected: u8,

        /// Byte found in memory.
        observed: u8,
    },

    /// An ABI call produced an outcome the step did not expect.
    #[error("{operation} at {va}: expected {expected}, observed {observed}")]
    Abi {
        /// The operation.
        operation: Operation,

        /// Address passed to the operation.
        va: Va,

        /// Expected outcome.
        expected: OutcomeClass,

        /// Observed outcome.
        observed: OutcomeClass,
    },

    /// Metadata could not be encoded or decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The collaborator disagreed with the lifecycle model.
    #[error("{0}")]
    StateViolation(Box<StateViolation>),

    /// A scenario-level assertion did not hold.
    #[error("Assertion `{assertion}` failed: {detail}")]
    AssertionFailed {
        /// Name of the assertion.
        assertion: String,

        /// What was observed.
        detail: String,
    },

    /// The page size is not a power of two or too small.
    #[error("Invalid page size {0:#x}")]
    InvalidPageSize(u64),

    /// Operation not supported.
    #[error("Operation not supported.")]
    NotSupported,

    /// Other error.
    #[error("{0}")]
    Other(&'static str),
}

/// An outcome inconsistent with the lifecycle model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateViolation {
    /// Page table the operation addressed.
    pub table: TableId,

    /// Page within the table.
    pub page: PageIndex,

    /// The operation.
    pub operation: Operation,

    /// Lifecycle state the model held before the operation.
    pub state: Lifecycle,

    /// Outcome the model predicted.
    pub expected: OutcomeClass,

    /// Outcome the collaborator produced.
    pub observed: OutcomeClass,
}

impl std::fmt::Display for StateViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "State violation: {} on table {} page {} in state {:?}: expected {}, observed {}",
            self.operation, self.table, self.page, self.state, self.expected, self.observed
        )
    }
}

impl From<Errno> for PteMetaError {
    fn from(value: Errno) -> Self {
        Self::Io(value.into())
    }
}

impl From<StateViolation> for PteMetaError {
    fn from(value: StateViolation) -> Self {
        Self::StateViolation(Box::new(value))
    }
}

/// An error produced by the metadata codec.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// An inline value does not fit into the value bits.
    #[error("Inline value {value:#x} does not fit into 63 bits")]
    ValueOverflow {
        /// The rejected value.
        value: u64,
    },

    /// A header field does not fit into the chosen layout.
    #[error("Header field `{field}` value {value:#x} does not fit into {layout:?} layout")]
    FieldOverflow {
        /// Name of the field.
        field: &'static str,

        /// The rejected value.
        value: u64,

        /// Layout that was used.
        layout: HeaderLayout,
    },

    /// The buffer is shorter than the header.
    #[error("Buffer truncated: {available} byte(s) available, {required} required")]
    Truncated {
        /// Bytes needed for the header.
        required: usize,

        /// Bytes in the buffer.
        available: usize,
    },

    /// The declared payload length differs from the bytes present.
    #[error("Declared payload length {declared} differs from {available} available byte(s)")]
    LengthMismatch {
        /// Length from the header.
        declared: u64,

        /// Bytes following the header.
        available: usize,
    },

    /// The reserved header word is not zero.
    #[error("Reserved header word is {0:#x}")]
    ReservedNotZero(u32),

    /// Metadata read back differs from what was written.
    #[error("Round trip mismatch: wrote {written:?}, read {read:?}")]
    RoundTrip {
        /// Metadata written.
        written: Box<MetadataValue>,

        /// Metadata read back.
        read: Box<MetadataValue>,
    },
}
