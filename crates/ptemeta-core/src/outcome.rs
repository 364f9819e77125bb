use serde::{Deserialize, Serialize};

use crate::{Errno, Mdp};

/// An operation of the metadata ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Expand a page table so it can hold per-page metadata.
    Enable,

    /// Tear down the metadata of a page table.
    Disable,

    /// Attach metadata to a page.
    Set(Mdp),

    /// Retrieve the metadata of a page.
    Get(Mdp),
}

/// An operation without its encoding mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// See [`Operation::Enable`].
    Enable,

    /// See [`Operation::Disable`].
    Disable,

    /// See [`Operation::Set`].
    Set,

    /// See [`Operation::Get`].
    Get,
}

impl Operation {
    /// Returns the operation without its encoding mode.
    pub fn kind(self) -> OperationKind {
        match self {
            Self::Enable => OperationKind::Enable,
            Self::Disable => OperationKind::Disable,
            Self::Set(_) => OperationKind::Set,
            Self::Get(_) => OperationKind::Get,
        }
    }

    /// Returns the name under which timings of this operation are recorded.
    pub fn name(self) -> &'static str {
        match self {
            Self::Enable => "enable_pte_meta",
            Self::Disable => "disable_pte_meta",
            Self::Set(Mdp::Inline) => "set_pte_meta mdp=0",
            Self::Set(Mdp::Structured) => "set_pte_meta mdp=1",
            Self::Get(Mdp::Inline) => "get_pte_meta mdp=0",
            Self::Get(Mdp::Structured) => "get_pte_meta mdp=1",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Classified failure of an ABI operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The page table is already expanded.
    AlreadyExpanded,

    /// The page table is not expanded.
    NotExpanded,

    /// No metadata was ever set for the page.
    NoData,

    /// The arguments were malformed.
    InvalidArgument,

    /// Access was denied.
    PermissionDenied,

    /// Any other failure, preserved verbatim.
    Other(Errno),
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::AlreadyExpanded => f.write_str("AlreadyExpanded"),
            Self::NotExpanded => f.write_str("NotExpanded"),
            Self::NoData => f.write_str("NoData"),
            Self::InvalidArgument => f.write_str("InvalidArgument"),
            Self::PermissionDenied => f.write_str("PermissionDenied"),
            Self::Other(errno) => write!(f, "Other({errno})"),
        }
    }
}

/// Result of a single ABI call.
pub type OperationOutcome<T> = Result<T, ErrorKind>;

/// Success or failure of an ABI call, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeClass {
    /// The call succeeded.
    Success,

    /// The call failed.
    Failure(ErrorKind),
}

impl<T> From<&OperationOutcome<T>> for OutcomeClass {
    fn from(value: &OperationOutcome<T>) -> Self {
        match value {
            Ok(_) => Self::Success,
            Err(kind) => Self::Failure(*kind),
        }
    }
}

impl std::fmt::Display for OutcomeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failure(kind) => write!(f, "failure ({kind})"),
        }
    }
}

/// A single classification rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierRule {
    /// Operation the rule applies to, or `None` for every operation.
    pub operation: Option<OperationKind>,

    /// Raw error number to match.
    pub errno: Errno,

    /// Resulting classification.
    pub kind: ErrorKind,
}

/// Maps raw error numbers to [`ErrorKind`]s.
///
/// Rules are matched in order; the first rule whose operation filter and
/// error number match wins. Unmatched error numbers become
/// [`ErrorKind::Other`].
///
/// The same error number can mean different things for different
/// operations: `EINVAL` from `disable` signals a table that was never
/// expanded, while `EINVAL` from `set` signals a malformed argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrnoClassifier {
    rules: Vec<ClassifierRule>,
}

impl Default for ErrnoClassifier {
    fn default() -> Self {
        use ErrorKind::*;

        Self::empty()
            .with_rule(None, Errno::EACCES, PermissionDenied)
            .with_rule(None, Errno::EPERM, PermissionDenied)
            .with_rule(None, Errno::EINVAL, InvalidArgument)
            .with_rule(None, Errno::ENODATA, NoData)
            .with_rule(None, Errno::ENOENT, NotExpanded)
            .with_rule(Some(OperationKind::Disable), Errno::EINVAL, NotExpanded)
            .with_rule(None, Errno::EEXIST, AlreadyExpanded)
    }
}

impl ErrnoClassifier {
    /// Creates a classifier without rules; everything becomes
    /// [`ErrorKind::Other`].
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Adds a rule that takes precedence over all existing rules.
    pub fn with_rule(
        mut self,
        operation: Option<OperationKind>,
        errno: Errno,
        kind: ErrorKind,
    ) -> Self {
        self.rules.insert(
            0,
            ClassifierRule {
                operation,
                errno,
                kind,
            },
        );
        self
    }

    /// Returns the rules in match order.
    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    /// Classifies a raw error number returned by `operation`.
    pub fn classify(&self, operation: Operation, errno: Errno) -> ErrorKind {
        let kind = operation.kind();

        self.rules
            .iter()
            .find(|rule| rule.errno == errno && rule.operation.is_none_or(|op| op == kind))
            .map(|rule| rule.kind)
            .unwrap_or(ErrorKind::Other(errno))
    }
}
