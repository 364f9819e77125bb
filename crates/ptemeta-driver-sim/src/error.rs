use ptemeta_core::Errno;

/// Error type for the simulated collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The table is already expanded.
    AlreadyExpanded,

    /// `disable` on a table that is not expanded.
    NotExpanded,

    /// `set` on a table that is not expanded, without auto-expansion.
    NoTable,

    /// Nothing was stored for the page.
    NoData,

    /// The buffer or encoding mode does not match the stored metadata.
    Malformed,

    /// The address is NULL.
    BadAddress,
}

impl From<Error> for Errno {
    fn from(value: Error) -> Self {
        match value {
            Error::AlreadyExpanded => Errno::EEXIST,
            Error::NotExpanded => Errno::EINVAL,
            Error::NoTable => Errno::ENOENT,
            Error::NoData => Errno::ENODATA,
            Error::Malformed => Errno::EINVAL,
            Error::BadAddress => Errno::EFAULT,
        }
    }
}
