use serde::{Deserialize, Serialize};

/// A raw error number returned by the metadata collaborator.
///
/// Drivers surface failures as the positive `errno` value the kernel would
/// set. Turning it into something meaningful is the job of the
/// [`ErrnoClassifier`](crate::ErrnoClassifier).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Errno(pub i32);

impl Errno {
    /// Operation not permitted.
    pub const EPERM: Self = Self(libc::EPERM);

    /// No such file or directory.
    pub const ENOENT: Self = Self(libc::ENOENT);

    /// Bad address.
    pub const EFAULT: Self = Self(libc::EFAULT);

    /// Permission denied.
    pub const EACCES: Self = Self(libc::EACCES);

    /// File exists.
    pub const EEXIST: Self = Self(libc::EEXIST);

    /// Invalid argument.
    pub const EINVAL: Self = Self(libc::EINVAL);

    /// Function not implemented.
    pub const ENOSYS: Self = Self(libc::ENOSYS);

    /// No data available.
    pub const ENODATA: Self = Self(libc::ENODATA);

    /// Operation not supported.
    pub const EOPNOTSUPP: Self = Self(libc::EOPNOTSUPP);

    /// Returns the `errno` value of the calling thread.
    pub fn last() -> Self {
        Self(std::io::Error::last_os_error().raw_os_error().unwrap_or(0))
    }
}

impl From<Errno> for std::io::Error {
    fn from(value: Errno) -> Self {
        std::io::Error::from_raw_os_error(value.0)
    }
}

impl std::fmt::Debug for Errno {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Errno({})", self.0)
    }
}

impl std::fmt::Display for Errno {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&std::io::Error::from(*self), f)
    }
}
