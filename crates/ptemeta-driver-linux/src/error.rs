/// Error type for the Linux driver.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The running kernel does not implement the metadata syscalls.
    #[error("The running kernel does not implement the metadata syscalls.")]
    NotSupported,
}

impl From<Error> for ptemeta_core::PteMetaError {
    fn from(value: Error) -> Self {
        match value {
            Error::NotSupported => Self::NotSupported,
        }
    }
}
