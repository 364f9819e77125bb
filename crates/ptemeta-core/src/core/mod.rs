mod address;
mod errno;
pub(crate) mod macros;

pub use self::{
    address::{PageGeometry, PageIndex, TableId, Va, host_page_size},
    errno::Errno,
};
