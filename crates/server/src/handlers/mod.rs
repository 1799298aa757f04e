//! HTTP request handlers.

mod downloads;
mod gethash;
mod lists;

pub use downloads::downloads;
pub use gethash::gethash;
pub use lists::list_names;
