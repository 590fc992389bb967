pub(crate) mod cursor;
pub mod error;
pub mod layout;
pub mod rice;
pub mod types;

pub use error::*;
pub use layout::*;
pub use types::*;
