//! Date-grouped tasks kept in sync with the backend

mod api;
mod board;
mod error;
mod sync;
mod types;


pub use api::*;
pub use board::*;
pub use error::*;
pub use sync::*;
pub use types::*;
