//! Data models for Diyafa

mod booking;
mod event;
mod listing;
mod money;
mod slot;

pub use booking::*;
pub use event::*;
pub use listing::*;
pub use money::*;
pub use slot::*;
