//! Performance result data model

pub mod artifact;
pub mod identity;
pub mod result;
pub mod rollup;
pub mod time_range;

pub use artifact::*;
pub use identity::identity;
pub use result::*;
pub use rollup::*;
pub use time_range::TimeRange;
