//! Domain models for clinic-day ranges.

mod day_key;
mod range;
mod record;

pub use day_key::*;
pub use range::*;
pub use record::*;
