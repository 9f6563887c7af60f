//! Consistency checks for persisted clinic day keys.

mod day_keys;

pub use day_keys::*;
