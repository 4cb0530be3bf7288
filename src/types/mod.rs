//! Shared data structures for engine run-to-failure records.

mod records;

pub use records::*;
