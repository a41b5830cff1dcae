//! Retrieval orchestration: bounded retry, URL normalisation and dedup.
//!
//! Takes the provider's raw hit list and turns it into the ordered,
//! duplicate-free candidate set the ranking stages work on.

pub mod dedup;
pub mod retrieve;
pub mod url_normalize;
