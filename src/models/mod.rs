//! Core data model for the asset organizer.
//!
//! These types describe loose input files, the product groups they are
//! bucketed into and the verdicts produced for each group. They are plain
//! values: built once during the classification scan and never mutated
//! afterwards.

pub mod file_entry;
pub mod group;
pub mod metadata;
pub mod role;
pub mod verdict;
