//! Classification, validation and the I/O collaborators that act on the verdicts.

pub mod classifier;
pub mod ledger;
pub mod organizer;
pub mod packager;
pub mod storage_sink;
pub mod validator;
