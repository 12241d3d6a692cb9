//! Entry points for each CLI subcommand.

pub mod clean;
pub mod history;
pub mod organize;
pub mod sample_data;
