//! CLI subcommand implementations

pub mod balances;
pub mod sync;
pub mod version;
