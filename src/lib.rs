pub mod app;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod error;
pub mod selection;
pub mod stats;
pub mod test_utils;

pub use error::{Result, ShardselError};

/// Package version from Cargo.toml.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
