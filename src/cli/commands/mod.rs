//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::Result;

pub mod df;
pub mod import;
pub mod rebuild;
pub mod select;
pub mod shards;

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<()> {
    match command {
        Commands::Import(args) => import::run(ctx, args),
        Commands::Rebuild(args) => rebuild::run(ctx, args),
        Commands::Select(args) => select::run(ctx, args),
        Commands::Df(args) => df::run(ctx, args),
        Commands::Shards(args) => shards::run(ctx, args),
    }
}
