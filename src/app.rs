//! Application context shared by CLI commands.

use std::path::PathBuf;

use crate::cli::Cli;
use crate::cli::progress::ProgressReporter;
use crate::config::Config;
use crate::error::Result;
use crate::selection::SelectionEngine;

pub struct AppContext {
    pub root: PathBuf,
    pub config: Config,
    pub machine: bool,
    pub quiet: bool,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let root = cli.root.clone();
        let config = Config::load(cli.config.as_deref(), &root)?;
        Ok(Self {
            root,
            config,
            machine: cli.machine,
            quiet: cli.quiet,
        })
    }

    /// Open the selection engine over the configured statistics.
    pub fn engine(&self) -> Result<SelectionEngine> {
        SelectionEngine::open(&self.config)
    }

    pub fn progress(&self) -> ProgressReporter {
        ProgressReporter::new(self.machine, self.quiet)
    }
}
