//! Progress reporting for long-running commands.
//!
//! - TTY: animated spinners and bars on stderr
//! - non-TTY: one line per phase
//! - machine mode: JSON progress events on stderr
//! - quiet: nothing

use std::io::IsTerminal;
use std::time::Duration;

use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    Tty,
    NonTty,
    Machine,
    Quiet,
}

impl ProgressMode {
    #[must_use]
    pub fn detect(machine: bool, quiet: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if machine {
            Self::Machine
        } else if std::io::stderr().is_terminal() {
            Self::Tty
        } else {
            Self::NonTty
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum ProgressEventType {
    Start,
    Update,
    Complete,
}

#[derive(Debug, Clone, Serialize)]
struct ProgressEvent<'a> {
    #[serde(rename = "type")]
    event_type: &'static str,
    event: ProgressEventType,
    operation: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    timestamp: String,
}

impl<'a> ProgressEvent<'a> {
    fn new(event: ProgressEventType, operation: &'a str) -> Self {
        Self {
            event_type: "progress",
            event,
            operation,
            current: None,
            total: None,
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            eprintln!("{json}");
        }
    }
}

pub struct ProgressReporter {
    mode: ProgressMode,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(machine: bool, quiet: bool) -> Self {
        Self {
            mode: ProgressMode::detect(machine, quiet),
        }
    }

    #[must_use]
    pub const fn with_mode(mode: ProgressMode) -> Self {
        Self { mode }
    }

    /// Spinner for an operation of unknown length.
    pub fn spinner(&self, msg: &str) -> ProgressHandle {
        self.start(msg, None)
    }

    /// Bar for an operation of `total` steps.
    pub fn progress(&self, total: u64, msg: &str) -> ProgressHandle {
        self.start(msg, Some(total))
    }

    fn start(&self, msg: &str, total: Option<u64>) -> ProgressHandle {
        match self.mode {
            ProgressMode::Quiet => ProgressHandle::Noop,
            ProgressMode::Machine => {
                let mut event = ProgressEvent::new(ProgressEventType::Start, msg);
                event.total = total;
                event.emit();
                ProgressHandle::Machine {
                    operation: msg.to_string(),
                    current: 0,
                    total,
                }
            }
            ProgressMode::NonTty => {
                eprintln!("[shardsel] {msg}...");
                ProgressHandle::NonTty {
                    operation: msg.to_string(),
                }
            }
            ProgressMode::Tty => {
                let pb = match total {
                    Some(total) => {
                        let pb = ProgressBar::new(total);
                        pb.set_style(
                            ProgressStyle::with_template("{msg} [{bar:30.cyan/blue}] {pos}/{len}")
                                .unwrap_or_else(|_| ProgressStyle::default_bar()),
                        );
                        pb
                    }
                    None => {
                        let pb = ProgressBar::new_spinner();
                        pb.set_style(
                            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                        );
                        pb.enable_steady_tick(Duration::from_millis(100));
                        pb
                    }
                };
                pb.set_message(msg.to_string());
                ProgressHandle::Tty(pb)
            }
        }
    }
}

pub enum ProgressHandle {
    Noop,
    Machine {
        operation: String,
        current: u64,
        total: Option<u64>,
    },
    NonTty {
        operation: String,
    },
    Tty(ProgressBar),
}

impl ProgressHandle {
    pub fn inc(&mut self, delta: u64) {
        match self {
            Self::Tty(pb) => pb.inc(delta),
            Self::Machine {
                operation,
                current,
                total,
            } => {
                *current += delta;
                let mut event = ProgressEvent::new(ProgressEventType::Update, operation);
                event.current = Some(*current);
                event.total = *total;
                event.emit();
            }
            Self::Noop | Self::NonTty { .. } => {}
        }
    }

    pub fn finish(self, msg: &str) {
        match self {
            Self::Tty(pb) => pb.finish_with_message(msg.to_string()),
            Self::Machine {
                operation, current, ..
            } => {
                let mut event = ProgressEvent::new(ProgressEventType::Complete, &operation);
                event.current = Some(current);
                event.message = Some(msg);
                event.emit();
            }
            Self::NonTty { operation } => eprintln!("[shardsel] {operation}: {msg}"),
            Self::Noop => {}
        }
    }
}
