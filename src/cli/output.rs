use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::error::{Result, ShardselError, StructuredError};

/// Envelope for machine-mode output.
#[derive(Serialize)]
pub struct MachineResponse<T> {
    pub status: MachineStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub data: T,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum MachineStatus {
    Ok,
    Error(StructuredError),
}

pub fn machine_ok<T: Serialize>(data: T) -> MachineResponse<T> {
    MachineResponse {
        status: MachineStatus::Ok,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data,
    }
}

/// Machine-mode error carrying code, suggestion and context.
pub fn machine_error(err: &ShardselError) -> MachineResponse<serde_json::Value> {
    MachineResponse {
        status: MachineStatus::Error(err.to_structured()),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data: serde_json::Value::Null,
    }
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)?;
    println!("{payload}");
    Ok(())
}

/// Print `data` wrapped in an ok envelope.
pub fn emit_machine<T: Serialize>(data: T) -> Result<()> {
    emit_json(&machine_ok(data))
}

#[derive(Debug, Clone, Default)]
pub struct HumanLayout {
    lines: Vec<String>,
}

impl HumanLayout {
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(text.bold().to_string());
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        self.lines.push(format!("  {:<14} {value}", format!("{key}:").dimmed()));
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    pub fn blank(&mut self) -> &mut Self {
        self.lines.push(String::new());
        self
    }

    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

pub fn emit_human(layout: HumanLayout) {
    println!("{}", layout.build());
}
