//! telemetry.rs
//!
//! Lightweight JSONL telemetry sink for armctl.
//!
//! # Environment variables
//!
//! - `ARMCTL_TELEMETRY_MODE`: `"off"` (default) disables telemetry,
//!   `"jsonl"` writes JSONL to `ARMCTL_TELEMETRY_PATH`.
//! - `ARMCTL_TELEMETRY_PATH`: Path to the JSONL file. Required when
//!   mode is `"jsonl"`.
//! - `ARMCTL_TELEMETRY_APPEND`: Optional. When set to `"1"`/`"true"`/`"yes"`,
//!   appends to existing files instead of truncating. Default is truncate.
//!
//! # Schema version
//!
//! The writer itself is generic and does not inject `schema_version`.
//! The record builders in this module ([`tick_record`], [`episode_record`])
//! always include it.
//!
//! Telemetry never fails the control loop: open or write errors switch the
//! sink off for the rest of the process.

use std::env;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use log::warn;
use serde_json::{json, Value as JsonValue};

use crate::engine::TickReport;
use crate::state::EpisodeOutcome;

/// Current telemetry schema version.
pub const SCHEMA_VERSION: i64 = 1;

/// Telemetry mode, controlled by ARMCTL_TELEMETRY_MODE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryMode {
    Off,
    Jsonl,
}

impl TelemetryMode {
    /// Parse mode from environment. Defaults to Off.
    pub fn from_env() -> Self {
        match env::var("ARMCTL_TELEMETRY_MODE") {
            Ok(s) => match s.to_lowercase().as_str() {
                "jsonl" => TelemetryMode::Jsonl,
                _ => TelemetryMode::Off,
            },
            Err(_) => TelemetryMode::Off,
        }
    }
}

/// Configuration for the telemetry sink.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub mode: TelemetryMode,
    pub path: Option<PathBuf>,
    pub append: bool,
}

impl TelemetryConfig {
    /// Construct from environment variables.
    pub fn from_env() -> Self {
        let mode = TelemetryMode::from_env();

        let path = if mode == TelemetryMode::Jsonl {
            env::var("ARMCTL_TELEMETRY_PATH").ok().map(PathBuf::from)
        } else {
            None
        };

        TelemetryConfig {
            mode,
            path,
            append: Self::append_from_env(),
        }
    }

    /// JSONL output to an explicit path, truncating.
    pub fn jsonl(path: impl Into<PathBuf>) -> Self {
        TelemetryConfig {
            mode: TelemetryMode::Jsonl,
            path: Some(path.into()),
            append: false,
        }
    }

    pub fn append_from_env() -> bool {
        env::var("ARMCTL_TELEMETRY_APPEND")
            .ok()
            .map(|value| matches!(value.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
    }
}

/// A JSONL telemetry sink.
///
/// When mode == Off, all methods are no-ops.
/// When mode == Jsonl, the file is opened lazily on first use and one JSON
/// object is written per line.
pub struct TelemetrySink {
    mode: TelemetryMode,
    path: Option<PathBuf>,
    append: bool,
    writer: Option<BufWriter<File>>,
    records: u64,
}

impl TelemetrySink {
    /// Construct a telemetry sink from environment configuration.
    pub fn from_env() -> Self {
        Self::from_config(TelemetryConfig::from_env())
    }

    pub fn from_config(cfg: TelemetryConfig) -> Self {
        TelemetrySink {
            mode: cfg.mode,
            path: cfg.path,
            append: cfg.append,
            writer: None,
            records: 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.mode == TelemetryMode::Jsonl
    }

    /// Records written so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    fn ensure_writer(&mut self) -> Option<&mut BufWriter<File>> {
        if self.mode != TelemetryMode::Jsonl {
            return None;
        }

        if self.writer.is_none() {
            let path = match &self.path {
                Some(p) => p.clone(),
                None => {
                    warn!("[telemetry] jsonl mode without ARMCTL_TELEMETRY_PATH; disabled");
                    self.mode = TelemetryMode::Off;
                    return None;
                }
            };

            if let Some(parent) = path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }

            let mut options = OpenOptions::new();
            options.create(true).write(true);
            if self.append {
                options.append(true);
            } else {
                options.truncate(true);
            }

            let file = match options.open(&path) {
                Ok(f) => f,
                Err(e) => {
                    warn!("[telemetry] cannot open {}: {}; disabled", path.display(), e);
                    self.mode = TelemetryMode::Off;
                    return None;
                }
            };

            self.writer = Some(BufWriter::new(file));
        }

        self.writer.as_mut()
    }

    /// Log a JSON value as a single line.
    pub fn log_json(&mut self, value: &JsonValue) {
        if self.mode != TelemetryMode::Jsonl {
            return;
        }

        let line = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(_) => return,
        };

        let writer = match self.ensure_writer() {
            Some(w) => w,
            None => return,
        };

        if writeln!(writer, "{}", line).is_err() {
            self.mode = TelemetryMode::Off;
            self.writer = None;
            return;
        }
        self.records += 1;
    }

    /// Flush the underlying writer, if any.
    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }
}

impl Drop for TelemetrySink {
    fn drop(&mut self) {
        self.flush();
    }
}

/// One record per engine tick.
pub fn tick_record(report: &TickReport) -> JsonValue {
    let failures: Vec<JsonValue> = report
        .failures
        .iter()
        .map(|e| json!({ "kind": e.tag(), "message": e.to_string() }))
        .collect();

    json!({
        "schema_version": SCHEMA_VERSION,
        "event": "tick",
        "tick": report.tick,
        "sim_time": report.sim_time,
        "mode": report.mode.as_str(),
        "agent_ready": report.agent_ready,
        "had_new_frame": report.had_new_frame,
        "frame_count": report.frame_count,
        "action": report.action,
        "actuated": report.actuated,
        "goal_contact": report.goal_contact,
        "reward": report.reward.map(|r| r.value),
        "terminal": report.reward.map(|r| r.terminal).unwrap_or(false),
        "goal_distance": report.goal_distance,
        "avg_goal_delta": report.avg_goal_delta,
        "failures": failures,
    })
}

/// One record per finalized episode.
pub fn episode_record(outcome: &EpisodeOutcome) -> JsonValue {
    json!({
        "schema_version": SCHEMA_VERSION,
        "event": "episode",
        "episode": outcome.episode,
        "reward": outcome.reward,
        "result": outcome.label(),
        "reason": outcome.reason.map(|r| r.as_str()),
        "frames": outcome.frames,
        "successful_episodes": outcome.successful,
        "total_episodes": outcome.total,
        "accuracy": outcome.accuracy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_builders_stamp_schema_version() {
        use crate::state::{ControlMode, TerminationReason};

        let mut report = TickReport::inert(7, 1.25, ControlMode::AgentDriven);
        report.failures.push(crate::error::ControlError::Format { bits_per_pixel: 32 });
        let tick = tick_record(&report);
        assert_eq!(tick["schema_version"], SCHEMA_VERSION);
        assert_eq!(tick["event"], "tick");
        assert_eq!(tick["mode"], "agent_driven");
        assert_eq!(tick["failures"][0]["kind"], "format");

        let outcome = EpisodeOutcome {
            episode: 3,
            reward: 1.0,
            won: true,
            reason: Some(TerminationReason::GoalReached),
            frames: 9,
            successful: 2,
            total: 3,
            accuracy: 2.0 / 3.0,
        };
        let episode = episode_record(&outcome);
        assert_eq!(episode["schema_version"], SCHEMA_VERSION);
        assert_eq!(episode["result"], "WIN");
        assert_eq!(episode["reason"], "goal_reached");
    }

    #[test]
    fn off_sink_writes_nothing() {
        let mut sink = TelemetrySink::from_config(TelemetryConfig {
            mode: TelemetryMode::Off,
            path: None,
            append: false,
        });
        sink.log_json(&json!({ "x": 1 }));
        assert_eq!(sink.records(), 0);
        assert!(!sink.is_enabled());
    }

    #[test]
    fn jsonl_without_path_disables_itself() {
        let mut sink = TelemetrySink::from_config(TelemetryConfig {
            mode: TelemetryMode::Jsonl,
            path: None,
            append: false,
        });
        sink.log_json(&json!({ "x": 1 }));
        assert!(!sink.is_enabled());
    }
}
