// src/logging.rs
//
// Event sinks for the engine.
// - EventSink: trait called by the engine once per tick and per episode
// - NoopSink:  discards all events
// - JsonlSink: forwards tick and episode records to a TelemetrySink

use std::path::Path;

use crate::engine::TickReport;
use crate::state::EpisodeOutcome;
use crate::telemetry::{episode_record, tick_record, TelemetryConfig, TelemetrySink};

/// Abstract sink for engine events.
pub trait EventSink {
    fn log_tick(&mut self, report: &TickReport);

    fn log_episode(&mut self, outcome: &EpisodeOutcome);
}

/// Sink that discards all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn log_tick(&mut self, _report: &TickReport) {}

    fn log_episode(&mut self, _outcome: &EpisodeOutcome) {}
}

/// JSONL sink built on [`TelemetrySink`].
///
/// With `ticks = false` only episode records are written.
pub struct JsonlSink {
    telemetry: TelemetrySink,
    ticks: bool,
}

impl JsonlSink {
    /// Sink configured from `ARMCTL_TELEMETRY_*`.
    pub fn from_env() -> Self {
        Self {
            telemetry: TelemetrySink::from_env(),
            ticks: true,
        }
    }

    /// Sink writing to `path`, truncating it.
    pub fn create(path: impl AsRef<Path>) -> Self {
        Self {
            telemetry: TelemetrySink::from_config(TelemetryConfig::jsonl(path.as_ref())),
            ticks: true,
        }
    }

    pub fn episodes_only(mut self) -> Self {
        self.ticks = false;
        self
    }

    pub fn telemetry(&self) -> &TelemetrySink {
        &self.telemetry
    }

    pub fn flush(&mut self) {
        self.telemetry.flush();
    }
}

impl EventSink for JsonlSink {
    fn log_tick(&mut self, report: &TickReport) {
        if self.ticks {
            self.telemetry.log_json(&tick_record(report));
        }
    }

    fn log_episode(&mut self, outcome: &EpisodeOutcome) {
        self.telemetry.log_json(&episode_record(outcome));
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn log_tick(&mut self, report: &TickReport) {
        (**self).log_tick(report);
    }

    fn log_episode(&mut self, outcome: &EpisodeOutcome) {
        (**self).log_episode(outcome);
    }
}
