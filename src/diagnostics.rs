//! Per-instance diagnostics.
//!
//! A `MotionCalculator` owns its sink, so debug output lives and dies with the
//! session instead of sitting in process-wide state.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, warn};

/// Why a frame produced no metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoValidKeypoints,
    NonPositiveDeltaTime,
    InsufficientHistory,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    FrameSkipped { timestamp: f64, reason: SkipReason },
    /// dt が期待間隔を大きく超えた
    FrameDrop { timestamp: f64, delta_time: f32 },
    OutlierRejected { timestamp: f64, speed: f32 },
    FilterSeeded { dx: f32, dy: f32 },
    Calibrated { pixels_per_meter: f32 },
    Reset,
}

pub trait DiagnosticsSink: Send {
    fn record(&mut self, event: DiagnosticEvent);
}

/// Default sink: forwards everything to `tracing`.
#[derive(Debug, Default)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&mut self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::OutlierRejected { timestamp, speed } => {
                warn!(timestamp, speed, "rejected implausible speed sample");
            }
            DiagnosticEvent::FrameDrop {
                timestamp,
                delta_time,
            } => {
                debug!(timestamp, delta_time, "frame drop");
            }
            other => debug!(?other, "motion diagnostics"),
        }
    }
}

/// Keeps the last `capacity` events in memory, for debug panels and tests.
#[derive(Debug)]
pub struct MemorySink {
    events: VecDeque<DiagnosticEvent>,
    capacity: usize,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn events(&self) -> impl Iterator<Item = &DiagnosticEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl DiagnosticsSink for MemorySink {
    fn record(&mut self, event: DiagnosticEvent) {
        if self.capacity == 0 {
            return;
        }
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}

/// Shares one `MemorySink` between the calculator and an observer.
impl DiagnosticsSink for std::sync::Arc<std::sync::Mutex<MemorySink>> {
    fn record(&mut self, event: DiagnosticEvent) {
        if let Ok(mut sink) = self.lock() {
            sink.record(event);
        }
    }
}
