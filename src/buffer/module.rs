//! Triple store that runs inside the portable (WebAssembly) capture module.
//!
//! On `wasm32` this type backs the exported `KeystrokeCapture`; natively the
//! same store is driven through [`CaptureModule`] by the module worker.

use std::fmt;

use thiserror::Error;

use crate::export::tail_lines;
use crate::models::{KeyEvent, KeyEventKind};

use super::RecordOutcome;

const TIMING_SAMPLES: usize = 10;

/// A call into the capture module failed.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ModuleFault {
    /// The module trapped; its internal state can no longer be trusted.
    #[error("capture module trapped: {0}")]
    Trapped(String),
    /// The call was refused but the module is still usable.
    #[error("capture module rejected call: {0}")]
    Rejected(String),
}

/// Operations the module worker issues against a module instance.
pub trait CaptureModule: Send {
    fn capture(
        &mut self,
        kind: KeyEventKind,
        key: &str,
        timestamp: f64,
    ) -> Result<RecordOutcome, ModuleFault>;
    fn event_count(&self) -> usize;
    fn rows(&self) -> Result<Vec<KeyEvent>, ModuleFault>;
    fn clear(&mut self) -> Result<(), ModuleFault>;
    fn last_events(&self, n: usize) -> String;
}

pub struct ModuleBuffer {
    timestamps: Vec<f64>,
    keys: Vec<String>,
    kinds: Vec<u8>,
    capacity: usize,
}

impl ModuleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            timestamps: Vec::with_capacity(capacity),
            keys: Vec::with_capacity(capacity),
            kinds: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn push(&mut self, kind: KeyEventKind, key: &str, timestamp: f64) -> RecordOutcome {
        if self.timestamps.len() >= self.capacity {
            return RecordOutcome::Dropped;
        }

        self.timestamps.push(timestamp);
        self.keys.push(key.to_string());
        self.kinds.push(kind.as_u8());
        RecordOutcome::Recorded
    }

    pub fn events(&self) -> Vec<KeyEvent> {
        self.timestamps
            .iter()
            .zip(&self.keys)
            .zip(&self.kinds)
            .map(|((timestamp, key), kind)| KeyEvent {
                kind: KeyEventKind::from_u8(*kind),
                key: key.clone(),
                timestamp: *timestamp,
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.timestamps.clear();
        self.keys.clear();
        self.kinds.clear();
    }

    fn columns_aligned(&self) -> bool {
        self.timestamps.len() == self.keys.len() && self.keys.len() == self.kinds.len()
    }
}

impl CaptureModule for ModuleBuffer {
    fn capture(
        &mut self,
        kind: KeyEventKind,
        key: &str,
        timestamp: f64,
    ) -> Result<RecordOutcome, ModuleFault> {
        if !self.columns_aligned() {
            return Err(ModuleFault::Trapped("column lengths diverged".into()));
        }
        Ok(self.push(kind, key, timestamp))
    }

    fn event_count(&self) -> usize {
        self.len()
    }

    fn rows(&self) -> Result<Vec<KeyEvent>, ModuleFault> {
        if !self.columns_aligned() {
            return Err(ModuleFault::Trapped("column lengths diverged".into()));
        }
        Ok(self.events())
    }

    fn clear(&mut self) -> Result<(), ModuleFault> {
        self.reset();
        Ok(())
    }

    fn last_events(&self, n: usize) -> String {
        tail_lines(&self.events(), n)
    }
}

/// Result of the timestamp-resolution self-test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingReport {
    pub min_delta_ms: f64,
    pub max_delta_ms: f64,
}

impl fmt::Display for TimingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Timing test - Min delta: {:.3}ms, Max delta: {:.3}ms",
            self.min_delta_ms, self.max_delta_ms
        )
    }
}

/// Sample `now` back to back and report the smallest and largest step.
pub fn timing_precision<F>(mut now: F) -> TimingReport
where
    F: FnMut() -> f64,
{
    let samples: Vec<f64> = (0..TIMING_SAMPLES).map(|_| now()).collect();
    let deltas = samples.windows(2).map(|pair| pair[1] - pair[0]);

    let (min_delta_ms, max_delta_ms) = deltas.fold((f64::INFINITY, 0.0f64), |(lo, hi), d| {
        (lo.min(d), hi.max(d))
    });

    TimingReport {
        min_delta_ms,
        max_delta_ms,
    }
}
