//! `wasm-bindgen` export of the module buffer for the browser page.
//!
//! Only compiled on `wasm32` targets.

use js_sys::Array;
use wasm_bindgen::prelude::*;

use crate::buffer::{timing_precision, CaptureModule, ModuleBuffer, RecordOutcome};
use crate::export::{to_raw_sequence, to_table};
use crate::keys::map_key;
use crate::models::KeyEventKind;

fn performance() -> Result<web_sys::Performance, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window object available"))?;
    window
        .performance()
        .ok_or_else(|| JsValue::from_str("No performance object available"))
}

fn console_warn(msg: &str) {
    web_sys::console::warn_1(&JsValue::from_str(msg));
}

#[wasm_bindgen]
pub struct KeystrokeCapture {
    buffer: ModuleBuffer,
    origin_ms: f64,
    last_timestamp: f64,
    overflow_reported: bool,
}

#[wasm_bindgen]
impl KeystrokeCapture {
    #[wasm_bindgen(constructor)]
    pub fn new(capacity: usize) -> Result<KeystrokeCapture, JsValue> {
        let origin_ms = performance()?.time_origin();
        Ok(KeystrokeCapture {
            buffer: ModuleBuffer::new(capacity),
            origin_ms,
            last_timestamp: 0.0,
            overflow_reported: false,
        })
    }

    /// Record one event for a raw key value; the token is mapped here.
    pub fn capture_keystroke(&mut self, key: String, is_release: bool) -> Result<(), JsValue> {
        let timestamp = performance()?.now().max(self.last_timestamp);
        self.last_timestamp = timestamp;

        let kind = if is_release {
            KeyEventKind::Release
        } else {
            KeyEventKind::Press
        };

        let outcome = self
            .buffer
            .capture(kind, map_key(&key), timestamp)
            .map_err(|fault| JsValue::from_str(&fault.to_string()))?;

        if outcome == RecordOutcome::Dropped && !self.overflow_reported {
            self.overflow_reported = true;
            console_warn(&format!(
                "Keystroke buffer full ({} events); further events are dropped",
                self.buffer.capacity()
            ));
        }
        Ok(())
    }

    pub fn get_event_count(&self) -> usize {
        self.buffer.event_count()
    }

    pub fn export_as_csv(&self) -> String {
        to_table(&self.buffer.events(), self.origin_ms)
    }

    /// `[["P", key, time], ...]` with absolute timestamps.
    pub fn get_raw_data(&self) -> Result<JsValue, JsValue> {
        let result = Array::new();
        for row in to_raw_sequence(&self.buffer.events(), self.origin_ms) {
            let entry = Array::new();
            entry.push(&JsValue::from_str(row.code()));
            entry.push(&JsValue::from_str(&row.key));
            entry.push(&JsValue::from_f64(row.time));
            result.push(&entry);
        }
        Ok(result.into())
    }

    pub fn get_last_10_events(&self) -> String {
        self.buffer.last_events(10)
    }

    pub fn clear(&mut self) {
        self.buffer.reset();
        self.overflow_reported = false;
    }

    pub fn test_timing_precision() -> Result<String, JsValue> {
        let performance = performance()?;
        Ok(timing_precision(|| performance.now()).to_string())
    }
}
