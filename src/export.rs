//! Table and raw-sequence renderings of recorded key events.
//!
//! Both renderings keep the buffer's insertion order; nothing is re-sorted.

use serde::Serialize;

use crate::models::{KeyEvent, KeyEventKind};

pub const TABLE_HEADER: &str = "Press or Release,Key,Time";

/// One exported row with an absolute (epoch-relative) millisecond timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRow {
    pub kind: KeyEventKind,
    pub key: String,
    pub time: f64,
}

impl RawRow {
    pub fn code(&self) -> &'static str {
        self.kind.as_code()
    }
}

fn absolute_ms(origin_ms: f64, relative_ms: f64) -> f64 {
    origin_ms + relative_ms
}

/// CSV table: header, then `P|R,<token>,<absolute ms>` per event, newline-joined.
pub fn to_table(events: &[KeyEvent], origin_ms: f64) -> String {
    let mut lines = Vec::with_capacity(events.len() + 1);
    lines.push(TABLE_HEADER.to_string());

    for event in events {
        let time = absolute_ms(origin_ms, event.timestamp).round() as i64;
        lines.push(format!("{},{},{}", event.kind.as_code(), event.key, time));
    }

    lines.join("\n")
}

pub fn to_raw_sequence(events: &[KeyEvent], origin_ms: f64) -> Vec<RawRow> {
    events
        .iter()
        .map(|event| RawRow {
            kind: event.kind,
            key: event.key.clone(),
            time: absolute_ms(origin_ms, event.timestamp),
        })
        .collect()
}

/// Last `n` events as `P a 123` lines, relative timestamps.
pub fn tail_lines(events: &[KeyEvent], n: usize) -> String {
    let start = events.len().saturating_sub(n);
    events[start..]
        .iter()
        .map(|event| {
            format!(
                "{} {} {:.0}\n",
                event.kind.as_code(),
                event.key,
                event.timestamp
            )
        })
        .collect()
}
