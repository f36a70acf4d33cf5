use std::collections::HashMap;

use crate::models::{KeyEvent, KeyEventKind};

use super::RecordOutcome;

/// Main-thread buffer: three pre-allocated parallel columns plus an
/// interning table for key tokens, so recording never allocates per event.
pub struct TypedBuffer {
    kinds: Box<[u8]>,
    keys: Box<[u16]>,
    timestamps: Box<[f64]>,
    cursor: usize,
    key_index: HashMap<String, u16>,
    key_names: Vec<String>,
}

impl TypedBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            kinds: vec![0u8; capacity].into_boxed_slice(),
            keys: vec![0u16; capacity].into_boxed_slice(),
            timestamps: vec![0f64; capacity].into_boxed_slice(),
            cursor: 0,
            key_index: HashMap::new(),
            key_names: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.timestamps.len()
    }

    pub fn count(&self) -> usize {
        self.cursor
    }

    pub fn record(&mut self, kind: KeyEventKind, key: &str, timestamp: f64) -> RecordOutcome {
        if self.cursor >= self.capacity() {
            return RecordOutcome::Dropped;
        }

        let Some(key_code) = self.intern(key) else {
            return RecordOutcome::Dropped;
        };

        let idx = self.cursor;
        self.kinds[idx] = kind.as_u8();
        self.keys[idx] = key_code;
        self.timestamps[idx] = timestamp;
        self.cursor += 1;

        RecordOutcome::Recorded
    }

    pub fn rows(&self) -> Vec<KeyEvent> {
        (0..self.cursor)
            .map(|idx| KeyEvent {
                kind: KeyEventKind::from_u8(self.kinds[idx]),
                key: self.key_names[usize::from(self.keys[idx])].clone(),
                timestamp: self.timestamps[idx],
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.cursor = 0;
        self.key_index.clear();
        self.key_names.clear();
    }

    /// Number of distinct tokens seen since the last clear.
    pub fn distinct_keys(&self) -> usize {
        self.key_names.len()
    }

    fn intern(&mut self, key: &str) -> Option<u16> {
        if let Some(code) = self.key_index.get(key) {
            return Some(*code);
        }

        let code = u16::try_from(self.key_names.len()).ok()?;
        self.key_index.insert(key.to_string(), code);
        self.key_names.push(key.to_string());
        Some(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_insertion_order() {
        let mut buffer = TypedBuffer::new(8);
        buffer.record(KeyEventKind::Press, "a", 1.0);
        buffer.record(KeyEventKind::Press, "Key.shift", 2.0);
        buffer.record(KeyEventKind::Release, "a", 3.0);

        assert_eq!(buffer.count(), 3);
        assert_eq!(
            buffer.rows(),
            vec![
                KeyEvent::press("a", 1.0),
                KeyEvent::press("Key.shift", 2.0),
                KeyEvent::release("a", 3.0),
            ]
        );
    }

    #[test]
    fn repeated_tokens_share_one_index() {
        let mut buffer = TypedBuffer::new(8);
        for i in 0..4 {
            buffer.record(KeyEventKind::Press, "a", f64::from(i));
        }
        assert_eq!(buffer.distinct_keys(), 1);
    }

    #[test]
    fn full_buffer_drops_without_growing() {
        let mut buffer = TypedBuffer::new(2);
        assert_eq!(buffer.record(KeyEventKind::Press, "a", 1.0), RecordOutcome::Recorded);
        assert_eq!(buffer.record(KeyEventKind::Release, "a", 2.0), RecordOutcome::Recorded);
        assert_eq!(buffer.record(KeyEventKind::Press, "b", 3.0), RecordOutcome::Dropped);
        assert_eq!(buffer.count(), 2);
        assert_eq!(buffer.capacity(), 2);
    }

    #[test]
    fn clear_resets_cursor_and_key_table() {
        let mut buffer = TypedBuffer::new(4);
        buffer.record(KeyEventKind::Press, "a", 1.0);
        buffer.clear();
        assert_eq!(buffer.count(), 0);
        assert_eq!(buffer.distinct_keys(), 0);
        assert!(buffer.rows().is_empty());
    }
}
