//! Per-task capture engine: pairs physical key signals into press/release
//! events and feeds them to the event buffer chosen at activation.

use std::{collections::HashMap, sync::Arc};

use anyhow::Result;
use serde::Serialize;

use crate::buffer::{
    timing_precision, BackendKind, EventBuffer, ModuleLoader, ModuleWorker, RecordOutcome,
    TimingReport, TypedBuffer,
};
use crate::config::BufferConfig;
use crate::export::{to_raw_sequence, to_table, RawRow};
use crate::keys::map_key;
use crate::models::{KeyEvent, KeyEventKind, KeySignal, SignalTarget};
use crate::{log_debug, log_info, log_warn};

use super::Clock;

const ENABLE_LOGS: bool = true;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CapturePhase {
    Uninitialized,
    Listening,
    Finalized,
}

/// What the page should do with a key-down after capture has seen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    Default,
    /// Suppress the default action and insert `\n` at the caret.
    InsertNewline,
}

pub struct CaptureEngine {
    phase: CapturePhase,
    config: BufferConfig,
    loader: Option<Arc<dyn ModuleLoader>>,
    clock: Arc<dyn Clock>,
    buffer: Option<EventBuffer>,
    /// Physical key code -> token recorded at press time.
    pressed: HashMap<String, String>,
    last_timestamp: f64,
    typed_dropped: usize,
    anomalies: usize,
}

impl CaptureEngine {
    pub fn new(
        config: BufferConfig,
        clock: Arc<dyn Clock>,
        loader: Option<Arc<dyn ModuleLoader>>,
    ) -> Self {
        Self {
            phase: CapturePhase::Uninitialized,
            config,
            loader,
            clock,
            buffer: None,
            pressed: HashMap::new(),
            last_timestamp: 0.0,
            typed_dropped: 0,
            anomalies: 0,
        }
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.buffer.as_ref().map(EventBuffer::kind)
    }

    /// Pick the backend and start listening. The choice holds for the rest of
    /// the task; later calls return it unchanged.
    pub fn activate(&mut self) -> BackendKind {
        if let Some(buffer) = &self.buffer {
            return buffer.kind();
        }

        let buffer = self.acquire_backend();
        let kind = buffer.kind();
        self.buffer = Some(buffer);
        self.phase = CapturePhase::Listening;
        kind
    }

    fn acquire_backend(&self) -> EventBuffer {
        let capacity = self.config.capacity;

        if self.config.prefer_module {
            match &self.loader {
                Some(loader) => match ModuleWorker::spawn(Arc::clone(loader), capacity) {
                    Ok(worker) => {
                        log_info!("Keystroke capture using module backend (capacity {capacity})");
                        return EventBuffer::Module(worker);
                    }
                    Err(err) => {
                        log_warn!("Capture module unavailable, falling back to typed buffer: {err:#}");
                    }
                },
                None => log_info!("No capture module loader configured"),
            }
        }

        log_info!("Keystroke capture using typed buffer (capacity {capacity})");
        EventBuffer::Typed(TypedBuffer::new(capacity))
    }

    pub fn key_down(&mut self, signal: &KeySignal) -> KeyDisposition {
        let disposition = if signal.target == SignalTarget::TextField
            && signal.key == "Enter"
            && !signal.shift
        {
            KeyDisposition::InsertNewline
        } else {
            KeyDisposition::Default
        };

        if self.phase != CapturePhase::Listening {
            return disposition;
        }

        if self.pressed.contains_key(&signal.code) {
            log_debug!("Autorepeat for code={} discarded", signal.code);
            return disposition;
        }

        let token = map_key(&signal.key).to_string();
        self.pressed.insert(signal.code.clone(), token.clone());
        let timestamp = self.stamp();
        self.record(KeyEvent::new(KeyEventKind::Press, token, timestamp));

        disposition
    }

    pub fn key_up(&mut self, signal: &KeySignal) {
        if self.phase != CapturePhase::Listening {
            return;
        }

        let token = match self.pressed.remove(&signal.code) {
            Some(token) => token,
            None => {
                self.anomalies += 1;
                let token = map_key(&signal.key).to_string();
                log_warn!(
                    "No tracked press for code={}; recording release as {token}",
                    signal.code
                );
                token
            }
        };

        let timestamp = self.stamp();
        self.record(KeyEvent::new(KeyEventKind::Release, token, timestamp));
    }

    /// Current clock reading, never earlier than the previous event.
    fn stamp(&mut self) -> f64 {
        let now = self.clock.now_ms().max(self.last_timestamp);
        self.last_timestamp = now;
        now
    }

    fn record(&mut self, event: KeyEvent) {
        let Some(buffer) = self.buffer.as_mut() else {
            return;
        };

        if buffer.record(event) == RecordOutcome::Dropped {
            if let EventBuffer::Typed(typed) = buffer {
                self.typed_dropped += 1;
                if self.typed_dropped == 1 {
                    log_warn!(
                        "Typed buffer full ({} events); further events are dropped",
                        typed.capacity()
                    );
                }
            }
        }
    }

    pub async fn count(&self) -> Result<usize> {
        match &self.buffer {
            Some(buffer) => buffer.count().await,
            None => Ok(0),
        }
    }

    pub async fn rows(&self) -> Result<Vec<KeyEvent>> {
        match &self.buffer {
            Some(buffer) => buffer.rows().await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn export_table(&self) -> Result<String> {
        let rows = self.rows().await?;
        Ok(to_table(&rows, self.clock.origin_epoch_ms()))
    }

    pub async fn export_raw(&self) -> Result<Vec<RawRow>> {
        let rows = self.rows().await?;
        Ok(to_raw_sequence(&rows, self.clock.origin_epoch_ms()))
    }

    /// Events discarded because the buffer was full or the module was gone.
    pub fn dropped(&self) -> usize {
        let module_dropped = match &self.buffer {
            Some(EventBuffer::Module(worker)) => worker.dropped(),
            _ => 0,
        };
        self.typed_dropped + module_dropped
    }

    /// Releases that had no tracked press.
    pub fn anomalies(&self) -> usize {
        self.anomalies
    }

    pub fn recoveries(&self) -> usize {
        match &self.buffer {
            Some(EventBuffer::Module(worker)) => worker.recoveries(),
            _ => 0,
        }
    }

    /// Physical key codes pressed but not yet released.
    pub fn unreleased_keys(&self) -> Vec<String> {
        let mut codes: Vec<String> = self.pressed.keys().cloned().collect();
        codes.sort();
        codes
    }

    /// Clear events and press state. A module backend is rebuilt from scratch.
    pub async fn reset(&mut self) -> Result<()> {
        self.pressed.clear();
        self.anomalies = 0;
        self.typed_dropped = 0;

        match self.buffer.as_mut() {
            Some(EventBuffer::Module(worker)) => worker.reload().await?,
            Some(buffer) => buffer.clear().await?,
            None => {}
        }

        if self.buffer.is_some() {
            self.phase = CapturePhase::Listening;
        }
        log_info!("Keystroke capture reset");
        Ok(())
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.pressed.clear();
        self.anomalies = 0;
        self.typed_dropped = 0;
        match self.buffer.as_mut() {
            Some(buffer) => buffer.clear().await,
            None => Ok(()),
        }
    }

    /// Stop recording; the buffer stays readable.
    pub fn finalize(&mut self) {
        if self.phase == CapturePhase::Listening {
            log_info!("Keystroke capture finalized");
        }
        self.phase = CapturePhase::Finalized;
    }

    /// Module diagnostics; `None` on the typed backend.
    pub async fn last_events(&self, n: usize) -> Result<Option<String>> {
        match &self.buffer {
            Some(EventBuffer::Module(worker)) => Ok(Some(worker.last_events(n).await?)),
            _ => Ok(None),
        }
    }

    pub fn timing_self_test(&self) -> TimingReport {
        timing_precision(|| self.clock.now_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::worker::tests::{FragileLoader, UnavailableLoader};
    use crate::buffer::InProcessLoader;
    use crate::capture::ManualClock;
    use pretty_assertions::assert_eq;

    const ORIGIN: f64 = 1_700_000_000_000.0;

    fn typed_engine(capacity: usize) -> (CaptureEngine, ManualClock) {
        let clock = ManualClock::new(ORIGIN);
        let config = BufferConfig {
            capacity,
            prefer_module: false,
        };
        let mut engine = CaptureEngine::new(config, Arc::new(clock.clone()), None);
        engine.activate();
        (engine, clock)
    }

    fn module_engine(loader: Arc<dyn ModuleLoader>) -> (CaptureEngine, ManualClock) {
        let clock = ManualClock::new(ORIGIN);
        let mut engine =
            CaptureEngine::new(BufferConfig::default(), Arc::new(clock.clone()), Some(loader));
        engine.activate();
        (engine, clock)
    }

    fn tap(engine: &mut CaptureEngine, clock: &ManualClock, code: &str, key: &str) {
        clock.advance(10.0);
        engine.key_down(&KeySignal::new(code, key));
        clock.advance(5.0);
        engine.key_up(&KeySignal::new(code, key));
    }

    #[tokio::test]
    async fn taps_produce_two_events_each() {
        let (mut engine, clock) = typed_engine(100);
        for key in ["h", "e", "l", "l", "o"] {
            tap(&mut engine, &clock, &format!("Key{}", key.to_uppercase()), key);
        }

        assert_eq!(engine.count().await.unwrap(), 10);
        let table = engine.export_table().await.unwrap();
        assert_eq!(table.lines().count(), 11);
    }

    #[tokio::test]
    async fn autorepeat_records_one_press() {
        let (mut engine, clock) = typed_engine(100);
        for _ in 0..5 {
            clock.advance(30.0);
            engine.key_down(&KeySignal::new("KeyA", "a"));
        }
        engine.key_up(&KeySignal::new("KeyA", "a"));

        let rows = engine.rows().await.unwrap();
        assert_eq!(
            rows,
            vec![KeyEvent::press("a", 30.0), KeyEvent::release("a", 150.0)]
        );
    }

    #[tokio::test]
    async fn release_uses_press_time_token() {
        let (mut engine, clock) = typed_engine(100);
        engine.key_down(&KeySignal::new("ShiftLeft", "Shift"));
        clock.advance(1.0);
        engine.key_down(&KeySignal::new("Digit1", "!"));
        clock.advance(1.0);
        engine.key_up(&KeySignal::new("ShiftLeft", "Shift"));
        clock.advance(1.0);
        engine.key_up(&KeySignal::new("Digit1", "1"));

        let keys: Vec<String> = engine
            .rows()
            .await
            .unwrap()
            .into_iter()
            .map(|event| format!("{}{}", event.kind.as_code(), event.key))
            .collect();
        assert_eq!(keys, vec!["PKey.shift", "P!", "RKey.shift", "R!"]);
        assert!(engine.unreleased_keys().is_empty());
    }

    #[tokio::test]
    async fn unmatched_release_is_an_anomaly() {
        let (mut engine, _clock) = typed_engine(100);
        engine.key_up(&KeySignal::new("Space", " "));

        assert_eq!(engine.anomalies(), 1);
        assert_eq!(
            engine.rows().await.unwrap(),
            vec![KeyEvent::release("Key.space", 0.0)]
        );
    }

    #[tokio::test]
    async fn timestamps_never_go_backwards() {
        let (mut engine, clock) = typed_engine(100);
        clock.set(50.0);
        engine.key_down(&KeySignal::new("KeyA", "a"));
        clock.set(40.0);
        engine.key_up(&KeySignal::new("KeyA", "a"));

        let rows = engine.rows().await.unwrap();
        assert!(rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(rows[1].timestamp, 50.0);
    }

    #[tokio::test]
    async fn full_buffer_drops_without_error() {
        let (mut engine, clock) = typed_engine(4);
        for _ in 0..5 {
            tap(&mut engine, &clock, "KeyA", "a");
        }
        assert_eq!(engine.count().await.unwrap(), 4);
        assert_eq!(engine.dropped(), 6);
    }

    #[tokio::test]
    async fn reset_and_clear_restart_overflow_count_on_both_backends() {
        for prefer_module in [false, true] {
            let clock = ManualClock::new(ORIGIN);
            let config = BufferConfig {
                capacity: 2,
                prefer_module,
            };
            let loader: Arc<dyn ModuleLoader> = Arc::new(InProcessLoader);
            let mut engine = CaptureEngine::new(config, Arc::new(clock.clone()), Some(loader));
            engine.activate();

            for _ in 0..3 {
                tap(&mut engine, &clock, "KeyA", "a");
            }
            engine.key_up(&KeySignal::new("KeyB", "b"));
            assert_eq!(engine.count().await.unwrap(), 2);
            assert_eq!(engine.dropped(), 5, "{:?}", engine.backend_kind());
            assert_eq!(engine.anomalies(), 1);

            engine.reset().await.unwrap();
            assert_eq!(engine.count().await.unwrap(), 0);
            assert_eq!(engine.dropped(), 0, "{:?}", engine.backend_kind());
            assert_eq!(engine.anomalies(), 0);

            for _ in 0..2 {
                tap(&mut engine, &clock, "KeyA", "a");
            }
            assert_eq!(engine.count().await.unwrap(), 2);
            assert_eq!(engine.dropped(), 2, "{:?}", engine.backend_kind());

            engine.key_up(&KeySignal::new("KeyB", "b"));
            engine.clear().await.unwrap();
            assert_eq!(engine.count().await.unwrap(), 0);
            assert_eq!(engine.dropped(), 0, "{:?}", engine.backend_kind());
            assert_eq!(engine.anomalies(), 0);
        }
    }

    #[test]
    fn enter_in_text_field_inserts_newline() {
        let (mut engine, _clock) = typed_engine(10);
        let enter = KeySignal::new("Enter", "Enter").in_text_field();
        assert_eq!(engine.key_down(&enter), KeyDisposition::InsertNewline);
        // Held Enter still inserts a newline per autorepeat signal.
        assert_eq!(engine.key_down(&enter), KeyDisposition::InsertNewline);

        let shifted = KeySignal::new("Enter", "Enter").in_text_field().with_shift();
        assert_eq!(engine.key_down(&shifted), KeyDisposition::Default);
        assert_eq!(
            engine.key_down(&KeySignal::new("Enter", "Enter")),
            KeyDisposition::Default
        );
    }

    #[tokio::test]
    async fn table_uses_absolute_time() {
        let (mut engine, clock) = typed_engine(10);
        clock.set(100.0);
        engine.key_down(&KeySignal::new("KeyA", "a"));
        clock.set(120.0);
        engine.key_up(&KeySignal::new("KeyA", "a"));

        let table = engine.export_table().await.unwrap();
        assert_eq!(
            table,
            "Press or Release,Key,Time\nP,a,1700000000100\nR,a,1700000000120"
        );
        let raw = engine.export_raw().await.unwrap();
        assert_eq!(raw[1].time, ORIGIN + 120.0);
    }

    #[tokio::test]
    async fn module_backend_preferred_when_available() {
        let (mut engine, clock) = module_engine(Arc::new(InProcessLoader));
        assert_eq!(engine.backend_kind(), Some(BackendKind::Module));

        tap(&mut engine, &clock, "KeyQ", "q");
        assert_eq!(engine.count().await.unwrap(), 2);
        assert_eq!(
            engine.last_events(10).await.unwrap().as_deref(),
            Some("P q 10\nR q 15\n")
        );
    }

    #[tokio::test]
    async fn unavailable_module_falls_back_once() {
        let (mut engine, clock) = module_engine(Arc::new(UnavailableLoader));
        assert_eq!(engine.backend_kind(), Some(BackendKind::Typed));
        assert_eq!(engine.activate(), BackendKind::Typed);

        tap(&mut engine, &clock, "KeyQ", "q");
        assert_eq!(engine.count().await.unwrap(), 2);
        assert_eq!(engine.last_events(10).await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupted_module_is_rebuilt() {
        let (mut engine, clock) = module_engine(Arc::new(FragileLoader::new("Key.tab")));
        tap(&mut engine, &clock, "KeyA", "a");
        tap(&mut engine, &clock, "Tab", "Tab");
        tap(&mut engine, &clock, "KeyB", "b");

        let rows = engine.rows().await.unwrap();
        let keys: Vec<&str> = rows.iter().map(|event| event.key.as_str()).collect();
        assert_eq!(keys, vec!["Key.tab", "b", "b"]);
        assert_eq!(engine.recoveries(), 1);
    }

    #[tokio::test]
    async fn finalized_engine_ignores_signals() {
        let (mut engine, clock) = typed_engine(10);
        tap(&mut engine, &clock, "KeyA", "a");
        engine.finalize();
        tap(&mut engine, &clock, "KeyB", "b");

        assert_eq!(engine.phase(), CapturePhase::Finalized);
        assert_eq!(engine.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn reset_clears_events_and_press_state() {
        let (mut engine, clock) = module_engine(Arc::new(InProcessLoader));
        tap(&mut engine, &clock, "KeyA", "a");
        engine.key_down(&KeySignal::new("ShiftLeft", "Shift"));
        assert_eq!(engine.unreleased_keys(), vec!["ShiftLeft".to_string()]);

        engine.reset().await.unwrap();
        assert_eq!(engine.count().await.unwrap(), 0);
        assert!(engine.unreleased_keys().is_empty());
    }

    #[test]
    fn timing_self_test_reads_clock() {
        let (engine, _clock) = typed_engine(10);
        let report = engine.timing_self_test();
        assert_eq!(report.min_delta_ms, 0.0);
        assert_eq!(report.max_delta_ms, 0.0);
    }
}
