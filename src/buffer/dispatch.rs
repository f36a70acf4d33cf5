use anyhow::Result;
use serde::Serialize;

use crate::models::KeyEvent;

use super::{typed::TypedBuffer, worker::ModuleWorker, RecordOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackendKind {
    Module,
    Typed,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Module => "module",
            BackendKind::Typed => "typed",
        }
    }
}

/// The event buffer a capture engine writes to, chosen once per task.
pub enum EventBuffer {
    Module(ModuleWorker),
    Typed(TypedBuffer),
}

impl EventBuffer {
    pub fn kind(&self) -> BackendKind {
        match self {
            EventBuffer::Module(_) => BackendKind::Module,
            EventBuffer::Typed(_) => BackendKind::Typed,
        }
    }

    pub fn capacity(&self) -> usize {
        match self {
            EventBuffer::Module(worker) => worker.capacity(),
            EventBuffer::Typed(buffer) => buffer.capacity(),
        }
    }

    pub fn record(&mut self, event: KeyEvent) -> RecordOutcome {
        match self {
            EventBuffer::Module(worker) => worker.enqueue(event),
            EventBuffer::Typed(buffer) => buffer.record(event.kind, &event.key, event.timestamp),
        }
    }

    pub async fn count(&self) -> Result<usize> {
        match self {
            EventBuffer::Module(worker) => worker.count().await,
            EventBuffer::Typed(buffer) => Ok(buffer.count()),
        }
    }

    pub async fn rows(&self) -> Result<Vec<KeyEvent>> {
        match self {
            EventBuffer::Module(worker) => worker.rows().await,
            EventBuffer::Typed(buffer) => Ok(buffer.rows()),
        }
    }

    pub async fn clear(&mut self) -> Result<()> {
        match self {
            EventBuffer::Module(worker) => worker.clear().await,
            EventBuffer::Typed(buffer) => {
                buffer.clear();
                Ok(())
            }
        }
    }
}
