pub mod module;
pub mod typed;

#[cfg(not(target_arch = "wasm32"))]
mod dispatch;
#[cfg(not(target_arch = "wasm32"))]
pub mod worker;

pub use module::{timing_precision, CaptureModule, ModuleBuffer, ModuleFault, TimingReport};
pub use typed::TypedBuffer;

#[cfg(not(target_arch = "wasm32"))]
pub use dispatch::{BackendKind, EventBuffer};
#[cfg(not(target_arch = "wasm32"))]
pub use worker::{InProcessLoader, ModuleLoader, ModuleWorker};

/// Reference deployment capacity.
pub const DEFAULT_CAPACITY: usize = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// Accepted by the module worker queue; stored once the worker drains it.
    Queued,
    /// Buffer full; the event was discarded.
    Dropped,
}
