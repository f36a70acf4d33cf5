pub mod key_event;

#[cfg(not(target_arch = "wasm32"))]
pub mod device;
#[cfg(not(target_arch = "wasm32"))]
pub mod task;

pub use key_event::{KeyEvent, KeyEventKind, KeySignal, SignalTarget};

#[cfg(not(target_arch = "wasm32"))]
pub use device::{DeviceInfo, DeviceType};
#[cfg(not(target_arch = "wasm32"))]
pub use task::{ConfigError, Platform, TaskIdentity, TaskParams};
