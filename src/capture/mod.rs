mod clock;
mod engine;
mod text_field;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{CaptureEngine, CapturePhase, KeyDisposition};
pub use text_field::TextField;
