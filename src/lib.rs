pub mod buffer;
pub mod export;
pub mod keys;
pub mod models;
mod utils;

#[cfg(not(target_arch = "wasm32"))]
pub mod capture;
#[cfg(not(target_arch = "wasm32"))]
pub mod config;
#[cfg(not(target_arch = "wasm32"))]
pub mod page;
#[cfg(not(target_arch = "wasm32"))]
mod replay;
#[cfg(not(target_arch = "wasm32"))]
pub mod store;
#[cfg(not(target_arch = "wasm32"))]
pub mod submission;
#[cfg(not(target_arch = "wasm32"))]
pub mod upload;

#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(target_arch = "wasm32")]
pub use wasm::KeystrokeCapture;

#[cfg(not(target_arch = "wasm32"))]
pub use replay::{ReplayScript, ScriptedSignal, SignalKind};

/// Entry point of the `keystroke-capture` binary.
#[cfg(not(target_arch = "wasm32"))]
pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("keystroke-capture starting up...");

    let args = replay::Args::parse();
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(replay::execute(args))
}
