#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    keystroke_capture_lib::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {}
