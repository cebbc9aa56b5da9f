//! WASM bindings for textmark.
//!
//! Built as the page's content script: instantiating the module starts
//! highlighting the current document. Pages embedding the module directly
//! can use `TextMarker` for their own instance instead.
//!
//! # Features
//!
//! - `autostart`: Start a default highlighter on instantiation (default)

mod marker;

pub use marker::*;

use wasm_bindgen::prelude::*;

/// Initialize panic hook and console logging, then autostart if enabled.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    init_tracing();

    #[cfg(feature = "autostart")]
    marker::autostart();
}

fn init_tracing() {
    use tracing::Level;
    use tracing::subscriber::set_global_default;
    use tracing_subscriber::Registry;
    use tracing_subscriber::layer::SubscriberExt;

    let console_level = if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let wasm_layer = tracing_wasm::WASMLayer::new(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(console_level)
            .build(),
    );

    let reg = Registry::default().with(wasm_layer);

    // Another module on the page may have installed one already.
    let _ = set_global_default(reg);
}
