//! Browser DOM layer for textmark.
//!
//! This crate implements the `textmark-core` capability traits over
//! `web-sys`. It assumes a `wasm32-unknown-unknown` target environment.
//!
//! # Architecture
//!
//! - `tree`: element queries, text walking, geometry and text wrapping
//! - `schedule`: `requestAnimationFrame` and `setTimeout` scheduling
//! - `observer`: `MutationObserver` subscription and document readiness
//!
//! # Re-exports
//!
//! This crate re-exports `textmark-core` for convenience, so consumers
//! only need to depend on `textmark-browser`.

// Re-export core crate
pub use textmark_core;
pub use textmark_core::*;

pub mod observer;
pub mod schedule;
pub mod tree;

pub use observer::{BrowserNotifier, ObserverSubscription, to_change_record};
pub use schedule::{BrowserFrames, BrowserTimers};
pub use tree::BrowserTree;

use std::rc::Rc;

/// Highlighter running against the page's live document.
pub type BrowserHighlighter =
    Highlighter<BrowserTree, BrowserFrames, BrowserTimers, BrowserNotifier, SystemClock>;

/// Capabilities backed by the global `window` and its document.
pub fn browser_capabilities() -> Result<
    Capabilities<BrowserTree, BrowserFrames, BrowserTimers, BrowserNotifier, SystemClock>,
    HighlightError,
> {
    let window = web_sys::window().ok_or(HighlightError::Unavailable("window"))?;
    let document = window
        .document()
        .ok_or(HighlightError::Unavailable("document"))?;

    Ok(Capabilities {
        tree: Rc::new(BrowserTree::from_parts(window.clone(), document.clone())),
        frames: Rc::new(BrowserFrames::new(window)),
        timers: Rc::new(BrowserTimers::new()),
        notifier: Rc::new(BrowserNotifier::new(document)),
        clock: Rc::new(SystemClock::new()),
    })
}

/// Start highlighting the current page.
///
/// Subscribes to changes under `document.body` immediately and runs the
/// initial scan once the document is interactive.
pub fn start_highlighter(config: HighlightConfig) -> Result<BrowserHighlighter, HighlightError> {
    Highlighter::start(browser_capabilities()?, config)
}
