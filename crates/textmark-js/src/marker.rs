//! TextMarker - the highlighter handle exposed to JavaScript.

use std::cell::RefCell;

use wasm_bindgen::prelude::*;

use textmark_browser::{BrowserHighlighter, HighlightConfig, HighlightError, start_highlighter};

thread_local! {
    /// Highlighter started on instantiation, if any.
    static AUTOSTARTED: RefCell<Option<BrowserHighlighter>> = const { RefCell::new(None) };
}

#[cfg_attr(not(feature = "autostart"), allow(dead_code))]
pub(crate) fn autostart() {
    match start_highlighter(HighlightConfig::default()) {
        Ok(highlighter) => {
            tracing::info!("textmark: highlighting page");
            AUTOSTARTED.with(|slot| *slot.borrow_mut() = Some(highlighter));
        }
        Err(e) => tracing::warn!("textmark: autostart failed: {}", e),
    }
}

fn to_js_error(e: HighlightError) -> JsError {
    JsError::new(&e.to_string())
}

/// Parse a JS options object. `undefined` and `null` mean defaults.
fn parse_options(options: JsValue) -> Result<HighlightConfig, JsError> {
    if options.is_undefined() || options.is_null() {
        return Ok(HighlightConfig::default());
    }
    serde_wasm_bindgen::from_value(options)
        .map_err(|e| JsError::new(&format!("Invalid options: {}", e)))
}

/// A highlighter bound to the current page.
///
/// Starts watching the page on construction and stops when `stop()` is
/// called or the handle is freed.
#[wasm_bindgen]
pub struct TextMarker {
    inner: BrowserHighlighter,
}

#[wasm_bindgen]
impl TextMarker {
    /// Start highlighting with optional overrides, e.g.
    /// `new TextMarker({ className: "hl", batchSize: 20 })`.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<TextMarker, JsError> {
        let config = parse_options(options)?;
        let inner = start_highlighter(config).map_err(to_js_error)?;
        Ok(Self { inner })
    }

    /// Highlight text under `root` (default: `document.body`) now.
    pub fn scan(&self, root: Option<web_sys::Element>) {
        self.inner.scan(root.as_ref());
    }

    /// Stop watching for changes and drop any deferred scan.
    pub fn stop(&mut self) {
        self.inner.stop();
    }

    #[wasm_bindgen(getter, js_name = isRunning)]
    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }
}

/// Highlight text under `root` (default: `document.body`) using the
/// autostarted highlighter.
#[wasm_bindgen(js_name = highlightText)]
pub fn highlight_text(root: Option<web_sys::Element>) {
    AUTOSTARTED.with(|slot| match &*slot.borrow() {
        Some(highlighter) => highlighter.scan(root.as_ref()),
        None => tracing::debug!("highlightText: no autostarted highlighter"),
    });
}

/// Stop the autostarted highlighter, if running.
#[wasm_bindgen(js_name = stopAutostart)]
pub fn stop_autostart() {
    let stopped = AUTOSTARTED.with(|slot| slot.borrow_mut().take());
    if stopped.is_some() {
        tracing::info!("textmark: stopped");
    }
}
