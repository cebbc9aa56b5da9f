//! Frame and timer scheduling via the window.
//!
//! Frame callbacks are handed over with `Closure::once_into_js`, which frees
//! the closure when it runs. Timers use `gloo_timers::callback::Timeout`.

use std::time::Duration;

use gloo_timers::callback::Timeout;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::Window;

use textmark_core::{FrameScheduler, TimerScheduler};

/// `requestAnimationFrame` scheduling.
pub struct BrowserFrames {
    window: Window,
}

impl BrowserFrames {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl FrameScheduler for BrowserFrames {
    fn request_frame(&self, callback: Box<dyn FnOnce()>) {
        let closure = Closure::once_into_js(callback);
        if let Err(e) = self
            .window
            .request_animation_frame(closure.unchecked_ref())
        {
            tracing::warn!("requestAnimationFrame failed, remaining batches dropped: {:?}", e);
        }
    }
}

/// `setTimeout` / `clearTimeout` scheduling.
///
/// Handles own their callback: cancelling or dropping one clears the timeout
/// and frees the closure.
pub struct BrowserTimers;

impl BrowserTimers {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BrowserTimers {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerScheduler for BrowserTimers {
    type Handle = Timeout;

    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Timeout {
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        Timeout::new(millis, callback)
    }

    fn cancel(&self, handle: Timeout) {
        drop(handle.cancel());
    }
}
