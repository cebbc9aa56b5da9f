//! textmark-core: Pure Rust text highlighting logic without browser dependencies.
//!
//! This crate provides:
//! - Capability traits (`TreeQuery`, `ChangeNotifier`, `FrameScheduler`,
//!   `TimerScheduler`, `Clock`) describing what the host document offers
//! - `BatchScanner` - wraps long text nodes in highlight spans, a few
//!   elements per rendering frame
//! - `MutationWatcher` - throttled/debounced rescans on structural changes
//! - `Highlighter` - a running session wiring the two together
//!
//! Browser implementations of the capabilities live in `textmark-browser`.
//! In-memory fakes live in [`testing`] behind the `testing` feature.

pub mod config;
pub mod dom;
pub mod error;
pub mod geometry;
pub mod scanner;
pub mod session;
pub mod watcher;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::HighlightConfig;
pub use dom::{
    AddedNode, ChangeKind, ChangeNotifier, ChangeRecord, Clock, FrameScheduler, SystemClock,
    TimerScheduler, TreeQuery,
};
pub use error::HighlightError;
pub use geometry::{Rect, ViewportSize, is_near_viewport};
pub use scanner::{
    BatchScanner, ElementOutcome, ScanReport, is_trim_whitespace, trim_text, trimmed_len,
};
pub use session::{Capabilities, Highlighter};
pub use watcher::{DebounceState, MutationWatcher, WatchDecision};
