//! Highlighter tuning values.
//!
//! Every field has a default matching the stock content script, so an empty
//! options object (or `HighlightConfig::default()`) behaves exactly like it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::HighlightError;

/// Tags whose elements are considered for highlighting.
pub const DEFAULT_TAGS: [&str; 3] = ["p", "div", "span"];

/// Class put on every wrapper span.
pub const DEFAULT_CLASS_NAME: &str = "highlight-orange";

/// Attribute set to `"true"` on processed elements.
pub const DEFAULT_MARKER_ATTRIBUTE: &str = "data-highlighted";

/// Value written to the marker attribute.
pub const MARKER_VALUE: &str = "true";

/// Tuning values for scanning and mutation handling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HighlightConfig {
    /// Candidate tag allow-list, lowercase.
    pub tags: Vec<String>,
    /// Text length threshold in characters, measured after trimming.
    ///
    /// An element needs strictly more than this to be considered; each text
    /// node inside it needs at least this much to be wrapped.
    pub min_chars: usize,
    /// Elements processed per rendering frame.
    pub batch_size: usize,
    /// Pixels around the viewport still counted as near-visible.
    pub viewport_margin: f64,
    /// Minimum time between immediate mutation-triggered scans.
    pub throttle_ms: u32,
    /// Quiet period before a deferred whole-document scan.
    pub debounce_ms: u32,
    /// Class given to wrapper spans.
    pub class_name: String,
    /// Processed marker attribute. Must be a `data-` attribute.
    pub marker_attribute: String,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            tags: DEFAULT_TAGS.iter().map(|t| t.to_string()).collect(),
            min_chars: 50,
            batch_size: 10,
            viewport_margin: 100.0,
            throttle_ms: 250,
            debounce_ms: 100,
            class_name: DEFAULT_CLASS_NAME.to_string(),
            marker_attribute: DEFAULT_MARKER_ATTRIBUTE.to_string(),
        }
    }
}

impl HighlightConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(u64::from(self.throttle_ms))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(u64::from(self.debounce_ms))
    }

    /// Tag list as borrowed strs, for passing to [`TreeQuery::descendants_matching`](crate::TreeQuery::descendants_matching).
    pub fn tag_refs(&self) -> Vec<&str> {
        self.tags.iter().map(String::as_str).collect()
    }

    /// Check the values make sense before a highlighter is started.
    pub fn validate(&self) -> Result<(), HighlightError> {
        if self.batch_size == 0 {
            return Err(HighlightError::InvalidConfig(
                "batchSize must be at least 1".into(),
            ));
        }
        if self.tags.is_empty() || self.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(HighlightError::InvalidConfig(
                "tags must be a non-empty list of tag names".into(),
            ));
        }
        if self.class_name.trim().is_empty() || self.class_name.contains(char::is_whitespace) {
            return Err(HighlightError::InvalidConfig(format!(
                "className {:?} must be a single class name",
                self.class_name
            )));
        }
        if !self.marker_attribute.starts_with("data-") || self.marker_attribute.len() == 5 {
            return Err(HighlightError::InvalidConfig(format!(
                "markerAttribute {:?} must be a data- attribute",
                self.marker_attribute
            )));
        }
        if !self.viewport_margin.is_finite() || self.viewport_margin < 0.0 {
            return Err(HighlightError::InvalidConfig(
                "viewportMargin must be a non-negative number".into(),
            ));
        }
        Ok(())
    }
}
