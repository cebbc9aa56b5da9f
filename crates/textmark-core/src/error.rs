//! Error types for highlighter setup and host calls.

use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur while setting up or driving a highlighter.
///
/// Scans never return these to their caller: a failed host call during a
/// scan is logged and the scan moves on to the next node.
#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HighlightError {
    /// Configuration rejected by [`HighlightConfig::validate`](crate::HighlightConfig::validate).
    #[error("invalid highlighter config: {0}")]
    #[diagnostic(code(textmark::config))]
    InvalidConfig(String),

    /// A host API call failed.
    #[error("host call failed: {0}")]
    #[diagnostic(code(textmark::host))]
    Host(String),

    /// A required host object is missing (no window, no document).
    #[error("{0} is not available")]
    #[diagnostic(
        code(textmark::unavailable),
        help("textmark-browser must run inside a page with a window and document")
    )]
    Unavailable(&'static str),
}

impl From<&str> for HighlightError {
    fn from(s: &str) -> Self {
        HighlightError::Host(s.to_string())
    }
}

impl From<String> for HighlightError {
    fn from(s: String) -> Self {
        HighlightError::Host(s)
    }
}
