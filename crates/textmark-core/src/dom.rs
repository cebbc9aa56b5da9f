//! Host capability traits.
//!
//! These traits define the interface between the highlighting logic and the
//! live document it runs against. The browser implementation lives in
//! `textmark-browser`; the in-memory fakes in [`crate::testing`] let the same
//! logic run under plain `cargo test`.

use std::time::Duration;

use web_time::Instant;

use crate::error::HighlightError;
use crate::geometry::{Rect, ViewportSize};
use crate::scanner::trim_text;

/// Read and mutate access to the live document tree.
pub trait TreeQuery {
    /// Element node handle. Equality is node identity.
    type Element: Clone + PartialEq + 'static;
    /// Text node handle.
    type Text: Clone + 'static;

    /// The document body, if the document has one yet.
    fn body(&self) -> Option<Self::Element>;

    /// All descendants of `root` whose tag is in `tags`, in document order.
    ///
    /// `root` itself is not included.
    fn descendants_matching(&self, root: &Self::Element, tags: &[&str]) -> Vec<Self::Element>;

    /// Concatenated text of every text node under `element`.
    fn text_content(&self, element: &Self::Element) -> String;

    /// Every text node under `root`, descending into nested elements, in
    /// document order.
    fn text_nodes(&self, root: &Self::Element) -> Vec<Self::Text>;

    /// Literal text of a text node.
    fn node_text(&self, text: &Self::Text) -> String;

    /// The element directly containing a text node.
    fn text_parent(&self, text: &Self::Text) -> Option<Self::Element>;

    fn has_class(&self, element: &Self::Element, class: &str) -> bool;

    fn attribute(&self, element: &Self::Element, name: &str) -> Option<String>;

    fn set_attribute(
        &self,
        element: &Self::Element,
        name: &str,
        value: &str,
    ) -> Result<(), HighlightError>;

    /// Bounding box of `element` relative to the viewport, read at call time.
    fn bounding_rect(&self, element: &Self::Element) -> Rect;

    fn viewport(&self) -> ViewportSize;

    /// Replace `text` in place with a `<span class="{class}">` holding the
    /// same text. The original text node is discarded.
    fn wrap_text(&self, text: &Self::Text, class: &str) -> Result<(), HighlightError>;
}

/// Next-rendering-frame scheduling (`requestAnimationFrame`).
pub trait FrameScheduler {
    fn request_frame(&self, callback: Box<dyn FnOnce()>);
}

/// Delayed invocation with cancellation (`setTimeout` / `clearTimeout`).
pub trait TimerScheduler {
    type Handle: 'static;

    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Self::Handle;

    /// Cancel a scheduled callback. Cancelling one that already fired is a no-op.
    fn cancel(&self, handle: Self::Handle);
}

/// Monotonic time source for the throttle window.
pub trait Clock {
    /// Time elapsed since some fixed origin.
    fn now(&self) -> Duration;
}

/// Wall clock backed by `web_time`, so it works on wasm and native alike.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Kind of structural change, mirroring `MutationRecord.type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    ChildList,
    Attributes,
    CharacterData,
}

impl ChangeKind {
    /// Parse a `MutationRecord.type` string.
    pub fn from_mutation_type(s: &str) -> Option<Self> {
        match s {
            "childList" => Some(ChangeKind::ChildList),
            "attributes" => Some(ChangeKind::Attributes),
            "characterData" => Some(ChangeKind::CharacterData),
            _ => None,
        }
    }
}

/// A node added by a structural change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddedNode {
    /// An element, with its text content at delivery time.
    Element { text: String },
    /// Text, comment, or any other non-element node.
    Other,
}

impl AddedNode {
    pub fn element(text: impl Into<String>) -> Self {
        AddedNode::Element { text: text.into() }
    }

    /// Whether this is an element carrying non-whitespace text.
    pub fn has_text(&self) -> bool {
        matches!(self, AddedNode::Element { text } if !trim_text(text).is_empty())
    }
}

/// One structural change notification.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeRecord<E> {
    pub kind: ChangeKind,
    /// The changed node, if it is an element.
    pub target: Option<E>,
    pub added: Vec<AddedNode>,
}

impl<E> ChangeRecord<E> {
    /// A `childList` change on `target` adding `added`.
    pub fn child_list(target: E, added: Vec<AddedNode>) -> Self {
        Self {
            kind: ChangeKind::ChildList,
            target: Some(target),
            added,
        }
    }

    /// Whether this change added at least one element with real text.
    pub fn adds_text(&self) -> bool {
        self.kind == ChangeKind::ChildList && self.added.iter().any(AddedNode::has_text)
    }
}

/// Structural change subscription and document readiness.
pub trait ChangeNotifier<E> {
    /// Keeps the subscription alive. Dropping it stops delivery.
    type Subscription: 'static;

    /// Deliver every batch of child-list changes in the subtree of `root`.
    fn subscribe(
        &self,
        root: &E,
        callback: Box<dyn FnMut(Vec<ChangeRecord<E>>)>,
    ) -> Result<Self::Subscription, HighlightError>;

    /// Run `callback` once the document is interactive, or right away if it
    /// already is.
    fn on_ready(&self, callback: Box<dyn FnOnce()>);
}
