//! In-memory fakes for every host capability.
//!
//! Available under `cfg(test)` and the `testing` feature. Everything here is
//! single-threaded and driven by hand: frames run when `run_next` is called,
//! timers fire when the clock is advanced, and change batches are delivered
//! with `deliver`.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::dom::{ChangeNotifier, ChangeRecord, Clock, FrameScheduler, TimerScheduler, TreeQuery};
use crate::error::HighlightError;
use crate::geometry::{Rect, ViewportSize};

/// Handle to a node in a [`MemoryDocument`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug)]
enum NodeKind {
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
        rect: Rect,
    },
    Text(String),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug)]
struct DocumentState {
    nodes: Vec<Node>,
    body: Option<NodeId>,
    viewport: ViewportSize,
    query_roots: Vec<NodeId>,
    fail_wraps: bool,
}

impl DocumentState {
    fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    fn push(&mut self, kind: NodeKind, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    /// Pre-order walk of everything below `root`.
    fn descendants(&self, root: NodeId, out: &mut Vec<NodeId>) {
        for &child in &self.node(root).children {
            out.push(child);
            self.descendants(child, out);
        }
    }

    fn text_content(&self, id: NodeId) -> String {
        match &self.node(id).kind {
            NodeKind::Text(text) => text.clone(),
            NodeKind::Element { .. } => {
                let mut out = Vec::new();
                self.descendants(id, &mut out);
                out.into_iter()
                    .filter_map(|n| match &self.node(n).kind {
                        NodeKind::Text(text) => Some(text.as_str()),
                        NodeKind::Element { .. } => None,
                    })
                    .collect()
            }
        }
    }

    fn write_html(&self, id: NodeId, out: &mut String) {
        match &self.node(id).kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element {
                tag, attributes, ..
            } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                out.push('>');
                for &child in &self.node(id).children {
                    self.write_html(child, out);
                }
                out.push_str(&format!("</{tag}>"));
            }
        }
    }
}

/// Arena-backed document tree implementing [`TreeQuery`].
///
/// New elements get a small box at the top-left of a 1024x768 viewport, so
/// they count as visible unless moved with [`set_rect`](Self::set_rect).
#[derive(Debug)]
pub struct MemoryDocument {
    state: RefCell<DocumentState>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Document with an empty `<body>`.
    pub fn new() -> Self {
        let doc = Self::without_body();
        {
            let mut state = doc.state.borrow_mut();
            let body = state.push(element_kind("body"), None);
            state.body = Some(body);
        }
        doc
    }

    /// Document that has not parsed a body yet.
    pub fn without_body() -> Self {
        Self {
            state: RefCell::new(DocumentState {
                nodes: Vec::new(),
                body: None,
                viewport: ViewportSize::new(1024.0, 768.0),
                query_roots: Vec::new(),
                fail_wraps: false,
            }),
        }
    }

    /// The body node. Panics on a document built with `without_body`.
    pub fn body_id(&self) -> NodeId {
        self.state.borrow().body.expect("document has no body")
    }

    pub fn append_element(&self, parent: NodeId, tag: &str) -> NodeId {
        self.state
            .borrow_mut()
            .push(element_kind(tag), Some(parent))
    }

    pub fn append_text(&self, parent: NodeId, text: &str) -> NodeId {
        self.state
            .borrow_mut()
            .push(NodeKind::Text(text.to_string()), Some(parent))
    }

    pub fn set_rect(&self, id: NodeId, new_rect: Rect) {
        if let NodeKind::Element { rect, .. } = &mut self.state.borrow_mut().nodes[id.0].kind {
            *rect = new_rect;
        }
    }

    /// Scroll the page down by `dy` pixels, moving every element up.
    pub fn scroll_by(&self, dy: f64) {
        for node in &mut self.state.borrow_mut().nodes {
            if let NodeKind::Element { rect, .. } = &mut node.kind {
                *rect = rect.shifted_y(-dy);
            }
        }
    }

    pub fn set_viewport(&self, viewport: ViewportSize) {
        self.state.borrow_mut().viewport = viewport;
    }

    pub fn set_attr(&self, id: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.state.borrow_mut().nodes[id.0].kind
        {
            match attributes.iter_mut().find(|(n, _)| n == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attributes.push((name.to_string(), value.to_string())),
            }
        }
    }

    pub fn get_attribute(&self, id: NodeId, name: &str) -> Option<String> {
        match &self.state.borrow().node(id).kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.state.borrow().node(id).children.clone()
    }

    /// Tag of an element; `None` for text nodes.
    pub fn tag(&self, id: NodeId) -> Option<String> {
        match &self.state.borrow().node(id).kind {
            NodeKind::Element { tag, .. } => Some(tag.clone()),
            NodeKind::Text(_) => None,
        }
    }

    pub fn text_content_of(&self, id: NodeId) -> String {
        self.state.borrow().text_content(id)
    }

    /// Outer HTML of `id`, attributes in the order they were set.
    pub fn to_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.state.borrow().write_html(id, &mut out);
        out
    }

    /// Roots passed to `descendants_matching`, one per scan started.
    pub fn query_roots(&self) -> Vec<NodeId> {
        self.state.borrow().query_roots.clone()
    }

    pub fn clear_query_roots(&self) {
        self.state.borrow_mut().query_roots.clear();
    }

    /// Make every `wrap_text` call fail, as if the host threw.
    pub fn fail_wraps(&self, fail: bool) {
        self.state.borrow_mut().fail_wraps = fail;
    }
}

fn element_kind(tag: &str) -> NodeKind {
    NodeKind::Element {
        tag: tag.to_ascii_lowercase(),
        attributes: Vec::new(),
        rect: Rect::from_origin(0.0, 0.0, 100.0, 20.0),
    }
}

impl TreeQuery for MemoryDocument {
    type Element = NodeId;
    type Text = NodeId;

    fn body(&self) -> Option<NodeId> {
        self.state.borrow().body
    }

    fn descendants_matching(&self, root: &NodeId, tags: &[&str]) -> Vec<NodeId> {
        let mut state = self.state.borrow_mut();
        state.query_roots.push(*root);

        let mut all = Vec::new();
        state.descendants(*root, &mut all);
        all.into_iter()
            .filter(|id| match &state.node(*id).kind {
                NodeKind::Element { tag, .. } => tags.iter().any(|t| t.eq_ignore_ascii_case(tag)),
                NodeKind::Text(_) => false,
            })
            .collect()
    }

    fn text_content(&self, element: &NodeId) -> String {
        self.state.borrow().text_content(*element)
    }

    fn text_nodes(&self, root: &NodeId) -> Vec<NodeId> {
        let state = self.state.borrow();
        let mut all = Vec::new();
        state.descendants(*root, &mut all);
        all.into_iter()
            .filter(|id| matches!(state.node(*id).kind, NodeKind::Text(_)))
            .collect()
    }

    fn node_text(&self, text: &NodeId) -> String {
        self.state.borrow().text_content(*text)
    }

    fn text_parent(&self, text: &NodeId) -> Option<NodeId> {
        self.state.borrow().node(*text).parent
    }

    fn has_class(&self, element: &NodeId, class: &str) -> bool {
        self.get_attribute(*element, "class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    fn attribute(&self, element: &NodeId, name: &str) -> Option<String> {
        self.get_attribute(*element, name)
    }

    fn set_attribute(&self, element: &NodeId, name: &str, value: &str) -> Result<(), HighlightError> {
        self.set_attr(*element, name, value);
        Ok(())
    }

    fn bounding_rect(&self, element: &NodeId) -> Rect {
        match &self.state.borrow().node(*element).kind {
            NodeKind::Element { rect, .. } => *rect,
            NodeKind::Text(_) => Rect::default(),
        }
    }

    fn viewport(&self) -> ViewportSize {
        self.state.borrow().viewport
    }

    fn wrap_text(&self, text: &NodeId, class: &str) -> Result<(), HighlightError> {
        let mut state = self.state.borrow_mut();
        if state.fail_wraps {
            return Err(HighlightError::Host("replaceChild refused".into()));
        }

        let Some(parent) = state.node(*text).parent else {
            return Err(HighlightError::Host("text node has no parent".into()));
        };
        let NodeKind::Text(content) = &state.node(*text).kind else {
            return Err(HighlightError::Host("not a text node".into()));
        };
        let content = content.clone();
        let rect = match &state.node(parent).kind {
            NodeKind::Element { rect, .. } => *rect,
            NodeKind::Text(_) => Rect::default(),
        };

        let Some(index) = state.nodes[parent.0]
            .children
            .iter()
            .position(|c| c == text)
        else {
            return Err(HighlightError::Host("text node not found in parent".into()));
        };

        let span = state.push(
            NodeKind::Element {
                tag: "span".into(),
                attributes: vec![("class".into(), class.to_string())],
                rect,
            },
            None,
        );
        state.push(NodeKind::Text(content), Some(span));

        state.nodes[parent.0].children[index] = span;
        state.nodes[span.0].parent = Some(parent);
        state.nodes[text.0].parent = None;
        Ok(())
    }
}

/// Frame queue run by hand.
#[derive(Default)]
pub struct ManualFrames {
    queue: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

impl ManualFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run the oldest queued frame callback. Returns false if none was queued.
    pub fn run_next(&self) -> bool {
        let next = self.queue.borrow_mut().pop_front();
        match next {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Run frames until none are left, including ones queued along the way.
    pub fn run_all(&self) {
        while self.run_next() {}
    }
}

impl FrameScheduler for ManualFrames {
    fn request_frame(&self, callback: Box<dyn FnOnce()>) {
        self.queue.borrow_mut().push_back(callback);
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at `start`.
    pub fn at(start: Duration) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Handle returned by [`ManualTimers::schedule`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimerId(u64);

struct PendingTimer {
    id: TimerId,
    due: Duration,
    callback: Box<dyn FnOnce()>,
}

/// Timers that fire as a shared [`ManualClock`] is advanced.
pub struct ManualTimers {
    clock: Rc<ManualClock>,
    timers: RefCell<Vec<PendingTimer>>,
    next_id: Cell<u64>,
    cancelled: Cell<usize>,
}

impl ManualTimers {
    pub fn new(clock: Rc<ManualClock>) -> Self {
        Self {
            clock,
            timers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            cancelled: Cell::new(0),
        }
    }

    pub fn pending(&self) -> usize {
        self.timers.borrow().len()
    }

    /// How many scheduled timers were cancelled before firing.
    pub fn cancelled(&self) -> usize {
        self.cancelled.get()
    }

    /// Move the clock forward by `by`, firing due timers in order. Each
    /// callback sees the clock at its own due time.
    pub fn advance(&self, by: Duration) {
        let target = self.clock.now() + by;
        loop {
            let next = {
                let mut timers = self.timers.borrow_mut();
                let due = timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.due <= target)
                    .min_by_key(|(_, t)| (t.due, t.id.0))
                    .map(|(i, _)| i);
                due.map(|i| timers.remove(i))
            };
            let Some(timer) = next else { break };
            if timer.due > self.clock.now() {
                self.clock.set(timer.due);
            }
            (timer.callback)();
        }
        self.clock.set(target);
    }
}

impl TimerScheduler for ManualTimers {
    type Handle = TimerId;

    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> TimerId {
        let id = TimerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.timers.borrow_mut().push(PendingTimer {
            id,
            due: self.clock.now() + delay,
            callback,
        });
        id
    }

    fn cancel(&self, handle: TimerId) {
        let mut timers = self.timers.borrow_mut();
        if let Some(index) = timers.iter().position(|t| t.id == handle) {
            timers.remove(index);
            self.cancelled.set(self.cancelled.get() + 1);
        }
    }
}

type ChangeCallback<E> = RefCell<Box<dyn FnMut(Vec<ChangeRecord<E>>)>>;

/// Keeps a [`MemoryNotifier`] subscription alive.
pub struct MemorySubscription<E> {
    _callback: Rc<ChangeCallback<E>>,
}

/// Change notifier fed by hand with [`deliver`](Self::deliver).
pub struct MemoryNotifier<E> {
    ready: Cell<bool>,
    waiting: RefCell<Vec<Box<dyn FnOnce()>>>,
    subscribers: RefCell<Vec<(E, Weak<ChangeCallback<E>>)>>,
}

impl<E: Clone + 'static> MemoryNotifier<E> {
    /// Notifier for a document that is already interactive.
    pub fn ready() -> Self {
        Self {
            ready: Cell::new(true),
            waiting: RefCell::new(Vec::new()),
            subscribers: RefCell::new(Vec::new()),
        }
    }

    /// Notifier for a document still loading.
    pub fn loading() -> Self {
        Self {
            ready: Cell::new(false),
            ..Self::ready()
        }
    }

    /// Flip to interactive and run every waiting ready callback.
    pub fn set_ready(&self) {
        self.ready.set(true);
        let waiting = std::mem::take(&mut *self.waiting.borrow_mut());
        for callback in waiting {
            callback();
        }
    }

    /// Roots of live subscriptions.
    pub fn subscribed_roots(&self) -> Vec<E> {
        self.subscribers
            .borrow()
            .iter()
            .filter(|(_, cb)| cb.strong_count() > 0)
            .map(|(root, _)| root.clone())
            .collect()
    }

    /// Hand a batch of changes to every live subscriber.
    pub fn deliver(&self, records: Vec<ChangeRecord<E>>) {
        let live: Vec<_> = self
            .subscribers
            .borrow()
            .iter()
            .filter_map(|(_, cb)| cb.upgrade())
            .collect();
        for callback in live {
            (&mut *callback.borrow_mut())(records.clone());
        }
    }
}

impl<E: Clone + 'static> ChangeNotifier<E> for MemoryNotifier<E> {
    type Subscription = MemorySubscription<E>;

    fn subscribe(
        &self,
        root: &E,
        callback: Box<dyn FnMut(Vec<ChangeRecord<E>>)>,
    ) -> Result<MemorySubscription<E>, HighlightError> {
        let callback = Rc::new(RefCell::new(callback));
        self.subscribers
            .borrow_mut()
            .push((root.clone(), Rc::downgrade(&callback)));
        Ok(MemorySubscription {
            _callback: callback,
        })
    }

    fn on_ready(&self, callback: Box<dyn FnOnce()>) {
        if self.ready.get() {
            callback();
        } else {
            self.waiting.borrow_mut().push(callback);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_replaces_in_place() {
        let doc = MemoryDocument::new();
        let p = doc.append_element(doc.body_id(), "p");
        doc.append_text(p, "before ");
        let text = doc.append_text(p, "middle");
        doc.append_text(p, " after");

        doc.wrap_text(&text, "hl").unwrap();

        insta::assert_snapshot!(
            doc.to_html(p),
            @r#"<p>before <span class="hl">middle</span> after</p>"#
        );
        assert_eq!(doc.text_parent(&text), None);
    }

    #[test]
    fn test_failed_wrap_leaves_arena_untouched() {
        let doc = MemoryDocument::new();
        let p = doc.append_element(doc.body_id(), "p");
        let text = doc.append_text(p, "orphaned");
        // Parent link without the matching child entry.
        doc.state.borrow_mut().nodes[p.0].children.clear();
        let before = doc.state.borrow().nodes.len();

        assert!(matches!(doc.wrap_text(&text, "hl"), Err(HighlightError::Host(_))));
        assert_eq!(doc.state.borrow().nodes.len(), before);
        assert_eq!(doc.text_parent(&text), Some(p));
    }

    #[test]
    fn test_descendants_in_document_order() {
        let doc = MemoryDocument::new();
        let body = doc.body_id();
        let a = doc.append_element(body, "div");
        let b = doc.append_element(a, "P");
        let c = doc.append_element(body, "span");
        doc.append_element(body, "ul");

        assert_eq!(doc.descendants_matching(&body, &["p", "div", "span"]), vec![a, b, c]);
        assert_eq!(doc.query_roots(), vec![body]);
    }

    #[test]
    fn test_timers_fire_in_due_order() {
        let clock = Rc::new(ManualClock::new());
        let timers = ManualTimers::new(Rc::clone(&clock));
        let fired = Rc::new(RefCell::new(Vec::new()));

        for (label, ms) in [("late", 30u64), ("early", 10), ("cancelled", 20)] {
            let fired = Rc::clone(&fired);
            let observed = Rc::clone(&clock);
            let id = timers.schedule(
                Duration::from_millis(ms),
                Box::new(move || fired.borrow_mut().push((label, observed.now()))),
            );
            if label == "cancelled" {
                timers.cancel(id);
            }
        }

        timers.advance(Duration::from_millis(50));
        assert_eq!(
            *fired.borrow(),
            vec![
                ("early", Duration::from_millis(10)),
                ("late", Duration::from_millis(30))
            ]
        );
        assert_eq!(clock.now(), Duration::from_millis(50));
        assert_eq!(timers.cancelled(), 1);
    }

    #[test]
    fn test_dropped_subscription_stops_delivery() {
        let notifier = MemoryNotifier::<u32>::ready();
        let seen = Rc::new(Cell::new(0));
        let counter = Rc::clone(&seen);
        let sub = notifier
            .subscribe(&7, Box::new(move |records: Vec<ChangeRecord<u32>>| {
                    counter.set(counter.get() + records.len())
                }))
            .unwrap();

        notifier.deliver(vec![ChangeRecord::child_list(1, Vec::new())]);
        assert_eq!(seen.get(), 1);
        assert_eq!(notifier.subscribed_roots(), vec![7]);

        drop(sub);
        notifier.deliver(vec![ChangeRecord::child_list(1, Vec::new())]);
        assert_eq!(seen.get(), 1);
        assert!(notifier.subscribed_roots().is_empty());
    }
}
