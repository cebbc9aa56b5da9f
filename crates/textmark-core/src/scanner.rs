//! Batch scanner: wraps long text nodes in highlight spans.
//!
//! A scan collects candidate elements under a root once, then processes them
//! `batch_size` at a time. The first batch runs synchronously; each later
//! batch waits for the next rendering frame so a long page is annotated over
//! several frames instead of blocking the main thread.
//!
//! There is no shared cursor between scans. Two scans over the same subtree
//! may interleave; the processed marker keeps either from wrapping twice.

use std::rc::Rc;

use crate::config::{HighlightConfig, MARKER_VALUE};
use crate::dom::{FrameScheduler, TreeQuery};
use crate::geometry::is_near_viewport;

/// Whitespace as the DOM's `String.prototype.trim` sees it: Unicode
/// `White_Space` minus U+0085, plus U+FEFF.
pub fn is_trim_whitespace(c: char) -> bool {
    c == '\u{FEFF}' || (c.is_whitespace() && c != '\u{0085}')
}

/// `text` with surrounding [trim whitespace](is_trim_whitespace) removed.
pub fn trim_text(text: &str) -> &str {
    text.trim_matches(is_trim_whitespace)
}

/// Length of the trimmed text in UTF-16 code units, the unit DOM strings
/// are measured in.
pub fn trimmed_len(text: &str) -> usize {
    trim_text(text).encode_utf16().count()
}

/// What happened to a single candidate element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementOutcome {
    /// Marker already set; nothing done.
    AlreadyProcessed,
    /// Too far from the viewport; left unmarked for a later scan.
    OutOfView,
    /// Not enough text; marked without wrapping.
    BelowThreshold,
    /// Enough text; `wrapped` text nodes were replaced by wrapper spans.
    Highlighted { wrapped: usize },
}

/// Tally of a finished scan, logged at debug level.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub candidates: usize,
    pub batches: usize,
    pub already_processed: usize,
    pub out_of_view: usize,
    pub below_threshold: usize,
    pub highlighted: usize,
    pub wrapped_nodes: usize,
}

impl ScanReport {
    fn record(&mut self, outcome: ElementOutcome) {
        match outcome {
            ElementOutcome::AlreadyProcessed => self.already_processed += 1,
            ElementOutcome::OutOfView => self.out_of_view += 1,
            ElementOutcome::BelowThreshold => self.below_threshold += 1,
            ElementOutcome::Highlighted { wrapped } => {
                self.highlighted += 1;
                self.wrapped_nodes += wrapped;
            }
        }
    }
}

/// Candidates of one scan and how far it has got.
struct ScanJob<E> {
    candidates: Vec<E>,
    cursor: usize,
    report: ScanReport,
}

impl<E> ScanJob<E> {
    fn new(candidates: Vec<E>) -> Self {
        let report = ScanReport {
            candidates: candidates.len(),
            ..Default::default()
        };
        Self {
            candidates,
            cursor: 0,
            report,
        }
    }

    fn is_done(&self) -> bool {
        self.cursor >= self.candidates.len()
    }
}

/// Walks a subtree and wraps qualifying text, a batch per frame.
pub struct BatchScanner<T, F> {
    tree: Rc<T>,
    frames: Rc<F>,
    config: Rc<HighlightConfig>,
}

impl<T, F> Clone for BatchScanner<T, F> {
    fn clone(&self) -> Self {
        Self {
            tree: Rc::clone(&self.tree),
            frames: Rc::clone(&self.frames),
            config: Rc::clone(&self.config),
        }
    }
}

impl<T, F> BatchScanner<T, F>
where
    T: TreeQuery + 'static,
    F: FrameScheduler + 'static,
{
    pub fn new(tree: Rc<T>, frames: Rc<F>, config: Rc<HighlightConfig>) -> Self {
        Self {
            tree,
            frames,
            config,
        }
    }

    pub fn tree(&self) -> &Rc<T> {
        &self.tree
    }

    pub fn config(&self) -> &HighlightConfig {
        &self.config
    }

    /// Highlight text within the subtree rooted at `root` (default: body).
    ///
    /// Returns after the first batch; the rest follow on later frames. A
    /// missing root makes this a no-op.
    pub fn scan(&self, root: Option<&T::Element>) {
        let Some(root) = root.cloned().or_else(|| self.tree.body()) else {
            tracing::debug!("scan: no root element, nothing to do");
            return;
        };

        let candidates = self
            .tree
            .descendants_matching(&root, &self.config.tag_refs());
        tracing::debug!(candidates = candidates.len(), "scan: starting");

        self.run(ScanJob::new(candidates));
    }

    fn run(&self, mut job: ScanJob<T::Element>) {
        self.run_batch(&mut job);

        if job.is_done() {
            let report = &job.report;
            tracing::debug!(
                candidates = report.candidates,
                batches = report.batches,
                highlighted = report.highlighted,
                wrapped_nodes = report.wrapped_nodes,
                below_threshold = report.below_threshold,
                out_of_view = report.out_of_view,
                already_processed = report.already_processed,
                "scan: finished"
            );
            return;
        }

        let scanner = self.clone();
        self.frames
            .request_frame(Box::new(move || scanner.run(job)));
    }

    fn run_batch(&self, job: &mut ScanJob<T::Element>) {
        let end = (job.cursor + self.config.batch_size.max(1)).min(job.candidates.len());
        for element in &job.candidates[job.cursor..end] {
            let outcome = self.process_element(element);
            job.report.record(outcome);
        }
        job.cursor = end;
        job.report.batches += 1;
    }

    /// Process one candidate element.
    ///
    /// Out-of-view elements are left unmarked so a later scan can pick them
    /// up once they scroll near the viewport. Every other element ends up
    /// marked, wrapped or not.
    pub fn process_element(&self, element: &T::Element) -> ElementOutcome {
        let tree = &*self.tree;
        let config = &*self.config;

        if self.is_processed(element) {
            return ElementOutcome::AlreadyProcessed;
        }

        let rect = tree.bounding_rect(element);
        if !is_near_viewport(&rect, &tree.viewport(), config.viewport_margin) {
            tracing::trace!(?rect, "process_element: out of view");
            return ElementOutcome::OutOfView;
        }

        let outcome = if trimmed_len(&tree.text_content(element)) > config.min_chars {
            ElementOutcome::Highlighted {
                wrapped: self.wrap_text_nodes(element),
            }
        } else {
            ElementOutcome::BelowThreshold
        };

        if let Err(e) = tree.set_attribute(element, &config.marker_attribute, MARKER_VALUE) {
            tracing::warn!("Failed to mark element as processed: {}", e);
        }

        tracing::trace!(?outcome, "process_element: done");
        outcome
    }

    fn is_processed(&self, element: &T::Element) -> bool {
        self.tree
            .attribute(element, &self.config.marker_attribute)
            .is_some_and(|v| !v.is_empty())
    }

    /// Wrap every long enough text node under `element`, returning how many
    /// were wrapped.
    fn wrap_text_nodes(&self, element: &T::Element) -> usize {
        let tree = &*self.tree;
        let config = &*self.config;

        // Collect first: wrapping replaces nodes the walk would otherwise visit.
        let text_nodes: Vec<(T::Text, String)> = tree
            .text_nodes(element)
            .into_iter()
            .map(|node| {
                let text = tree.node_text(&node);
                (node, text)
            })
            .filter(|(_, text)| !trim_text(text).is_empty())
            .collect();

        let mut wrapped = 0;
        for (node, text) in text_nodes {
            let inside_wrapper = tree
                .text_parent(&node)
                .is_some_and(|parent| tree.has_class(&parent, &config.class_name));
            if inside_wrapper || trimmed_len(&text) < config.min_chars {
                continue;
            }

            match tree.wrap_text(&node, &config.class_name) {
                Ok(()) => wrapped += 1,
                Err(e) => tracing::warn!("Failed to wrap text node: {}", e),
            }
        }
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::testing::{ManualFrames, MemoryDocument, NodeId};

    const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit sed do.";

    fn scanner(doc: &Rc<MemoryDocument>) -> (BatchScanner<MemoryDocument, ManualFrames>, Rc<ManualFrames>) {
        let frames = Rc::new(ManualFrames::new());
        let scanner = BatchScanner::new(
            Rc::clone(doc),
            Rc::clone(&frames),
            Rc::new(HighlightConfig::default()),
        );
        (scanner, frames)
    }

    fn paragraph(doc: &MemoryDocument, parent: NodeId, text: &str) -> NodeId {
        let p = doc.append_element(parent, "p");
        doc.append_text(p, text);
        p
    }

    #[test]
    fn test_lorem_paragraph_is_wrapped() {
        let doc = Rc::new(MemoryDocument::new());
        let p = paragraph(&doc, doc.body_id(), LOREM);
        let (scanner, _) = scanner(&doc);

        scanner.scan(None);

        let children = doc.children(p);
        assert_eq!(children.len(), 1);
        let span = children[0];
        assert_eq!(doc.tag(span).as_deref(), Some("span"));
        assert_eq!(doc.get_attribute(span, "class").as_deref(), Some("highlight-orange"));
        assert_eq!(doc.text_content_of(span), LOREM);
        assert_eq!(doc.get_attribute(p, "data-highlighted").as_deref(), Some("true"));
    }

    #[test]
    fn test_wrapped_html() {
        let doc = Rc::new(MemoryDocument::new());
        let p = paragraph(&doc, doc.body_id(), LOREM);
        let (scanner, _) = scanner(&doc);

        scanner.scan(None);

        insta::assert_snapshot!(
            doc.to_html(p),
            @r#"<p data-highlighted="true"><span class="highlight-orange">Lorem ipsum dolor sit amet, consectetur adipiscing elit sed do.</span></p>"#
        );
    }

    #[test]
    fn test_threshold_boundary() {
        let fifty = "a".repeat(50);
        let fifty_one = "b".repeat(51);

        let doc = Rc::new(MemoryDocument::new());
        let at = paragraph(&doc, doc.body_id(), &fifty);
        let over = paragraph(&doc, doc.body_id(), &fifty_one);
        let (scanner, _) = scanner(&doc);

        assert_eq!(scanner.process_element(&at), ElementOutcome::BelowThreshold);
        assert_eq!(
            scanner.process_element(&over),
            ElementOutcome::Highlighted { wrapped: 1 }
        );

        assert_eq!(doc.tag(doc.children(at)[0]), None);
        assert_eq!(doc.tag(doc.children(over)[0]).as_deref(), Some("span"));
        // Both are marked either way.
        assert!(doc.get_attribute(at, "data-highlighted").is_some());
        assert!(doc.get_attribute(over, "data-highlighted").is_some());
    }

    #[test]
    fn test_threshold_counts_trimmed_text() {
        let padded = format!("   {}\n\t", "c".repeat(50));
        let doc = Rc::new(MemoryDocument::new());
        let p = paragraph(&doc, doc.body_id(), &padded);
        let (scanner, _) = scanner(&doc);

        assert_eq!(scanner.process_element(&p), ElementOutcome::BelowThreshold);
    }

    #[test]
    fn test_short_nodes_in_long_element_stay_plain() {
        // Element text is long enough, but only one node is long on its own.
        let doc = Rc::new(MemoryDocument::new());
        let div = doc.append_element(doc.body_id(), "div");
        doc.append_text(div, "short lead-in, ");
        let em = doc.append_element(div, "em");
        doc.append_text(em, &"x".repeat(50));
        let (scanner, _) = scanner(&doc);

        assert_eq!(
            scanner.process_element(&div),
            ElementOutcome::Highlighted { wrapped: 1 }
        );
        insta::assert_snapshot!(
            doc.to_html(div),
            @r#"<div data-highlighted="true">short lead-in, <em><span class="highlight-orange">xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx</span></em></div>"#
        );
    }

    #[test]
    fn test_whitespace_nodes_never_wrapped_or_counted() {
        let doc = Rc::new(MemoryDocument::new());
        let div = doc.append_element(doc.body_id(), "div");
        doc.append_text(div, &" ".repeat(80));
        doc.append_text(div, "short");
        doc.append_text(div, &"\n\t".repeat(40));
        let (scanner, _) = scanner(&doc);

        assert_eq!(scanner.process_element(&div), ElementOutcome::BelowThreshold);
        assert!(doc.children(div).iter().all(|c| doc.tag(*c).is_none()));
    }

    #[test]
    fn test_scan_twice_is_idempotent() {
        let doc = Rc::new(MemoryDocument::new());
        let outer = doc.append_element(doc.body_id(), "div");
        paragraph(&doc, outer, LOREM);
        let inner = doc.append_element(outer, "span");
        doc.append_text(inner, &"y".repeat(70));
        let (scanner, _) = scanner(&doc);

        scanner.scan(None);
        let once = doc.to_html(doc.body_id());
        scanner.scan(None);
        scanner.scan(Some(&outer));
        let twice = doc.to_html(doc.body_id());

        // Later scans mark the new wrapper spans, nothing else changes.
        let strip = |html: &str| html.replace(r#" data-highlighted="true""#, "");
        assert_eq!(strip(&once), strip(&twice));
        assert_eq!(twice.matches("<span").count(), 3);
        assert_eq!(once.matches("highlight-orange").count(), 2);
    }

    #[test]
    fn test_wrapper_never_rewrapped() {
        let doc = Rc::new(MemoryDocument::new());
        let p = paragraph(&doc, doc.body_id(), LOREM);
        let (scanner, _) = scanner(&doc);
        scanner.scan(None);

        // The wrapper span is itself a candidate on later scans.
        let span = doc.children(p)[0];
        assert_eq!(
            scanner.process_element(&span),
            ElementOutcome::Highlighted { wrapped: 0 }
        );
        assert_eq!(doc.children(span).len(), 1);
        assert_eq!(doc.tag(doc.children(span)[0]), None);

        scanner.scan(None);
        assert_eq!(doc.to_html(doc.body_id()).matches("<span").count(), 1);
    }

    #[test]
    fn test_out_of_view_left_unmarked_until_near() {
        let doc = Rc::new(MemoryDocument::new());
        let p = paragraph(&doc, doc.body_id(), LOREM);
        doc.set_rect(p, Rect::from_origin(0.0, 3000.0, 600.0, 40.0));
        let (scanner, _) = scanner(&doc);

        scanner.scan(None);
        assert_eq!(doc.get_attribute(p, "data-highlighted"), None);
        assert_eq!(doc.tag(doc.children(p)[0]), None);

        doc.scroll_by(2500.0);
        scanner.scan(None);
        assert_eq!(doc.get_attribute(p, "data-highlighted").as_deref(), Some("true"));
        assert_eq!(doc.tag(doc.children(p)[0]).as_deref(), Some("span"));
    }

    #[test]
    fn test_batches_span_frames() {
        let doc = Rc::new(MemoryDocument::new());
        let paragraphs: Vec<_> = (0..25)
            .map(|i| paragraph(&doc, doc.body_id(), &format!("{i:02} {LOREM}")))
            .collect();
        let (scanner, frames) = scanner(&doc);

        let marked = || {
            paragraphs
                .iter()
                .filter(|p| doc.get_attribute(**p, "data-highlighted").is_some())
                .count()
        };

        scanner.scan(None);
        assert_eq!(marked(), 10);
        assert_eq!(frames.pending(), 1);

        assert!(frames.run_next());
        assert_eq!(marked(), 20);
        assert_eq!(frames.pending(), 1);

        assert!(frames.run_next());
        assert_eq!(marked(), 25);
        assert_eq!(frames.pending(), 0);
    }

    #[test]
    fn test_batches_follow_document_order() {
        let doc = Rc::new(MemoryDocument::new());
        let first = doc.append_element(doc.body_id(), "div");
        let nested: Vec<_> = (0..12).map(|_| paragraph(&doc, first, LOREM)).collect();
        let last = paragraph(&doc, doc.body_id(), LOREM);
        let (scanner, frames) = scanner(&doc);

        scanner.scan(None);
        // div + first nine paragraphs make the first batch.
        assert!(doc.get_attribute(first, "data-highlighted").is_some());
        assert!(doc.get_attribute(nested[8], "data-highlighted").is_some());
        assert!(doc.get_attribute(nested[9], "data-highlighted").is_none());
        assert!(doc.get_attribute(last, "data-highlighted").is_none());

        frames.run_all();
        assert!(doc.get_attribute(last, "data-highlighted").is_some());
    }

    #[test]
    fn test_interleaved_scans_do_not_double_wrap() {
        let doc = Rc::new(MemoryDocument::new());
        for i in 0..15 {
            paragraph(&doc, doc.body_id(), &format!("{i:02} {LOREM}"));
        }
        let (scanner, frames) = scanner(&doc);

        scanner.scan(None);
        scanner.scan(None);
        assert_eq!(frames.pending(), 2);
        frames.run_all();

        let html = doc.to_html(doc.body_id());
        assert_eq!(html.matches("highlight-orange").count(), 15);
    }

    #[test]
    fn test_root_itself_is_not_a_candidate() {
        let doc = Rc::new(MemoryDocument::new());
        let p = paragraph(&doc, doc.body_id(), LOREM);
        let (scanner, _) = scanner(&doc);

        scanner.scan(Some(&p));
        assert_eq!(doc.get_attribute(p, "data-highlighted"), None);
    }

    #[test]
    fn test_only_allowed_tags_are_candidates() {
        let doc = Rc::new(MemoryDocument::new());
        let li = doc.append_element(doc.body_id(), "li");
        doc.append_text(li, LOREM);
        let (scanner, _) = scanner(&doc);

        scanner.scan(None);
        assert_eq!(doc.get_attribute(li, "data-highlighted"), None);
        assert_eq!(doc.tag(doc.children(li)[0]), None);
    }

    #[test]
    fn test_missing_body_is_noop() {
        let doc = Rc::new(MemoryDocument::without_body());
        let (scanner, frames) = scanner(&doc);

        scanner.scan(None);
        assert!(doc.query_roots().is_empty());
        assert_eq!(frames.pending(), 0);
    }

    #[test]
    fn test_failed_wrap_still_marks() {
        let doc = Rc::new(MemoryDocument::new());
        let p = paragraph(&doc, doc.body_id(), LOREM);
        doc.fail_wraps(true);
        let (scanner, _) = scanner(&doc);

        assert_eq!(
            scanner.process_element(&p),
            ElementOutcome::Highlighted { wrapped: 0 }
        );
        assert_eq!(doc.get_attribute(p, "data-highlighted").as_deref(), Some("true"));
        assert_eq!(doc.tag(doc.children(p)[0]), None);
    }

    #[test]
    fn test_trimmed_len_counts_utf16_units() {
        assert_eq!(trimmed_len("  héllo  "), 5);
        assert_eq!(trimmed_len("\n\t "), 0);
        assert_eq!(trimmed_len("🌍🌍"), 4);
        assert_eq!(trimmed_len(&format!("{}\u{FEFF}", "a".repeat(50))), 50);
        assert_eq!(trimmed_len("\u{FEFF}\u{00A0}x\u{3000}"), 1);
        // NEL is not trimmed by the DOM.
        assert_eq!(trimmed_len("\u{0085}x"), 2);
    }

    #[test]
    fn test_astral_text_measured_in_utf16_units() {
        // 26 emoji are 52 UTF-16 units: over the threshold.
        let doc = Rc::new(MemoryDocument::new());
        let p = paragraph(&doc, doc.body_id(), &"😀".repeat(26));
        let (scanner, _) = scanner(&doc);

        assert_eq!(
            scanner.process_element(&p),
            ElementOutcome::Highlighted { wrapped: 1 }
        );
        assert_eq!(doc.tag(doc.children(p)[0]).as_deref(), Some("span"));
    }

    #[test]
    fn test_byte_order_mark_padding_is_trimmed() {
        let doc = Rc::new(MemoryDocument::new());
        let p = paragraph(&doc, doc.body_id(), &format!("\u{FEFF}{}\u{FEFF}", "a".repeat(50)));
        let (scanner, _) = scanner(&doc);

        assert_eq!(scanner.process_element(&p), ElementOutcome::BelowThreshold);
        assert_eq!(doc.tag(doc.children(p)[0]), None);
    }

    #[test]
    fn test_processed_element_ignores_later_text() {
        let doc = Rc::new(MemoryDocument::new());
        let p = paragraph(&doc, doc.body_id(), "short");
        let (scanner, _) = scanner(&doc);
        scanner.scan(None);
        assert_eq!(doc.get_attribute(p, "data-highlighted").as_deref(), Some("true"));

        let late = doc.append_text(p, &"z".repeat(60));
        assert_eq!(scanner.process_element(&p), ElementOutcome::AlreadyProcessed);
        scanner.scan(None);
        assert_eq!(doc.children(p)[1], late);
        assert_eq!(doc.tag(late), None);

        // A new unmarked child of the processed element is still picked up.
        let child = paragraph(&doc, p, &"w".repeat(60));
        scanner.scan(Some(&p));
        assert_eq!(doc.get_attribute(child, "data-highlighted").as_deref(), Some("true"));
        assert_eq!(doc.tag(doc.children(child)[0]).as_deref(), Some("span"));
        assert_eq!(doc.children(p)[1], late);
    }
}
