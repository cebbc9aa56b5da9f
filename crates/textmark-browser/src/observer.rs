//! Structural change subscription via `MutationObserver`, and document
//! readiness via `DOMContentLoaded`.

use gloo_events::EventListener;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{
    Document, Element, MutationObserver, MutationObserverInit, MutationRecord, Node,
};

use textmark_core::{AddedNode, ChangeKind, ChangeNotifier, ChangeRecord, HighlightError};

use crate::tree::host_error;

/// Convert a `MutationRecord` into a core change record.
///
/// Returns `None` for record types the core does not know.
pub fn to_change_record(record: &MutationRecord) -> Option<ChangeRecord<Element>> {
    let kind = ChangeKind::from_mutation_type(&record.type_())?;
    let target = record
        .target()
        .and_then(|node| node.dyn_into::<Element>().ok());

    let added_nodes = record.added_nodes();
    let added = (0..added_nodes.length())
        .filter_map(|i| added_nodes.item(i))
        .map(|node| {
            if node.node_type() == Node::ELEMENT_NODE {
                AddedNode::element(node.text_content().unwrap_or_default())
            } else {
                AddedNode::Other
            }
        })
        .collect();

    Some(ChangeRecord {
        kind,
        target,
        added,
    })
}

/// Live `MutationObserver`. Disconnects on drop.
pub struct ObserverSubscription {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
}

impl Drop for ObserverSubscription {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

/// Change notifications for a page document.
pub struct BrowserNotifier {
    document: Document,
}

impl BrowserNotifier {
    pub fn new(document: Document) -> Self {
        Self { document }
    }
}

impl ChangeNotifier<Element> for BrowserNotifier {
    type Subscription = ObserverSubscription;

    fn subscribe(
        &self,
        root: &Element,
        mut callback: Box<dyn FnMut(Vec<ChangeRecord<Element>>)>,
    ) -> Result<ObserverSubscription, HighlightError> {
        let closure = Closure::wrap(Box::new(
            move |records: js_sys::Array, _observer: MutationObserver| {
                let records: Vec<_> = records
                    .iter()
                    .filter_map(|r| r.dyn_into::<MutationRecord>().ok())
                    .filter_map(|r| to_change_record(&r))
                    .collect();
                tracing::trace!(records = records.len(), "mutation observer batch");
                callback(records);
            },
        ) as Box<dyn FnMut(js_sys::Array, MutationObserver)>);

        let observer = MutationObserver::new(closure.as_ref().unchecked_ref())
            .map_err(|e| host_error("new MutationObserver", e))?;

        // Child list changes only; attribute and text edits never add elements.
        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_subtree(true);
        observer
            .observe_with_options(root, &options)
            .map_err(|e| host_error("MutationObserver.observe", e))?;

        Ok(ObserverSubscription {
            observer,
            _callback: closure,
        })
    }

    fn on_ready(&self, callback: Box<dyn FnOnce()>) {
        if self.document.ready_state() != "loading" {
            callback();
            return;
        }

        tracing::debug!("document still loading, waiting for DOMContentLoaded");
        EventListener::once(&self.document, "DOMContentLoaded", move |_| callback()).forget();
    }
}
