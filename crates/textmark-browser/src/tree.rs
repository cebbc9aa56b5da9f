//! Browser implementation of document tree queries and mutation.

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, Element, Text, Window};

use textmark_core::{HighlightError, Rect, TreeQuery, ViewportSize};

/// `NodeFilter.SHOW_TEXT`
const SHOW_TEXT: u32 = 0x4;

pub(crate) fn host_error(context: &str, err: JsValue) -> HighlightError {
    HighlightError::Host(format!("{context} failed: {err:?}"))
}

/// Live page document.
pub struct BrowserTree {
    window: Window,
    document: Document,
}

impl BrowserTree {
    /// Tree for the global window's document.
    pub fn new() -> Result<Self, HighlightError> {
        let window = web_sys::window().ok_or(HighlightError::Unavailable("window"))?;
        let document = window
            .document()
            .ok_or(HighlightError::Unavailable("document"))?;
        Ok(Self { window, document })
    }

    pub fn from_parts(window: Window, document: Document) -> Self {
        Self { window, document }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// `innerWidth`/`innerHeight`, falling back to the root element's client
    /// size when the window reports zero.
    fn window_dimension(
        &self,
        inner: Result<JsValue, JsValue>,
        client: impl Fn(&Element) -> i32,
    ) -> f64 {
        inner
            .ok()
            .and_then(|v| v.as_f64())
            .filter(|v| *v > 0.0)
            .or_else(|| {
                self.document
                    .document_element()
                    .map(|root| f64::from(client(&root)))
            })
            .unwrap_or(0.0)
    }
}

impl TreeQuery for BrowserTree {
    type Element = Element;
    type Text = Text;

    fn body(&self) -> Option<Element> {
        self.document.body().map(Element::from)
    }

    fn descendants_matching(&self, root: &Element, tags: &[&str]) -> Vec<Element> {
        let selector = tags.join(", ");
        let node_list = match root.query_selector_all(&selector) {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(selector = %selector, "querySelectorAll failed: {:?}", e);
                return Vec::new();
            }
        };

        (0..node_list.length())
            .filter_map(|i| node_list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }

    fn text_content(&self, element: &Element) -> String {
        element.text_content().unwrap_or_default()
    }

    fn text_nodes(&self, root: &Element) -> Vec<Text> {
        let walker = match self
            .document
            .create_tree_walker_with_what_to_show(root, SHOW_TEXT)
        {
            Ok(walker) => walker,
            Err(e) => {
                tracing::warn!("create_tree_walker failed: {:?}", e);
                return Vec::new();
            }
        };

        let mut text_nodes = Vec::new();
        while let Ok(Some(node)) = walker.next_node() {
            if let Ok(text) = node.dyn_into::<Text>() {
                text_nodes.push(text);
            }
        }
        text_nodes
    }

    fn node_text(&self, text: &Text) -> String {
        text.text_content().unwrap_or_default()
    }

    fn text_parent(&self, text: &Text) -> Option<Element> {
        text.parent_element()
    }

    fn has_class(&self, element: &Element, class: &str) -> bool {
        element.class_list().contains(class)
    }

    fn attribute(&self, element: &Element, name: &str) -> Option<String> {
        element.get_attribute(name)
    }

    fn set_attribute(&self, element: &Element, name: &str, value: &str) -> Result<(), HighlightError> {
        element
            .set_attribute(name, value)
            .map_err(|e| host_error("setAttribute", e))
    }

    fn bounding_rect(&self, element: &Element) -> Rect {
        let rect = element.get_bounding_client_rect();
        Rect::new(rect.top(), rect.left(), rect.bottom(), rect.right())
    }

    fn viewport(&self) -> ViewportSize {
        ViewportSize::new(
            self.window_dimension(self.window.inner_width(), Element::client_width),
            self.window_dimension(self.window.inner_height(), Element::client_height),
        )
    }

    fn wrap_text(&self, text: &Text, class: &str) -> Result<(), HighlightError> {
        let parent = text
            .parent_node()
            .ok_or(HighlightError::Host("text node has no parent".into()))?;

        let span = self
            .document
            .create_element("span")
            .map_err(|e| host_error("createElement", e))?;
        span.set_class_name(class);
        span.set_text_content(text.text_content().as_deref());

        parent
            .replace_child(&span, text)
            .map_err(|e| host_error("replaceChild", e))?;
        Ok(())
    }
}
