//! Element helper for widgets that render markup by hand.

use std::rc::Rc;

use tracing::debug;

use super::{Document, InsertPosition, NodeId};
use crate::error::{Error, Result};

/// Wraps one element with content save/restore and markup insertion.
///
/// Widgets use it to swap a loading placeholder in and out of a container
/// and to append rendered rows.
pub struct El<D: Document + ?Sized> {
    doc: Rc<D>,
    el: NodeId,
    saved: Option<String>,
}

impl<D: Document + ?Sized> El<D> {
    /// Wrap `el`.
    pub fn new(doc: Rc<D>, el: NodeId) -> Self {
        Self {
            doc,
            el,
            saved: None,
        }
    }

    /// Wrap the element whose `id` attribute is `id`.
    pub fn by_id(doc: Rc<D>, id: &str) -> Result<Self> {
        let el = doc
            .element_by_id(id)
            .ok_or_else(|| Error::UnknownElement(id.to_string()))?;
        Ok(Self::new(doc, el))
    }

    /// The wrapped element.
    pub fn node(&self) -> NodeId {
        self.el
    }

    /// Whether a stored content snapshot is waiting to be restored.
    pub fn is_stored(&self) -> bool {
        self.saved.is_some()
    }

    /// Snapshot the current inner HTML, replacing any earlier snapshot.
    pub fn store(&mut self) -> &mut Self {
        self.saved = Some(self.doc.inner_html(self.el));
        self
    }

    /// Put the snapshot back and forget it. Without one this does nothing.
    pub fn restore(&mut self) -> &mut Self {
        if let Some(saved) = self.saved.take() {
            self.html(&saved);
        }
        self
    }

    /// Replace the inner HTML unless it already equals `content`.
    ///
    /// Returns whether the document was written.
    pub fn html(&self, content: &str) -> bool {
        if self.doc.inner_html(self.el) == content {
            return false;
        }
        self.doc.set_inner_html(self.el, content);
        true
    }

    /// Insert `content` before the first child.
    pub fn prepend(&self, content: &str) {
        self.insert(InsertPosition::AfterBegin, content);
    }

    /// Insert `content` after the last child.
    pub fn append(&self, content: &str) {
        self.insert(InsertPosition::BeforeEnd, content);
    }

    /// Insert `content` as the previous sibling.
    pub fn before(&self, content: &str) {
        self.insert(InsertPosition::BeforeBegin, content);
    }

    /// Insert `content` as the next sibling.
    pub fn after(&self, content: &str) {
        self.insert(InsertPosition::AfterEnd, content);
    }

    /// Detach the element from its parent.
    pub fn remove(&self) {
        debug!(el = self.el.raw(), "removing element");
        self.doc.remove_element(self.el);
    }

    fn insert(&self, position: InsertPosition, content: &str) {
        self.doc.insert_adjacent_html(self.el, position, content);
    }
}
