//! Document Nodes
//!
//! This module defines the element handle shared by every [`Document`]
//! implementation and the node record stored by [`MemoryDocument`].
//!
//! [`Document`]: super::Document
//! [`MemoryDocument`]: super::MemoryDocument

use smallvec::SmallVec;

/// Handle to an element in a document.
///
/// Handles are non-owning: the document owns the element, and a handle to a
/// removed element simply stops being connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// An element stored in the in-memory document arena.
#[derive(Debug, Default)]
pub(crate) struct Node {
    /// Lower-cased tag name.
    pub(crate) tag: String,

    /// Attributes in insertion order. Names are unique.
    pub(crate) attributes: Vec<(String, String)>,

    /// Parent element, `None` for the body root and detached elements.
    pub(crate) parent: Option<NodeId>,

    /// Child elements in document order.
    pub(crate) children: SmallVec<[NodeId; 4]>,

    /// Form value for inputs, textareas and selects.
    pub(crate) value: String,

    /// Checked state for checkbox and radio inputs.
    pub(crate) checked: bool,

    /// Markup content of leaf elements.
    pub(crate) html: String,
}

impl Node {
    /// Create a detached node with a lower-cased tag.
    pub(crate) fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_lowercase(),
            ..Self::default()
        }
    }

    /// Look up an attribute value by exact name.
    pub(crate) fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, keeping its original position if it already exists.
    ///
    /// Returns `false` when the stored value was already `value`.
    pub(crate) fn set_attribute(&mut self, name: &str, value: &str) -> bool {
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some((_, current)) if current == value => false,
            Some((_, current)) => {
                *current = value.to_string();
                true
            }
            None => {
                self.attributes.push((name.to_string(), value.to_string()));
                true
            }
        }
    }

    /// Returns `false` when the attribute was absent.
    pub(crate) fn remove_attribute(&mut self, name: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|(n, _)| n != name);
        self.attributes.len() != before
    }

    /// Forget `child` without touching its parent link.
    pub(crate) fn remove_child(&mut self, child: NodeId) {
        self.children.retain(|c| *c != child);
    }
}
