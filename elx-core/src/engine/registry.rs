//! Reference Registry
//!
//! Logical keys map to the ordered, duplicate-free list of elements that
//! carry `x-ref-<key>`. The registry also remembers which elements listen
//! for window-level key combos and the current tab range.
//!
//! Entries are non-owning: elements belong to the document. Detached
//! elements linger until [`Registry::clean`] runs.

use indexmap::IndexMap;

use crate::dom::{Document, NodeId};

/// Focus-trap boundaries for Tab cycling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabRange {
    pub first: Option<NodeId>,
    pub last: Option<NodeId>,
    /// Keys recorded by the last scan pass that resolved a tab spec.
    pub default_first: String,
    pub default_last: String,
}

impl TabRange {
    /// The `"first:last"` spec of the recorded defaults, if any was set.
    pub fn default_spec(&self) -> Option<String> {
        if self.default_first.is_empty() && self.default_last.is_empty() {
            None
        } else {
            Some(format!("{}:{}", self.default_first, self.default_last))
        }
    }
}

/// Elements removed by one clean pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub refs_removed: usize,
    pub keys_removed: usize,
    pub combos_removed: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    refs: IndexMap<String, Vec<NodeId>>,
    window_keys: IndexMap<String, Vec<NodeId>>,
    pub tab: TabRange,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `el` under `key` unless it is already there.
    ///
    /// Returns `true` if the element was added.
    pub fn register(&mut self, key: &str, el: NodeId) -> bool {
        push_unique(self.refs.entry(key.to_string()).or_default(), el)
    }

    /// Elements under `key`, in first-registration order.
    pub fn lookup(&self, key: &str) -> Vec<NodeId> {
        self.refs.get(key).cloned().unwrap_or_default()
    }

    /// First element registered under `key`.
    pub fn first(&self, key: &str) -> Option<NodeId> {
        self.refs.get(key).and_then(|els| els.first().copied())
    }

    /// Registered keys in first-seen order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.refs.keys().map(String::as_str)
    }

    /// Number of registered keys.
    pub fn len(&self) -> usize {
        self.refs.len()
    }

    /// Record `el` as a target of window combo `combo`.
    ///
    /// Returns `false` if it was already recorded.
    pub fn register_window_key(&mut self, combo: &str, el: NodeId) -> bool {
        push_unique(self.window_keys.entry(combo.to_string()).or_default(), el)
    }

    /// Elements listening for window combo `combo`.
    pub fn window_targets(&self, combo: &str) -> Vec<NodeId> {
        self.window_keys.get(combo).cloned().unwrap_or_default()
    }

    /// Drop every element no longer attached to `doc`, and every key left
    /// without elements.
    pub fn clean<D: Document + ?Sized>(&mut self, doc: &D) -> CleanReport {
        let mut report = CleanReport::default();
        let (removed, keys) = retain_connected(&mut self.refs, doc);
        report.refs_removed = removed;
        report.keys_removed = keys;
        let (_, combos) = retain_connected(&mut self.window_keys, doc);
        report.combos_removed = combos;
        report
    }
}

fn push_unique(els: &mut Vec<NodeId>, el: NodeId) -> bool {
    if els.contains(&el) {
        false
    } else {
        els.push(el);
        true
    }
}

fn retain_connected<D: Document + ?Sized>(
    map: &mut IndexMap<String, Vec<NodeId>>,
    doc: &D,
) -> (usize, usize) {
    let mut removed = 0;
    for els in map.values_mut() {
        let before = els.len();
        els.retain(|&el| doc.is_connected(el));
        removed += before - els.len();
    }
    let keys_before = map.len();
    map.retain(|_, els| !els.is_empty());
    (removed, keys_before - map.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDocument;

    #[test]
    fn register_dedupes_and_keeps_order() {
        let mut registry = Registry::new();
        let (a, b) = (NodeId::from(1), NodeId::from(2));
        assert!(registry.register("item", a));
        assert!(registry.register("item", b));
        assert!(!registry.register("item", a));
        assert_eq!(registry.lookup("item"), vec![a, b]);
        assert_eq!(registry.first("item"), Some(a));
        assert!(registry.lookup("missing").is_empty());
    }

    #[test]
    fn clean_drops_detached_elements_and_empty_keys() {
        let doc = MemoryDocument::new();
        let body = doc.body();
        let kept = doc.create_child(body, "li", &[]);
        let gone = doc.create_child(body, "li", &[]);
        let lonely = doc.create_child(body, "p", &[]);

        let mut registry = Registry::new();
        registry.register("item", kept);
        registry.register("item", gone);
        registry.register("note", lonely);
        registry.register_window_key("escape", lonely);

        doc.remove(gone);
        doc.remove(lonely);
        let report = registry.clean(&doc);

        assert_eq!(registry.lookup("item"), vec![kept]);
        assert!(registry.lookup("note").is_empty());
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["item"]);
        assert!(registry.window_targets("escape").is_empty());
        assert_eq!(
            report,
            CleanReport {
                refs_removed: 2,
                keys_removed: 1,
                combos_removed: 1,
            }
        );
    }

    #[test]
    fn default_spec_requires_a_recorded_key() {
        let mut tab = TabRange::default();
        assert_eq!(tab.default_spec(), None);
        tab.default_first = "name".into();
        assert_eq!(tab.default_spec().as_deref(), Some("name:"));
    }
}
