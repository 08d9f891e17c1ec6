//! Subscriber types for the variable store.
//!
//! A tap is a callback invoked whenever a variable is set. Taps live in
//! slot lists indexed by [`TapHandle`]; removing a tap empties its slot
//! instead of shifting the list, so handles held elsewhere stay valid and a
//! notification pass that is already under way keeps its positions.

use std::rc::Rc;

use crate::dom::NodeId;
use super::Value;

/// Handle returned by `tap`, used to `untap` later.
///
/// Handles are positions in one key's tap list. They are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TapHandle(usize);

impl TapHandle {
    /// Slot index of this tap in its list.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Callback for one key: `(old, new, source element)`.
pub type KeyTap = Rc<dyn Fn(&Value, &Value, Option<NodeId>)>;

/// Callback for every key: `(key, old, new, source element)`.
pub type WildcardTap = Rc<dyn Fn(&str, &Value, &Value, Option<NodeId>)>;

/// Ordered tap slots for one subscription list.
pub(crate) struct TapList<T: ?Sized> {
    slots: Vec<Option<Rc<T>>>,
}

impl<T: ?Sized> TapList<T> {
    /// Create an empty list.
    pub(crate) fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Append a tap and hand out its handle.
    pub(crate) fn push(&mut self, tap: Rc<T>) -> TapHandle {
        self.slots.push(Some(tap));
        TapHandle(self.slots.len() - 1)
    }

    /// Empty the slot behind `handle`. Unknown handles are ignored.
    pub(crate) fn remove(&mut self, handle: TapHandle) {
        if let Some(slot) = self.slots.get_mut(handle.0) {
            *slot = None;
        }
    }

    /// Number of slots, including emptied ones.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// The live tap at `index`, if its slot is still occupied.
    pub(crate) fn get(&self, index: usize) -> Option<Rc<T>> {
        self.slots.get(index).and_then(|slot| slot.clone())
    }

    /// Number of taps still installed.
    pub(crate) fn active(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn handles_are_sequential_and_stable() {
        let mut list: TapList<dyn Fn()> = TapList::new();
        let a = list.push(Rc::new(|| {}));
        let b = list.push(Rc::new(|| {}));
        let c = list.push(Rc::new(|| {}));
        assert_eq!((a.index(), b.index(), c.index()), (0, 1, 2));

        list.remove(b);
        assert_eq!(list.len(), 3);
        assert_eq!(list.active(), 2);
        assert!(list.get(b.index()).is_none());
        assert!(list.get(c.index()).is_some());

        let d = list.push(Rc::new(|| {}));
        assert_eq!(d.index(), 3);
    }

    #[test]
    fn removed_tap_is_never_called() {
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        let mut list: TapList<dyn Fn()> = TapList::new();
        let handle = list.push(Rc::new(move || flag.set(true)));
        list.remove(handle);
        list.remove(TapHandle(42));

        for index in 0..list.len() {
            if let Some(tap) = list.get(index) {
                tap();
            }
        }
        assert!(!called.get());
    }
}
