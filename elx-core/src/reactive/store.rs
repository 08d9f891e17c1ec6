//! Variable Store
//!
//! Maps logical keys to their last known [`Value`] and notifies taps when a
//! key is set.
//!
//! # Notification Order
//!
//! `set` stores the new value first, then calls every tap on that key, then
//! every wildcard tap, each in subscription order and each exactly once.
//! Taps always receive the previous value, which is `Null` for a key that
//! was never set.
//!
//! # Re-entrancy
//!
//! Taps routinely call back into the engine: they set other variables, add
//! or remove taps, or scan freshly inserted markup. No internal borrow is
//! held while a tap runs. The number of slots is fixed when notification
//! starts; each slot is re-read right before it is called, so a tap removed
//! earlier in the same pass is skipped and a tap added during the pass waits
//! for the next `set`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::trace;

use crate::dom::NodeId;
use super::subscriber::{KeyTap, TapHandle, TapList, WildcardTap};
use super::Value;

type KeyTapFn = dyn Fn(&Value, &Value, Option<NodeId>);
type WildcardTapFn = dyn Fn(&str, &Value, &Value, Option<NodeId>);

#[derive(Default)]
struct StoreState {
    values: IndexMap<String, Value>,
    taps: HashMap<String, TapList<KeyTapFn>>,
    wildcard: Option<TapList<WildcardTapFn>>,
}

/// Reactive variable store.
#[derive(Default)]
pub struct VariableStore {
    state: RefCell<StoreState>,
}

impl VariableStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `key`, if it was ever stored.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.borrow().values.get(key).cloned()
    }

    /// Whether `key` has ever been given a value.
    pub fn contains(&self, key: &str) -> bool {
        self.state.borrow().values.contains_key(key)
    }

    /// Store `value` only if `key` has no value yet. Taps are not notified.
    ///
    /// Returns whether the value was stored.
    pub fn seed(&self, key: &str, value: Value) -> bool {
        let mut state = self.state.borrow_mut();
        if state.values.contains_key(key) {
            return false;
        }
        state.values.insert(key.to_string(), value);
        true
    }

    /// Overwrite `key` without notifying taps.
    pub fn put(&self, key: &str, value: Value) {
        self.state.borrow_mut().values.insert(key.to_string(), value);
    }

    /// Store `value` under `key` and notify taps.
    pub fn set(&self, key: &str, value: Value, source: Option<NodeId>) {
        let (old, key_slots, wildcard_slots) = {
            let mut state = self.state.borrow_mut();
            let old = state
                .values
                .insert(key.to_string(), value.clone())
                .unwrap_or_default();
            let key_slots = state.taps.get(key).map_or(0, TapList::len);
            let wildcard_slots = state.wildcard.as_ref().map_or(0, TapList::len);
            (old, key_slots, wildcard_slots)
        };
        trace!(key, %old, new = %value, key_slots, wildcard_slots, "variable set");

        for index in 0..key_slots {
            let tap = self
                .state
                .borrow()
                .taps
                .get(key)
                .and_then(|list| list.get(index));
            if let Some(tap) = tap {
                tap(&old, &value, source);
            }
        }

        for index in 0..wildcard_slots {
            let tap = self
                .state
                .borrow()
                .wildcard
                .as_ref()
                .and_then(|list| list.get(index));
            if let Some(tap) = tap {
                tap(key, &old, &value, source);
            }
        }
    }

    /// Subscribe to changes of `key`.
    pub fn tap<F>(&self, key: &str, callback: F) -> TapHandle
    where
        F: Fn(&Value, &Value, Option<NodeId>) + 'static,
    {
        let tap: KeyTap = Rc::new(callback);
        self.state
            .borrow_mut()
            .taps
            .entry(key.to_string())
            .or_insert_with(TapList::new)
            .push(tap)
    }

    /// Remove a tap from `key`. Other handles on the key stay valid.
    pub fn untap(&self, key: &str, handle: TapHandle) {
        if let Some(list) = self.state.borrow_mut().taps.get_mut(key) {
            list.remove(handle);
        }
    }

    /// Subscribe to changes of every key.
    pub fn tap_all<F>(&self, callback: F) -> TapHandle
    where
        F: Fn(&str, &Value, &Value, Option<NodeId>) + 'static,
    {
        let tap: WildcardTap = Rc::new(callback);
        self.state
            .borrow_mut()
            .wildcard
            .get_or_insert_with(TapList::new)
            .push(tap)
    }

    /// Remove a wildcard tap.
    pub fn untap_all(&self, handle: TapHandle) {
        if let Some(list) = self.state.borrow_mut().wildcard.as_mut() {
            list.remove(handle);
        }
    }

    /// Number of live taps on `key`.
    pub fn tap_count(&self, key: &str) -> usize {
        self.state.borrow().taps.get(key).map_or(0, TapList::active)
    }

    /// All stored keys and values, in first-set order.
    pub fn snapshot(&self) -> Vec<(String, Value)> {
        self.state
            .borrow()
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
