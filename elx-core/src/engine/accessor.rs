//! Per-key accessor returned by [`Engine::x`].

use crate::dom::{Document, NodeId};
use crate::reactive::{TapHandle, Value};

use super::Engine;

/// Reference and variable operations bound to one key.
///
/// `rot`, `set`, `val` and `var` apply immediately. `run` enqueues like any
/// other processing request.
pub struct X<'e, D: Document + 'static> {
    engine: &'e Engine<D>,
    key: String,
    source: Option<NodeId>,
}

impl<'e, D: Document + 'static> X<'e, D> {
    pub(super) fn new(engine: &'e Engine<D>, key: &str) -> Self {
        Self {
            engine,
            key: key.to_string(),
            source: None,
        }
    }

    /// Use `el` as the source element: the target of key `this` and the
    /// element reported to taps.
    pub fn with_source(mut self, el: NodeId) -> Self {
        self.source = Some(el);
        self
    }

    /// The key this accessor addresses.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current variable value, `Null` if never set.
    pub fn value(&self) -> Value {
        self.engine.variable(&self.key)
    }

    /// Elements registered under the key.
    pub fn refs(&self) -> Vec<NodeId> {
        self.engine.refs(&self.key)
    }

    /// Subscribe to changes of the key.
    pub fn tap<F>(&self, callback: F) -> TapHandle
    where
        F: Fn(&Value, &Value, Option<NodeId>) + 'static,
    {
        self.engine.tap(&self.key, callback)
    }

    /// Remove a subscription made through [`X::tap`].
    pub fn untap(&self, handle: TapHandle) {
        self.engine.untap(&self.key, handle);
    }

    /// Rotate the last class token through space-separated `states`.
    pub fn rot(&self, states: &str) {
        self.engine.rotate_class(&self.key, states, self.source);
    }

    /// Rotate `attribute` through `|`-separated `states`.
    pub fn set(&self, attribute: &str, states: &str) {
        self.engine
            .rotate_attribute(&self.key, attribute, states, self.source);
    }

    /// Write `value` into every element under the key.
    pub fn val(&self, value: impl Into<Value>) {
        self.engine.bind_value(&self.key, &value.into(), self.source);
    }

    /// Set the variable, notifying taps.
    pub fn var(&self, value: impl Into<Value>) {
        self.engine
            .store()
            .set(&self.key, value.into(), self.source);
    }

    /// Replay the space-separated trigger attributes on the key's elements.
    pub fn run(&self, triggers: &str) {
        self.engine
            .run_triggers(&self.key, triggers, self.source, None);
    }
}
