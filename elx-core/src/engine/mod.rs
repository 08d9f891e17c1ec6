//! Directive Engine
//!
//! The engine owns the reference registry, the variable store and the
//! batching queue, and drives a [`Document`] through them.
//!
//! # Lifecycle
//!
//! 1. Build one engine per document with [`Engine::new`] and hand clones of
//!    it to every consumer
//! 2. Call [`Engine::init`] with freshly inserted elements. The scan pass
//!    registers `x-ref-*` keys, seeds variables and binds `x-on-*` listeners
//! 3. User interaction enqueues processing requests. A deferred drain task
//!    on the [`TaskQueue`] applies them in order
//! 4. Call [`Engine::clean`] after removing markup to drop detached
//!    elements from the registry
//!
//! # Re-entrancy
//!
//! Listeners, taps and deferred tasks all call back into the engine. No
//! internal borrow is held across a call into the document or into a tap,
//! and every processing request is deferred, so a directive never observes
//! the registry halfway through a scan.

mod accessor;
mod batch;
mod binder;
mod processor;
mod registry;

pub use accessor::X;
pub use batch::Phase;
pub use registry::{CleanReport, TabRange};

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{debug, error, warn};

use crate::config::EngineConfig;
use crate::directive::{self, REF_PREFIX};
use crate::dom::{current_value, ControlKind, Document, NodeId};
use crate::error::{Error, Result};
use crate::reactive::{TapHandle, Value, VariableStore};
use crate::task::{TaskId, TaskQueue};
use crate::util::trim;

use batch::{Batch, PendingItem, ScanGuard};
use registry::Registry;

pub(crate) struct Inner<D: Document + 'static> {
    doc: Rc<D>,
    tasks: Rc<TaskQueue>,
    config: EngineConfig,
    registry: RefCell<Registry>,
    store: VariableStore,
    batch: RefCell<Batch>,
    focus_task: Cell<Option<TaskId>>,
}

/// Handle to a directive engine.
///
/// Cloning is cheap and every clone drives the same state.
pub struct Engine<D: Document + 'static> {
    inner: Rc<Inner<D>>,
}

impl<D: Document + 'static> Clone for Engine<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<D: Document + 'static> Engine<D> {
    /// Create an engine over `doc`, scheduling deferred work on `tasks`.
    pub fn new(doc: Rc<D>, tasks: Rc<TaskQueue>, config: EngineConfig) -> Self {
        if let Err(reason) = directive::validate() {
            error!(%reason, "directive table is inconsistent");
        }
        Self {
            inner: Rc::new(Inner {
                doc,
                tasks,
                config,
                registry: RefCell::new(Registry::new()),
                store: VariableStore::new(),
                batch: RefCell::new(Batch::new()),
                focus_task: Cell::new(None),
            }),
        }
    }

    /// The document this engine drives.
    pub fn document(&self) -> &Rc<D> {
        &self.inner.doc
    }

    /// The queue deferred work is scheduled on.
    pub fn tasks(&self) -> &Rc<TaskQueue> {
        &self.inner.tasks
    }

    /// The configuration the engine was built with.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Scan `elements`: register references, seed variables, resolve the
    /// tab range and bind event listeners.
    ///
    /// `tab` is a `"first:last"` pair of reference keys. Without one, the
    /// keys recorded by an earlier scan are reused, then the configured
    /// default.
    pub fn init(&self, elements: &[NodeId], tab: Option<&str>) {
        let _scan = ScanGuard::enter(self);
        let doc = &*self.inner.doc;

        // Explicit range, then the recorded defaults, then the config
        let spec = tab
            .map(str::to_string)
            .or_else(|| self.inner.registry.borrow().tab.default_spec())
            .or_else(|| self.inner.config.default_tab.clone())
            .unwrap_or_default();
        let spec = trim(&spec);
        let mut tab_keys = spec.split(':');
        let (tab_first, tab_last) = match (tab_keys.next(), tab_keys.next()) {
            (Some(first), Some(last)) => (trim(first), trim(last)),
            _ => ("", ""),
        };

        // Register everything before binding anything
        for &el in elements {
            for (name, value) in doc.attributes(el) {
                let Some(key) = name.strip_prefix(REF_PREFIX) else {
                    continue;
                };
                self.inner.registry.borrow_mut().register(key, el);
                // Seed only the first time a key is seen
                if !self.inner.store.contains(key) {
                    self.inner.store.seed(key, seed_value(doc, el, &value));
                }
            }

            let has_ref = |key: &str| {
                !key.is_empty() && doc.has_attribute(el, &format!("{}{}", REF_PREFIX, key))
            };
            let mut registry = self.inner.registry.borrow_mut();
            if has_ref(tab_first) {
                registry.tab.first = Some(el);
                registry.tab.default_first = tab_first.to_string();
            }
            if has_ref(tab_last) {
                registry.tab.last = Some(el);
                registry.tab.default_last = tab_last.to_string();
            }
        }

        for &el in elements {
            self.bind(el);
        }
        self.bind_window();

        debug!(
            elements = elements.len(),
            keys = self.inner.registry.borrow().len(),
            "scan pass complete"
        );
    }

    /// [`init`](Self::init) with elements looked up by id.
    pub fn init_by_ids(&self, ids: &[&str], tab: Option<&str>) -> Result<()> {
        let elements = ids
            .iter()
            .map(|id| {
                self.inner
                    .doc
                    .element_by_id(id)
                    .ok_or_else(|| Error::UnknownElement(id.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        self.init(&elements, tab);
        Ok(())
    }

    /// Drop detached elements from the registry.
    pub fn clean(&self) -> CleanReport {
        let _scan = ScanGuard::enter(self);
        let report = self.inner.registry.borrow_mut().clean(&*self.inner.doc);
        debug!(
            refs_removed = report.refs_removed,
            keys_removed = report.keys_removed,
            combos_removed = report.combos_removed,
            "clean pass complete"
        );
        report
    }

    /// Request processing of `el`'s directives under `rule`.
    ///
    /// Never applies anything synchronously: the request is queued and
    /// handled by the next drain.
    pub fn process(&self, el: NodeId, rule: &str) {
        self.enqueue(el, rule, None);
    }

    /// Queue a processing request and make sure a drain will run.
    pub(crate) fn enqueue(&self, el: NodeId, rule: &str, trigger: Option<&str>) {
        let item = PendingItem {
            el,
            rule: rule.to_string(),
            trigger: trigger.map(str::to_string),
        };
        let schedule = self.inner.batch.borrow_mut().push(item);
        if schedule {
            self.schedule_drain();
        }
    }

    fn schedule_drain(&self) {
        let weak: Weak<Inner<D>> = Rc::downgrade(&self.inner);
        let id = self.inner.tasks.schedule(self.inner.config.drain_delay_ms, move || {
            if let Some(inner) = weak.upgrade() {
                Engine { inner }.drain();
            }
        });
        self.inner.batch.borrow_mut().scheduled(id);
    }

    fn drain(&self) {
        if !self.inner.batch.borrow_mut().begin_drain() {
            return;
        }
        // A zero limit would reschedule forever without applying anything.
        let limit = self.inner.config.max_drain_items.max(1);
        let mut applied = 0;
        while applied < limit {
            let item = self.inner.batch.borrow_mut().next();
            let Some(item) = item else {
                break;
            };
            self.apply(&item);
            applied += 1;
        }

        let leftovers = self.inner.batch.borrow_mut().finish_drain();
        if leftovers {
            warn!(
                applied,
                remaining = self.inner.batch.borrow().len(),
                "drain item limit reached; deferring the rest"
            );
            self.schedule_drain();
        }
        debug!(applied, "drain complete");
    }

    /// Current batching phase.
    pub fn phase(&self) -> Phase {
        self.inner.batch.borrow().phase()
    }

    /// Number of queued processing requests.
    pub fn pending(&self) -> usize {
        self.inner.batch.borrow().len()
    }

    /// Accessor for `key`.
    pub fn x(&self, key: &str) -> X<'_, D> {
        X::new(self, key)
    }

    /// Accessor for `key`, storing `value` first without notifying taps.
    pub fn x_init(&self, key: &str, value: impl Into<Value>) -> X<'_, D> {
        self.inner.store.put(key, value.into());
        X::new(self, key)
    }

    /// Elements registered under `key`, in first-registration order.
    pub fn refs(&self, key: &str) -> Vec<NodeId> {
        self.inner.registry.borrow().lookup(key)
    }

    /// Registered reference keys, in first-seen order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.registry.borrow().keys().map(str::to_string).collect()
    }

    /// Current value of `key`; `Null` when never set.
    pub fn variable(&self, key: &str) -> Value {
        self.inner.store.get(key).unwrap_or_default()
    }

    /// The variable store behind `x-var-*` and the accessors.
    pub fn store(&self) -> &VariableStore {
        &self.inner.store
    }

    /// Subscribe to changes of `key`.
    pub fn tap<F>(&self, key: &str, callback: F) -> TapHandle
    where
        F: Fn(&Value, &Value, Option<NodeId>) + 'static,
    {
        self.inner.store.tap(key, callback)
    }

    /// Remove a subscription made through [`Engine::tap`].
    pub fn untap(&self, key: &str, handle: TapHandle) {
        self.inner.store.untap(key, handle);
    }

    /// Subscribe to changes of every key.
    pub fn tap_all<F>(&self, callback: F) -> TapHandle
    where
        F: Fn(&str, &Value, &Value, Option<NodeId>) + 'static,
    {
        self.inner.store.tap_all(callback)
    }

    /// Remove a subscription made through [`Engine::tap_all`].
    pub fn untap_all(&self, handle: TapHandle) {
        self.inner.store.untap_all(handle);
    }

    /// Current tab range.
    pub fn tab_range(&self) -> TabRange {
        self.inner.registry.borrow().tab.clone()
    }
}

/// Initial variable value for an element first seen under `x-ref-<key>`.
fn seed_value<D: Document + ?Sized>(doc: &D, el: NodeId, ref_value: &str) -> Value {
    if ControlKind::of(doc, el) == ControlKind::Toggle {
        return Value::from(current_value(doc, el));
    }
    let value = doc.value(el);
    if value.is_empty() {
        Value::from(ref_value)
    } else {
        Value::from(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDocument;

    fn engine() -> (Rc<MemoryDocument>, Rc<TaskQueue>, Engine<MemoryDocument>) {
        let doc = Rc::new(MemoryDocument::new());
        let tasks = Rc::new(TaskQueue::new());
        let engine = Engine::new(doc.clone(), tasks.clone(), EngineConfig::default());
        (doc, tasks, engine)
    }

    #[test]
    fn init_seeds_variables_once() {
        let (doc, _tasks, engine) = engine();
        let body = doc.body();
        let name = doc.create_child(body, "input", &[("x-ref-name", "")]);
        doc.set_value(name, "Ana");
        let agree = doc.create_child(body, "input", &[("type", "checkbox"), ("x-ref-agree", "")]);
        let label = doc.create_child(body, "span", &[("x-ref-label", "fallback")]);

        engine.init(&[name, agree, label], None);
        assert_eq!(engine.variable("name"), Value::from("Ana"));
        assert_eq!(engine.variable("agree"), Value::from("false"));
        assert_eq!(engine.variable("label"), Value::from("fallback"));

        doc.set_value(name, "Ben");
        engine.init(&[name], None);
        assert_eq!(engine.variable("name"), Value::from("Ana"));
    }

    #[test]
    fn init_resolves_tab_range_and_remembers_defaults() {
        let (doc, _tasks, engine) = engine();
        let body = doc.body();
        let first = doc.create_child(body, "input", &[("x-ref-start", "")]);
        let last = doc.create_child(body, "button", &[("x-ref-end", "")]);

        engine.init(&[first, last], Some("start:end"));
        let tab = engine.tab_range();
        assert_eq!((tab.first, tab.last), (Some(first), Some(last)));
        assert_eq!(tab.default_spec().as_deref(), Some("start:end"));

        let replacement = doc.create_child(body, "button", &[("x-ref-end", "")]);
        engine.init(&[replacement], None);
        assert_eq!(engine.tab_range().last, Some(replacement));
    }

    #[test]
    fn configured_default_tab_applies_without_argument() {
        let doc = Rc::new(MemoryDocument::new());
        let tasks = Rc::new(TaskQueue::new());
        let config = EngineConfig {
            default_tab: Some("a:b".into()),
            ..EngineConfig::default()
        };
        let engine = Engine::new(doc.clone(), tasks, config);
        let a = doc.create_child(doc.body(), "input", &[("x-ref-a", "")]);
        engine.init(&[a], None);
        assert_eq!(engine.tab_range().first, Some(a));
    }

    #[test]
    fn init_by_ids_reports_unknown_ids() {
        let (doc, _tasks, engine) = engine();
        doc.create_child(doc.body(), "div", &[("id", "known"), ("x-ref-k", "")]);
        assert!(engine.init_by_ids(&["known"], None).is_ok());
        assert_eq!(engine.refs("k").len(), 1);
        let err = engine.init_by_ids(&["known", "ghost"], None).unwrap_err();
        assert!(matches!(err, Error::UnknownElement(id) if id == "ghost"));
    }

    #[test]
    fn process_defers_until_the_drain_task() {
        let (doc, tasks, engine) = engine();
        let el = doc.create_child(doc.body(), "span", &[("x-ref-t", ""), ("x-val-t", "hi")]);
        engine.init(&[el], None);

        engine.process(el, "");
        assert_eq!(engine.phase(), Phase::Queued);
        assert_eq!(doc.inner_html(el), "");
        tasks.run_until_idle();
        assert_eq!(doc.inner_html(el), "hi");
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn drain_limit_yields_leftovers_to_a_new_task() {
        let doc = Rc::new(MemoryDocument::new());
        let tasks = Rc::new(TaskQueue::new());
        let config = EngineConfig {
            max_drain_items: 2,
            ..EngineConfig::default()
        };
        let engine = Engine::new(doc.clone(), tasks.clone(), config);
        let el = doc.create_child(doc.body(), "div", &[]);
        for _ in 0..5 {
            engine.process(el, "");
        }
        assert_eq!(tasks.run_due(), 3);
        assert_eq!(engine.pending(), 0);
        assert_eq!(engine.phase(), Phase::Idle);
    }

    #[test]
    fn zero_drain_limit_still_makes_progress() {
        let doc = Rc::new(MemoryDocument::new());
        let tasks = Rc::new(TaskQueue::new());
        let config = EngineConfig {
            max_drain_items: 0,
            ..EngineConfig::default()
        };
        let engine = Engine::new(doc.clone(), tasks.clone(), config);
        let span = doc.create_child(doc.body(), "span", &[("x-ref-t", ""), ("x-val-t", "hi")]);
        engine.init(&[span], None);

        engine.process(span, "");
        engine.process(span, "");
        assert_eq!(tasks.run_until_idle(), 2);
        assert_eq!(doc.inner_html(span), "hi");
        assert_eq!(engine.pending(), 0);
        assert_eq!(engine.phase(), Phase::Idle);
    }
}
