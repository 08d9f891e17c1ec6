//! Directive Processor
//!
//! Applies one queued item: parses its rule filter, collects the matching
//! directives from the element's current attributes, then applies them.
//!
//! # Algorithm
//!
//! 1. Every attribute is classified through the directive table and kept if
//!    the rule filter matches its key. A value of `this` is replaced by the
//!    element's current value, computed at most once per item
//! 2. Family directives are applied grouped by family (rotate class, rotate
//!    attribute, bind value, bind variable, run) and in attribute order
//!    within a family
//! 3. The first tab directive (`x-tab` or `x-tab-reset`) and the first
//!    `x-focus` are applied last. Focus is deferred on the task queue and
//!    replaces any focus still pending
//!
//! Malformed values never fail: missing keys target nothing and empty state
//! lists fall back to a placeholder state.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::directive::{Directive, Family, RuleFilter, THIS};
use crate::dom::{current_value, ControlKind, Document, NodeId};
use crate::reactive::Value;
use crate::util::{html_encode, trim};

use super::batch::PendingItem;
use super::Engine;

/// Class written when a rotation has no states.
const EMPTY_CLASS_STATE: &str = "_";

/// Attribute state that means "attribute absent".
const NULL_STATE: &str = "null";

enum TabUpdate {
    Range(String),
    Reset,
}

impl<D: Document + 'static> Engine<D> {
    /// Apply every directive on the item's element that its rule admits.
    pub(super) fn apply(&self, item: &PendingItem) {
        let doc = &*self.inner.doc;
        let el = item.el;
        let filter = RuleFilter::parse(&item.rule);
        let attributes = doc.attributes(el);

        let mut this_value: Option<String> = None;
        let mut effects: Vec<(Directive<'_>, String)> = Vec::new();
        let mut tab = None;
        let mut focus = None;

        // Collect admitted directives; `this` is read at most once per item
        for (name, raw) in &attributes {
            let Some(directive) = Directive::parse(name) else {
                continue;
            };
            if !filter.matches(directive.filter_key()) {
                continue;
            }
            let mut value = trim(raw).to_string();
            if value == THIS {
                value = this_value
                    .get_or_insert_with(|| current_value(doc, el))
                    .clone();
            }
            match directive {
                Directive::Tab if tab.is_none() => tab = Some(TabUpdate::Range(value)),
                Directive::TabReset if tab.is_none() => tab = Some(TabUpdate::Reset),
                Directive::Focus if focus.is_none() => focus = Some(value),
                Directive::Tab | Directive::TabReset | Directive::Focus => {}
                _ => effects.push((directive, value)),
            }
        }

        // Stable sort keeps attribute order within a family
        effects.sort_by_key(|(directive, _)| directive.family());
        trace!(el = el.raw(), directives = effects.len(), "applying item");

        for (directive, value) in &effects {
            match *directive {
                Directive::RotateClass { key } => self.rotate_class(key, value, Some(el)),
                Directive::RotateAttribute { key, attribute } => {
                    self.rotate_attribute(key, attribute, value, Some(el))
                }
                Directive::BindValue { key } => {
                    self.bind_value(key, &Value::from(value.as_str()), Some(el))
                }
                Directive::BindVariable { key } => {
                    self.inner.store.set(key, Value::from(value.as_str()), Some(el))
                }
                Directive::Run { key } => {
                    self.run_triggers(key, value, Some(el), item.trigger.as_deref())
                }
                Directive::Tab | Directive::TabReset | Directive::Focus => {}
            }
        }

        // Control directives go last so they see the updated markup
        if let Some(tab) = tab {
            self.apply_tab(tab);
        }
        if let Some(focus) = focus {
            self.schedule_focus(&focus);
        }
    }

    /// Elements addressed by `key`; `this` addresses the source element.
    fn targets(&self, key: &str, source: Option<NodeId>) -> Vec<NodeId> {
        if key == THIS {
            source.into_iter().collect()
        } else {
            self.inner.registry.borrow().lookup(key)
        }
    }

    /// Advance the last class token of every target through `states`.
    pub(super) fn rotate_class(&self, key: &str, states: &str, source: Option<NodeId>) {
        let doc = &*self.inner.doc;
        let states: Vec<&str> = states.split_whitespace().collect();
        let targets = self.targets(key, source);
        trace!(family = %Family::RotateClass, key, targets = targets.len());

        for el in targets {
            let class = doc.class_name(el);
            let mut classes: Vec<&str> = class.split_whitespace().collect();
            let current = classes.last().copied().unwrap_or("");
            let next = next_state(&states, current).unwrap_or(EMPTY_CLASS_STATE);
            if current == next {
                continue;
            }
            match classes.last_mut() {
                Some(last) => *last = next,
                None => classes.push(next),
            }
            doc.set_class_name(el, &classes.join(" "));
        }
    }

    /// Advance `attribute` of every target through `|`-separated `states`.
    pub(super) fn rotate_attribute(
        &self,
        key: &str,
        attribute: &str,
        states: &str,
        source: Option<NodeId>,
    ) {
        let doc = &*self.inner.doc;
        let states: Vec<&str> = states.split('|').map(trim).collect();
        let targets = self.targets(key, source);
        trace!(family = %Family::RotateAttribute, key, attribute, targets = targets.len());

        for el in targets {
            let current = doc.attribute(el, attribute);
            let current_state = current.as_deref().unwrap_or(NULL_STATE);
            let next = next_state(&states, current_state).unwrap_or("");
            if next == NULL_STATE {
                if current.is_some() {
                    doc.remove_attribute(el, attribute);
                }
            } else if current_state != next {
                doc.set_attribute(el, attribute, next);
            }
        }
    }

    /// Write `value` into every target, skipping writes that change nothing.
    pub(super) fn bind_value(&self, key: &str, value: &Value, source: Option<NodeId>) {
        let doc = &*self.inner.doc;
        let targets = self.targets(key, source);
        trace!(family = %Family::BindValue, key, targets = targets.len());

        for el in targets {
            match ControlKind::of(doc, el) {
                ControlKind::Toggle => {
                    let checked = value.is_checked();
                    if doc.checked(el) != checked {
                        doc.set_checked(el, checked);
                    }
                }
                ControlKind::Field => {
                    let text = value.to_string();
                    if doc.value(el) != text {
                        doc.set_value(el, &text);
                    }
                }
                ControlKind::Content => {
                    if doc.child_element_count(el) > 0 {
                        continue;
                    }
                    let html = html_encode(&value.to_string());
                    if doc.inner_html(el) != html {
                        doc.set_inner_html(el, &html);
                    }
                }
            }
        }
    }

    /// Replay trigger attributes on every element under `key`.
    ///
    /// An empty trigger list replays `fired`, the attribute that produced
    /// the current item.
    pub(super) fn run_triggers(
        &self,
        key: &str,
        triggers: &str,
        source: Option<NodeId>,
        fired: Option<&str>,
    ) {
        let doc = &*self.inner.doc;
        let names: Vec<&str> = if trim(triggers).is_empty() {
            fired.into_iter().collect()
        } else {
            triggers.split_whitespace().collect()
        };
        let targets = self.targets(key, source);
        trace!(family = %Family::Run, key, triggers = names.len(), targets = targets.len());

        for name in names {
            for &el in &targets {
                if let Some(rule) = doc.attribute(el, name) {
                    self.enqueue(el, &rule, Some(name));
                }
            }
        }
    }

    fn apply_tab(&self, update: TabUpdate) {
        let mut guard = self.inner.registry.borrow_mut();
        let registry = &mut *guard;
        let (first_key, last_key) = match update {
            TabUpdate::Range(spec) => {
                let parts: Vec<&str> = spec.split(':').map(trim).collect();
                let [first, last] = parts.as_slice() else {
                    return;
                };
                (first.to_string(), last.to_string())
            }
            TabUpdate::Reset => {
                registry.tab.first = None;
                registry.tab.last = None;
                (registry.tab.default_first.clone(), registry.tab.default_last.clone())
            }
        };

        let first = registry.first(&first_key);
        let last = registry.first(&last_key);
        if first.is_some() {
            registry.tab.first = first;
        }
        if last.is_some() {
            registry.tab.last = last;
        }
        trace!(first = %first_key, last = %last_key, "tab range updated");
    }

    /// Focus the first element under `key` after the configured delay,
    /// replacing any focus still pending.
    fn schedule_focus(&self, key: &str) {
        let Some(target) = self.inner.registry.borrow().first(key) else {
            return;
        };
        if let Some(previous) = self.inner.focus_task.take() {
            self.inner.tasks.cancel(previous);
        }
        let doc = Rc::clone(&self.inner.doc);
        let delay = self.inner.config.focus_delay_ms;
        let id = self.inner.tasks.schedule(delay, move || doc.focus(target));
        self.inner.focus_task.set(Some(id));
        debug!(key, target = target.raw(), delay, "focus scheduled");
    }
}

/// The state after `current` in `states`, wrapping around. Unknown states
/// advance to the first one.
fn next_state<'a>(states: &[&'a str], current: &str) -> Option<&'a str> {
    if states.is_empty() {
        return None;
    }
    let next = states
        .iter()
        .position(|state| *state == current)
        .map_or(0, |index| (index + 1) % states.len());
    Some(states[next])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::dom::MemoryDocument;
    use crate::task::TaskQueue;
    use rstest::rstest;

    struct Fixture {
        doc: Rc<MemoryDocument>,
        tasks: Rc<TaskQueue>,
        engine: Engine<MemoryDocument>,
    }

    impl Fixture {
        fn new() -> Self {
            let doc = Rc::new(MemoryDocument::new());
            let tasks = Rc::new(TaskQueue::new());
            let engine = Engine::new(doc.clone(), tasks.clone(), EngineConfig::default());
            Self { doc, tasks, engine }
        }

        fn element(&self, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
            let el = self.doc.create_child(self.doc.body(), tag, attributes);
            self.engine.init(&[el], None);
            el
        }

        fn process(&self, el: NodeId, rule: &str) {
            self.engine.process(el, rule);
            self.tasks.run_due();
        }
    }

    #[rstest]
    #[case(&["a", "b", "c"], "a", Some("b"))]
    #[case(&["a", "b", "c"], "b", Some("c"))]
    #[case(&["a", "b", "c"], "c", Some("a"))]
    #[case(&["a", "b", "c"], "z", Some("a"))]
    #[case(&["solo"], "solo", Some("solo"))]
    #[case(&[], "a", None)]
    fn next_state_wraps(
        #[case] states: &[&str],
        #[case] current: &str,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(next_state(states, current), expected);
    }

    #[test]
    fn rotate_class_rewrites_only_the_last_token() {
        let f = Fixture::new();
        let el = f.element(
            "div",
            &[("class", "card off"), ("x-ref-card", ""), ("x-rot-card", "off on")],
        );
        f.process(el, "");
        assert_eq!(f.doc.class_name(el), "card on");
        f.process(el, "");
        assert_eq!(f.doc.class_name(el), "card off");
    }

    #[test]
    fn rotate_class_without_states_uses_placeholder() {
        let f = Fixture::new();
        let el = f.element("div", &[("class", "x"), ("x-rot-this", "")]);
        f.process(el, "");
        assert_eq!(f.doc.class_name(el), "_");
        let before = f.doc.mutations();
        f.process(el, "");
        assert_eq!(f.doc.mutations(), before);
    }

    #[test]
    fn rotate_attribute_cycles_and_removes_on_null() {
        let f = Fixture::new();
        let panel = f.element("div", &[("x-ref-panel", "")]);
        let toggle = f.element("button", &[("x-set-panel.hidden", "null|hidden")]);

        f.process(toggle, "");
        assert_eq!(f.doc.attribute(panel, "hidden").as_deref(), Some("hidden"));
        f.process(toggle, "");
        assert_eq!(f.doc.attribute(panel, "hidden"), None);
        f.process(toggle, "");
        assert_eq!(f.doc.attribute(panel, "hidden").as_deref(), Some("hidden"));
    }

    #[test]
    fn legacy_attribute_spelling_is_accepted() {
        let f = Fixture::new();
        let panel = f.element("div", &[("x-ref-panel", ""), ("aria-expanded", "false")]);
        let toggle = f.element("button", &[("x-attr-panel_aria-expanded", "false | true")]);
        f.process(toggle, "");
        assert_eq!(f.doc.attribute(panel, "aria-expanded").as_deref(), Some("true"));
    }

    #[test]
    fn bind_value_targets_each_control_kind() {
        let f = Fixture::new();
        let check = f.element("input", &[("type", "checkbox"), ("x-ref-agree", "")]);
        let field = f.element("textarea", &[("x-ref-note", "")]);
        let label = f.element("span", &[("x-ref-label", "")]);
        let source = f.element(
            "div",
            &[("x-val-agree", "1"), ("x-val-note", "see you"), ("x-val-label", "<b>Hi</b>")],
        );

        f.process(source, "");
        assert!(f.doc.checked(check));
        assert_eq!(f.doc.value(field), "see you");
        assert_eq!(f.doc.inner_html(label), "&lt;b&gt;Hi&lt;/b&gt;");
        assert_eq!(f.doc.text(label), "<b>Hi</b>");

        let before = f.doc.mutations();
        f.process(source, "");
        assert_eq!(f.doc.mutations(), before);
    }

    #[test]
    fn bind_value_skips_elements_with_children() {
        let f = Fixture::new();
        let wrapper = f.element("div", &[("x-ref-box", "")]);
        f.doc.create_child(wrapper, "p", &[]);
        let source = f.element("div", &[("x-val-box", "text")]);
        f.process(source, "");
        assert_eq!(f.doc.inner_html(wrapper), "");
        assert_eq!(f.doc.child_element_count(wrapper), 1);
    }

    #[test]
    fn this_resolves_to_the_source_value() {
        let f = Fixture::new();
        let mirror = f.element("span", &[("x-ref-mirror", "")]);
        let input = f.element("input", &[("x-val-mirror", "this"), ("x-var-typed", "this")]);
        f.doc.set_value(input, "Ana");

        f.process(input, "");
        assert_eq!(f.doc.inner_html(mirror), "Ana");
        assert_eq!(f.engine.variable("typed"), Value::from("Ana"));
    }

    #[test]
    fn filter_selects_directive_keys() {
        let f = Fixture::new();
        let a = f.element("span", &[("x-ref-a", "")]);
        let b = f.element("span", &[("x-ref-b", "")]);
        let source = f.element("div", &[("x-val-a", "A"), ("x-val-b", "B")]);

        f.process(source, "!a");
        assert_eq!(f.doc.inner_html(a), "");
        assert_eq!(f.doc.inner_html(b), "B");
        f.process(source, "a");
        assert_eq!(f.doc.inner_html(a), "A");
    }

    #[test]
    fn families_apply_in_fixed_order() {
        let f = Fixture::new();
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));
        let target = f.element("span", &[("x-ref-t", ""), ("class", "a")]);

        let sink = log.clone();
        let doc = f.doc.clone();
        f.engine.tap("seen", move |_, _, _| {
            sink.borrow_mut().push((doc.class_name(target), doc.inner_html(target)));
        });
        let source = f.element(
            "div",
            &[("x-var-seen", "now"), ("x-val-t", "v"), ("x-rot-t", "a b")],
        );

        f.process(source, "");
        assert_eq!(*log.borrow(), vec![("b".to_string(), "v".to_string())]);
    }

    #[test]
    fn tab_directives_first_occurrence_wins() {
        let f = Fixture::new();
        let one = f.element("input", &[("x-ref-one", "")]);
        let two = f.element("input", &[("x-ref-two", "")]);
        let source = f.element("div", &[("x-tab", "one:two"), ("x-tab-reset", "")]);

        f.process(source, "");
        let tab = f.engine.tab_range();
        assert_eq!((tab.first, tab.last), (Some(one), Some(two)));
    }

    #[test]
    fn tab_reset_restores_defaults() {
        let f = Fixture::new();
        let a = f.doc.create_child(f.doc.body(), "input", &[("x-ref-a", "")]);
        let b = f.doc.create_child(f.doc.body(), "input", &[("x-ref-b", "")]);
        let c = f.doc.create_child(f.doc.body(), "input", &[("x-ref-c", "")]);
        f.engine.init(&[a, b, c], Some("a:b"));

        let narrow = f.element("div", &[("x-tab", "c:c")]);
        f.process(narrow, "");
        assert_eq!(f.engine.tab_range().first, Some(c));

        let reset = f.element("div", &[("x-tab-reset", "")]);
        f.process(reset, "");
        let tab = f.engine.tab_range();
        assert_eq!((tab.first, tab.last), (Some(a), Some(b)));
    }

    #[test]
    fn malformed_tab_spec_is_ignored() {
        let f = Fixture::new();
        f.element("input", &[("x-ref-one", "")]);
        let source = f.element("div", &[("x-tab", "one")]);
        f.process(source, "");
        assert_eq!(f.engine.tab_range().first, None);
    }

    #[test]
    fn focus_is_deferred_and_replaced() {
        let f = Fixture::new();
        let first = f.element("input", &[("x-ref-first", "")]);
        let second = f.element("input", &[("x-ref-second", "")]);
        let a = f.element("div", &[("x-focus", "first")]);
        let b = f.element("div", &[("x-focus", "second")]);

        f.process(a, "");
        assert_eq!(f.doc.active_element(), None);
        f.tasks.advance(10);
        f.process(b, "");
        f.tasks.advance(45);
        assert_eq!(f.doc.active_element(), None);
        f.tasks.advance(5);
        assert_eq!(f.doc.active_element(), Some(second));
        assert_ne!(f.doc.active_element(), Some(first));
        assert_eq!(f.tasks.pending(), 0);
    }

    #[test]
    fn run_replays_named_triggers() {
        let f = Fixture::new();
        let target = f.element(
            "span",
            &[
                ("x-ref-out", ""),
                ("x-ref-step", ""),
                ("x-on-click", "out"),
                ("x-val-out", "ran"),
            ],
        );
        let source = f.element("button", &[("x-run-step", "x-on-click")]);

        f.process(source, "");
        assert_eq!(f.doc.inner_html(target), "ran");
    }

    #[test]
    fn empty_run_replays_the_firing_attribute() {
        let f = Fixture::new();
        let target = f.element(
            "span",
            &[("x-ref-out", ""), ("x-on-click", "out"), ("x-val-out", "ran")],
        );
        let button = f.element("button", &[("x-on-click", "out"), ("x-run-out", "")]);

        f.doc.click(button);
        f.tasks.run_due();
        assert_eq!(f.doc.inner_html(target), "ran");
    }
}
