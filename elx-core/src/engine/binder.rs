//! Event Binder
//!
//! Attaches one native listener per element and event family. Listeners
//! re-read their directive attribute when they fire and only enqueue a
//! processing request; no directive effect ever runs inside a listener.
//!
//! # Families
//!
//! | Attribute         | Event                                        |
//! |-------------------|----------------------------------------------|
//! | `x-on-click`      | click, plus Enter on non-button elements     |
//! | `x-on-enter`      | mouseenter                                   |
//! | `x-on-leave`      | mouseleave                                   |
//! | `x-on-focus`      | focus                                        |
//! | `x-on-blur`       | blur                                         |
//! | `x-on-submit`     | submit                                       |
//! | `x-on-input`      | input                                        |
//! | `x-on-key`        | keydown on the element, per key combo        |
//! | `x-on-key-window` | keydown anywhere, per key combo              |
//!
//! The window listener also runs the Tab focus trap.

use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::dom::{
    activates_on_enter, is_natively_focusable, Disposition, Document, DomEvent, EventKind,
    Listener, NodeId,
};

use super::{Engine, Inner};

const ON_CLICK: &str = "x-on-click";
const ON_KEY: &str = "x-on-key";
const ON_KEY_WINDOW: &str = "x-on-key-window";
const STOP: &str = "x-stop";
const PREVENT: &str = "x-prevent";

const EVENT_ATTRIBUTES: &[(&str, EventKind)] = &[
    (ON_CLICK, EventKind::Click),
    ("x-on-enter", EventKind::MouseEnter),
    ("x-on-leave", EventKind::MouseLeave),
    ("x-on-focus", EventKind::Focus),
    ("x-on-blur", EventKind::Blur),
    ("x-on-submit", EventKind::Submit),
    ("x-on-input", EventKind::Input),
];

impl<D: Document + 'static> Engine<D> {
    /// Bind every `x-on-*` family present on `el`.
    ///
    /// Rebinding replaces the previous listener, so scanning an element
    /// twice never doubles its handlers.
    pub(super) fn bind(&self, el: NodeId) {
        let doc = &*self.inner.doc;

        for &(attribute, kind) in EVENT_ATTRIBUTES {
            if doc.has_attribute(el, attribute) {
                doc.set_listener(el, kind, self.listener(el, attribute));
            }
        }

        let clickable = doc.has_attribute(el, ON_CLICK);
        if clickable && !is_natively_focusable(doc, el) && !doc.has_attribute(el, "tabindex") {
            doc.set_attribute(el, "tabindex", "0");
        }
        if clickable || doc.has_attribute(el, ON_KEY) {
            let weak = self.weak();
            doc.set_listener(
                el,
                EventKind::KeyDown,
                Rc::new(move |event: &DomEvent| match weak.upgrade() {
                    Some(inner) => Engine { inner }.on_key(el, event),
                    None => Disposition::PASS,
                }),
            );
        }

        if let Some(combos) = doc.attribute(el, ON_KEY_WINDOW) {
            let mut registry = self.inner.registry.borrow_mut();
            for combo in combos.to_lowercase().split_whitespace() {
                registry.register_window_key(combo, el);
            }
        }
    }

    /// Install the window keydown listener.
    pub(super) fn bind_window(&self) {
        let weak = self.weak();
        self.inner.doc.set_window_listener(Rc::new(move |event: &DomEvent| match weak.upgrade() {
            Some(inner) => Engine { inner }.on_window_key(event),
            None => Disposition::PASS,
        }));
    }

    fn weak(&self) -> Weak<Inner<D>> {
        Rc::downgrade(&self.inner)
    }

    fn listener(&self, el: NodeId, attribute: &'static str) -> Listener {
        let weak = self.weak();
        Rc::new(move |_event: &DomEvent| match weak.upgrade() {
            Some(inner) => Engine { inner }.fire(el, attribute),
            None => Disposition::PASS,
        })
    }

    /// Enqueue `el` under the rule filter held by `attribute`.
    fn fire(&self, el: NodeId, attribute: &str) -> Disposition {
        let doc = &*self.inner.doc;
        let Some(rule) = doc.attribute(el, attribute) else {
            return Disposition::PASS;
        };
        trace!(el = el.raw(), attribute, "listener fired");
        self.enqueue(el, &rule, Some(attribute));
        disposition(doc, el)
    }

    fn on_key(&self, el: NodeId, event: &DomEvent) -> Disposition {
        let doc = &*self.inner.doc;
        let combo = event.combo();
        let bound = doc
            .attribute(el, ON_KEY)
            .is_some_and(|combos| listed(&combos, &combo));
        if bound {
            let attribute = format!("{}-{}", ON_KEY, combo);
            let rule = doc.attribute(el, &attribute).unwrap_or_default();
            trace!(el = el.raw(), combo = %combo, "key combo fired");
            self.enqueue(el, &rule, Some(&attribute));
            return disposition(doc, el).merge(Disposition::PREVENT);
        }

        let enter = event
            .key
            .as_deref()
            .is_some_and(|key| key.eq_ignore_ascii_case("enter"));
        // Buttons and links already turn Enter into a native click.
        if enter && doc.has_attribute(el, ON_CLICK) && !activates_on_enter(doc, el) {
            return self.fire(el, ON_CLICK);
        }
        Disposition::PASS
    }

    fn on_window_key(&self, event: &DomEvent) -> Disposition {
        let doc = &*self.inner.doc;
        let combo = event.combo();
        let targets = self.inner.registry.borrow().window_targets(&combo);
        if !targets.is_empty() {
            let attribute = format!("{}-{}", ON_KEY_WINDOW, combo);
            for el in targets {
                let rule = doc.attribute(el, &attribute).unwrap_or_default();
                self.enqueue(el, &rule, Some(&attribute));
            }
        }
        self.trap_tab(event)
    }

    /// Wrap Tab focus between the ends of the tab range.
    fn trap_tab(&self, event: &DomEvent) -> Disposition {
        let is_tab = event
            .key
            .as_deref()
            .is_some_and(|key| key.eq_ignore_ascii_case("tab"));
        if !is_tab || event.ctrl || event.alt {
            return Disposition::PASS;
        }

        let (first, last) = {
            let registry = self.inner.registry.borrow();
            (registry.tab.first, registry.tab.last)
        };
        let (Some(first), Some(last)) = (first, last) else {
            return Disposition::PASS;
        };

        let doc = &*self.inner.doc;
        let active = doc.active_element();
        let target = if event.shift {
            (active == Some(first)).then_some(last)
        } else {
            (active == Some(last)).then_some(first)
        };
        match target {
            Some(target) => {
                debug!(target = target.raw(), shift = event.shift, "tab trap wrapped focus");
                doc.focus(target);
                Disposition::PREVENT
            }
            None => Disposition::PASS,
        }
    }
}

/// Whether `combo` appears in a space-separated combo list.
fn listed(combos: &str, combo: &str) -> bool {
    combos
        .split_whitespace()
        .any(|listed| listed.eq_ignore_ascii_case(combo))
}

fn disposition<D: Document + ?Sized>(doc: &D, el: NodeId) -> Disposition {
    Disposition {
        prevent_default: doc.has_attribute(el, PREVENT),
        stop_propagation: doc.has_attribute(el, STOP),
    }
}
