//! Document Abstraction
//!
//! The engine never talks to a concrete DOM. It drives anything implementing
//! [`Document`], which mirrors the small slice of the browser DOM the
//! directive engine needs: attribute access, class and form state, inner
//! HTML, connectivity, focus, and one handler slot per element and event
//! family.
//!
//! All methods take `&self`. A browser binding hands out shared handles and
//! mutates through them, and the engine re-enters the document from inside
//! event handlers, so implementations are expected to use interior
//! mutability and to release any internal borrow before invoking a listener.
//!
//! [`MemoryDocument`] is the in-process implementation used by non-browser
//! hosts and by the test suite.

mod el;
mod memory;
mod node;

pub use el::El;
pub use memory::MemoryDocument;
pub use node::NodeId;

use std::fmt;
use std::rc::Rc;

/// Native event families the binder attaches handlers for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Click,
    MouseEnter,
    MouseLeave,
    Focus,
    Blur,
    Submit,
    Input,
    KeyDown,
}

impl EventKind {
    /// Whether the event propagates from the target up to its ancestors.
    pub fn bubbles(self) -> bool {
        matches!(
            self,
            EventKind::Click | EventKind::Submit | EventKind::Input | EventKind::KeyDown
        )
    }
}

/// A native event as seen by a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    pub kind: EventKind,
    /// Key name for keyboard events (`"Enter"`, `"Tab"`, `"k"`, ...).
    pub key: Option<String>,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

impl DomEvent {
    /// A non-keyboard event of the given kind.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            key: None,
            ctrl: false,
            alt: false,
            shift: false,
        }
    }

    /// A keydown event for `key` with no modifiers held.
    pub fn key_down(key: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            ..Self::new(EventKind::KeyDown)
        }
    }

    /// Hold Ctrl.
    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    /// Hold Alt.
    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    /// Hold Shift.
    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// Combo name used by `x-on-key-<combo>` attributes.
    ///
    /// Modifiers come first in the fixed order `ctrl`, `alt`, `shift`,
    /// followed by the lower-cased key: `ctrl-shift-k`, `enter`, `tab`.
    pub fn combo(&self) -> String {
        let mut combo = String::new();
        for (held, name) in [(self.ctrl, "ctrl"), (self.alt, "alt"), (self.shift, "shift")] {
            if held {
                combo.push_str(name);
                combo.push('-');
            }
        }
        if let Some(key) = &self.key {
            combo.push_str(&key.to_lowercase());
        }
        combo
    }
}

/// What a listener asks the host to do after it returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Disposition {
    pub prevent_default: bool,
    pub stop_propagation: bool,
}

impl Disposition {
    /// Let the event continue untouched.
    pub const PASS: Disposition = Disposition {
        prevent_default: false,
        stop_propagation: false,
    };

    /// Suppress the host's default action.
    pub const PREVENT: Disposition = Disposition {
        prevent_default: true,
        stop_propagation: false,
    };

    /// Combine the requests of two listeners.
    pub fn merge(self, other: Disposition) -> Disposition {
        Disposition {
            prevent_default: self.prevent_default || other.prevent_default,
            stop_propagation: self.stop_propagation || other.stop_propagation,
        }
    }
}

/// A native event handler.
pub type Listener = Rc<dyn Fn(&DomEvent) -> Disposition>;

/// The DOM operations consumed by the engine.
pub trait Document {
    /// Look an element up by its `id` attribute.
    fn element_by_id(&self, id: &str) -> Option<NodeId>;

    /// All attributes of `el`, in document order.
    fn attributes(&self, el: NodeId) -> Vec<(String, String)>;

    fn attribute(&self, el: NodeId, name: &str) -> Option<String>;

    fn has_attribute(&self, el: NodeId, name: &str) -> bool {
        self.attribute(el, name).is_some()
    }

    fn set_attribute(&self, el: NodeId, name: &str, value: &str);

    fn remove_attribute(&self, el: NodeId, name: &str);

    fn class_name(&self, el: NodeId) -> String;

    fn set_class_name(&self, el: NodeId, value: &str);

    /// Lower-cased tag name.
    fn tag_name(&self, el: NodeId) -> String;

    /// Current form value. Empty for elements without one.
    fn value(&self, el: NodeId) -> String;

    fn set_value(&self, el: NodeId, value: &str);

    fn checked(&self, el: NodeId) -> bool;

    fn set_checked(&self, el: NodeId, checked: bool);

    fn child_element_count(&self, el: NodeId) -> usize;

    fn inner_html(&self, el: NodeId) -> String;

    fn set_inner_html(&self, el: NodeId, html: &str);

    /// Parse `html` and insert it at `position` relative to `el`.
    ///
    /// Positions outside `el` need a parent; on a detached element they do
    /// nothing.
    fn insert_adjacent_html(&self, el: NodeId, position: InsertPosition, html: &str);

    /// Detach `el` from its parent. Does nothing if it has none.
    fn remove_element(&self, el: NodeId);

    /// Whether `el` is still attached to the document body.
    fn is_connected(&self, el: NodeId) -> bool;

    fn focus(&self, el: NodeId);

    fn active_element(&self) -> Option<NodeId>;

    /// Install the handler for `kind` on `el`, replacing any previous one.
    fn set_listener(&self, el: NodeId, kind: EventKind, listener: Listener);

    fn has_listener(&self, el: NodeId, kind: EventKind) -> bool;

    /// Install the window-level keydown handler, replacing any previous one.
    fn set_window_listener(&self, listener: Listener);
}

/// Where [`Document::insert_adjacent_html`] places new markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertPosition {
    /// Before `el`, as its previous sibling.
    BeforeBegin,
    /// Inside `el`, before its first child.
    AfterBegin,
    /// Inside `el`, after its last child.
    BeforeEnd,
    /// After `el`, as its next sibling.
    AfterEnd,
}

impl InsertPosition {
    /// The position keyword used by the browser API.
    pub fn as_str(self) -> &'static str {
        match self {
            InsertPosition::BeforeBegin => "beforebegin",
            InsertPosition::AfterBegin => "afterbegin",
            InsertPosition::BeforeEnd => "beforeend",
            InsertPosition::AfterEnd => "afterend",
        }
    }
}

/// How an element stores the value directives read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    /// `<input type="checkbox|radio">`: the checked flag.
    Toggle,
    /// Other `<input>`, `<textarea>`, `<select>`: the form value.
    Field,
    /// Anything else: inner content.
    Content,
}

impl ControlKind {
    /// Classify `el` by tag and input type.
    pub fn of<D: Document + ?Sized>(doc: &D, el: NodeId) -> Self {
        match doc.tag_name(el).as_str() {
            "input" => {
                let kind = doc.attribute(el, "type").unwrap_or_default().to_lowercase();
                if kind == "checkbox" || kind == "radio" {
                    ControlKind::Toggle
                } else {
                    ControlKind::Field
                }
            }
            "textarea" | "select" => ControlKind::Field,
            _ => ControlKind::Content,
        }
    }
}

/// Whether `el` takes keyboard focus without a `tabindex`.
pub fn is_natively_focusable<D: Document + ?Sized>(doc: &D, el: NodeId) -> bool {
    match doc.tag_name(el).as_str() {
        "button" | "input" | "select" | "textarea" => true,
        "a" | "area" => doc.has_attribute(el, "href"),
        _ => false,
    }
}

/// Whether the host fires a native click when Enter is pressed on `el`.
pub fn activates_on_enter<D: Document + ?Sized>(doc: &D, el: NodeId) -> bool {
    match doc.tag_name(el).as_str() {
        "button" => true,
        "a" | "area" => doc.has_attribute(el, "href"),
        "input" => matches!(
            doc.attribute(el, "type").unwrap_or_default().to_lowercase().as_str(),
            "submit" | "reset" | "button" | "image"
        ),
        _ => false,
    }
}

/// The value `this` stands for in a directive fired by `el`.
///
/// Checkbox and radio inputs yield `"true"`/`"false"`, other elements their
/// form value, and leaf elements without a form value their inner HTML.
pub fn current_value<D: Document + ?Sized>(doc: &D, el: NodeId) -> String {
    if ControlKind::of(doc, el) == ControlKind::Toggle {
        return doc.checked(el).to_string();
    }
    let value = doc.value(el);
    if !value.is_empty() {
        return value;
    }
    if doc.child_element_count(el) == 0 {
        doc.inner_html(el)
    } else {
        String::new()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Click => "click",
            EventKind::MouseEnter => "mouseenter",
            EventKind::MouseLeave => "mouseleave",
            EventKind::Focus => "focus",
            EventKind::Blur => "blur",
            EventKind::Submit => "submit",
            EventKind::Input => "input",
            EventKind::KeyDown => "keydown",
        };
        f.write_str(name)
    }
}
