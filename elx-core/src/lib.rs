//! ELX Core
//!
//! This crate provides the directive engine behind the clinic site widgets:
//! markup declares behaviour through `x-*` attributes and the engine wires it
//! up. It implements:
//!
//! - A reference registry of elements grouped under logical keys
//! - Reactive variables with per-key and wildcard taps
//! - Event binding for `x-on-*` attributes, including a Tab focus trap
//! - A directive processor for class and attribute rotation, value and
//!   variable binding, trigger replay, tab ranges and deferred focus
//! - A batching layer that defers all processing to a single drain task
//!
//! Alongside the engine live the small collaborators the widgets use: string
//! and query helpers, an element helper, condition polling, a URL builder
//! with history sync, an XHR-style request wrapper and a script loader.
//!
//! # Architecture
//!
//! - `dom`: the [`Document`] abstraction, an in-memory implementation and
//!   the [`El`] helper
//! - `task`: a single-threaded task queue with a virtual clock, plus
//!   debounce, throttle and polling
//! - `reactive`: variable values, the store and its taps
//! - `directive`: the attribute prefix table and rule filters
//! - `engine`: registry, binder, processor and batching
//! - `util`, `url`, `request`, `script`: collaborator helpers
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use elx_core::{Document, Engine, EngineConfig, MemoryDocument, TaskQueue};
//!
//! let doc = Rc::new(MemoryDocument::new());
//! let tasks = Rc::new(TaskQueue::new());
//! let engine = Engine::new(doc.clone(), tasks.clone(), EngineConfig::default());
//!
//! let button = doc.create_child(
//!     doc.body(),
//!     "button",
//!     &[("class", "off"), ("x-on-click", ""), ("x-rot-this", "off on")],
//! );
//! engine.init(&[button], None);
//!
//! doc.click(button);
//! tasks.run_until_idle();
//! assert_eq!(doc.class_name(button), "on");
//! ```

pub mod config;
pub mod directive;
pub mod dom;
pub mod engine;
pub mod error;
pub mod reactive;
pub mod request;
pub mod script;
pub mod task;
pub mod url;
pub mod util;

pub use config::EngineConfig;
pub use dom::{
    Disposition, Document, DomEvent, El, EventKind, InsertPosition, MemoryDocument, NodeId,
};
pub use engine::{CleanReport, Engine, Phase, TabRange, X};
pub use error::{Error, Result};
pub use reactive::{TapHandle, Value, VariableStore};
pub use request::{Request, RequestOptions, Response, Transport};
pub use script::{ScriptHost, ScriptLoader};
pub use task::{Debounce, Poll, PollOptions, PollStatus, TaskId, TaskQueue, Throttle};
pub use url::{History, Url};
