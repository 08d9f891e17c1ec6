//! Reactive State
//!
//! Variables are the engine's shared state: a flat map from logical key to
//! the last scalar [`Value`] written under it, plus subscriber callbacks
//! ("taps") notified synchronously on every write.
//!
//! # Concepts
//!
//! ## Values
//!
//! A variable holds a string, a boolean or nothing. Values coming from markup
//! are always strings; consumers may store booleans directly.
//!
//! ## Taps
//!
//! A tap subscribes either to one key or to every key (a wildcard tap). Key
//! taps run before wildcard taps. Removing a tap never disturbs the handles
//! of the others.

mod store;
mod subscriber;
mod value;

pub use store::VariableStore;
pub use subscriber::{KeyTap, TapHandle, WildcardTap};
pub use value::Value;
