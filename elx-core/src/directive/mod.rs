//! Attribute Directive Parser
//!
//! Classifies element attributes into directive families and decides, via a
//! [`RuleFilter`], which of them take part in one firing.

mod filter;
mod table;

pub use filter::RuleFilter;
pub use table::{validate, Directive, Family, PrefixRule, FOCUS, PREFIXES, TAB, TAB_RESET};

/// Prefix of reference attributes (`x-ref-<key>`).
pub const REF_PREFIX: &str = "x-ref-";

/// Value token that stands for the triggering element's current value.
pub const THIS: &str = "this";
