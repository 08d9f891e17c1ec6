//! Directive Table
//!
//! Maps attribute names onto directive families through a static prefix
//! table. Family directives carry a reference key after their prefix;
//! attribute-rotation directives also name the target attribute after a
//! separator. Control directives are matched by their exact name.
//!
//! Both spellings that markup has used over time are accepted:
//!
//! | Family            | Prefixes                                   |
//! |-------------------|--------------------------------------------|
//! | rotate class      | `x-rot-<key>`, `x-cycle-<key>`             |
//! | rotate attribute  | `x-set-<key>.<attr>`, `x-attr-<key>_<attr>` |
//! | bind value        | `x-val-<key>`                              |
//! | bind variable     | `x-var-<key>`                              |
//! | run               | `x-run-<key>`                              |
//! | control           | `x-tab`, `x-tab-reset`, `x-focus`          |

use std::fmt;

/// Directive families, in the order the processor applies them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    RotateClass,
    RotateAttribute,
    BindValue,
    BindVariable,
    Run,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::RotateClass => "rot",
            Family::RotateAttribute => "set",
            Family::BindValue => "val",
            Family::BindVariable => "var",
            Family::Run => "run",
        };
        f.write_str(name)
    }
}

/// One row of the prefix table.
#[derive(Debug, Clone, Copy)]
pub struct PrefixRule {
    pub prefix: &'static str,
    pub family: Family,
    /// Separator between key and attribute name, for attribute rotation.
    pub attribute_separator: Option<char>,
}

const fn family(prefix: &'static str, family: Family) -> PrefixRule {
    PrefixRule {
        prefix,
        family,
        attribute_separator: None,
    }
}

const fn attribute(prefix: &'static str, separator: char) -> PrefixRule {
    PrefixRule {
        prefix,
        family: Family::RotateAttribute,
        attribute_separator: Some(separator),
    }
}

pub const PREFIXES: &[PrefixRule] = &[
    family("x-rot-", Family::RotateClass),
    family("x-cycle-", Family::RotateClass),
    attribute("x-set-", '.'),
    attribute("x-attr-", '_'),
    family("x-val-", Family::BindValue),
    family("x-var-", Family::BindVariable),
    family("x-run-", Family::Run),
];

pub const TAB: &str = "x-tab";
pub const TAB_RESET: &str = "x-tab-reset";
pub const FOCUS: &str = "x-focus";

/// A directive attribute, borrowed from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    RotateClass { key: &'a str },
    RotateAttribute { key: &'a str, attribute: &'a str },
    BindValue { key: &'a str },
    BindVariable { key: &'a str },
    Run { key: &'a str },
    Tab,
    TabReset,
    Focus,
}

impl<'a> Directive<'a> {
    /// Classify an attribute name. Returns `None` for anything that is not
    /// a processor directive, including `x-ref-*` and `x-on-*`.
    pub fn parse(name: &'a str) -> Option<Self> {
        match name {
            TAB => return Some(Directive::Tab),
            TAB_RESET => return Some(Directive::TabReset),
            FOCUS => return Some(Directive::Focus),
            _ => {}
        }

        let (rule, rest) = PREFIXES
            .iter()
            .find_map(|rule| name.strip_prefix(rule.prefix).map(|rest| (rule, rest)))?;

        let directive = match rule.family {
            Family::RotateClass => Directive::RotateClass { key: rest },
            Family::BindValue => Directive::BindValue { key: rest },
            Family::BindVariable => Directive::BindVariable { key: rest },
            Family::Run => Directive::Run { key: rest },
            Family::RotateAttribute => {
                let separator = rule.attribute_separator?;
                let (key, attribute) = rest.split_once(separator)?;
                if attribute.is_empty() {
                    return None;
                }
                Directive::RotateAttribute { key, attribute }
            }
        };
        Some(directive)
    }

    /// The name a rule filter selects this directive by.
    pub fn filter_key(&self) -> &'a str {
        match self {
            Directive::RotateClass { key }
            | Directive::RotateAttribute { key, .. }
            | Directive::BindValue { key }
            | Directive::BindVariable { key }
            | Directive::Run { key } => key,
            Directive::Tab => "tab",
            Directive::TabReset => "tab-reset",
            Directive::Focus => "focus",
        }
    }

    /// The family of a key-carrying directive.
    pub fn family(&self) -> Option<Family> {
        match self {
            Directive::RotateClass { .. } => Some(Family::RotateClass),
            Directive::RotateAttribute { .. } => Some(Family::RotateAttribute),
            Directive::BindValue { .. } => Some(Family::BindValue),
            Directive::BindVariable { .. } => Some(Family::BindVariable),
            Directive::Run { .. } => Some(Family::Run),
            Directive::Tab | Directive::TabReset | Directive::Focus => None,
        }
    }
}

/// Check the prefix table: every prefix starts with `x-`, ends with `-`,
/// and no prefix shadows another or a control name.
pub fn validate() -> Result<(), String> {
    for (i, rule) in PREFIXES.iter().enumerate() {
        if !rule.prefix.starts_with("x-") || !rule.prefix.ends_with('-') {
            return Err(format!("malformed directive prefix '{}'", rule.prefix));
        }
        if (rule.family == Family::RotateAttribute) != rule.attribute_separator.is_some() {
            return Err(format!("separator mismatch for '{}'", rule.prefix));
        }
        for other in &PREFIXES[i + 1..] {
            if rule.prefix.starts_with(other.prefix) || other.prefix.starts_with(rule.prefix) {
                return Err(format!(
                    "directive prefixes '{}' and '{}' overlap",
                    rule.prefix, other.prefix
                ));
            }
        }
        for control in [TAB, TAB_RESET, FOCUS] {
            if control.starts_with(rule.prefix) {
                return Err(format!("prefix '{}' shadows '{}'", rule.prefix, control));
            }
        }
    }
    Ok(())
}
