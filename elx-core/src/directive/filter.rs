//! Rule filters carried by event attributes.

use smallvec::SmallVec;

use crate::util::trim;

type Keys = SmallVec<[String; 4]>;

/// Restricts which directive keys participate in one firing.
///
/// Parsed from the value of the attribute that named the event, e.g. the
/// value of `x-on-click`:
///
/// - `""` matches every key
/// - `"!a b"` matches every key except `a` and `b`
/// - `"a b"` matches only `a` and `b`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RuleFilter {
    #[default]
    All,
    Only(Keys),
    Except(Keys),
}

impl RuleFilter {
    /// Parse a rule filter. Blank means all, a leading `!` negates.
    pub fn parse(raw: &str) -> Self {
        let raw = trim(raw);
        if raw.is_empty() {
            return RuleFilter::All;
        }
        match raw.strip_prefix('!') {
            Some(rest) => RuleFilter::Except(split(rest)),
            None => RuleFilter::Only(split(raw)),
        }
    }

    /// Whether a directive filtered by `key` may apply.
    pub fn matches(&self, key: &str) -> bool {
        match self {
            RuleFilter::All => true,
            RuleFilter::Only(keys) => keys.iter().any(|k| k == key),
            RuleFilter::Except(keys) => !keys.iter().any(|k| k == key),
        }
    }
}

fn split(list: &str) -> Keys {
    list.split_whitespace().map(str::to_string).collect()
}
