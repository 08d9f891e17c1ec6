//! URL builder with a structured query.

use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::util::{object_to_query, query_to_object};

/// The host's session history, written to by [`Url::sync`].
pub trait History {
    /// Whether entries can be pushed without a page load.
    fn supports_state(&self) -> bool {
        true
    }

    fn push_state(&self, url: &str);

    fn replace_state(&self, url: &str);

    /// Load `url` as a full navigation.
    fn assign(&self, url: &str);
}

/// A URL split into base, decoded query object and fragment.
///
/// ```
/// use elx_core::Url;
///
/// let mut url = Url::parse("/book?service=cleaning#slots").unwrap();
/// url.set_query("date", "2025-01-02").remove_query("service");
/// assert_eq!(url.to_string(), "/book?date=2025-01-02#slots");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Url {
    base: String,
    query: Map<String, Value>,
    hash: String,
}

impl Url {
    /// Parse `base?query#hash`. Fails only on an undecodable query.
    pub fn parse(url: &str) -> Result<Self> {
        let (rest, hash) = url.split_once('#').unwrap_or((url, ""));
        let (base, query) = rest.split_once('?').unwrap_or((rest, ""));
        let query = match query_to_object(query)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Ok(Self {
            base: base.to_string(),
            query,
            hash: hash.to_string(),
        })
    }

    /// Everything before the query.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The fragment without its leading `#`.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Replace the fragment. An empty hash drops it.
    pub fn set_hash(&mut self, hash: &str) -> &mut Self {
        self.hash = hash.to_string();
        self
    }

    /// Insert or overwrite a query key. Existing keys keep their position.
    pub fn set_query(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        self.query.insert(key.to_string(), value.into());
        self
    }

    /// Drop a query key, keeping the order of the rest.
    pub fn remove_query(&mut self, key: &str) -> &mut Self {
        self.query.shift_remove(key);
        self
    }

    /// The decoded value of a query key.
    pub fn get_query(&self, key: &str) -> Option<&Value> {
        self.query.get(key)
    }

    /// Write this URL to the address bar.
    ///
    /// Pushes a new history entry, or replaces the current one when
    /// `replace` is set. Hosts without state support navigate instead.
    pub fn sync<H: History + ?Sized>(&self, history: &H, replace: bool) {
        let url = self.to_string();
        if !history.supports_state() {
            debug!(%url, "history state unsupported; navigating");
            history.assign(&url);
        } else if replace {
            history.replace_state(&url);
        } else {
            history.push_state(&url);
        }
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base)?;
        let query = object_to_query(&Value::Object(self.query.clone()));
        if !query.is_empty() {
            write!(f, "?{}", query)?;
        }
        if !self.hash.is_empty() {
            write!(f, "#{}", self.hash)?;
        }
        Ok(())
    }
}
