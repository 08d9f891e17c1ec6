//! Request Wrapper
//!
//! An XHR-style request object shared by the widgets. It owns a
//! [`Transport`], a FIFO stack of completion callbacks, a response cache and
//! a small data bag.
//!
//! # Callbacks
//!
//! Each completed exchange (including cache hits, timeouts and aborts) pops
//! the next callback off the stack and calls it. `retry` pushes the last
//! callback back on the front; `retry_all` restores every callback consumed
//! so far.
//!
//! # Failure
//!
//! Failures are reported through status codes, never through `Err`:
//!
//! | Code | Meaning                                         |
//! |------|-------------------------------------------------|
//! | 0    | aborted or no connection                        |
//! | 200  | cache hit (header `x-cache: HIT`)               |
//! | 408  | client-side timeout (header `x-timeout: true`)  |
//!
//! # Cache
//!
//! Successful non-empty responses are cached by URL when caching is on.
//! Entries expire after the TTL and the oldest entries are evicted once the
//! total UTF-8 size exceeds the limit. Time is read from the [`TaskQueue`]
//! clock.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::task::{TaskId, TaskQueue};
use crate::util::{byte_size, trim};

const REQUESTED_WITH: (&str, &str) = ("X-Requested-With", "XMLHttpRequest");
const MIB: usize = 1024 * 1024;

/// Options for one [`Request::send`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    pub method: String,
    pub headers: IndexMap<String, String>,
    pub content: String,
    /// Seconds before the exchange is aborted and answered with 408.
    pub timeout_secs: Option<u64>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: "GET".to_string(),
            headers: IndexMap::new(),
            content: String::new(),
            timeout_secs: None,
        }
    }
}

/// What the transport is asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub content: String,
}

/// A finished exchange as the transport sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    /// Raw header block, one `name: value` per line.
    pub headers: String,
}

/// Completion handed to [`Transport::send`].
pub type Completion = Box<dyn FnOnce(RawResponse)>;

/// The network side of a [`Request`].
pub trait Transport {
    /// Start an exchange and call `done` once it finishes. `done` may be
    /// called synchronously.
    fn send(&self, spec: RequestSpec, done: Completion);

    /// Abort the exchange in flight. `done` must not be called afterwards.
    fn abort(&self);

    /// Whether an exchange is in flight.
    fn is_pending(&self) -> bool;
}

/// A response with parsed headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub content: String,
    /// Lower-cased header names to trimmed values.
    pub headers: IndexMap<String, String>,
}

impl Response {
    /// Build a response from a status, body and raw header block.
    ///
    /// Lines without a colon or with an empty name are skipped.
    pub fn parse(code: u16, content: String, header_block: &str) -> Self {
        let headers = header_block
            .lines()
            .filter_map(|line| line.split_once(':'))
            .map(|(name, value)| (trim(name).to_lowercase(), trim(value).to_string()))
            .filter(|(name, _)| !name.is_empty())
            .collect();
        Self {
            code,
            content,
            headers,
        }
    }

    fn cache_hit(content: String) -> Self {
        Self::parse(200, content, "X-Cache: HIT")
    }

    fn timed_out() -> Self {
        Self::parse(408, String::new(), "X-Timeout: true")
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }
}

/// Callback invoked with the request and its response.
pub type Callback<T> = Rc<dyn Fn(&Request<T>, &Response)>;

struct CallStack<T: Transport + 'static> {
    pending: VecDeque<Callback<T>>,
    done: Vec<Callback<T>>,
    last: Option<Callback<T>>,
}

struct CacheEntry {
    value: String,
    stored_at: u64,
}

#[derive(Default)]
struct ResponseCache {
    enabled: bool,
    entries: IndexMap<String, CacheEntry>,
    total: usize,
    limit: Option<usize>,
    ttl_ms: Option<u64>,
}

impl ResponseCache {
    fn get(&mut self, key: &str, now: u64) -> Option<String> {
        let entry = self.entries.get(key)?;
        let expired = self
            .ttl_ms
            .is_some_and(|ttl| now.saturating_sub(entry.stored_at) > ttl);
        if expired {
            self.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    fn insert(&mut self, key: &str, value: String, now: u64) {
        self.total += byte_size(&value);
        let previous = self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: now,
            },
        );
        if let Some(previous) = previous {
            self.total -= byte_size(&previous.value);
        }
        self.evict();
    }

    fn remove(&mut self, key: &str) {
        if let Some(entry) = self.entries.shift_remove(key) {
            self.total -= byte_size(&entry.value);
        }
    }

    /// Drop oldest entries until the total fits the limit.
    fn evict(&mut self) {
        let Some(limit) = self.limit else {
            return;
        };
        while self.total > limit {
            let Some((key, entry)) = self.entries.shift_remove_index(0) else {
                break;
            };
            self.total -= byte_size(&entry.value);
            debug!(key = %key, size = byte_size(&entry.value), "evicted cache entry");
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.total = 0;
    }
}

struct RequestInner<T: Transport + 'static> {
    transport: T,
    tasks: Rc<TaskQueue>,
    calls: RefCell<CallStack<T>>,
    cache: RefCell<ResponseCache>,
    data: RefCell<HashMap<String, serde_json::Value>>,
    /// Open flag of the exchange in flight, shared with its completion and
    /// timeout. Whichever settles the exchange first clears it.
    open: RefCell<Option<Rc<Cell<bool>>>>,
    timeout: Cell<Option<TaskId>>,
}

/// A reusable request with a callback stack and response cache.
pub struct Request<T: Transport + 'static> {
    inner: Rc<RequestInner<T>>,
}

impl<T: Transport + 'static> Clone for Request<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Transport + 'static> Request<T> {
    /// Create a request over `transport`, with timeouts on `tasks`.
    pub fn new(transport: T, tasks: Rc<TaskQueue>) -> Self {
        Self {
            inner: Rc::new(RequestInner {
                transport,
                tasks,
                calls: RefCell::new(CallStack {
                    pending: VecDeque::new(),
                    done: Vec::new(),
                    last: None,
                }),
                cache: RefCell::new(ResponseCache::default()),
                data: RefCell::new(HashMap::new()),
                open: RefCell::new(None),
                timeout: Cell::new(None),
            }),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Send a request to `url`, answering from the cache when possible.
    pub fn send(&self, url: &str, options: &RequestOptions) {
        // Cached responses never reach the transport
        let now = self.inner.tasks.now();
        let hit = {
            let mut cache = self.inner.cache.borrow_mut();
            if cache.enabled {
                cache.get(url, now)
            } else {
                None
            }
        };
        if let Some(content) = hit {
            debug!(url, "cache hit");
            self.next_callback(&Response::cache_hit(content));
            return;
        }

        let mut headers = vec![(REQUESTED_WITH.0.to_string(), REQUESTED_WITH.1.to_string())];
        headers.extend(
            options
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        let spec = RequestSpec {
            method: options.method.clone(),
            url: url.to_string(),
            headers,
            content: options.content.clone(),
        };

        // Only the latest send may complete; older ones are closed
        let open = Rc::new(Cell::new(true));
        if let Some(previous) = self.inner.open.replace(Some(open.clone())) {
            previous.set(false);
        }
        self.cancel_timeout();

        // Whichever of timeout and completion fires first closes the send
        if let Some(secs) = options.timeout_secs {
            let weak = self.weak();
            let open = open.clone();
            let url = url.to_string();
            let id = self.inner.tasks.schedule(secs.saturating_mul(1000), move || {
                if !open.replace(false) {
                    return;
                }
                if let Some(inner) = weak.upgrade() {
                    let request = Request { inner };
                    request.inner.timeout.set(None);
                    request.inner.transport.abort();
                    warn!(url = %url, "request timed out and was aborted");
                    request.next_callback(&Response::timed_out());
                }
            });
            self.inner.timeout.set(Some(id));
        }

        let weak = self.weak();
        let url = url.to_string();
        self.inner.transport.send(
            spec,
            Box::new(move |raw: RawResponse| {
                if !open.replace(false) {
                    return;
                }
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let request = Request { inner };
                request.cancel_timeout();
                let response = Response::parse(raw.status, raw.body, &raw.headers);
                if response.is_success() && !response.content.is_empty() {
                    let now = request.inner.tasks.now();
                    let mut cache = request.inner.cache.borrow_mut();
                    if cache.enabled {
                        cache.insert(&url, response.content.clone(), now);
                    }
                }
                request.next_callback(&response);
            }),
        );
    }

    /// Abort the exchange in flight and answer it with status 0.
    pub fn abort(&self) {
        if !self.inner.transport.is_pending() {
            return;
        }
        if let Some(open) = self.inner.open.take() {
            open.set(false);
        }
        self.cancel_timeout();
        self.inner.transport.abort();
        warn!("request aborted");
        self.next_callback(&Response::default());
    }

    /// Queue `callback` for the next unanswered exchange.
    pub fn add_callback<F>(&self, callback: F) -> &Self
    where
        F: Fn(&Request<T>, &Response) + 'static,
    {
        self.inner
            .calls
            .borrow_mut()
            .pending
            .push_back(Rc::new(callback));
        self
    }

    /// Put the most recently called callback back on the front.
    pub fn retry(&self) -> &Self {
        let mut calls = self.inner.calls.borrow_mut();
        if let Some(last) = calls.last.take() {
            calls.pending.push_front(last);
        }
        self
    }

    /// Restore every callback consumed so far, ahead of those still queued.
    pub fn retry_all(&self) -> &Self {
        let mut calls = self.inner.calls.borrow_mut();
        let mut restored: VecDeque<Callback<T>> = calls.done.drain(..).collect();
        restored.append(&mut calls.pending);
        calls.pending = restored;
        self
    }

    /// Drop every callback still waiting for a response.
    pub fn reset_callstack(&self) -> &Self {
        self.inner.calls.borrow_mut().pending.clear();
        self
    }

    /// Number of callbacks waiting for a response.
    pub fn pending_callbacks(&self) -> usize {
        self.inner.calls.borrow().pending.len()
    }

    /// Turn response caching on or off.
    pub fn set_cache(&self, enabled: bool) -> &Self {
        self.inner.cache.borrow_mut().enabled = enabled;
        self
    }

    /// Cache size limit in MiB; `None` for unlimited.
    pub fn set_cache_size(&self, mib: Option<usize>) -> &Self {
        let mut cache = self.inner.cache.borrow_mut();
        cache.limit = mib.map(|mib| mib.saturating_mul(MIB));
        cache.evict();
        self
    }

    /// Cache entry lifetime in seconds; `None` for no expiry.
    pub fn set_cache_ttl(&self, seconds: Option<u64>) -> &Self {
        self.inner.cache.borrow_mut().ttl_ms = seconds.map(|s| s.saturating_mul(1000));
        self
    }

    /// Forget the cached response for `url`.
    pub fn remove_cache_entry(&self, url: &str) {
        self.inner.cache.borrow_mut().remove(url);
    }

    /// Forget every cached response.
    pub fn clear_cache(&self) {
        self.inner.cache.borrow_mut().clear();
    }

    /// Total UTF-8 size of cached bodies.
    pub fn cache_size(&self) -> usize {
        self.inner.cache.borrow().total
    }

    /// Attach a value to this request for later callbacks.
    pub fn set_data(&self, key: &str, value: impl Into<serde_json::Value>) -> &Self {
        self.inner
            .data
            .borrow_mut()
            .insert(key.to_string(), value.into());
        self
    }

    /// A value attached with [`Request::set_data`].
    pub fn get_data(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.data.borrow().get(key).cloned()
    }

    fn next_callback(&self, response: &Response) {
        let callback = {
            let mut calls = self.inner.calls.borrow_mut();
            let Some(callback) = calls.pending.pop_front() else {
                return;
            };
            calls.last = Some(callback.clone());
            calls.done.push(callback.clone());
            callback
        };
        callback(self, response);
    }

    fn cancel_timeout(&self) {
        if let Some(id) = self.inner.timeout.take() {
            self.inner.tasks.cancel(id);
        }
    }

    fn weak(&self) -> Weak<RequestInner<T>> {
        Rc::downgrade(&self.inner)
    }
}
