//! Script Loading
//!
//! Widgets pull in their own scripts on demand. [`ScriptLoader`] remembers
//! which URLs have finished loading, so asking for the same bundle twice
//! only injects it once, and reports a batch as loaded when every URL in
//! it is.
//!
//! Injecting the `<script>` element is the host's job, behind
//! [`ScriptHost`].

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use indexmap::IndexSet;
use tracing::{debug, warn};

/// Inserts deferred `<script src>` elements into the page.
pub trait ScriptHost {
    /// Start loading `url`. Call `done(true)` once it has run and
    /// `done(false)` if it failed to load.
    fn inject(&self, url: &str, done: Box<dyn FnOnce(bool)>);
}

struct Batch {
    remaining: Cell<usize>,
    failed: Cell<bool>,
    on_success: Cell<Option<Box<dyn FnOnce()>>>,
    on_failure: Cell<Option<Box<dyn FnOnce()>>>,
}

impl Batch {
    fn loaded(&self) {
        let remaining = self.remaining.get().saturating_sub(1);
        self.remaining.set(remaining);
        if remaining == 0 && !self.failed.get() {
            if let Some(callback) = self.on_success.take() {
                callback();
            }
        }
    }

    fn failed(&self) {
        if self.failed.replace(true) {
            return;
        }
        if let Some(callback) = self.on_failure.take() {
            callback();
        }
    }
}

/// Loads script bundles through a [`ScriptHost`], each URL at most once.
pub struct ScriptLoader<H: ScriptHost> {
    host: H,
    loaded: Rc<RefCell<IndexSet<String>>>,
}

impl<H: ScriptHost> ScriptLoader<H> {
    /// Create a loader that injects through `host`.
    pub fn new(host: H) -> Self {
        Self {
            host,
            loaded: Rc::new(RefCell::new(IndexSet::new())),
        }
    }

    /// The host scripts are injected through.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Whether `url` has finished loading.
    pub fn is_loaded(&self, url: &str) -> bool {
        self.loaded.borrow().contains(url)
    }

    /// Load every URL in `urls` that is not loaded yet.
    ///
    /// `on_success` runs once all of them have loaded, immediately if none
    /// needed loading. `on_failure` runs on the first failure, after which
    /// `on_success` never runs for this batch.
    pub fn load<S, F>(&self, urls: &[&str], on_success: S, on_failure: F)
    where
        S: FnOnce() + 'static,
        F: FnOnce() + 'static,
    {
        let pending: Vec<&str> = {
            let loaded = self.loaded.borrow();
            urls.iter().copied().filter(|url| !loaded.contains(*url)).collect()
        };
        if pending.is_empty() {
            on_success();
            return;
        }

        debug!(requested = urls.len(), injecting = pending.len(), "loading scripts");
        let batch = Rc::new(Batch {
            remaining: Cell::new(pending.len()),
            failed: Cell::new(false),
            on_success: Cell::new(Some(Box::new(on_success))),
            on_failure: Cell::new(Some(Box::new(on_failure))),
        });
        for url in pending {
            let batch = Rc::clone(&batch);
            let loaded = Rc::clone(&self.loaded);
            let owned = url.to_string();
            self.host.inject(
                url,
                Box::new(move |ok| {
                    if ok {
                        loaded.borrow_mut().insert(owned);
                        batch.loaded();
                    } else {
                        warn!(url = %owned, "script failed to load");
                        batch.failed();
                    }
                }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Done = Box<dyn FnOnce(bool)>;

    /// Holds injected scripts until the test settles them.
    #[derive(Default)]
    struct PageHead {
        injected: RefCell<Vec<(String, Done)>>,
    }

    impl PageHead {
        fn urls(&self) -> Vec<String> {
            self.injected.borrow().iter().map(|(url, _)| url.clone()).collect()
        }

        fn settle(&self, url: &str, ok: bool) {
            let index = self
                .injected
                .borrow()
                .iter()
                .position(|(u, _)| u == url)
                .unwrap();
            let (_, done) = self.injected.borrow_mut().remove(index);
            done(ok);
        }
    }

    impl ScriptHost for Rc<PageHead> {
        fn inject(&self, url: &str, done: Done) {
            self.injected.borrow_mut().push((url.to_string(), done));
        }
    }

    fn log() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn FnOnce()>) {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        let make = move |name: &'static str| {
            let sink = sink.clone();
            Box::new(move || sink.borrow_mut().push(name)) as Box<dyn FnOnce()>
        };
        (events, make)
    }

    #[test]
    fn succeeds_once_every_script_loaded() {
        let head = Rc::new(PageHead::default());
        let loader = ScriptLoader::new(head.clone());
        let (events, make) = log();

        loader.load(&["/js/chat.js", "/js/emoji.js"], make("ok"), make("failed"));
        assert_eq!(head.urls(), ["/js/chat.js", "/js/emoji.js"]);

        head.settle("/js/emoji.js", true);
        assert!(events.borrow().is_empty());
        head.settle("/js/chat.js", true);
        assert_eq!(*events.borrow(), ["ok"]);
        assert!(loader.is_loaded("/js/chat.js"));
    }

    #[test]
    fn loaded_scripts_are_not_injected_again() {
        let head = Rc::new(PageHead::default());
        let loader = ScriptLoader::new(head.clone());
        let (events, make) = log();

        loader.load(&["/js/chat.js"], make("first"), make("failed"));
        head.settle("/js/chat.js", true);

        loader.load(&["/js/chat.js"], make("cached"), make("failed"));
        assert!(head.urls().is_empty());

        loader.load(&["/js/chat.js", "/js/slots.js"], make("mixed"), make("failed"));
        assert_eq!(head.urls(), ["/js/slots.js"]);
        head.settle("/js/slots.js", true);
        assert_eq!(*events.borrow(), ["first", "cached", "mixed"]);
    }

    #[test]
    fn first_failure_wins() {
        let head = Rc::new(PageHead::default());
        let loader = ScriptLoader::new(head.clone());
        let (events, make) = log();

        loader.load(&["/a.js", "/b.js", "/c.js"], make("ok"), make("failed"));
        head.settle("/a.js", false);
        head.settle("/b.js", false);
        head.settle("/c.js", true);
        assert_eq!(*events.borrow(), ["failed"]);
        assert!(!loader.is_loaded("/a.js"));
        assert!(loader.is_loaded("/c.js"));
    }
}
