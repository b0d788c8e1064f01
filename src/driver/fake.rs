//! In-memory [`PageDriver`] implementation for deterministic tests.
//!
//! The fake models each page as a flat list of elements in insertion
//! (document) order. Elements declare the selectors they match, a parent
//! for subtree-scoped searches, and optional click-driven behavior
//! (vanish or become disabled after N clicks) so pagination loops can be
//! exercised without a browser.
//!
//! `wait_for` never sleeps: a selector either matches now or times out
//! immediately.
//!
//! # Example
//!
//! ```
//! use scrawl::driver::fake::{FakeDriver, FakeElement};
//!
//! let driver = FakeDriver::new();
//! let list = driver.add("https://example.com", FakeElement::new("ul.items"));
//! driver.add(
//!     "https://example.com",
//!     FakeElement::new("li.item").text("First").child_of(list),
//! );
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

use super::{ElementHandle, PageDriver, SwipeDirection};

// ============================================================================
// FakeElement
// ============================================================================

/// Declarative description of one element in a fake page.
#[derive(Debug, Clone)]
pub struct FakeElement {
    selectors: Vec<String>,
    text: String,
    attrs: HashMap<String, String>,
    parent: Option<u64>,
    disabled: bool,
    vanish_after_clicks: Option<u32>,
    disable_after_clicks: Option<u32>,
    fail_clicks: bool,
}

impl FakeElement {
    /// Creates an element matching `selector`.
    #[must_use]
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selectors: vec![selector.into()],
            text: String::new(),
            attrs: HashMap::new(),
            parent: None,
            disabled: false,
            vanish_after_clicks: None,
            disable_after_clicks: None,
            fail_clicks: false,
        }
    }

    /// Adds another selector this element matches.
    #[must_use]
    pub fn matching(mut self, selector: impl Into<String>) -> Self {
        self.selectors.push(selector.into());
        self
    }

    /// Sets the element's text content.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Sets an attribute value.
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Places the element inside the subtree of `parent`.
    #[must_use]
    pub fn child_of(mut self, parent: u64) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Marks the element as disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Detaches the element from the page after `n` clicks.
    #[must_use]
    pub fn vanish_after_clicks(mut self, n: u32) -> Self {
        self.vanish_after_clicks = Some(n);
        self
    }

    /// Disables the element after `n` clicks.
    #[must_use]
    pub fn disable_after_clicks(mut self, n: u32) -> Self {
        self.disable_after_clicks = Some(n);
        self
    }

    /// Makes every click on the element fail with a stale handle.
    #[must_use]
    pub fn fail_clicks(mut self) -> Self {
        self.fail_clicks = true;
        self
    }
}

// ============================================================================
// DriverCall
// ============================================================================

/// One recorded driver interaction, for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    /// `navigate(url)`.
    Navigate(String),
    /// `click(element)` with its verbatim options.
    Click {
        /// Raw element id.
        element: u64,
        /// Options passed through by the interpreter.
        options: Map<String, Value>,
    },
    /// `dispatch_event(element, event)`.
    Dispatch {
        /// Raw element id.
        element: u64,
        /// Synthetic event name.
        event: String,
    },
    /// `swipe(element, direction)`.
    Swipe {
        /// Raw element id.
        element: u64,
        /// Gesture direction.
        direction: SwipeDirection,
    },
    /// `scroll_into_view(element)`.
    ScrollIntoView {
        /// Raw element id.
        element: u64,
    },
    /// `screenshot(path)`.
    Screenshot(PathBuf),
}

// ============================================================================
// Internal State
// ============================================================================

#[derive(Debug)]
struct ElementState {
    id: u64,
    spec: FakeElement,
    clicks: u32,
    vanished: bool,
    disabled: bool,
}

impl ElementState {
    fn matches(&self, selector: &str) -> bool {
        !self.vanished && self.spec.selectors.iter().any(|s| s == selector)
    }
}

#[derive(Debug, Default)]
struct Inner {
    /// Elements per page URL, in document order.
    pages: HashMap<String, Vec<u64>>,
    elements: HashMap<u64, ElementState>,
    current: Option<String>,
    poisoned: Vec<String>,
    next_id: u64,
    calls: Vec<DriverCall>,
}

// ============================================================================
// FakeDriver
// ============================================================================

/// Deterministic in-memory page driver.
#[derive(Debug, Default)]
pub struct FakeDriver {
    inner: Mutex<Inner>,
}

impl FakeDriver {
    /// Creates an empty driver with no pages.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an element to the page at `url`, creating the page if
    /// needed. Returns the element's raw id for `child_of` nesting and
    /// call-log assertions.
    pub fn add(&self, url: impl Into<String>, element: FakeElement) -> u64 {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let disabled = element.disabled;
        inner.elements.insert(
            id,
            ElementState {
                id,
                spec: element,
                clicks: 0,
                vanished: false,
                disabled,
            },
        );
        inner.pages.entry(url.into()).or_default().push(id);
        id
    }

    /// Makes any navigation to `url` fail with [`Error::DriverFatal`].
    pub fn poison(&self, url: impl Into<String>) {
        self.inner.lock().poisoned.push(url.into());
    }

    /// Returns the recorded interaction log.
    #[must_use]
    pub fn calls(&self) -> Vec<DriverCall> {
        self.inner.lock().calls.clone()
    }

    /// Returns how many times `element` was clicked.
    #[must_use]
    pub fn click_count(&self, element: u64) -> u32 {
        self.inner
            .lock()
            .elements
            .get(&element)
            .map_or(0, |state| state.clicks)
    }
}

// ============================================================================
// FakeDriver - Queries
// ============================================================================

impl FakeDriver {
    /// Walks parent links to check subtree membership.
    fn in_subtree(inner: &Inner, mut id: u64, root: u64) -> bool {
        loop {
            let Some(state) = inner.elements.get(&id) else {
                return false;
            };
            match state.spec.parent {
                Some(parent) if parent == root => return true,
                Some(parent) => id = parent,
                None => return false,
            }
        }
    }

    fn find_ids(inner: &Inner, selector: &str, root: Option<u64>) -> Vec<u64> {
        let Some(current) = inner.current.as_ref() else {
            return Vec::new();
        };
        let Some(order) = inner.pages.get(current) else {
            return Vec::new();
        };

        order
            .iter()
            .filter_map(|id| inner.elements.get(id))
            .filter(|state| state.matches(selector))
            .filter(|state| root.is_none_or(|root| Self::in_subtree(inner, state.id, root)))
            .map(|state| state.id)
            .collect()
    }
}

// ============================================================================
// PageDriver Implementation
// ============================================================================

#[async_trait]
impl PageDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.poisoned.iter().any(|p| p == url) {
            return Err(Error::driver_fatal(format!("session lost at {url}")));
        }
        inner.current = Some(url.to_string());
        inner.calls.push(DriverCall::Navigate(url.to_string()));
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self
            .inner
            .lock()
            .current
            .clone()
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn find(
        &self,
        selector: &str,
        root: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>> {
        let inner = self.inner.lock();
        let ids = Self::find_ids(&inner, selector, root.map(ElementHandle::raw));
        Ok(ids.into_iter().map(ElementHandle::new).collect())
    }

    async fn text(&self, handle: &ElementHandle) -> Result<String> {
        let inner = self.inner.lock();
        let state = inner
            .elements
            .get(&handle.raw())
            .filter(|state| !state.vanished)
            .ok_or_else(|| Error::stale_element(handle.to_string()))?;
        Ok(state.spec.text.clone())
    }

    async fn attr(&self, handle: &ElementHandle, name: &str) -> Result<Option<String>> {
        let inner = self.inner.lock();
        let state = inner
            .elements
            .get(&handle.raw())
            .filter(|state| !state.vanished)
            .ok_or_else(|| Error::stale_element(handle.to_string()))?;
        Ok(state.spec.attrs.get(name).cloned())
    }

    async fn click(&self, handle: &ElementHandle, options: &Map<String, Value>) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::Click {
            element: handle.raw(),
            options: options.clone(),
        });

        let state = inner
            .elements
            .get_mut(&handle.raw())
            .filter(|state| !state.vanished)
            .ok_or_else(|| Error::stale_element(handle.to_string()))?;

        if state.spec.fail_clicks {
            return Err(Error::stale_element(handle.to_string()));
        }

        state.clicks += 1;
        if state.spec.vanish_after_clicks.is_some_and(|n| state.clicks >= n) {
            state.vanished = true;
        }
        if state.spec.disable_after_clicks.is_some_and(|n| state.clicks >= n) {
            state.disabled = true;
        }
        Ok(())
    }

    async fn dispatch_event(&self, handle: &ElementHandle, event: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.elements.contains_key(&handle.raw()) {
            return Err(Error::stale_element(handle.to_string()));
        }
        inner.calls.push(DriverCall::Dispatch {
            element: handle.raw(),
            event: event.to_string(),
        });
        Ok(())
    }

    async fn swipe(&self, handle: &ElementHandle, direction: SwipeDirection) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.elements.contains_key(&handle.raw()) {
            return Err(Error::stale_element(handle.to_string()));
        }
        inner.calls.push(DriverCall::Swipe {
            element: handle.raw(),
            direction,
        });
        Ok(())
    }

    async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(DriverCall::ScrollIntoView {
            element: handle.raw(),
        });
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let inner = self.inner.lock();
        if Self::find_ids(&inner, selector, None).is_empty() {
            Err(Error::selector_timeout(selector, timeout_ms))
        } else {
            Ok(())
        }
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        self.inner
            .lock()
            .calls
            .push(DriverCall::Screenshot(path.to_path_buf()));
        Ok(())
    }

    async fn is_disabled(&self, handle: &ElementHandle) -> Result<bool> {
        let inner = self.inner.lock();
        let state = inner
            .elements
            .get(&handle.raw())
            .ok_or_else(|| Error::stale_element(handle.to_string()))?;
        Ok(state.disabled)
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        let inner = self.inner.lock();
        Ok(!Self::find_ids(&inner, selector, None).is_empty())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio_test::assert_ok;

    const URL: &str = "https://example.com";

    fn seeded() -> (FakeDriver, u64, u64) {
        let driver = FakeDriver::new();
        let list = driver.add(URL, FakeElement::new("ul.items"));
        let item = driver.add(
            URL,
            FakeElement::new("li.item")
                .text("First")
                .attr("href", "/a")
                .child_of(list),
        );
        (driver, list, item)
    }

    #[tokio::test]
    async fn test_find_in_document_order() {
        let (driver, _, _) = seeded();
        driver.add(URL, FakeElement::new("li.item").text("Second"));
        driver.navigate(URL).await.unwrap();

        let found = driver.find("li.item", None).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(driver.text(&found[0]).await.unwrap(), "First");
        assert_eq!(driver.text(&found[1]).await.unwrap(), "Second");
    }

    #[tokio::test]
    async fn test_find_scoped_to_root() {
        let (driver, list, _) = seeded();
        driver.add(URL, FakeElement::new("li.item").text("Orphan"));
        driver.navigate(URL).await.unwrap();

        let root = ElementHandle::new(list);
        let found = driver.find("li.item", Some(&root)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(driver.text(&found[0]).await.unwrap(), "First");
    }

    #[tokio::test]
    async fn test_nothing_matches_before_navigation() {
        let (driver, _, _) = seeded();
        assert!(driver.find("li.item", None).await.unwrap().is_empty());
        assert!(!driver.exists("li.item").await.unwrap());
    }

    #[tokio::test]
    async fn test_vanish_after_clicks() {
        let driver = FakeDriver::new();
        let btn = driver.add(URL, FakeElement::new("button.more").vanish_after_clicks(2));
        driver.navigate(URL).await.unwrap();
        let handle = ElementHandle::new(btn);

        driver.click(&handle, &Map::new()).await.unwrap();
        assert!(driver.exists("button.more").await.unwrap());
        driver.click(&handle, &Map::new()).await.unwrap();
        assert!(!driver.exists("button.more").await.unwrap());

        let err = driver.text(&handle).await.unwrap_err();
        assert!(matches!(err, Error::StaleElement { .. }));
    }

    #[tokio::test]
    async fn test_wait_for_times_out_without_match() {
        let (driver, _, _) = seeded();
        driver.navigate(URL).await.unwrap();

        tokio_test::assert_ok!(driver.wait_for("li.item", 100).await);
        let err = driver.wait_for("div.never", 100).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_poisoned_navigation_is_fatal() {
        let driver = FakeDriver::new();
        driver.poison(URL);

        let err = driver.navigate(URL).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_call_log_records_interactions() {
        let (driver, _, item) = seeded();
        driver.navigate(URL).await.unwrap();
        let handle = ElementHandle::new(item);

        driver.click(&handle, &Map::new()).await.unwrap();
        driver.dispatch_event(&handle, "mouseover").await.unwrap();

        let calls = driver.calls();
        assert_eq!(calls[0], DriverCall::Navigate(URL.to_string()));
        assert!(matches!(calls[1], DriverCall::Click { element, .. } if element == item));
        assert_eq!(
            calls[2],
            DriverCall::Dispatch {
                element: item,
                event: "mouseover".to_string()
            }
        );
    }
}
