//! Page driver abstraction.
//!
//! The interpreter never talks to the network or DOM directly; every
//! navigation, query, and interaction goes through the [`PageDriver`]
//! trait. A production implementation wraps a real browser backend; the
//! [`fake`] module ships a deterministic in-memory implementation for
//! tests.
//!
//! All driver calls are awaited to completion (or timeout) before the
//! interpreter takes its next step, so one page session is driven at a
//! time with no overlap between actions on the same element lineage.

// ============================================================================
// Modules
// ============================================================================

/// Deterministic in-memory driver for tests.
pub mod fake;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

// ============================================================================
// ElementHandle
// ============================================================================

/// Opaque handle to an element resolved by the driver.
///
/// Handles are cheap to clone and only meaningful to the driver that
/// produced them. A handle may go stale if the underlying element is
/// detached; the driver then reports [`Error::StaleElement`].
///
/// [`Error::StaleElement`]: crate::error::Error::StaleElement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(u64);

impl ElementHandle {
    /// Creates a handle from a raw driver-assigned id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw driver-assigned id.
    #[inline]
    #[must_use]
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

// ============================================================================
// SwipeDirection
// ============================================================================

/// Direction of a pointer swipe gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    /// Drag from the element center to the left page edge.
    Left,
    /// Drag from the element center to the right page edge.
    Right,
}

// ============================================================================
// PageDriver
// ============================================================================

/// Capability contract between the interpreter and a browser backend.
///
/// `find` returns matches in document order; the interpreter relies on
/// that ordering for `_nth` and range slicing. `wait_for` blocks until
/// the selector matches at least one element or the timeout elapses,
/// returning [`Error::SelectorTimeout`] on expiry.
///
/// [`Error::SelectorTimeout`]: crate::error::Error::SelectorTimeout
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigates the page session to `url`.
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Returns the URL the session currently points at.
    async fn current_url(&self) -> Result<String>;

    /// Finds all elements matching `selector`, in document order.
    ///
    /// With a `root`, the search is restricted to that element's
    /// subtree; without one it runs against the whole page.
    async fn find(
        &self,
        selector: &str,
        root: Option<&ElementHandle>,
    ) -> Result<Vec<ElementHandle>>;

    /// Returns the element's text content.
    async fn text(&self, handle: &ElementHandle) -> Result<String>;

    /// Returns an attribute value, or `None` if the attribute is absent.
    async fn attr(&self, handle: &ElementHandle, name: &str) -> Result<Option<String>>;

    /// Clicks the element as a native interaction.
    ///
    /// `options` are passed through verbatim (e.g. `button`,
    /// `modifiers`); unknown keys are the backend's concern.
    async fn click(&self, handle: &ElementHandle, options: &Map<String, Value>) -> Result<()>;

    /// Fires `event` on the element as a synthetic event.
    async fn dispatch_event(&self, handle: &ElementHandle, event: &str) -> Result<()>;

    /// Performs a pointer swipe gesture across the element.
    async fn swipe(&self, handle: &ElementHandle, direction: SwipeDirection) -> Result<()>;

    /// Scrolls the element into the viewport.
    async fn scroll_into_view(&self, handle: &ElementHandle) -> Result<()>;

    /// Blocks until `selector` matches at least one element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SelectorTimeout`] if nothing matches within
    /// `timeout_ms`.
    ///
    /// [`Error::SelectorTimeout`]: crate::error::Error::SelectorTimeout
    async fn wait_for(&self, selector: &str, timeout_ms: u64) -> Result<()>;

    /// Captures a full-page screenshot to `path`.
    async fn screenshot(&self, path: &Path) -> Result<()>;

    /// Returns the element's disabled state.
    async fn is_disabled(&self, handle: &ElementHandle) -> Result<bool>;

    /// Returns `true` if `selector` currently matches any element.
    async fn exists(&self, selector: &str) -> Result<bool>;
}

// ============================================================================
// Tests
// ============================================================================
