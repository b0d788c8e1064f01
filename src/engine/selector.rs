//! Selector resolution.
//!
//! Turns a [`NodeSpec`] into the ordered set of elements the node
//! interacts with: wait, query under the current root, text filters,
//! first-match truncation, then range slicing. Zero matches is never an
//! error; the node simply contributes nothing.

// ============================================================================
// Imports
// ============================================================================

use tracing::warn;

use crate::driver::{ElementHandle, PageDriver};
use crate::error::Result;
use crate::spec::NodeSpec;

// ============================================================================
// Resolution
// ============================================================================

/// Resolves the elements a node targets, in document order.
///
/// # Errors
///
/// Returns [`Error::SelectorTimeout`] when `wait` expires without a
/// match (the caller treats this as a non-fatal, per-node failure) and
/// propagates fatal driver errors.
///
/// [`Error::SelectorTimeout`]: crate::error::Error::SelectorTimeout
pub(crate) async fn resolve(
    driver: &dyn PageDriver,
    node: &NodeSpec,
    root: Option<&ElementHandle>,
) -> Result<Vec<ElementHandle>> {
    if let Some(timeout_ms) = node.wait {
        driver.wait_for(&node.selector, timeout_ms).await?;
    }

    let matches = driver.find(&node.selector, root).await?;
    let mut filtered = Vec::with_capacity(matches.len());

    for handle in matches {
        if node.contains.is_none() && node.excludes.is_none() {
            filtered.push(handle);
            continue;
        }

        let text = match driver.text(&handle).await {
            Ok(text) => text,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(selector = %node.selector, error = %err, "Dropping unreadable element");
                continue;
            }
        };

        if node.contains.as_ref().is_some_and(|needle| !text.contains(needle.as_str())) {
            continue;
        }
        if node.excludes.as_ref().is_some_and(|needle| text.contains(needle.as_str())) {
            continue;
        }
        filtered.push(handle);
    }

    if !node.all {
        filtered.truncate(1);
        return Ok(filtered);
    }

    Ok(match node.range {
        Some(range) => range.apply(filtered),
        None => filtered,
    })
}

// ============================================================================
// Tests
// ============================================================================
