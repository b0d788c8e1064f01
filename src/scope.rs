//! Chained variable scope for expression evaluation.
//!
//! A [`Scope`] is a stack of frames walked innermost-first. The engine
//! pushes a frame per element iteration (carrying `_nth` and that node's
//! metadata) and pops it when the element's subtree finishes, so bindings
//! are visible to descendants but never leak sideways between siblings.
//!
//! Shadowing, not mutation: a deeper frame with the same name wins while
//! it is on the stack, and the outer binding reappears after the pop.

// ============================================================================
// Imports
// ============================================================================

use std::collections::HashMap;

use serde_json::Value;

// ============================================================================
// Built-in Variables
// ============================================================================

/// 0-based index of the current element within its resolved set.
pub const VAR_NTH: &str = "_nth";

/// 0-based index of the current repeat iteration.
pub const VAR_ITERATION: &str = "_iteration";

/// URL of the page currently being traversed.
pub const VAR_URL: &str = "_url";

/// Identifier of the node currently being traversed.
pub const VAR_NODE: &str = "_node";

// ============================================================================
// Scope
// ============================================================================

/// Chained mapping of named values visible to expressions.
///
/// # Example
///
/// ```
/// use scrawl::scope::Scope;
/// use serde_json::json;
///
/// let mut scope = Scope::new();
/// scope.set("section", json!("intro"));
///
/// scope.push();
/// scope.set("section", json!("details"));
/// assert_eq!(scope.get("section"), Some(&json!("details")));
///
/// scope.pop();
/// assert_eq!(scope.get("section"), Some(&json!("intro")));
/// ```
#[derive(Debug, Clone)]
pub struct Scope {
    /// Stack of frames; the last entry is the innermost.
    frames: Vec<HashMap<String, Value>>,
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope {
    /// Creates a scope with a single root frame.
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    /// Pushes a new innermost frame.
    pub fn push(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Pops the innermost frame.
    ///
    /// The root frame is never popped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    /// Binds `name` in the innermost frame, shadowing any outer binding.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.into(), value);
        }
    }

    /// Looks up `name`, innermost frame first.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Returns `true` if `name` is bound in any frame.
    #[inline]
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Returns the current frame depth.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

// ============================================================================
// Tests
// ============================================================================
