//! Error types for the Scrawl interpreter.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use scrawl::{Result, Error};
//!
//! async fn example(driver: &dyn PageDriver) -> Result<()> {
//!     driver.navigate("https://example.com").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants | Containment |
//! |----------|----------|-------------|
//! | Configuration | [`Error::Config`] | fatal at load time |
//! | Selector | [`Error::SelectorTimeout`] | node yields empty result |
//! | Expression | [`Error::UnresolvedVariable`], [`Error::InvalidExpression`] | owning field becomes null |
//! | Action | [`Error::ActionFailure`], [`Error::UnsupportedAction`] | next action runs |
//! | Repeat | [`Error::RepeatOverflow`] | page repeat stops, results kept |
//! | Driver | [`Error::StaleElement`], [`Error::DriverFatal`] | remaining page traversal aborted |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::Yaml`] | propagated |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging. Failures are
/// contained at the narrowest scope possible: action < node < page.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a scrawl spec document is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Selector Errors
    // ========================================================================
    /// Selector never matched within its `wait` window.
    ///
    /// Non-fatal: the owning node yields an empty result and sibling
    /// nodes continue.
    #[error("Selector timeout after {timeout_ms}ms: {selector}")]
    SelectorTimeout {
        /// Selector that never matched.
        selector: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Expression Errors
    // ========================================================================
    /// Expression references an unknown `$var{...}` binding.
    ///
    /// Fatal to the owning field only: the field resolves to null and
    /// the rest of the record is still extracted.
    #[error("Unresolved variable: {name}")]
    UnresolvedVariable {
        /// Variable name that had no binding in scope.
        name: String,
    },

    /// Expression text could not be parsed.
    #[error("Invalid expression at '{input}': {message}")]
    InvalidExpression {
        /// Offending expression text.
        input: String,
        /// Description of the parse failure.
        message: String,
    },

    // ========================================================================
    // Action Errors
    // ========================================================================
    /// Driver interaction failed while executing an action.
    ///
    /// Non-fatal by default: execution moves to the next action.
    #[error("Action '{action}' failed: {message}")]
    ActionFailure {
        /// Action type that failed.
        action: String,
        /// Description of the interaction failure.
        message: String,
    },

    /// Action type is not recognized and not a dispatchable event.
    #[error("Unsupported action: {action}")]
    UnsupportedAction {
        /// The unrecognized action type.
        action: String,
    },

    // ========================================================================
    // Repeat Errors
    // ========================================================================
    /// A `while` repeat exceeded the safety cap.
    ///
    /// Fatal to that page's repeat block; already-collected results are
    /// kept.
    #[error("Repeat overflow: exceeded {limit} iterations")]
    RepeatOverflow {
        /// The configured iteration cap.
        limit: u32,
    },

    // ========================================================================
    // Driver Errors
    // ========================================================================
    /// Element handle is no longer valid (detached from the page).
    #[error("Stale element: {handle}")]
    StaleElement {
        /// Debug rendering of the stale handle.
        handle: String,
    },

    /// Page session closed or driver backend unreachable.
    ///
    /// Aborts the remaining traversal for the current page; results of
    /// prior pages are preserved.
    #[error("Driver fatal: {message}")]
    DriverFatal {
        /// Description of the driver failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a selector timeout error.
    #[inline]
    pub fn selector_timeout(selector: impl Into<String>, timeout_ms: u64) -> Self {
        Self::SelectorTimeout {
            selector: selector.into(),
            timeout_ms,
        }
    }

    /// Creates an unresolved variable error.
    #[inline]
    pub fn unresolved_variable(name: impl Into<String>) -> Self {
        Self::UnresolvedVariable { name: name.into() }
    }

    /// Creates an invalid expression error.
    #[inline]
    pub fn invalid_expression(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidExpression {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Creates an action failure error.
    #[inline]
    pub fn action_failure(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ActionFailure {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Creates an unsupported action error.
    #[inline]
    pub fn unsupported_action(action: impl Into<String>) -> Self {
        Self::UnsupportedAction {
            action: action.into(),
        }
    }

    /// Creates a repeat overflow error.
    #[inline]
    pub fn repeat_overflow(limit: u32) -> Self {
        Self::RepeatOverflow { limit }
    }

    /// Creates a stale element error.
    #[inline]
    pub fn stale_element(handle: impl Into<String>) -> Self {
        Self::StaleElement {
            handle: handle.into(),
        }
    }

    /// Creates a driver fatal error.
    #[inline]
    pub fn driver_fatal(message: impl Into<String>) -> Self {
        Self::DriverFatal {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::SelectorTimeout { .. })
    }

    /// Returns `true` if this error aborts the current page traversal.
    ///
    /// Everything else is contained at the action, field, or node scope.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DriverFatal { .. })
    }

    /// Returns `true` if this is an expression error.
    #[inline]
    #[must_use]
    pub fn is_expression_error(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedVariable { .. } | Self::InvalidExpression { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::selector_timeout("div.missing", 500);
        assert_eq!(err.to_string(), "Selector timeout after 500ms: div.missing");
    }

    #[test]
    fn test_config_error() {
        let err = Error::config("range step must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: range step must be positive"
        );
    }

    #[test]
    fn test_unresolved_variable_display() {
        let err = Error::unresolved_variable("section_name");
        assert_eq!(err.to_string(), "Unresolved variable: section_name");
    }

    #[test]
    fn test_is_timeout() {
        let timeout_err = Error::selector_timeout("a", 1000);
        let other_err = Error::config("test");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
    }

    #[test]
    fn test_is_fatal() {
        let fatal_err = Error::driver_fatal("session closed");
        let action_err = Error::action_failure("click", "element detached");
        let overflow_err = Error::repeat_overflow(1000);

        assert!(fatal_err.is_fatal());
        assert!(!action_err.is_fatal());
        assert!(!overflow_err.is_fatal());
    }

    #[test]
    fn test_is_expression_error() {
        assert!(Error::unresolved_variable("x").is_expression_error());
        assert!(Error::invalid_expression("$attr{", "unterminated").is_expression_error());
        assert!(!Error::config("x").is_expression_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
