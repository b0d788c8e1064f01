//! Scrawl - Declarative multi-page web data extraction.
//!
//! This library interprets a declarative spec (YAML or JSON) describing
//! a multi-page extraction task and walks it against a pluggable page
//! driver, producing a structured JSON document plus a registry of
//! captured links.
//!
//! # Architecture
//!
//! The interpreter is a recursive tree walk:
//!
//! - A spec is a sequence of **pages**; each page names one or more
//!   navigation targets and a tree of **nodes**
//! - A node is a selector plus actions, link/data extraction, and child
//!   nodes walked with each matched element as the new root
//! - String fields embed `$attr{...}` / `$var{...}` expressions,
//!   resolved against the current element and a chained variable scope
//! - Links captured on one page can drive navigation of a later page
//!   via `link: $name`, carrying their metadata into that page's scope
//!
//! Failures are contained at the narrowest scope that can still make
//! progress: a bad expression nulls one field, a failed action yields
//! to the next, a missing selector empties one node, and only a fatal
//! driver error abandons a page.
//!
//! # Quick Start
//!
//! ```no_run
//! use scrawl::{PageDriver, ScrawlEngine};
//!
//! async fn extract(driver: impl PageDriver) -> anyhow::Result<()> {
//!     let spec = scrawl::spec::load_file("catalog.yaml")?;
//!     let engine = ScrawlEngine::new(driver);
//!
//!     let output = engine.run(&spec).await?;
//!     println!("{}", output.to_json()?);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`driver`] | [`PageDriver`] trait and the in-memory fake |
//! | [`engine`] | The interpreter: [`ScrawlEngine`], [`EngineOptions`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`expr`] | `$attr{}` / `$var{}` expression language |
//! | [`output`] | Result document and link registry types |
//! | [`scope`] | Chained variable scope |
//! | [`spec`] | Spec data model and YAML/JSON loading |

// ============================================================================
// Modules
// ============================================================================

/// Page driver abstraction.
///
/// The interpreter talks to the web exclusively through the
/// [`PageDriver`] trait; [`driver::fake`] ships a deterministic
/// in-memory implementation for tests.
pub mod driver;

/// The interpreter.
///
/// [`ScrawlEngine`] walks a validated [`ScrawlSpec`] against a driver.
pub mod engine;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Embedded expression language.
///
/// Parses and resolves the `$attr{...}` / `$var{...}` placeholders and
/// their `| transform` pipelines.
pub mod expr;

/// Result document types.
///
/// Ordered result tree, append-merge semantics, and the link registry.
pub mod output;

/// Chained variable scope for expression evaluation.
pub mod scope;

/// Declarative spec data model.
///
/// Deserialization, validation, and file loading for scrawl documents.
pub mod spec;

// ============================================================================
// Re-exports
// ============================================================================

// Driver types
pub use driver::{ElementHandle, PageDriver, SwipeDirection};

// Engine types
pub use engine::{EngineOptions, ScrawlEngine};

// Error types
pub use error::{Error, Result};

// Expression types
pub use expr::{EvalContext, Expression, Transform};

// Output types
pub use output::{LinkRecord, LinkStore, ScrawlOutput};

// Scope types
pub use scope::Scope;

// Spec types
pub use spec::{
    ActionKind, ActionSpec, Count, DataSpec, DataValue, LinkSource, LinkSpec, LinkTarget,
    NodeSpec, PageSpec, RangeSpec, RepeatSpec, ScrawlSpec, WhileSpec,
};
