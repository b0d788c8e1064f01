//! Embedded expression language.
//!
//! String-valued configuration fields may embed placeholders that are
//! resolved against the current element and the active variable scope:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `$attr{name}` | attribute of the current element (`text` is its text content) |
//! | `$attr{name@selector}` | same, from the first `selector` match under the current element |
//! | `$attr{name@<page>selector}` | same, from a fresh page-level lookup |
//! | `$attr{count@...}` | number of elements the lookup matched |
//! | `$var{name}` | lookup in the active [`Scope`] |
//!
//! A pipe suffix applies [`Transform`]s to the resolved value, left to
//! right: `$attr{href | clear_url_params | prepend https://ex.com}`.
//!
//! Strings parse into a small AST of literal and placeholder segments
//! rather than being substituted by regex. Braces do not nest: the first
//! `}` after an opener closes it, and an opener with no closing brace is
//! literal text. A string with no recognized placeholder resolves to
//! itself unchanged.
//!
//! Resolution is side-effect-free except for `@` lookups, which perform
//! read-only driver queries.

// ============================================================================
// Modules
// ============================================================================

pub mod transform;

pub use transform::Transform;

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::debug;

use crate::driver::{ElementHandle, PageDriver};
use crate::error::{Error, Result};
use crate::scope::Scope;

// ============================================================================
// AST
// ============================================================================

/// Where an `@` lookup searches for its selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupContext {
    /// Under the current element.
    Element,
    /// Against the whole page (`<page>` prefix).
    Page,
}

/// An `@` lookup attached to an attribute placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    /// Selector to resolve.
    pub selector: String,
    /// Search root.
    pub context: LookupContext,
}

/// Parsed `$attr{...}` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrExpr {
    /// Attribute name, or the pseudo-attributes `text` / `count`.
    pub name: String,
    /// Optional fresh lookup replacing the current element.
    pub lookup: Option<Lookup>,
    /// Transform pipeline.
    pub transforms: Vec<Transform>,
}

/// Parsed `$var{...}` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct VarExpr {
    /// Variable name.
    pub name: String,
    /// Transform pipeline.
    pub transforms: Vec<Transform>,
}

/// One segment of a parsed expression string.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Attr(AttrExpr),
    Var(VarExpr),
}

/// A parsed expression string: literal segments plus typed placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    segments: Vec<Segment>,
}

// ============================================================================
// Parser
// ============================================================================

const ATTR_OPENER: &str = "$attr{";
const VAR_OPENER: &str = "$var{";

impl Expression {
    /// Parses a raw configuration string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidExpression`] for an empty placeholder
    /// body and [`Error::Config`] for an unknown transform.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = raw;

        while let Some((index, opener, is_attr)) = next_opener(rest) {
            let after = &rest[index + opener.len()..];

            let Some(close) = after.find('}') else {
                // Unterminated opener stays literal.
                literal.push_str(rest);
                rest = "";
                break;
            };

            literal.push_str(&rest[..index]);
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }

            let body = &after[..close];
            segments.push(if is_attr {
                Segment::Attr(parse_attr(raw, body)?)
            } else {
                Segment::Var(parse_var(raw, body)?)
            });

            rest = &after[close + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Returns `true` if the string contained no placeholders.
    #[must_use]
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, Segment::Literal(_)))
    }
}

/// Finds the earliest placeholder opener in `input`.
fn next_opener(input: &str) -> Option<(usize, &'static str, bool)> {
    let attr = input.find(ATTR_OPENER).map(|i| (i, ATTR_OPENER, true));
    let var = input.find(VAR_OPENER).map(|i| (i, VAR_OPENER, false));

    match (attr, var) {
        (Some(a), Some(v)) => Some(if a.0 <= v.0 { a } else { v }),
        (a, v) => a.or(v),
    }
}

/// Splits a placeholder body into its core and transform pipeline.
fn split_pipes<'a>(raw: &str, body: &'a str) -> Result<(&'a str, Vec<Transform>)> {
    let mut parts = body.split('|');
    let core = parts.next().unwrap_or_default().trim();

    let transforms = parts
        .map(|part| {
            let mut tokens = part.split_whitespace();
            let name = tokens
                .next()
                .ok_or_else(|| Error::invalid_expression(raw, "empty transform segment"))?;
            Transform::parse(name, &tokens.collect::<Vec<_>>())
        })
        .collect::<Result<Vec<_>>>()?;

    Ok((core, transforms))
}

fn parse_attr(raw: &str, body: &str) -> Result<AttrExpr> {
    let (core, transforms) = split_pipes(raw, body)?;

    let (name, lookup) = match core.split_once('@') {
        Some((name, selector)) => {
            let (context, selector) = match selector.trim().strip_prefix("<page>") {
                Some(stripped) => (LookupContext::Page, stripped.trim()),
                None => (LookupContext::Element, selector.trim()),
            };
            if selector.is_empty() {
                return Err(Error::invalid_expression(raw, "empty lookup selector"));
            }
            (
                name.trim(),
                Some(Lookup {
                    selector: selector.to_string(),
                    context,
                }),
            )
        }
        None => (core, None),
    };

    if name.is_empty() {
        return Err(Error::invalid_expression(raw, "attribute name missing"));
    }

    Ok(AttrExpr {
        name: name.to_string(),
        lookup,
        transforms,
    })
}

fn parse_var(raw: &str, body: &str) -> Result<VarExpr> {
    let (core, transforms) = split_pipes(raw, body)?;

    if core.is_empty() {
        return Err(Error::invalid_expression(raw, "variable name missing"));
    }

    Ok(VarExpr {
        name: core.to_string(),
        transforms,
    })
}

// ============================================================================
// Evaluation
// ============================================================================

/// Everything a placeholder may consult while resolving.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    /// Driver for `@` lookups and attribute reads.
    pub driver: &'a dyn PageDriver,
    /// Active variable scope.
    pub scope: &'a Scope,
    /// Element the expression is anchored to, if any.
    pub current: Option<&'a ElementHandle>,
}

impl Expression {
    /// Resolves the expression against an element and scope.
    ///
    /// A string that is exactly one placeholder keeps the resolved
    /// value's type; mixed strings concatenate segment renderings left
    /// to right.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedVariable`] for a `$var` with no
    /// binding, and propagates driver errors from `@` lookups.
    pub async fn resolve(&self, ctx: &EvalContext<'_>) -> Result<Value> {
        if let [segment] = self.segments.as_slice() {
            return eval_segment(segment, ctx).await;
        }

        let mut out = String::new();
        for segment in &self.segments {
            let value = eval_segment(segment, ctx).await?;
            out.push_str(&transform::display(&value));
        }
        Ok(Value::String(out))
    }
}

/// Parses and resolves `raw` in one step.
pub async fn resolve_str(raw: &str, ctx: &EvalContext<'_>) -> Result<Value> {
    Expression::parse(raw)?.resolve(ctx).await
}

async fn eval_segment(segment: &Segment, ctx: &EvalContext<'_>) -> Result<Value> {
    match segment {
        Segment::Literal(text) => Ok(Value::String(text.clone())),
        Segment::Attr(attr) => eval_attr(attr, ctx).await,
        Segment::Var(var) => eval_var(var, ctx),
    }
}

async fn eval_attr(attr: &AttrExpr, ctx: &EvalContext<'_>) -> Result<Value> {
    let targets: Vec<ElementHandle> = match &attr.lookup {
        Some(lookup) => {
            let root = match lookup.context {
                LookupContext::Element => ctx.current,
                LookupContext::Page => None,
            };
            ctx.driver.find(&lookup.selector, root).await?
        }
        None => ctx.current.copied().into_iter().collect(),
    };

    if attr.name == "count" {
        let count = Value::from(targets.len() as u64);
        return Ok(transform::apply_all(&attr.transforms, count));
    }

    let Some(target) = targets.first() else {
        debug!(attr = %attr.name, "Attribute lookup matched nothing");
        return Ok(Value::Null);
    };

    let value = if attr.name == "text" {
        Value::String(ctx.driver.text(target).await?)
    } else {
        match ctx.driver.attr(target, &attr.name).await? {
            Some(value) => Value::String(value),
            None => Value::Null,
        }
    };

    Ok(transform::apply_all(&attr.transforms, value))
}

fn eval_var(var: &VarExpr, ctx: &EvalContext<'_>) -> Result<Value> {
    let value = ctx
        .scope
        .get(&var.name)
        .cloned()
        .ok_or_else(|| Error::unresolved_variable(&var.name))?;

    Ok(transform::apply_all(&var.transforms, value))
}

// ============================================================================
// Tests
// ============================================================================
