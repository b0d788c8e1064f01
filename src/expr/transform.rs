//! Pure string transforms applied by the `| name` pipe suffix.
//!
//! Transforms run left to right after a placeholder resolves, before the
//! value is substituted back into the owning string.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Transform
// ============================================================================

/// One parsed pipe transform.
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Prepends a literal prefix.
    Prepend(String),
    /// Lowercases the value.
    Lowercase,
    /// Slugifies the value (lowercase, ASCII, `-` separated).
    Slug,
    /// Subtracts a constant from a numeric value.
    Subtract(f64),
    /// Drops the query string and fragment from a URL.
    ClearUrlParams,
    /// Trims surrounding whitespace.
    Trim,
}

impl Transform {
    /// Parses a transform from its pipe-segment tokens.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown transform name or a
    /// malformed argument.
    pub fn parse(name: &str, args: &[&str]) -> Result<Self> {
        match name {
            "prepend" => Ok(Self::Prepend(
                args.first().map(|s| (*s).to_string()).unwrap_or_default(),
            )),
            "lowercase" => Ok(Self::Lowercase),
            "slug" => Ok(Self::Slug),
            "subtract" => {
                let operand = args
                    .first()
                    .and_then(|s| s.parse::<f64>().ok())
                    .ok_or_else(|| Error::config("subtract requires a numeric argument"))?;
                Ok(Self::Subtract(operand))
            }
            "clear_url_params" => Ok(Self::ClearUrlParams),
            "trim" => Ok(Self::Trim),
            other => Err(Error::config(format!("unknown transform '{other}'"))),
        }
    }

    /// Applies the transform to a resolved value.
    #[must_use]
    pub fn apply(&self, value: Value) -> Value {
        match self {
            Self::Prepend(prefix) => Value::String(format!("{prefix}{}", display(&value))),
            Self::Lowercase => Value::String(display(&value).to_lowercase()),
            Self::Slug => Value::String(slugify(&display(&value))),
            Self::Subtract(operand) => {
                let minuend = as_number(&value).unwrap_or(0.0);
                number(minuend - operand)
            }
            Self::ClearUrlParams => Value::String(clear_url_params(&display(&value))),
            Self::Trim => Value::String(display(&value).trim().to_string()),
        }
    }
}

/// Applies a transform pipeline left to right.
#[must_use]
pub fn apply_all(transforms: &[Transform], value: Value) -> Value {
    transforms
        .iter()
        .fold(value, |value, transform| transform.apply(value))
}

// ============================================================================
// Helpers
// ============================================================================

/// Renders a value the way it substitutes into a string.
///
/// Null renders empty, scalars render bare, and structured values fall
/// back to their JSON text.
#[must_use]
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Best-effort numeric reading of a value (numbers and numeric strings).
pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

fn clear_url_params(input: &str) -> String {
    // Relative URLs fail to parse; fall back to a plain split for those.
    match Url::parse(input) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.into()
        }
        Err(_) => input
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_parse_known_transforms() {
        assert_eq!(
            Transform::parse("prepend", &["https://ex.com"]).unwrap(),
            Transform::Prepend("https://ex.com".to_string())
        );
        assert_eq!(Transform::parse("trim", &[]).unwrap(), Transform::Trim);
        assert_eq!(
            Transform::parse("subtract", &["2"]).unwrap(),
            Transform::Subtract(2.0)
        );
    }

    #[test]
    fn test_parse_unknown_transform_fails() {
        let err = Transform::parse("reverse", &[]).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_parse_subtract_requires_number() {
        assert!(Transform::parse("subtract", &[]).is_err());
        assert!(Transform::parse("subtract", &["abc"]).is_err());
    }

    #[test]
    fn test_prepend_handles_null() {
        let value = Transform::Prepend("https://ex.com".to_string()).apply(Value::Null);
        assert_eq!(value, json!("https://ex.com"));
    }

    #[test]
    fn test_slug() {
        let value = Transform::Slug.apply(json!("  Hello,  World! "));
        assert_eq!(value, json!("hello-world"));
    }

    #[test]
    fn test_subtract_from_numeric_string() {
        let value = Transform::Subtract(1.0).apply(json!("10"));
        assert_eq!(value, json!(9));
    }

    #[test]
    fn test_subtract_from_non_numeric_is_zero_based() {
        let value = Transform::Subtract(2.0).apply(json!("n/a"));
        assert_eq!(value, json!(-2));
    }

    #[test]
    fn test_clear_url_params_absolute() {
        let value = Transform::ClearUrlParams.apply(json!("https://ex.com/a?page=2#top"));
        assert_eq!(value, json!("https://ex.com/a"));
    }

    #[test]
    fn test_clear_url_params_relative() {
        let value = Transform::ClearUrlParams.apply(json!("/a/b?page=2"));
        assert_eq!(value, json!("/a/b"));
    }

    #[test]
    fn test_pipeline_order() {
        let transforms = vec![Transform::Trim, Transform::Lowercase];
        let value = apply_all(&transforms, json!("  MiXeD  "));
        assert_eq!(value, json!("mixed"));
    }
}
