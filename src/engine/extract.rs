//! Link and data extraction against one element.
//!
//! Extraction is failure-tolerant at field granularity: an expression
//! that fails to resolve leaves its field null and the rest of the
//! record intact. Only fatal driver errors escape.
//!
//! Metadata maps are evaluated once per element. The evaluated map is
//! kept in the output record and handed back to the caller, which
//! merges it into the scope seen by descendant nodes.

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::Result;
use crate::expr::{self, transform, EvalContext};
use crate::output::LinkRecord;
use crate::spec::{DataSpec, DataValue, LinkSpec};

// ============================================================================
// Extracted Records
// ============================================================================

/// A resolved link spec: registry key plus the record to store.
#[derive(Debug, Clone)]
pub(crate) struct ExtractedLink {
    /// Registry name the record files under.
    pub name: String,
    /// Captured URL and metadata.
    pub record: LinkRecord,
}

/// A resolved data spec: result key, rendered value, and the metadata
/// to merge into scope.
#[derive(Debug, Clone)]
pub(crate) struct ExtractedData {
    /// Key in the owning node's result map.
    pub name: String,
    /// Rendered value, metadata already folded in.
    pub value: Value,
    /// Evaluated metadata for scope propagation.
    pub metadata: Map<String, Value>,
}

// ============================================================================
// Field Resolution
// ============================================================================

/// Resolves one expression field, containing expression failures.
///
/// An unresolved variable or malformed expression leaves the field null;
/// fatal driver errors propagate.
pub(crate) async fn resolve_field(raw: &str, ctx: &EvalContext<'_>) -> Result<Value> {
    match expr::resolve_str(raw, ctx).await {
        Ok(value) => Ok(value),
        Err(err) if err.is_fatal() => Err(err),
        Err(err) => {
            warn!(field = raw, error = %err, "Field resolution failed, yielding null");
            Ok(Value::Null)
        }
    }
}

/// Evaluates a metadata map's expression values.
///
/// String values resolve as expressions; anything else passes through
/// verbatim.
pub(crate) async fn eval_metadata(
    metadata: &Map<String, Value>,
    ctx: &EvalContext<'_>,
) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for (key, value) in metadata {
        let resolved = match value {
            Value::String(raw) => resolve_field(raw, ctx).await?,
            other => other.clone(),
        };
        out.insert(key.clone(), resolved);
    }
    Ok(out)
}

// ============================================================================
// Link Extraction
// ============================================================================

/// Resolves a link spec against the current element.
///
/// Returns `None` (with a warning) when the URL expression resolves to
/// nothing; a link without a URL is not worth recording.
pub(crate) async fn extract_link(
    spec: &LinkSpec,
    ctx: &EvalContext<'_>,
) -> Result<Option<ExtractedLink>> {
    let name = transform::display(&resolve_field(&spec.name, ctx).await?);
    if name.is_empty() {
        warn!(name = %spec.name, "Link name resolved empty, skipping");
        return Ok(None);
    }

    let url = transform::display(&resolve_field(&spec.value, ctx).await?);
    if url.is_empty() {
        warn!(%name, "Link value resolved empty, skipping");
        return Ok(None);
    }

    let metadata = eval_metadata(&spec.metadata, ctx).await?;
    Ok(Some(ExtractedLink {
        name,
        record: LinkRecord { url, metadata },
    }))
}

// ============================================================================
// Data Extraction
// ============================================================================

/// Resolves a data spec against the current element.
///
/// A scalar spec without metadata renders as the bare value; with
/// metadata it wraps into `{value, metadata}`. A record spec renders its
/// fields in order, with a `metadata` key appended when non-empty.
pub(crate) async fn extract_data(
    spec: &DataSpec,
    ctx: &EvalContext<'_>,
) -> Result<Option<ExtractedData>> {
    let name = transform::display(&resolve_field(&spec.name, ctx).await?);
    if name.is_empty() {
        warn!(name = %spec.name, "Data name resolved empty, skipping");
        return Ok(None);
    }

    let metadata = eval_metadata(&spec.metadata, ctx).await?;
    let value = match &spec.value {
        DataValue::Scalar(raw) => {
            let scalar = resolve_field(raw, ctx).await?;
            if metadata.is_empty() {
                scalar
            } else {
                let mut wrapped = Map::new();
                wrapped.insert("value".to_string(), scalar);
                wrapped.insert("metadata".to_string(), Value::Object(metadata.clone()));
                Value::Object(wrapped)
            }
        }
        DataValue::Record(fields) => {
            let mut record = Map::new();
            for (key, field) in fields {
                let resolved = match field {
                    Value::String(raw) => resolve_field(raw, ctx).await?,
                    other => other.clone(),
                };
                record.insert(key.clone(), resolved);
            }
            if !metadata.is_empty() {
                record.insert("metadata".to_string(), Value::Object(metadata.clone()));
            }
            Value::Object(record)
        }
    };

    Ok(Some(ExtractedData {
        name,
        value,
        metadata,
    }))
}

// ============================================================================
// Tests
// ============================================================================
