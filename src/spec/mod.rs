//! Declarative scrawl spec data model.
//!
//! A [`ScrawlSpec`] is the immutable tree a user writes (in YAML or
//! JSON) to describe a multi-page extraction task: pages wrap nodes,
//! nodes wrap selectors, actions, extraction specs, and child nodes,
//! recursively. The [`crate::engine`] walks this tree; nothing here
//! touches a driver.
//!
//! The `nodes`-within-`nodes` shape is strictly a tree (a node owns its
//! children), so no cycle handling is needed, only recursion.

// ============================================================================
// Modules
// ============================================================================

mod load;

pub use load::{from_json, from_yaml, load_file};

// ============================================================================
// Imports
// ============================================================================

use serde::de::{Deserializer, Error as DeError};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// ScrawlSpec
// ============================================================================

/// Root document: an ordered sequence of pages under the `scrawl` key.
#[derive(Debug, Clone, Deserialize)]
pub struct ScrawlSpec {
    /// Pages, executed in order.
    #[serde(rename = "scrawl", default)]
    pub pages: Vec<PageSpec>,
}

impl ScrawlSpec {
    /// Validates the whole tree.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid field.
    pub fn validate(&self) -> Result<()> {
        for page in &self.pages {
            page.validate()?;
        }
        Ok(())
    }
}

// ============================================================================
// PageSpec
// ============================================================================

/// One page entry: where to navigate and what to do there.
#[derive(Debug, Clone, Deserialize)]
pub struct PageSpec {
    /// Identifier in the result tree; defaults to `page-{index}`.
    #[serde(default)]
    pub name: Option<String>,

    /// One or more navigation targets.
    pub link: LinkSource,

    /// Optional loop around the page's node walk.
    #[serde(default)]
    pub repeat: Option<RepeatSpec>,

    /// Nodes, executed in order.
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

impl PageSpec {
    /// Result-tree key for this page.
    #[must_use]
    pub fn identifier(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("page-{index}"))
    }

    fn validate(&self) -> Result<()> {
        if let Some(repeat) = &self.repeat {
            repeat.validate()?;
        }
        for node in &self.nodes {
            node.validate()?;
        }
        Ok(())
    }
}

// ============================================================================
// Link Targets
// ============================================================================

/// The `link` field: a single target or a list of targets.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LinkSource {
    /// Single target.
    One(LinkTarget),
    /// Ordered list of targets.
    Many(Vec<LinkTarget>),
}

impl LinkSource {
    /// Iterates the targets in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &LinkTarget> {
        match self {
            Self::One(target) => std::slice::from_ref(target).iter(),
            Self::Many(targets) => targets.iter(),
        }
    }
}

/// One navigation target.
///
/// A plain string starting with `$` references the links captured so
/// far under that name (each captured link navigates once, carrying its
/// metadata into scope).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LinkTarget {
    /// Literal URL, or a `$name` link-registry reference.
    Url(String),
    /// Parametric descriptor with metadata injected into page scope.
    Descriptor {
        /// URL to navigate to.
        url: String,
        /// Variables bound for the page walk and kept in output.
        #[serde(default)]
        metadata: Map<String, Value>,
    },
}

// ============================================================================
// RepeatSpec
// ============================================================================

/// Loop specification wrapping a page's node walk.
///
/// Exactly one of `times` and `while` must be set.
#[derive(Debug, Clone, Deserialize)]
pub struct RepeatSpec {
    /// Static iteration count.
    #[serde(default)]
    pub times: Option<u32>,

    /// Live condition re-evaluated before each iteration.
    #[serde(rename = "while", default)]
    pub condition: Option<WhileSpec>,
}

impl RepeatSpec {
    /// Checks the `times`/`while` exclusivity rule.
    pub fn validate(&self) -> Result<()> {
        match (&self.times, &self.condition) {
            (Some(_), Some(_)) => Err(Error::config(
                "repeat.times and repeat.while are mutually exclusive",
            )),
            (None, None) => Err(Error::config(
                "repeat requires either times or while",
            )),
            _ => {
                if let Some(condition) = &self.condition {
                    condition.validate()?;
                }
                Ok(())
            }
        }
    }
}

/// Condition for a `while` repeat.
#[derive(Debug, Clone, Deserialize)]
pub struct WhileSpec {
    /// Selector the condition inspects.
    pub selector: String,

    /// Continue while the selector's existence equals this flag.
    #[serde(default)]
    pub exists: Option<bool>,

    /// Continue while the first match's disabled state equals this flag.
    #[serde(default)]
    pub disabled: Option<bool>,
}

impl WhileSpec {
    fn validate(&self) -> Result<()> {
        if self.exists.is_none() && self.disabled.is_none() {
            return Err(Error::config(
                "repeat.while requires exists or disabled",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// NodeSpec
// ============================================================================

/// A unit of selector + interactions + extraction + children.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSpec {
    /// Identifier in the result tree; defaults to the selector with
    /// `:` replaced by `-`.
    #[serde(default)]
    pub name: Option<String>,

    /// Selector resolved under the current root.
    pub selector: String,

    /// Interact with every match instead of only the first.
    #[serde(default)]
    pub all: bool,

    /// Slice over the filtered match sequence; applies when `all` is
    /// true.
    #[serde(default)]
    pub range: Option<RangeSpec>,

    /// Keep only elements whose text contains this substring.
    #[serde(default)]
    pub contains: Option<String>,

    /// Drop elements whose text contains this substring.
    #[serde(default)]
    pub excludes: Option<String>,

    /// Scroll each element into view before interacting.
    #[serde(default)]
    pub show: bool,

    /// Milliseconds to wait for the selector to match.
    #[serde(default)]
    pub wait: Option<u64>,

    /// Actions executed per element, in order.
    #[serde(default)]
    pub actions: Vec<ActionSpec>,

    /// Link extraction specs.
    #[serde(default)]
    pub links: Vec<LinkSpec>,

    /// Data extraction specs.
    #[serde(default)]
    pub data: Vec<DataSpec>,

    /// Child nodes walked with each element as the new root.
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
}

impl NodeSpec {
    /// Result-tree key for this node.
    #[must_use]
    pub fn identifier(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.selector.replace(':', "-"))
    }

    fn validate(&self) -> Result<()> {
        if self.selector.trim().is_empty() {
            return Err(Error::config("node selector must not be empty"));
        }
        if let Some(range) = &self.range {
            range.validate()?;
        }
        for action in &self.actions {
            action.validate()?;
        }
        for child in &self.nodes {
            child.validate()?;
        }
        Ok(())
    }
}

// ============================================================================
// RangeSpec
// ============================================================================

/// Half-open stepped slice `[start, stop, step]` over a match sequence.
///
/// Deserializes from a sequence of up to three entries, each an integer
/// or the placeholder `"_"` (keep the default). `stop = -1` means
/// "through the last element".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    /// First index kept (0-based).
    pub start: i64,
    /// First index dropped; `-1` means the end of the sequence.
    pub stop: i64,
    /// Step between kept indices.
    pub step: i64,
}

impl Default for RangeSpec {
    fn default() -> Self {
        Self {
            start: 0,
            stop: -1,
            step: 1,
        }
    }
}

impl RangeSpec {
    /// Checks bounds: `start >= 0`, `stop >= -1`, `step >= 1`.
    pub fn validate(&self) -> Result<()> {
        if self.start < 0 {
            return Err(Error::config("range start must not be negative"));
        }
        if self.stop < -1 {
            return Err(Error::config("range stop must be -1 or a valid index"));
        }
        if self.step < 1 {
            return Err(Error::config("range step must be at least 1"));
        }
        Ok(())
    }

    /// Slices `items` per the start/stop/step convention.
    ///
    /// Never narrows below what the caller asked for: `[0, -1, 1]` is
    /// the identity.
    #[must_use]
    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let len = items.len() as i64;
        let stop = if self.stop < 0 { len } else { self.stop.min(len) };
        let step = self.step.max(1) as usize;

        items
            .into_iter()
            .enumerate()
            .filter(|(i, _)| {
                let i = *i as i64;
                i >= self.start && i < stop && (i - self.start) % step as i64 == 0
            })
            .map(|(_, item)| item)
            .collect()
    }
}

impl<'de> Deserialize<'de> for RangeSpec {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Entry {
            Index(i64),
            Placeholder(String),
        }

        fn pick<E: DeError>(entry: Option<&Entry>, default: i64) -> std::result::Result<i64, E> {
            match entry {
                None => Ok(default),
                Some(Entry::Index(i)) => Ok(*i),
                Some(Entry::Placeholder(s)) if s == "_" => Ok(default),
                Some(Entry::Placeholder(s)) => {
                    Err(E::custom(format!("invalid range entry '{s}', expected an integer or \"_\"")))
                }
            }
        }

        let entries: Vec<Entry> = Vec::deserialize(deserializer)?;
        if entries.len() > 3 {
            return Err(D::Error::custom("range takes at most three entries"));
        }

        Ok(Self {
            start: pick(entries.first(), 0)?,
            stop: pick(entries.get(1), -1)?,
            step: pick(entries.get(2), 1)?,
        })
    }
}

// ============================================================================
// ActionSpec
// ============================================================================

/// Kind of interaction an action performs.
///
/// Any other string is a synthetic event name, valid only together with
/// `dispatch: true`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Native click.
    Click,
    /// Pointer swipe toward the left edge.
    SwipeLeft,
    /// Pointer swipe toward the right edge.
    SwipeRight,
    /// Synthetic event name for `dispatch: true`.
    #[serde(untagged)]
    Event(String),
}

impl ActionKind {
    /// Name used for logging and error context.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Click => "click",
            Self::SwipeLeft => "swipe_left",
            Self::SwipeRight => "swipe_right",
            Self::Event(name) => name,
        }
    }
}

/// Literal or expression-valued interaction count.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Count {
    /// Fixed count.
    Literal(u32),
    /// Expression resolving to an integer at execution time.
    Expression(String),
}

impl Default for Count {
    fn default() -> Self {
        Self::Literal(1)
    }
}

/// One interaction performed against a resolved element.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionSpec {
    /// Interaction kind.
    #[serde(rename = "type")]
    pub kind: ActionKind,

    /// Milliseconds to sleep before the interaction.
    #[serde(default)]
    pub delay: u64,

    /// Milliseconds to sleep after the interaction.
    #[serde(default)]
    pub wait: u64,

    /// How many times to repeat the interaction.
    #[serde(default)]
    pub count: Count,

    /// Options passed verbatim to the driver.
    #[serde(default)]
    pub options: Map<String, Value>,

    /// Screenshot path captured after the interaction; may contain
    /// expressions.
    #[serde(default)]
    pub screenshot: Option<String>,

    /// Fire as a synthetic event instead of a native interaction.
    #[serde(default)]
    pub dispatch: bool,
}

impl ActionSpec {
    fn validate(&self) -> Result<()> {
        if let ActionKind::Event(name) = &self.kind
            && !self.dispatch
        {
            return Err(Error::config(format!(
                "action type '{name}' requires dispatch: true"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Extraction Specs
// ============================================================================

/// Link extraction: captures a URL per element under `name`.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkSpec {
    /// Registry and record key; may itself be an expression.
    pub name: String,

    /// URL expression.
    pub value: String,

    /// Expressions evaluated once per element, merged into scope for
    /// descendants and kept in the output record.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Scalar or structured value of a data spec.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    /// Single expression.
    Scalar(String),
    /// Field-name → expression record.
    Record(Map<String, Value>),
}

/// Data extraction: produces a record per element under `name`.
#[derive(Debug, Clone, Deserialize)]
pub struct DataSpec {
    /// Record key in the owning node's result; may be an expression.
    pub name: String,

    /// What to extract.
    pub value: DataValue,

    /// Expressions evaluated once per element, merged into scope for
    /// descendants and kept in the output record.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

// ============================================================================
// Tests
// ============================================================================
