//! Action execution against resolved elements.
//!
//! Actions run strictly in configuration order. For one action the
//! sequence is: resolve the screenshot path, sleep `delay`, perform the
//! interaction `count` times, capture the screenshot, sleep `wait`.
//! The path is resolved up front because the interaction itself may
//! detach the element the path expressions read from.
//!
//! A failed action is reported as [`Error::ActionFailure`]; the caller
//! decides whether the node continues with the next action or aborts.

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::driver::{ElementHandle, PageDriver, SwipeDirection};
use crate::error::{Error, Result};
use crate::expr::{self, transform, EvalContext};
use crate::spec::{ActionKind, ActionSpec, Count};

// ============================================================================
// Execution
// ============================================================================

/// Runs a node's actions against one element, in order.
///
/// Non-fatal failures are logged and skipped unless `abort_on_failure`
/// is set, in which case the first failure is returned and the caller
/// drops the rest of the node's work for this element.
pub(crate) async fn run_all(
    driver: &dyn PageDriver,
    actions: &[ActionSpec],
    element: &ElementHandle,
    ctx: &EvalContext<'_>,
    abort_on_failure: bool,
) -> Result<()> {
    for action in actions {
        match run_one(driver, action, element, ctx).await {
            Ok(()) => {}
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) if abort_on_failure => return Err(err),
            Err(err) => {
                warn!(action = action.kind.name(), %element, error = %err, "Action failed, continuing");
            }
        }
    }
    Ok(())
}

/// Runs a single action to completion.
async fn run_one(
    driver: &dyn PageDriver,
    action: &ActionSpec,
    element: &ElementHandle,
    ctx: &EvalContext<'_>,
) -> Result<()> {
    // The interaction may detach the element, so anything read from it
    // is resolved first.
    let screenshot = match &action.screenshot {
        Some(raw) => Some(resolve_path(raw, ctx).await?),
        None => None,
    };
    let count = resolve_count(&action.count, ctx).await?;

    if action.delay > 0 {
        sleep(Duration::from_millis(action.delay)).await;
    }

    debug!(action = action.kind.name(), %element, count, "Running action");
    for _ in 0..count {
        interact(driver, action, element)
            .await
            .map_err(|err| contain(err, &action.kind))?;
    }

    if let Some(path) = screenshot {
        driver
            .screenshot(Path::new(&path))
            .await
            .map_err(|err| contain(err, &action.kind))?;
    }

    if action.wait > 0 {
        sleep(Duration::from_millis(action.wait)).await;
    }

    Ok(())
}

/// Performs the raw interaction once.
async fn interact(
    driver: &dyn PageDriver,
    action: &ActionSpec,
    element: &ElementHandle,
) -> Result<()> {
    match &action.kind {
        ActionKind::SwipeLeft => driver.swipe(element, SwipeDirection::Left).await,
        ActionKind::SwipeRight => driver.swipe(element, SwipeDirection::Right).await,
        ActionKind::Click if action.dispatch => driver.dispatch_event(element, "click").await,
        ActionKind::Click => driver.click(element, &action.options).await,
        ActionKind::Event(name) if action.dispatch => driver.dispatch_event(element, name).await,
        ActionKind::Event(name) => Err(Error::unsupported_action(name.clone())),
    }
}

/// Wraps a non-fatal driver error with the action's context.
fn contain(err: Error, kind: &ActionKind) -> Error {
    if err.is_fatal() {
        err
    } else {
        Error::action_failure(kind.name(), err.to_string())
    }
}

/// Resolves a screenshot path, which may embed expressions.
async fn resolve_path(raw: &str, ctx: &EvalContext<'_>) -> Result<String> {
    let value = expr::resolve_str(raw, ctx).await?;
    Ok(transform::display(&value))
}

/// Resolves an interaction count to a concrete number.
async fn resolve_count(count: &Count, ctx: &EvalContext<'_>) -> Result<u32> {
    match count {
        Count::Literal(n) => Ok(*n),
        Count::Expression(raw) => {
            let value = expr::resolve_str(raw, ctx).await?;
            let number = transform::as_number(&value)
                .ok_or_else(|| Error::invalid_expression(raw, "count did not resolve to a number"))?;
            if number < 0.0 {
                return Err(Error::invalid_expression(raw, "count must not be negative"));
            }
            Ok(number as u32)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
