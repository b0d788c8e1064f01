//! Repeat control around a page's node walk.
//!
//! `times` is a static bound; `while` re-evaluates a live page
//! condition before each iteration and is capped by a configured
//! maximum so an unbounded loop always terminates. Iterations run
//! strictly one after another.

// ============================================================================
// Imports
// ============================================================================

use futures_util::future::BoxFuture;
use tracing::debug;

use crate::driver::PageDriver;
use crate::error::{Error, Result};
use crate::spec::{RepeatSpec, WhileSpec};

// ============================================================================
// RepeatController
// ============================================================================

/// Drives the iteration loop for one page entry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RepeatController {
    /// Safety cap for `while` loops.
    cap: u32,
}

impl RepeatController {
    /// Creates a controller with the configured iteration cap.
    pub(crate) fn new(cap: u32) -> Self {
        Self { cap }
    }

    /// Runs `iteration` according to `spec`.
    ///
    /// No spec means exactly one iteration. Each call receives the
    /// 0-based iteration index; results the iteration produced are the
    /// caller's to keep, so a late [`Error::RepeatOverflow`] loses
    /// nothing already collected.
    ///
    /// Returns the number of completed iterations.
    pub(crate) async fn run<'a, F>(
        &self,
        spec: Option<&RepeatSpec>,
        driver: &dyn PageDriver,
        mut iteration: F,
    ) -> Result<u32>
    where
        F: FnMut(u32) -> BoxFuture<'a, Result<()>>,
    {
        match spec {
            None => {
                iteration(0).await?;
                Ok(1)
            }
            Some(RepeatSpec {
                times: Some(times), ..
            }) => {
                for index in 0..*times {
                    iteration(index).await?;
                }
                Ok(*times)
            }
            Some(RepeatSpec {
                condition: Some(condition),
                ..
            }) => {
                let mut index = 0;
                while holds(condition, driver).await? {
                    if index >= self.cap {
                        return Err(Error::repeat_overflow(self.cap));
                    }
                    iteration(index).await?;
                    index += 1;
                }
                debug!(iterations = index, "While repeat finished");
                Ok(index)
            }
            // Rejected by validation; treat as a single iteration.
            Some(_) => {
                iteration(0).await?;
                Ok(1)
            }
        }
    }
}

/// Evaluates a `while` condition against the live page.
async fn holds(condition: &WhileSpec, driver: &dyn PageDriver) -> Result<bool> {
    if let Some(expected) = condition.exists
        && driver.exists(&condition.selector).await? == expected
    {
        return Ok(true);
    }

    if let Some(expected) = condition.disabled {
        // The disabled check needs the first match's handle.
        let matches = driver.find(&condition.selector, None).await?;
        if let Some(first) = matches.first()
            && driver.is_disabled(first).await? == expected
        {
            return Ok(true);
        }
    }

    Ok(false)
}

// ============================================================================
// Tests
// ============================================================================
