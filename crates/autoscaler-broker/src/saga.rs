//! Compensation for multi-step broker operations.
//!
//! Each mutating step that succeeds registers an undo action. When a later
//! step fails, [`Saga::compensate`] runs the registered actions in reverse
//! registration order. Compensation is best-effort: an undo failure is
//! logged and the remaining undo actions still run.

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, error};

type UndoFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type UndoAction = Box<dyn FnOnce() -> UndoFuture + Send>;

pub struct Saga {
    operation: &'static str,
    steps: Vec<(&'static str, UndoAction)>,
}

impl Saga {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            steps: Vec::new(),
        }
    }

    /// Register the undo action for a step that has just succeeded.
    pub fn push<F, Fut>(&mut self, step: &'static str, undo: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.steps
            .push((step, Box::new(move || Box::pin(undo()) as UndoFuture)));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every undo action, newest first.
    pub async fn compensate(self) {
        let operation = self.operation;
        for (step, undo) in self.steps.into_iter().rev() {
            match undo().await {
                Ok(()) => debug!(operation, step, "compensated"),
                Err(e) => error!(operation, step, error = %e, "compensation failed"),
            }
        }
    }
}
