use super::Locator;
use crate::log::CONTEXT;
use serde_json::Value;
use std::mem;
use tracing::{debug, error};
use uuid::Uuid;

/// The plaintext a parameter held before it was encrypted.
#[derive(Debug, Clone, PartialEq)]
pub struct RestorationRecord {
    pub locator: Locator,
    pub original: Value,
}

///
/// Restoration state for one logical operation.
///
/// Created at prepare time and consumed by [`restore`](super::restore).
/// A context dropped while it still holds records means plaintext was never written back, which is logged as an
/// error.
///
#[derive(Debug)]
pub struct OperationContext {
    id: Uuid,
    records: Vec<RestorationRecord>,
}

impl OperationContext {
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        debug!(target: CONTEXT, msg = "Operation started", %id);

        OperationContext {
            id,
            records: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn records(&self) -> &[RestorationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn record(&mut self, locator: Locator, original: Value) {
        self.records.push(RestorationRecord { locator, original });
    }

    pub(crate) fn take_records(&mut self) -> Vec<RestorationRecord> {
        mem::take(&mut self.records)
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for OperationContext {
    fn drop(&mut self) {
        if !self.records.is_empty() {
            error!(
                target: CONTEXT,
                msg = "Operation context dropped without restoring parameters",
                id = %self.id,
                unrestored = self.records.len()
            );
        }
    }
}
