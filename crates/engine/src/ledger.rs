//! Append-only record of step outcomes for one plan run.
//!
//! The executor is the only writer. Placeholder resolution reads through
//! [`ExecutionLedger::find_by_step`], which never mutates, so lookups are safe
//! to repeat at any point of a run.

use serde::{Deserialize, Serialize};
use stepweave_types::{ExecutionResult, canonical_step_id};

use crate::error::LedgerLookupError;

/// Ordered, append-only collection of [`ExecutionResult`] records.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ExecutionLedger {
    entries: Vec<ExecutionResult>,
}

impl ExecutionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record. Existing records are never touched.
    pub fn append(&mut self, result: ExecutionResult) {
        self.entries.push(result);
    }

    /// Records in arrival order.
    pub fn entries(&self) -> &[ExecutionResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the ledger, returning its records.
    pub fn into_entries(self) -> Vec<ExecutionResult> {
        self.entries
    }

    /// Finds the record that stands for step `step` (1-based).
    ///
    /// Candidates are records whose id is `step<step>` or whose index is
    /// `step - 1`. The last successful candidate wins, otherwise the last
    /// candidate of any outcome. When that record is a skip, the most recent
    /// successful record with a lower index stands in for it, repeating while
    /// the stand-in is itself a skip.
    pub fn find_by_step(&self, step: usize) -> Result<&ExecutionResult, LedgerLookupError> {
        let step_id = canonical_step_id(step);
        let candidates: Vec<&ExecutionResult> = self
            .entries
            .iter()
            .filter(|entry| entry.step_id == step_id || (step >= 1 && entry.step_index == step - 1))
            .collect();

        let chosen = candidates
            .iter()
            .rev()
            .find(|entry| entry.is_success())
            .or_else(|| candidates.last())
            .copied()
            .ok_or(LedgerLookupError::NoEntry { step })?;

        if !chosen.is_skipped() {
            return Ok(chosen);
        }
        self.fallback_before(chosen.step_index)
            .ok_or(LedgerLookupError::SkippedWithoutFallback {
                step,
                skipped_index: chosen.step_index,
            })
    }

    fn fallback_before(&self, skipped_index: usize) -> Option<&ExecutionResult> {
        let mut boundary = skipped_index;
        loop {
            let candidate = self
                .entries
                .iter()
                .rev()
                .find(|entry| entry.step_index < boundary && entry.is_success())?;
            if !candidate.is_skipped() {
                return Some(candidate);
            }
            boundary = candidate.step_index;
        }
    }
}

impl From<Vec<ExecutionResult>> for ExecutionLedger {
    fn from(entries: Vec<ExecutionResult>) -> Self {
        Self { entries }
    }
}
