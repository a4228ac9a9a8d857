//! Plan execution: runs steps in order, resolving each step's input against the
//! ledger, gating confirmed tools on approval, invoking the tool, and recording
//! every attempt.
//!
//! - `invoker::ToolInvoker` abstracts how a tool is executed
//! - `busy::wait_until_idle` holds off while the invoker reports an in-flight call
//! - `condition` decides `when` clauses
//! - Every step attempt appends exactly one ledger entry; nothing is edited

use std::sync::Arc;

use stepweave_types::PlanRunEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::approval::{ApprovalHandler, AutoReject};
use crate::config::ExecutorConfig;

pub mod busy;
pub mod condition;
mod execute_plan;
pub mod invoker;
pub mod types;

pub use busy::wait_until_idle;
pub use condition::{evaluate_condition, is_truthy};
pub use invoker::{EchoInvoker, FixtureInvoker, ToolInvoker, error_result_message};
pub use types::{PlanRunReport, StepOutcome, StepStatusSummary};

/// Runs plans against a [`ToolInvoker`].
///
/// Approval requests go to the configured [`ApprovalHandler`], which defaults
/// to [`AutoReject`] so confirmed tools never run unattended.
#[derive(Clone)]
pub struct PlanExecutor {
    invoker: Arc<dyn ToolInvoker>,
    approvals: Arc<dyn ApprovalHandler>,
    config: ExecutorConfig,
    cancel: CancellationToken,
    events: Option<mpsc::UnboundedSender<PlanRunEvent>>,
}

impl PlanExecutor {
    pub fn new(invoker: Arc<dyn ToolInvoker>) -> Self {
        Self {
            invoker,
            approvals: Arc::new(AutoReject),
            config: ExecutorConfig::default(),
            cancel: CancellationToken::new(),
            events: None,
        }
    }

    pub fn with_approval_handler(mut self, approvals: Arc<dyn ApprovalHandler>) -> Self {
        self.approvals = approvals;
        self
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    /// Uses `cancel` as the run's cancellation signal.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Streams [`PlanRunEvent`]s to `events` while running.
    pub fn with_event_sender(mut self, events: mpsc::UnboundedSender<PlanRunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Token that cancels runs of this executor.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn emit(&self, event: PlanRunEvent) {
        if let Some(events) = &self.events {
            // Observers may stop listening at any time.
            let _ = events.send(event);
        }
    }
}
