//! Human-in-the-loop approval of tool calls.
//!
//! An [`ApprovalGate`] is shared between the executor, which waits on it, and
//! whatever surface decides (a prompt, a UI, an automatic policy). The first
//! resolution wins; every later `approve`/`reject`/`cancel` is a no-op that
//! returns `false`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use stepweave_types::ApprovalDecision;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The tool call awaiting a decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub step_id: String,
    pub step_index: usize,
    pub tool_name: String,
    /// Arguments after normalization, exactly as they would be sent.
    pub args: Value,
}

#[derive(Debug)]
struct GateState {
    decision: Option<ApprovalDecision>,
    sender: Option<oneshot::Sender<ApprovalDecision>>,
}

#[derive(Debug)]
struct GateInner {
    request: ApprovalRequest,
    state: Mutex<GateState>,
}

/// Cloneable handle to one pending approval.
#[derive(Debug, Clone)]
pub struct ApprovalGate {
    inner: Arc<GateInner>,
}

impl ApprovalGate {
    /// Opens a pending gate for `request`, returning the resolving handle and
    /// the waiter the executor suspends on.
    pub fn open(request: ApprovalRequest) -> (Self, ApprovalWaiter) {
        let (sender, receiver) = oneshot::channel();
        let gate = Self {
            inner: Arc::new(GateInner {
                request,
                state: Mutex::new(GateState {
                    decision: None,
                    sender: Some(sender),
                }),
            }),
        };
        let waiter = ApprovalWaiter {
            gate: gate.clone(),
            receiver,
        };
        (gate, waiter)
    }

    pub fn request(&self) -> &ApprovalRequest {
        &self.inner.request
    }

    pub fn approve(&self) -> bool {
        self.resolve(ApprovalDecision::Approved)
    }

    pub fn reject(&self) -> bool {
        self.resolve(ApprovalDecision::Rejected)
    }

    pub fn cancel(&self) -> bool {
        self.resolve(ApprovalDecision::Cancelled)
    }

    pub fn time_out(&self) -> bool {
        self.resolve(ApprovalDecision::TimedOut)
    }

    /// Moves the gate out of `Pending`. Returns `false` when it was already resolved.
    pub fn resolve(&self, decision: ApprovalDecision) -> bool {
        let mut state = self.inner.state.lock().expect("approval gate lock poisoned");
        if let Some(existing) = state.decision {
            debug!(step_id = %self.inner.request.step_id, ?existing, ignored = ?decision, "approval gate already resolved");
            return false;
        }
        state.decision = Some(decision);
        if let Some(sender) = state.sender.take() {
            // The waiter may already be gone after a cancelled run.
            let _ = sender.send(decision);
        }
        true
    }

    /// Terminal decision, or `None` while pending.
    pub fn decision(&self) -> Option<ApprovalDecision> {
        self.inner.state.lock().expect("approval gate lock poisoned").decision
    }

    pub fn is_pending(&self) -> bool {
        self.decision().is_none()
    }
}

/// The executor's side of a gate.
#[derive(Debug)]
pub struct ApprovalWaiter {
    gate: ApprovalGate,
    receiver: oneshot::Receiver<ApprovalDecision>,
}

impl ApprovalWaiter {
    /// Suspends until the gate resolves, the run is cancelled, or `timeout` elapses.
    ///
    /// Cancellation and timeout resolve the gate themselves, so the returned
    /// decision always matches [`ApprovalGate::decision`] even when a decision
    /// raced with them.
    pub async fn wait(self, timeout: Option<Duration>, cancel: &CancellationToken) -> ApprovalDecision {
        let Self { gate, receiver } = self;
        let deadline = async {
            match timeout {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };

        let fallback = tokio::select! {
            biased;
            received = receiver => received.unwrap_or(ApprovalDecision::Cancelled),
            _ = cancel.cancelled() => {
                gate.cancel();
                ApprovalDecision::Cancelled
            }
            _ = deadline => {
                warn!(step_id = %gate.request().step_id, tool = %gate.request().tool_name, "approval timed out");
                gate.time_out();
                ApprovalDecision::TimedOut
            }
        };
        gate.decision().unwrap_or(fallback)
    }
}

/// Receives approval requests; the host-facing side of the gate.
///
/// Implementations must not block: resolve the gate immediately or hand it to
/// something that resolves it later.
pub trait ApprovalHandler: Send + Sync {
    fn on_approval_requested(&self, gate: ApprovalGate);
}

/// Approves every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl ApprovalHandler for AutoApprove {
    fn on_approval_requested(&self, gate: ApprovalGate) {
        gate.approve();
    }
}

/// Rejects every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoReject;

impl ApprovalHandler for AutoReject {
    fn on_approval_requested(&self, gate: ApprovalGate) {
        gate.reject();
    }
}

/// Forwards gates to a UI loop over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelApprovalHandler {
    sender: mpsc::UnboundedSender<ApprovalGate>,
}

impl ChannelApprovalHandler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ApprovalGate>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ApprovalHandler for ChannelApprovalHandler {
    fn on_approval_requested(&self, gate: ApprovalGate) {
        if let Err(error) = self.sender.send(gate) {
            warn!(step_id = %error.0.request().step_id, "approval receiver dropped; rejecting");
            error.0.reject();
        }
    }
}
