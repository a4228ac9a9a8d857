//! The step loop.

use chrono::Utc;
use serde_json::Value;
use stepweave_types::{ApprovalDecision, ExecutionResult, PlanDefinition, PlanRunEvent, RunStatus, StepStatus};
use stepweave_util::redact_json_value;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::approval::{ApprovalGate, ApprovalRequest};
use crate::config::FailurePolicy;
use crate::ledger::ExecutionLedger;
use crate::normalize::StepInputNormalizer;
use crate::placeholder::PlaceholderResolver;
use crate::plan::{PlanError, PlannedStep, resolve_step_identities};
use crate::templates::find_forward_references;

use super::types::summarize_step_statuses;
use super::{PlanExecutor, PlanRunReport, StepOutcome, error_result_message, evaluate_condition, wait_until_idle};

/// A finished step plus whether cancellation cut it short.
struct StepExecution {
    outcome: StepOutcome,
    interrupted: bool,
}

impl PlanExecutor {
    /// Executes `plan` from the first step.
    ///
    /// Only a structurally invalid plan is an error. Step failures, skips and
    /// cancellation are reported through the returned [`PlanRunReport`].
    pub async fn run(&self, plan: &PlanDefinition) -> Result<PlanRunReport, PlanError> {
        let planned = resolve_step_identities(plan)?;
        let plan_name = plan.plan.as_deref().unwrap_or("unnamed");

        for problem in find_forward_references(plan)? {
            warn!(
                step_id = %problem.reference.step_id,
                placeholder = %problem.reference.placeholder,
                source_path = %problem.reference.source_path,
                problem = ?problem.problem,
                "placeholder references a step that has not run yet"
            );
        }

        info!(plan = plan_name, step_count = planned.len(), "plan execution started");
        self.emit(PlanRunEvent::RunStarted {
            plan: plan.plan.clone(),
            step_count: planned.len(),
            at: Utc::now(),
        });

        let mut ledger = ExecutionLedger::new();
        let mut outcomes = Vec::with_capacity(planned.len());
        let mut stopped_with = None;

        for planned_step in &planned {
            if self.cancel.is_cancelled() {
                stopped_with = Some(RunStatus::Cancelled);
                break;
            }

            let execution = self.execute_step(planned_step, &mut ledger).await;
            match execution.outcome.status {
                StepStatus::Succeeded => debug!(step_id = %planned_step.step_id, attempts = execution.outcome.attempts, "step execution succeeded"),
                StepStatus::Failed => warn!(step_id = %planned_step.step_id, attempts = execution.outcome.attempts, "step execution failed"),
                StepStatus::Skipped => info!(step_id = %planned_step.step_id, attempts = execution.outcome.attempts, "step execution skipped"),
            }

            let failed = execution.outcome.status == StepStatus::Failed;
            outcomes.push(execution.outcome);
            if execution.interrupted {
                stopped_with = Some(RunStatus::Cancelled);
                break;
            }
            if failed && self.config.failure_policy == FailurePolicy::Halt {
                stopped_with = Some(RunStatus::Halted);
                break;
            }
        }

        let summary = summarize_step_statuses(&outcomes);
        let status = stopped_with.unwrap_or(if summary.failed > 0 { RunStatus::Failed } else { RunStatus::Succeeded });

        info!(
            plan = plan_name,
            status = ?status,
            recorded = ledger.len(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "plan execution finished"
        );
        self.emit(PlanRunEvent::RunCompleted {
            status,
            finished_at: Utc::now(),
        });

        Ok(PlanRunReport { status, ledger, outcomes })
    }

    async fn execute_step(&self, planned: &PlannedStep<'_>, ledger: &mut ExecutionLedger) -> StepExecution {
        let started = Instant::now();
        let step = planned.step;
        debug!(step_id = %planned.step_id, tool = %step.tool, "step execution started");

        if let Some(condition) = &step.when {
            let skip_reason = match evaluate_condition(condition, &PlaceholderResolver::new(ledger)) {
                Ok(true) => None,
                Ok(false) => Some(format!("condition '{condition}' is false")),
                Err(error) => Some(format!("condition '{condition}' could not be resolved: {error}")),
            };
            if let Some(reason) = skip_reason {
                info!(step_id = %planned.step_id, tool = %step.tool, "step execution skipped by condition");
                ledger.append(ExecutionResult::skipped(
                    &planned.step_id,
                    planned.step_index,
                    &step.tool,
                    step.args.clone(),
                    &reason,
                ));
                return self.finish(planned, started, StepStatus::Skipped, 0, Some(reason), false);
            }
        }

        let args = match StepInputNormalizer::new(ledger).normalize(&step.args, &step.tool) {
            Ok(args) => args,
            Err(error) => {
                warn!(step_id = %planned.step_id, context_path = %error.context_path_display(), %error, "step execution failed due to unresolved placeholders");
                let reason = error.to_string();
                ledger.append(ExecutionResult::failed(
                    &planned.step_id,
                    planned.step_index,
                    &step.tool,
                    step.args.clone(),
                    None,
                    &reason,
                ));
                return self.finish(planned, started, StepStatus::Failed, 0, Some(reason), false);
            }
        };

        if step.requires_confirmation || self.config.tool_requires_confirmation(&step.tool) {
            let decision = self.await_approval(planned, &args).await;
            if !decision.is_approved() {
                let reason = approval_skip_reason(decision).to_string();
                info!(step_id = %planned.step_id, tool = %step.tool, ?decision, "step execution skipped by approval decision");
                ledger.append(ExecutionResult::skipped(&planned.step_id, planned.step_index, &step.tool, args, &reason));
                let interrupted = decision == ApprovalDecision::Cancelled;
                return self.finish(planned, started, StepStatus::Skipped, 0, Some(reason), interrupted);
            }
        }

        wait_until_idle(
            self.invoker.as_ref(),
            self.config.busy_poll_interval(),
            self.config.busy_wait_budget(),
            &self.cancel,
        )
        .await;

        self.invoke_with_retries(planned, args, ledger, started).await
    }

    async fn invoke_with_retries(&self, planned: &PlannedStep<'_>, args: Value, ledger: &mut ExecutionLedger, started: Instant) -> StepExecution {
        let tool = planned.step.tool.as_str();
        let max_attempts = self.config.max_attempts();
        let mut attempt = 0u32;
        let mut last_failure: Option<String> = None;

        loop {
            if self.cancel.is_cancelled() {
                return match last_failure {
                    Some(failure) => self.finish(planned, started, StepStatus::Failed, attempt, Some(failure), true),
                    None => {
                        let reason = "run cancelled before invocation".to_string();
                        ledger.append(ExecutionResult::skipped(&planned.step_id, planned.step_index, tool, args, &reason));
                        self.finish(planned, started, StepStatus::Skipped, 0, Some(reason), true)
                    }
                };
            }

            attempt += 1;
            self.emit(PlanRunEvent::StepStarted {
                step_id: planned.step_id.clone(),
                step_index: planned.step_index,
                tool_name: tool.to_string(),
                attempt,
                started_at: Utc::now(),
            });
            debug!(step_id = %planned.step_id, tool, attempt, args = %redact_json_value(&args), "invoking tool");

            let invocation = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                result = self.invoker.invoke(tool, &args) => Some(result),
            };
            let Some(invocation) = invocation else {
                info!(step_id = %planned.step_id, tool, attempt, "tool invocation abandoned after cancellation");
                let reason = Some("run cancelled during invocation".to_string());
                return self.finish(planned, started, StepStatus::Skipped, attempt, reason, true);
            };

            let failure = match invocation {
                Ok(result) => match error_result_message(&result) {
                    None => {
                        ledger.append(ExecutionResult::succeeded(&planned.step_id, planned.step_index, tool, args, result));
                        return self.finish(planned, started, StepStatus::Succeeded, attempt, None, false);
                    }
                    Some(message) => {
                        let reason = format!("tool '{tool}' returned an error result: {message}");
                        ledger.append(ExecutionResult::failed(
                            &planned.step_id,
                            planned.step_index,
                            tool,
                            args.clone(),
                            Some(result),
                            &reason,
                        ));
                        reason
                    }
                },
                Err(error) => {
                    let reason = error.to_string();
                    ledger.append(ExecutionResult::failed(&planned.step_id, planned.step_index, tool, args.clone(), None, &reason));
                    reason
                }
            };

            if attempt >= max_attempts {
                return self.finish(planned, started, StepStatus::Failed, attempt, Some(failure), false);
            }
            warn!(step_id = %planned.step_id, tool, attempt, max_attempts, error = %failure, "tool invocation failed; retrying");

            let delay = self.config.retry_delay();
            if !delay.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        info!(step_id = %planned.step_id, tool, attempt, "retry abandoned after cancellation");
                        return self.finish(planned, started, StepStatus::Failed, attempt, Some(failure), true);
                    }
                    _ = sleep(delay) => {}
                }
            }
            last_failure = Some(failure);
        }
    }

    async fn await_approval(&self, planned: &PlannedStep<'_>, args: &Value) -> ApprovalDecision {
        let request = ApprovalRequest {
            step_id: planned.step_id.clone(),
            step_index: planned.step_index,
            tool_name: planned.step.tool.clone(),
            args: args.clone(),
        };
        let (gate, waiter) = ApprovalGate::open(request);

        info!(step_id = %planned.step_id, tool = %planned.step.tool, "awaiting approval");
        self.emit(PlanRunEvent::ApprovalRequested {
            step_id: planned.step_id.clone(),
            tool_name: planned.step.tool.clone(),
            args: args.clone(),
        });
        self.approvals.on_approval_requested(gate);

        let decision = waiter.wait(self.config.approval_timeout(), &self.cancel).await;
        self.emit(PlanRunEvent::ApprovalResolved {
            step_id: planned.step_id.clone(),
            decision,
        });
        decision
    }

    fn finish(
        &self,
        planned: &PlannedStep<'_>,
        started: Instant,
        status: StepStatus,
        attempts: u32,
        reason: Option<String>,
        interrupted: bool,
    ) -> StepExecution {
        let duration_ms = started.elapsed().as_millis() as u64;
        self.emit(PlanRunEvent::StepFinished {
            step_id: planned.step_id.clone(),
            status,
            attempts,
            duration_ms,
            reason: reason.clone(),
        });
        StepExecution {
            outcome: StepOutcome {
                step_id: planned.step_id.clone(),
                step_index: planned.step_index,
                tool_name: planned.step.tool.clone(),
                status,
                attempts,
                duration_ms,
                reason,
            },
            interrupted,
        }
    }
}

fn approval_skip_reason(decision: ApprovalDecision) -> &'static str {
    match decision {
        ApprovalDecision::Approved => "approved",
        ApprovalDecision::Rejected => "rejected by user",
        ApprovalDecision::Cancelled => "approval cancelled",
        ApprovalDecision::TimedOut => "approval timed out",
    }
}
