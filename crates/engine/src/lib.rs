//! # Stepweave Engine
//!
//! Runs multi-step tool plans. Each step's arguments may reference earlier
//! step outputs through `{{step<N>.path}}` placeholders; the engine resolves
//! them against an append-only ledger, optionally waits for a human to approve
//! the call, invokes the tool, and records the outcome.
//!
//! ## Key Features
//!
//! - **Execution Ledger**: append-only step records with skip-aware lookup
//! - **Placeholder Resolution**: native-value passthrough, string rendering,
//!   alias and fallback heuristics for loosely shaped tool output
//! - **Input Normalization**: JSON repair for textual input, key/index context on failures
//! - **Approval Gates**: idempotent, cancellable, optionally timed out
//! - **Plan Execution**: `when` conditions, retries, halt/continue policy, run events
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use stepweave_engine::{FixtureInvoker, PlanExecutor, parse_plan_str};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build()?.block_on(async {
//! let plan = parse_plan_str(r#"
//! steps:
//!   - tool: search
//!     args: { query: "rust" }
//!   - tool: fetch
//!     args: { url: "{{step1.results[0].link}}" }
//! "#)?;
//!
//! let invoker = FixtureInvoker::from_json(&json!({
//!     "search": {"results": [{"link": "https://www.rust-lang.org"}]},
//!     "fetch": {"status": 200}
//! }))?;
//! let report = PlanExecutor::new(Arc::new(invoker)).run(&plan).await?;
//! assert_eq!(report.ledger.entries()[1].tool_args, json!({"url": "https://www.rust-lang.org"}));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`ledger`**: `ExecutionLedger` and step lookup
//! - **`path`**: dotted/indexed JSON navigation
//! - **`placeholder`**: placeholder syntax, resolution and rendering
//! - **`normalize`**: step input normalization
//! - **`approval`**: approval gates and handlers
//! - **`executor`**: the plan executor and tool invoker seam
//! - **`plan`** / **`templates`**: plan loading, step identity, preflight checks
//! - **`config`**: executor configuration

pub mod approval;
pub mod config;
pub mod error;
pub mod executor;
pub mod field_paths;
pub mod ledger;
pub mod normalize;
pub mod path;
pub mod placeholder;
pub mod plan;
pub mod templates;

pub use approval::{ApprovalGate, ApprovalHandler, ApprovalRequest, ApprovalWaiter, AutoApprove, AutoReject, ChannelApprovalHandler};
pub use config::{ConfigError, ExecutorConfig, FailurePolicy, default_config_path, load_config, load_config_from_path};
pub use error::{ContextSegment, LedgerLookupError, NormalizationError, ResolutionError, ToolError};
pub use executor::{EchoInvoker, FixtureInvoker, PlanExecutor, PlanRunReport, StepOutcome, ToolInvoker};
pub use ledger::ExecutionLedger;
pub use normalize::{StepInputNormalizer, normalize_step_input};
pub use placeholder::{PlaceholderExpr, PlaceholderResolver, Resolved, ResultSource};
pub use plan::{PlanError, PlannedStep, parse_plan_file, parse_plan_str, resolve_step_identities};
pub use templates::{ForwardReference, PlaceholderRef, ReferenceProblem, collect_placeholder_references, find_forward_references};
