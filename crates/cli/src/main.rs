use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use serde_json::Value;
use stepweave_engine::{
    ApprovalGate, ApprovalHandler, AutoApprove, ChannelApprovalHandler, EchoInvoker, ExecutorConfig, FailurePolicy, FixtureInvoker, PlanExecutor,
    ToolInvoker, collect_placeholder_references, find_forward_references, load_config, load_config_from_path, parse_plan_file,
};
use stepweave_types::RunStatus;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("run", sub)) => run_plan_cmd(sub).await,
        Some(("validate", sub)) => validate_plan_cmd(sub),
        _ => bail!("expected a subcommand; see --help"),
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    let plan_arg = Arg::new("plan")
        .help("Plan file (YAML or JSON)")
        .required(true)
        .value_parser(value_parser!(PathBuf));

    Command::new("stepweave")
        .about("Run and check multi-step tool plans")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Execute a plan against fixture tool results")
                .arg(plan_arg.clone())
                .arg(
                    Arg::new("fixtures")
                        .long("fixtures")
                        .short('f')
                        .help("JSON object of tool name -> result; tools echo their arguments when omitted")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .help("Executor config file (defaults to $STEPWEAVE_CONFIG_PATH or the user config dir)")
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("auto-approve")
                        .long("auto-approve")
                        .help("Approve every confirmation request without prompting")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("continue-on-error")
                        .long("continue-on-error")
                        .help("Keep running after a step fails")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("max-retries")
                        .long("max-retries")
                        .help("Extra attempts after a failed tool call")
                        .value_parser(value_parser!(u32)),
                )
                .arg(
                    Arg::new("events")
                        .long("events")
                        .help("Print run events as JSON lines on stderr")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Check a plan's step ids and placeholder references")
                .arg(plan_arg),
        )
}

async fn run_plan_cmd(matches: &ArgMatches) -> Result<()> {
    let plan_path = matches.get_one::<PathBuf>("plan").context("missing plan path")?;
    let plan = parse_plan_file(plan_path)?;
    let config = executor_config(matches)?;
    let invoker = tool_invoker(matches.get_one::<PathBuf>("fixtures").map(PathBuf::as_path))?;

    let cancel = CancellationToken::new();
    spawn_ctrl_c_listener(cancel.clone());

    let approvals: Arc<dyn ApprovalHandler> = if matches.get_flag("auto-approve") {
        Arc::new(AutoApprove)
    } else {
        let (handler, gates) = ChannelApprovalHandler::new();
        tokio::spawn(prompt_for_approvals(gates));
        Arc::new(handler)
    };

    let mut executor = PlanExecutor::new(invoker)
        .with_config(config)
        .with_approval_handler(approvals)
        .with_cancellation(cancel);
    if matches.get_flag("events") {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        executor = executor.with_event_sender(events_tx);
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                if let Ok(line) = serde_json::to_string(&event) {
                    eprintln!("{line}");
                }
            }
        });
    }

    let report = executor.run(&plan).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    match report.status {
        RunStatus::Succeeded => Ok(()),
        status => bail!("plan finished with status {status:?}"),
    }
}

fn executor_config(matches: &ArgMatches) -> Result<ExecutorConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => load_config_from_path(path)?,
        None => load_config()?,
    };
    if matches.get_flag("continue-on-error") {
        config.failure_policy = FailurePolicy::Continue;
    }
    if let Some(max_retries) = matches.get_one::<u32>("max-retries") {
        config.max_retries = *max_retries;
    }
    config.validate()?;
    Ok(config)
}

fn tool_invoker(fixtures_path: Option<&Path>) -> Result<Arc<dyn ToolInvoker>> {
    let Some(path) = fixtures_path else {
        info!("no fixtures given; tools echo their arguments");
        return Ok(Arc::new(EchoInvoker));
    };
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read fixtures file: {}", path.display()))?;
    let document: Value = serde_json::from_str(&content).with_context(|| format!("Failed to parse fixtures file: {}", path.display()))?;
    Ok(Arc::new(FixtureInvoker::from_json(&document)?))
}

fn spawn_ctrl_c_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received; cancelling run");
            cancel.cancel();
        }
    });
}

/// Asks on the terminal for each approval request. Stdin closing rejects.
async fn prompt_for_approvals(mut gates: mpsc::UnboundedReceiver<ApprovalGate>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stderr = tokio::io::stderr();

    while let Some(gate) = gates.recv().await {
        let request = gate.request();
        let args = serde_json::to_string_pretty(&request.args).unwrap_or_else(|_| request.args.to_string());
        let prompt = format!("\n{} wants to call '{}' with:\n{}\nApprove? [y/N] ", request.step_id, request.tool_name, args);
        if stderr.write_all(prompt.as_bytes()).await.is_err() || stderr.flush().await.is_err() {
            gate.reject();
            continue;
        }

        match lines.next_line().await {
            Ok(Some(answer)) if is_affirmative(&answer) => {
                gate.approve();
            }
            _ => {
                gate.reject();
            }
        }
    }
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn validate_plan_cmd(matches: &ArgMatches) -> Result<()> {
    let plan_path = matches.get_one::<PathBuf>("plan").context("missing plan path")?;
    let plan = parse_plan_file(plan_path)?;
    let references = collect_placeholder_references(&plan)?;
    let problems = find_forward_references(&plan)?;

    for problem in &problems {
        println!(
            "{}: {} refers to step{} ({:?})",
            problem.reference.source_path, problem.reference.placeholder, problem.reference.referenced_step, problem.problem
        );
    }
    if !problems.is_empty() {
        bail!("{} placeholder reference(s) cannot be satisfied", problems.len());
    }

    println!("{}: {} steps, {} placeholder references", plan_path.display(), plan.steps.len(), references.len());
    Ok(())
}
