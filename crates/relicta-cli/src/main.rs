//! `relicta` — drive release runs through governance from the shell.
//!
//! Exit codes: 0 on success, 1 on a domain error, 2 on usage errors
//! (clap's default), 130 when interrupted.

#![deny(unsafe_code)]

mod noop;
mod rpc;
mod service;

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use noop::{LoggingStepExecutor, StaticInspector, TemplateNoteGenerator};
use policy_dsl::{loader, LoaderOptions};
use relicta_core::{Actor, BumpKind, CancelToken, TrustLevel};
use release::{encode, ReleaseRun};
use service::{ReleaseService, ServiceError};

#[derive(Parser, Debug)]
#[command(name = "relicta", about = "Governed release pipeline", version)]
struct Cli {
    /// Repository root the run state lives under.
    #[arg(long, global = true, default_value = ".")]
    repo_root: PathBuf,

    /// Emit JSON on stdout instead of human-readable text.
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    /// Verbose diagnostics on stderr.
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scaffold the .relicta layout with a starter policy
    Init,
    /// Pin planning facts and open a release run
    Plan {
        /// Base ref the release range starts from.
        #[arg(long)]
        base_ref: Option<String>,
        /// Pin an explicit head SHA instead of inspecting the tree.
        #[arg(long)]
        head_sha: Option<String>,
        /// Pin an explicit comma-separated commit list.
        #[arg(long, value_delimiter = ',')]
        commits: Vec<String>,
    },
    /// Choose the next version for the planned run
    Bump {
        /// major | minor | patch | prerelease | none (default: suggested)
        #[arg(long)]
        kind: Option<String>,
    },
    /// Generate and attach release notes
    Notes,
    /// Evaluate governance and record an approval
    Approve {
        /// Approver identity (kind defaults to human).
        #[arg(long, default_value = "local")]
        approver: String,
        /// Why this release is fine.
        #[arg(long, default_value = "approved via cli")]
        justification: String,
    },
    /// Execute the publish plan for the approved run
    Publish,
    /// Show the latest run (or one by id)
    Status {
        /// A specific run id.
        #[arg(long)]
        run_id: Option<String>,
    },
    /// Return a failed or canceled run to the pipeline
    Retry,
    /// Cancel the active run
    Cancel {
        /// Why the run is being abandoned.
        #[arg(long, default_value = "canceled via cli")]
        reason: String,
    },
    /// Inspect policy files
    Policies {
        #[command(subcommand)]
        cmd: PoliciesCommand,
    },
    /// Dispatch one wire request ({"action": …, "inputs": …}) in-process
    Rpc {
        /// The request document.
        #[arg(long)]
        request: String,
    },
}

#[derive(Subcommand, Debug)]
enum PoliciesCommand {
    /// Parse every policy file, reporting per-file errors
    Check {
        /// Directory to check instead of the default search paths.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
    /// List loaded policies and their rules
    List,
}

const STARTER_POLICY: &str = r#"# Starter governance policy.
rule "breaking-changes" {
  priority = 100
  description = "breaking changes always get a second pair of eyes"
  when { change.breaking > 0 }
  then {
    require_approval(count: 1)
    add_rationale(message: "breaking changes require explicit approval")
  }
}

rule "hard-freeze" {
  priority = 1000
  when { time.freeze.isHard == true }
  then { block(reason: "Hard freeze in effect") }
}

defaults { decision = "approve" }
"#;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    telemetry::init_cli_logging(cli.verbose);

    let cancel = CancelToken::new();
    spawn_signal_watcher(cancel.clone());

    match run(&cli, &cancel) {
        Ok(()) => {
            if cancel.is_canceled() {
                ExitCode::from(130)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let code = e.exit_code() as u8;
            ExitCode::from(code)
        }
    }
}

fn spawn_signal_watcher(cancel: CancelToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupt: finishing the current operation (interrupt again to force quit)");
            cancel.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(1);
        }
    });
}

fn run(cli: &Cli, cancel: &CancelToken) -> Result<(), ServiceError> {
    match &cli.cmd {
        Command::Init => cmd_init(cli),
        Command::Policies { cmd } => cmd_policies(cli, cmd),
        Command::Plan { base_ref, head_sha, commits } => {
            let inspector = StaticInspector {
                head_sha: head_sha.clone(),
                commits: if commits.is_empty() { None } else { Some(commits.clone()) },
                ..StaticInspector::default()
            };
            let svc = open_service(cli, inspector)?;
            let run = svc.plan(&local_actor("local"), base_ref.as_deref(), cancel)?;
            print_run(cli, &run);
            Ok(())
        }
        Command::Bump { kind } => {
            let kind = kind.as_deref().and_then(BumpKind::parse);
            let svc = open_service(cli, StaticInspector::default())?;
            let run = svc.bump(&local_actor("local"), kind, cancel)?;
            print_run(cli, &run);
            Ok(())
        }
        Command::Notes => {
            let svc = open_service(cli, StaticInspector::default())?;
            let run = svc.notes(&local_actor("local"), cancel)?;
            print_run(cli, &run);
            Ok(())
        }
        Command::Approve { approver, justification } => {
            let svc = open_service(cli, StaticInspector::default())?;
            let (run, evaluation) = svc.approve(&local_actor(approver), justification, cancel)?;
            if cli.json {
                let body = serde_json::json!({
                    "run": encode(&run),
                    "decision": evaluation.decision,
                    "risk_score": evaluation.risk.score,
                });
                println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
            } else {
                println!(
                    "{} approved (risk {:.2}, decision {})",
                    run.id,
                    evaluation.risk.score,
                    evaluation.decision.kind.as_str()
                );
                for line in &evaluation.decision.rationale {
                    println!("  - {line}");
                }
            }
            Ok(())
        }
        Command::Publish => {
            let svc = open_service(cli, StaticInspector::default())?;
            let run = svc.publish(&local_actor("local"), cancel)?;
            print_run(cli, &run);
            Ok(())
        }
        Command::Status { run_id } => {
            let svc = open_service(cli, StaticInspector::default())?;
            let run = svc.status(run_id.as_deref(), cancel)?;
            print_run(cli, &run);
            Ok(())
        }
        Command::Retry => {
            let svc = open_service(cli, StaticInspector::default())?;
            let run = svc.retry(&local_actor("local"), cancel)?;
            print_run(cli, &run);
            Ok(())
        }
        Command::Cancel { reason } => {
            let svc = open_service(cli, StaticInspector::default())?;
            let run = svc.cancel_run(&local_actor("local"), reason, cancel)?;
            print_run(cli, &run);
            Ok(())
        }
        Command::Rpc { request } => {
            let request: rpc::RpcRequest = serde_json::from_str(request)
                .map_err(|e| ServiceError::Rejected(format!("malformed request: {e}")))?;
            let adapter = rpc::RpcAdapter::new(open_service(cli, StaticInspector::default())?);
            let response = adapter.handle(&request, cancel);
            println!("{}", serde_json::to_string_pretty(&response).unwrap_or_default());
            if response.errors.is_empty() {
                Ok(())
            } else {
                Err(ServiceError::Rejected(response.errors.join(", ")))
            }
        }
    }
}

fn open_service(cli: &Cli, inspector: StaticInspector) -> Result<ReleaseService, ServiceError> {
    ReleaseService::open(
        &cli.repo_root,
        Box::new(inspector),
        Box::new(TemplateNoteGenerator),
        Box::new(LoggingStepExecutor),
    )
}

fn local_actor(id: &str) -> Actor {
    Actor::human(id, id, TrustLevel::Basic)
}

fn cmd_init(cli: &Cli) -> Result<(), ServiceError> {
    let policies = cli.repo_root.join(".relicta/policies");
    fs::create_dir_all(&policies).map_err(store::StoreError::from)?;
    let starter = policies.join("default.policy");
    if !starter.exists() {
        fs::write(&starter, STARTER_POLICY).map_err(store::StoreError::from)?;
    }
    fs::create_dir_all(cli.repo_root.join(service::RUNS_DIR)).map_err(store::StoreError::from)?;
    fs::create_dir_all(cli.repo_root.join(service::MEMORY_DIR)).map_err(store::StoreError::from)?;
    if cli.json {
        println!("{}", serde_json::json!({"initialized": true, "policy": starter}));
    } else {
        println!("initialized .relicta layout with starter policy at {}", starter.display());
    }
    Ok(())
}

fn cmd_policies(cli: &Cli, cmd: &PoliciesCommand) -> Result<(), ServiceError> {
    let opts = LoaderOptions { ignore_errors: true, recursive: false };
    let result = match cmd {
        PoliciesCommand::Check { dir: Some(dir) } => loader::load_dir(dir, &opts)?,
        _ => loader::load_default(&cli.repo_root, &opts)?,
    };

    match cmd {
        PoliciesCommand::Check { .. } => {
            if cli.json {
                let body = serde_json::json!({
                    "loaded": result.policies.iter().map(|p| &p.name).collect::<Vec<_>>(),
                    "errors": result.errors.iter().map(|e| {
                        serde_json::json!({"file": e.file, "error": e.error})
                    }).collect::<Vec<_>>(),
                });
                println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
            } else {
                println!("{} policy file(s) loaded", result.policies.len());
                for error in &result.errors {
                    println!("  {}: {}", error.file.display(), error.error);
                }
            }
            if result.errors.is_empty() {
                Ok(())
            } else {
                Err(ServiceError::Rejected(format!("{} policy file(s) failed", result.errors.len())))
            }
        }
        PoliciesCommand::List => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&result.policies).unwrap_or_default());
            } else {
                for policy in &result.policies {
                    println!("policy {} ({} rules)", policy.name, policy.rules.len());
                    for rule in &policy.rules {
                        let flag = if rule.enabled { "" } else { " [disabled]" };
                        println!("  {:>5}  {}{}", rule.priority, rule.id, flag);
                    }
                }
            }
            Ok(())
        }
    }
}

fn print_run(cli: &Cli, run: &ReleaseRun) {
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&encode(run)).unwrap_or_default());
        return;
    }
    println!("{}  [{}]", run.id, run.state.as_str());
    if let Some(version) = &run.version_next {
        println!("  version: {version}");
    }
    if let Some(tag) = &run.tag_name {
        println!("  tag:     {tag}");
    }
    if run.risk_score > 0.0 {
        println!("  risk:    {:.2}", run.risk_score);
    }
    if let Some(error) = &run.last_error {
        println!("  error:   {error}");
    }
    for reason in &run.reasons {
        println!("  - {reason}");
    }
}
