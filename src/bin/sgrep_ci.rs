// sgrep-ci - runs the repository's CI workflow steps locally, in order

use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tracing::info;

use sgrep_lint::models::workflow::{Event, Workflow};
use sgrep_lint::services::pipeline_runner::{JobReport, PipelineRunner, StepOutcome};
use sgrep_lint::utils::logger::init_cli_logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum EventKind {
    #[value(name = "pull_request")]
    PullRequest,
    Push,
}

#[derive(Debug, Parser)]
#[command(name = "sgrep-ci")]
#[command(about = "Run a CI workflow's jobs step by step, stopping at the first failure")]
#[command(version)]
struct Args {
    /// Workflow file to run
    #[arg(default_value = ".github/workflows/tests.yml")]
    workflow: PathBuf,

    /// Event that triggers the run
    #[arg(long, value_enum, default_value = "push")]
    event: EventKind,

    /// Branch being pushed (required for push events)
    #[arg(long, env = "GITHUB_REF_NAME")]
    branch: Option<String>,

    /// Only run this job
    #[arg(long)]
    job: Option<String>,

    /// Directory steps run in
    #[arg(long, default_value = ".")]
    workdir: PathBuf,

    /// List the steps without running them
    #[arg(long)]
    dry_run: bool,

    /// Print job reports as JSON
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn event(&self) -> anyhow::Result<Event> {
        Ok(match self.event {
            EventKind::PullRequest => Event::PullRequest,
            EventKind::Push => Event::Push {
                branch: self
                    .branch
                    .clone()
                    .context("--branch is required for push events")?,
            },
        })
    }
}

fn print_report(report: &JobReport) {
    println!("job {}", report.job);
    for step in &report.steps {
        let status = match &step.outcome {
            StepOutcome::Passed => "ok".to_string(),
            StepOutcome::Failed { exit_code } => format!("FAILED (exit {exit_code})"),
            StepOutcome::Skipped { reason } => format!("skipped: {reason}"),
            StepOutcome::NotRun => "not run".to_string(),
            StepOutcome::Planned { command } => format!("would run: {command}"),
        };
        println!("  {} ... {}", step.name, status);
    }
}

async fn run(args: Args) -> anyhow::Result<bool> {
    let workflow = Workflow::load(&args.workflow)
        .with_context(|| format!("loading {}", args.workflow.display()))?;
    workflow.validate()?;

    let event = args.event()?;
    if !workflow.on.matches(&event) {
        info!("workflow is not triggered by {event}; nothing to do");
        return Ok(true);
    }

    let runner = PipelineRunner::new(args.workdir.clone())
        .with_env(workflow.env.clone())
        .dry_run(args.dry_run);
    let reports = runner.run_workflow(&workflow, args.job.as_deref()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        reports.iter().for_each(print_report);
    }

    if let Some(failure) = reports.iter().find_map(JobReport::first_failure) {
        if !args.json {
            eprintln!("error: {failure}");
        }
        return Ok(false);
    }
    if reports.is_empty() {
        bail!("no jobs ran");
    }
    Ok(true)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_cli_logger(args.verbose, false);

    match run(args).await {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            process::exit(2);
        }
    }
}
