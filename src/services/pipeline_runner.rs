use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::process::Command;
use tracing::{info, warn};

use crate::models::workflow::{Job, Step, Workflow};
use crate::utils::error::{LintError, Result};

/// Reported for steps that never produced an exit status
pub const NO_EXIT_CODE: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Passed,
    Failed { exit_code: i32 },
    Skipped { reason: String },
    /// An earlier step failed
    NotRun,
    /// Dry run: the command that would execute
    Planned { command: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: String,
    pub container: Option<String>,
    pub steps: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    pub fn succeeded(&self) -> bool {
        !self
            .steps
            .iter()
            .any(|step| matches!(step.outcome, StepOutcome::Failed { .. }))
    }

    pub fn first_failure(&self) -> Option<LintError> {
        self.steps.iter().find_map(|step| match step.outcome {
            StepOutcome::Failed { exit_code } => Some(LintError::ExecutionError {
                step: step.name.clone(),
                exit_code,
            }),
            _ => None,
        })
    }
}

/// Executes workflow jobs one step at a time, stopping at the first failure
#[derive(Debug, Clone)]
pub struct PipelineRunner {
    workdir: PathBuf,
    env: BTreeMap<String, String>,
    dry_run: bool,
}

impl PipelineRunner {
    pub fn new(workdir: PathBuf) -> Self {
        Self {
            workdir,
            env: BTreeMap::new(),
            dry_run: false,
        }
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Workflow-level environment shared by every job
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub async fn run_workflow(&self, workflow: &Workflow, only_job: Option<&str>) -> Result<Vec<JobReport>> {
        let jobs: Vec<&Job> = match only_job {
            Some(id) => vec![workflow
                .job(id)
                .ok_or_else(|| LintError::ValidationError(format!("no job named '{id}'")))?],
            None => workflow.jobs.iter().collect(),
        };

        let mut reports = Vec::with_capacity(jobs.len());
        for job in jobs {
            reports.push(self.run_job(job).await?);
        }
        Ok(reports)
    }

    pub async fn run_job(&self, job: &Job) -> Result<JobReport> {
        let started_at = Utc::now();
        if let Some(image) = &job.container {
            info!(job = %job.id, image = %image, "job expects container image");
        }

        let mut steps = Vec::with_capacity(job.steps.len());
        let mut failed = false;

        for step in &job.steps {
            let name = step.display_name();
            let outcome = if failed {
                StepOutcome::NotRun
            } else {
                self.run_step(job, step).await?
            };

            if let StepOutcome::Failed { exit_code } = outcome {
                warn!(job = %job.id, step = %name, exit_code, "step failed");
                failed = true;
            }
            steps.push(StepReport { name, outcome });
        }

        Ok(JobReport {
            job: job.id.clone(),
            container: job.container.clone(),
            steps,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn run_step(&self, job: &Job, step: &Step) -> Result<StepOutcome> {
        if let Some(action) = &step.uses {
            info!(job = %job.id, action = %action, "skipping external action");
            return Ok(StepOutcome::Skipped {
                reason: format!("external action {action} is not run locally"),
            });
        }

        let Some(script) = &step.run else {
            return Ok(StepOutcome::Skipped {
                reason: "step has nothing to run".to_string(),
            });
        };

        if self.dry_run {
            return Ok(StepOutcome::Planned {
                command: script.clone(),
            });
        }

        info!(job = %job.id, step = %step.display_name(), "running step");
        let workdir = match &step.working_directory {
            Some(dir) => self.workdir.join(dir),
            None => self.workdir.clone(),
        };

        let spawned = shell_command(script, &workdir)
            .envs(&self.env)
            .envs(&job.env)
            .envs(&step.env)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await;

        // a step that cannot start fails like one that exits non-zero
        let status = match spawned {
            Ok(status) => status,
            Err(err) => {
                warn!(
                    job = %job.id,
                    step = %step.display_name(),
                    workdir = %workdir.display(),
                    "could not start step: {err}"
                );
                return Ok(StepOutcome::Failed { exit_code: NO_EXIT_CODE });
            }
        };

        Ok(if status.success() {
            StepOutcome::Passed
        } else {
            StepOutcome::Failed {
                exit_code: status.code().unwrap_or(NO_EXIT_CODE),
            }
        })
    }
}

fn shell_command(script: &str, workdir: &Path) -> Command {
    let mut command = if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", script]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-e", "-c", script]);
        cmd
    };
    command.current_dir(workdir);
    command
}
