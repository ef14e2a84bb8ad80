use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::utils::error::{LintError, Result};

/// Event that may start a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    PullRequest,
    Push { branch: String },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::PullRequest => f.write_str("pull_request"),
            Event::Push { branch } => write!(f, "push to {branch}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushTrigger {
    /// Empty means every branch
    pub branches: Vec<String>,
}

/// The `on:` section of a workflow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Triggers {
    pub pull_request: bool,
    pub push: Option<PushTrigger>,
    /// Events this runner does not handle (schedule, workflow_dispatch, ...)
    pub other: Vec<String>,
}

impl Triggers {
    fn from_value(value: &Value) -> Result<Self> {
        let mut triggers = Triggers::default();
        match value {
            Value::String(event) => triggers.add_event(event, &Value::Null)?,
            Value::Sequence(events) => {
                for event in events {
                    let name = event.as_str().ok_or_else(|| {
                        LintError::ConfigError("`on:` list entries must be event names".to_string())
                    })?;
                    triggers.add_event(name, &Value::Null)?;
                }
            }
            Value::Mapping(events) => {
                for (name, settings) in events {
                    let name = name.as_str().ok_or_else(|| {
                        LintError::ConfigError("`on:` keys must be event names".to_string())
                    })?;
                    triggers.add_event(name, settings)?;
                }
            }
            _ => {
                return Err(LintError::ConfigError(
                    "`on:` must be an event name, a list or a mapping".to_string(),
                ))
            }
        }
        Ok(triggers)
    }

    fn add_event(&mut self, name: &str, settings: &Value) -> Result<()> {
        match name {
            "pull_request" => self.pull_request = true,
            "push" => {
                let branches = match settings.get("branches") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(Value::Sequence(items)) => items
                        .iter()
                        .map(|item| {
                            item.as_str().map(str::to_string).ok_or_else(|| {
                                LintError::ConfigError("push branches must be strings".to_string())
                            })
                        })
                        .collect::<Result<Vec<_>>>()?,
                    Some(Value::String(branch)) => vec![branch.clone()],
                    Some(_) => {
                        return Err(LintError::ConfigError(
                            "push branches must be a list".to_string(),
                        ))
                    }
                };
                self.push = Some(PushTrigger { branches });
            }
            other => self.other.push(other.to_string()),
        }
        Ok(())
    }

    pub fn matches(&self, event: &Event) -> bool {
        match event {
            Event::PullRequest => self.pull_request,
            Event::Push { branch } => self.push.as_ref().is_some_and(|push| {
                push.branches.is_empty() || push.branches.iter().any(|b| b == branch)
            }),
        }
    }
}

/// One entry of a job's `steps:` list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub uses: Option<String>,
    #[serde(default)]
    pub run: Option<String>,
    #[serde(default)]
    pub with: BTreeMap<String, Value>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default, rename = "working-directory")]
    pub working_directory: Option<String>,
}

impl Step {
    /// Name shown in reports: explicit name, else the action or first command line.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        if let Some(uses) = &self.uses {
            return uses.clone();
        }
        self.run
            .as_deref()
            .and_then(|run| run.lines().next())
            .unwrap_or("<empty step>")
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: String,
    pub runs_on: Option<String>,
    /// Container image the job expects to run in (`image:tag`)
    pub container: Option<String>,
    pub env: BTreeMap<String, String>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct RawJob {
    #[serde(default, rename = "runs-on")]
    runs_on: Option<String>,
    #[serde(default)]
    container: Option<Value>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    #[serde(default)]
    steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
struct RawWorkflow {
    #[serde(default)]
    name: Option<String>,
    on: Value,
    #[serde(default)]
    env: BTreeMap<String, String>,
    jobs: serde_yaml::Mapping,
}

/// A CI workflow: triggers plus jobs in declaration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Workflow {
    pub name: Option<String>,
    pub on: Triggers,
    pub env: BTreeMap<String, String>,
    pub jobs: Vec<Job>,
}

impl Workflow {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            LintError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let raw: RawWorkflow = serde_yaml::from_str(content)
            .map_err(|e| LintError::ConfigError(format!("Invalid workflow YAML: {e}")))?;

        let mut jobs = Vec::with_capacity(raw.jobs.len());
        for (id, job) in raw.jobs {
            let id = id
                .as_str()
                .ok_or_else(|| LintError::ConfigError("job ids must be strings".to_string()))?
                .to_string();
            let job: RawJob = serde_yaml::from_value(job)
                .map_err(|e| LintError::ConfigError(format!("Invalid job '{id}': {e}")))?;

            let container = match job.container {
                None | Some(Value::Null) => None,
                Some(Value::String(image)) => Some(image),
                Some(Value::Mapping(settings)) => settings
                    .get("image")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                Some(_) => {
                    return Err(LintError::ConfigError(format!(
                        "job '{id}': `container` must be an image or a mapping with `image`"
                    )))
                }
            };

            jobs.push(Job {
                id,
                runs_on: job.runs_on,
                container,
                env: job.env,
                steps: job.steps,
            });
        }

        Ok(Self {
            name: raw.name,
            on: Triggers::from_value(&raw.on)?,
            env: raw.env,
            jobs,
        })
    }

    /// Structural checks that do not depend on the triggering event.
    pub fn validate(&self) -> Result<()> {
        if self.jobs.is_empty() {
            return Err(LintError::ValidationError("workflow defines no jobs".to_string()));
        }

        for job in &self.jobs {
            if job.steps.is_empty() {
                return Err(LintError::ValidationError(format!(
                    "job '{}' has no steps",
                    job.id
                )));
            }

            if let Some(image) = &job.container {
                if !is_pinned_image(image) {
                    return Err(LintError::ValidationError(format!(
                        "job '{}': container image '{}' must be pinned to an explicit tag",
                        job.id, image
                    )));
                }
            }

            for (index, step) in job.steps.iter().enumerate() {
                match (&step.uses, &step.run) {
                    (Some(_), None) | (None, Some(_)) => {}
                    _ => {
                        return Err(LintError::ValidationError(format!(
                            "job '{}' step {} ('{}') must set exactly one of `uses` or `run`",
                            job.id,
                            index + 1,
                            step.display_name()
                        )))
                    }
                }
            }
        }

        Ok(())
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.id == id)
    }
}

/// `image:tag` or `image@digest`, where the tag is not `latest`.
pub fn is_pinned_image(image: &str) -> bool {
    if image.contains('@') {
        return true;
    }
    let name_start = image.rfind('/').map_or(0, |i| i + 1);
    match image[name_start..].rsplit_once(':') {
        Some((_, tag)) => !tag.is_empty() && tag != "latest",
        None => false,
    }
}
