use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde_yaml::{Mapping, Value};
use tokio::process::Command;
use tracing::debug;

use crate::models::finding::EngineOutput;
use crate::models::rule::Rule;
use crate::utils::constants::RULES_KEY;
use crate::utils::error::{LintError, Result};

/// Handle on the external structural matcher
#[derive(Debug, Clone)]
pub struct Engine {
    binary: String,
}

impl Engine {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Run `rules` over `targets` and parse the engine's JSON report.
    pub async fn run_rules<'a, I>(&self, rules: I, targets: &[PathBuf]) -> Result<EngineOutput>
    where
        I: IntoIterator<Item = &'a Rule>,
    {
        let rules_file = tempfile::Builder::new()
            .prefix("sgrep-rules-")
            .suffix(".yml")
            .tempfile()?;
        std::fs::write(rules_file.path(), render_rules_file(rules)?)?;

        let mut args = vec![
            "-rules_file".to_string(),
            rules_file.path().display().to_string(),
            "-json".to_string(),
        ];
        args.extend(targets.iter().map(|t| t.display().to_string()));

        let output = self.invoke(&args).await?;
        parse_engine_output(&output.stdout, &output.stderr, output.status.code())
    }

    /// Print the AST of a file (or of a pattern when `pattern` is set).
    pub async fn dump_ast(&self, lang: &str, target: Option<&Path>, pattern: Option<&str>) -> Result<String> {
        let mut args = vec!["-lang".to_string(), lang.to_string()];
        match (pattern, target) {
            (Some(pattern), _) => {
                args.push("-dump_pattern".to_string());
                args.push(pattern.to_string());
            }
            (None, Some(target)) => {
                args.push("-dump_ast".to_string());
                args.push(target.display().to_string());
            }
            (None, None) => {
                return Err(LintError::ValidationError(
                    "--dump-ast needs a target file or a pattern".to_string(),
                ))
            }
        }

        let output = self.invoke(&args).await?;
        if !output.status.success() {
            return Err(LintError::EngineError(format!(
                "dump failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn invoke(&self, args: &[String]) -> Result<std::process::Output> {
        debug!(binary = %self.binary, ?args, "invoking engine");
        Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    LintError::EngineError(format!(
                        "could not find the `{}` binary; install sgrep or point SGREP_CORE at it",
                        self.binary
                    ))
                } else {
                    LintError::IoError(e)
                }
            })
    }
}

/// YAML rules file in the shape the engine reads: `rules: [...]`.
pub fn render_rules_file<'a, I>(rules: I) -> Result<String>
where
    I: IntoIterator<Item = &'a Rule>,
{
    let rules: Vec<Value> = rules
        .into_iter()
        .map(|rule| Value::Mapping(rule.raw().clone()))
        .collect();

    let mut document = Mapping::new();
    document.insert(Value::from(RULES_KEY), Value::Sequence(rules));

    serde_yaml::to_string(&document)
        .map_err(|e| LintError::Internal(format!("could not serialize rules: {e}")))
}

/// Decode the engine's stdout, surfacing stderr when it is not a report.
pub fn parse_engine_output(stdout: &[u8], stderr: &[u8], exit_code: Option<i32>) -> Result<EngineOutput> {
    serde_json::from_slice(stdout).map_err(|e| {
        let stderr = String::from_utf8_lossy(stderr);
        LintError::EngineError(format!(
            "unreadable output (exit code {}): {}{}",
            exit_code.map_or_else(|| "none".to_string(), |c| c.to_string()),
            e,
            if stderr.trim().is_empty() {
                String::new()
            } else {
                format!("\n{}", stderr.trim())
            }
        ))
    })
}
