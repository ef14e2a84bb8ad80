use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::models::finding::ScanReport;
use crate::models::rule::{rewrite_rule_ids, validate_configs, ValidationOptions};
use crate::services::config_resolver::{manual_config, ConfigResolver};
use crate::services::engine::Engine;
use crate::services::output_writer::{OutputFormat, OutputWriter};
use crate::utils::constants::DEFAULT_CONFIG_FILE;
use crate::utils::environment::{resolve_targets, Settings};
use crate::utils::error::{LintError, Result, FINDINGS_EXIT_CODE};
use crate::utils::paths::is_test_path;

/// Resolve rules, run them through the engine and report findings
#[derive(Debug)]
pub struct ScanCommand {
    pub targets: Vec<String>,
    pub config: Option<String>,
    pub pattern: Option<String>,
    pub lang: Option<String>,
    pub validate_only: bool,
    pub strict: bool,
    pub options: ValidationOptions,
    pub exclude_tests: bool,
    pub rewrite_rule_ids: bool,
    pub output: Option<String>,
    pub format: OutputFormat,
    pub quiet: bool,
    pub error_on_findings: bool,
    pub engine: Engine,
    pub settings: Settings,
}

impl ScanCommand {
    pub async fn run(&self) -> Result<i32> {
        let configs = match (&self.pattern, &self.lang) {
            (Some(pattern), Some(lang)) => manual_config(pattern, lang),
            _ => {
                ConfigResolver::new(self.settings.clone())
                    .resolve_config(self.config.as_deref())
                    .await?
            }
        };

        let mut validated = validate_configs(&configs, &self.options);
        for invalid in &validated.invalid {
            warn!("invalid config {}: {}", invalid.config_id, invalid.reason);
        }

        if self.strict && !validated.invalid.is_empty() {
            return Err(LintError::ValidationError(format!(
                "run with --strict and there were {} errors loading configs",
                validated.invalid.len()
            )));
        }

        if self.validate_only {
            if !validated.invalid.is_empty() {
                return Err(LintError::ValidationError(format!(
                    "{} of {} configs are invalid",
                    validated.invalid.len(),
                    configs.len()
                )));
            }
            if !self.quiet {
                println!("Config is valid: {} rules in {} configs", validated.rule_count(), validated.valid.len());
            }
            return Ok(0);
        }

        if validated.rule_count() == 0 {
            return Err(LintError::ConfigError(format!(
                "no valid rules found; create a {DEFAULT_CONFIG_FILE} (see `sgrep --generate-config`) or pass --config"
            )));
        }

        if self.rewrite_rule_ids {
            rewrite_rule_ids(&mut validated);
        }

        let targets = resolve_targets(&self.targets);
        info!(
            "running {} rules from {} configs over {} targets",
            validated.rule_count(),
            validated.valid.len(),
            targets.len()
        );
        let output = self.engine.run_rules(validated.all_rules(), &targets).await?;

        let severities: HashMap<&str, &str> = validated
            .all_rules()
            .map(|rule| (rule.id.as_str(), rule.severity.as_str()))
            .collect();

        let mut results = output.matches;
        for finding in &mut results {
            if finding.extra.severity.is_none() {
                finding.extra.severity = severities
                    .get(finding.check_id.as_str())
                    .map(|s| (*s).to_string());
            }
        }

        if self.exclude_tests {
            let before = results.len();
            results.retain(|finding| !is_test_path(Path::new(&finding.path)));
            debug!("excluded {} findings in tests, docs or examples", before - results.len());
        }

        let report = ScanReport {
            results,
            errors: output.errors,
        };
        OutputWriter::new(self.format, self.quiet)
            .emit(&report, self.output.as_deref())
            .await?;

        if self.error_on_findings && !report.results.is_empty() {
            Ok(FINDINGS_EXIT_CODE)
        } else {
            Ok(0)
        }
    }
}
