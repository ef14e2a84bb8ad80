use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::finding::Finding;
use crate::models::rule::{validate_configs, InvalidConfig, ValidationOptions};
use crate::services::config_resolver::parse_config_at_path;
use crate::services::engine::Engine;
use crate::utils::error::Result;
use crate::utils::paths::{has_yaml_extension, is_hidden_config_dir, walk_files};

/// A rule file plus the code files that exercise it (same stem, same folder)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub config: PathBuf,
    pub code_files: Vec<PathBuf>,
}

/// Lines each rule should (and should not) match in one code file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expectations {
    pub expected: BTreeSet<usize>,
    pub ok: BTreeSet<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleTestResult {
    pub rule_id: String,
    pub file: String,
    pub expected: BTreeSet<usize>,
    pub reported: BTreeSet<usize>,
    pub passed: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TestSummary {
    pub results: Vec<RuleTestResult>,
    pub invalid: Vec<InvalidConfig>,
}

impl TestSummary {
    pub fn passed(&self) -> bool {
        self.invalid.is_empty() && self.results.iter().all(|r| r.passed)
    }

    pub fn to_text(&self) -> String {
        let mut lines = Vec::new();
        for result in &self.results {
            if result.passed {
                lines.push(format!("✓ {} ({})", result.rule_id, result.file));
            } else {
                let missed: Vec<String> = result
                    .expected
                    .difference(&result.reported)
                    .map(ToString::to_string)
                    .collect();
                let extra: Vec<String> = result
                    .reported
                    .difference(&result.expected)
                    .map(ToString::to_string)
                    .collect();
                lines.push(format!(
                    "✗ {} ({}): missed lines [{}], unexpected lines [{}]",
                    result.rule_id,
                    result.file,
                    missed.join(", "),
                    extra.join(", ")
                ));
            }
        }
        for invalid in &self.invalid {
            lines.push(format!("✗ {}: {}", invalid.config_id, invalid.reason));
        }

        let failed = self.results.iter().filter(|r| !r.passed).count() + self.invalid.len();
        lines.push(format!(
            "{} passed, {} failed",
            self.results.len() - self.results.iter().filter(|r| !r.passed).count(),
            failed
        ));
        lines.join("\n")
    }
}

fn annotation_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:#|//|--|/\*|<!--|;)\s*(todoruleid|ruleid|ok)\s*:\s*([A-Za-z0-9_.\-]+)")
            .expect("static regex")
    })
}

/// Read `ruleid:` / `todoruleid:` / `ok:` comments; each refers to the line after it.
pub fn parse_annotations(source: &str, ignore_todo: bool) -> BTreeMap<String, Expectations> {
    let mut by_rule: BTreeMap<String, Expectations> = BTreeMap::new();

    for (index, line) in source.lines().enumerate() {
        // annotation on line N (1-based: index + 1) targets line N + 1
        let target = index + 2;
        for captures in annotation_regex().captures_iter(line) {
            let kind = &captures[1];
            let rule_id = captures[2].to_string();
            let entry = by_rule.entry(rule_id).or_default();
            match kind {
                "ruleid" => {
                    entry.expected.insert(target);
                }
                "todoruleid" if !ignore_todo => {
                    entry.expected.insert(target);
                }
                "ok" => {
                    entry.ok.insert(target);
                }
                _ => {}
            }
        }
    }

    by_rule
}

/// Compare annotated expectations with what the engine reported for one file.
pub fn compare(
    file: &str,
    rule_ids: &[String],
    expectations: &BTreeMap<String, Expectations>,
    findings: &[Finding],
) -> Vec<RuleTestResult> {
    let mut reported: BTreeMap<&str, BTreeSet<usize>> = BTreeMap::new();
    for finding in findings {
        reported
            .entry(finding.check_id.as_str())
            .or_default()
            .insert(finding.start.line);
    }

    let mut ids: BTreeSet<&str> = rule_ids.iter().map(String::as_str).collect();
    ids.extend(reported.keys().copied());

    ids.into_iter()
        .filter_map(|rule_id| {
            let expected = expectations
                .get(rule_id)
                .map(|e| e.expected.clone())
                .unwrap_or_default();
            let reported = reported.get(rule_id).cloned().unwrap_or_default();
            if expected.is_empty() && reported.is_empty() && !expectations.contains_key(rule_id) {
                return None;
            }
            let flagged_ok = expectations
                .get(rule_id)
                .is_some_and(|e| !e.ok.is_disjoint(&reported));
            Some(RuleTestResult {
                rule_id: rule_id.to_string(),
                file: file.to_string(),
                passed: expected == reported && !flagged_ok,
                expected,
                reported,
            })
        })
        .collect()
}

/// Find rule files under `target` together with their code files.
pub fn discover_cases(target: &Path) -> Vec<TestCase> {
    let files: Vec<PathBuf> = walk_files(target)
        .into_iter()
        .filter(|path| !is_hidden_config_dir(path.strip_prefix(target).unwrap_or(path)))
        .collect();

    files
        .iter()
        .filter(|path| has_yaml_extension(path))
        .filter_map(|config| {
            let stem = config.file_stem()?;
            let code_files: Vec<PathBuf> = files
                .iter()
                .filter(|other| {
                    other.parent() == config.parent()
                        && other.file_stem() == Some(stem)
                        && !has_yaml_extension(other)
                })
                .cloned()
                .collect();
            (!code_files.is_empty()).then(|| TestCase {
                config: config.clone(),
                code_files,
            })
        })
        .collect()
}

/// Runs annotated rule tests through the engine
#[derive(Debug, Clone)]
pub struct RuleTester {
    engine: Engine,
    options: ValidationOptions,
    ignore_todo: bool,
}

impl RuleTester {
    pub fn new(engine: Engine, options: ValidationOptions, ignore_todo: bool) -> Self {
        Self {
            engine,
            options,
            ignore_todo,
        }
    }

    pub async fn run(&self, targets: &[PathBuf]) -> Result<TestSummary> {
        let mut summary = TestSummary::default();

        for target in targets {
            let cases = discover_cases(target);
            if cases.is_empty() {
                warn!("no rule tests found under {}", target.display());
            }
            for case in cases {
                self.run_case(&case, &mut summary).await?;
            }
        }

        Ok(summary)
    }

    async fn run_case(&self, case: &TestCase, summary: &mut TestSummary) -> Result<()> {
        debug!("testing {}", case.config.display());
        let configs = parse_config_at_path(&case.config, None);
        let validated = validate_configs(&configs, &self.options);
        if !validated.invalid.is_empty() {
            summary.invalid.extend(validated.invalid);
            return Ok(());
        }

        let rule_ids: Vec<String> = validated.all_rules().map(|r| r.id.clone()).collect();
        for code_file in &case.code_files {
            let source = match fs::read_to_string(code_file) {
                Ok(source) => source,
                Err(err) if err.kind() == std::io::ErrorKind::InvalidData => {
                    warn!("skipping {}: not a text file", code_file.display());
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let expectations = parse_annotations(&source, self.ignore_todo);
            let output = self
                .engine
                .run_rules(validated.all_rules(), std::slice::from_ref(code_file))
                .await?;
            summary.results.extend(compare(
                &code_file.display().to_string(),
                &rule_ids,
                &expectations,
                &output.matches,
            ));
        }
        Ok(())
    }
}
