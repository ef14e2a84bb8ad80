use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::utils::constants::{ID_KEY, RCE_RULE_FLAG, RULES_KEY};

/// Parsed configs keyed by config id. `None` marks a config that failed to load.
pub type ConfigMap = BTreeMap<String, Option<Value>>;

const REQUIRED_KEYS: &[&str] = &[ID_KEY, "message", "languages", "severity"];
const OPTIONAL_KEYS: &[&str] = &["fix", "metadata"];
const TOP_LEVEL_OPERATORS: &[&str] = &["pattern", "patterns", "pattern-either"];

/// Severity attached to every finding of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ERROR" => Some(Severity::Error),
            "WARNING" => Some(Severity::Warning),
            "INFO" => Some(Severity::Info),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Info => "INFO",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pattern tree of a rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    Pattern(String),
    PatternNot(String),
    PatternInside(String),
    PatternNotInside(String),
    WherePython(String),
    /// All children must hold (`patterns`)
    Patterns(Vec<Expression>),
    /// Any child may hold (`pattern-either`)
    Either(Vec<Expression>),
}

impl Expression {
    fn parse(operator: &str, value: &Value) -> Result<Self, String> {
        match operator {
            "patterns" => Ok(Expression::Patterns(Self::parse_list(operator, value)?)),
            "pattern-either" => Ok(Expression::Either(Self::parse_list(operator, value)?)),
            _ => {
                let text = value
                    .as_str()
                    .ok_or_else(|| format!("`{operator}` must be a string"))?
                    .to_string();
                match operator {
                    "pattern" => Ok(Expression::Pattern(text)),
                    "pattern-not" => Ok(Expression::PatternNot(text)),
                    "pattern-inside" => Ok(Expression::PatternInside(text)),
                    "pattern-not-inside" => Ok(Expression::PatternNotInside(text)),
                    "pattern-where-python" => Ok(Expression::WherePython(text)),
                    other => Err(format!("unknown pattern operator `{other}`")),
                }
            }
        }
    }

    fn parse_list(operator: &str, value: &Value) -> Result<Vec<Self>, String> {
        let items = value
            .as_sequence()
            .ok_or_else(|| format!("`{operator}` must be a list"))?;
        if items.is_empty() {
            return Err(format!("`{operator}` must not be empty"));
        }

        items
            .iter()
            .map(|item| {
                let mapping = item
                    .as_mapping()
                    .filter(|m| m.len() == 1)
                    .ok_or_else(|| format!("each entry of `{operator}` must have exactly one operator"))?;
                let (key, child) = mapping
                    .iter()
                    .next()
                    .ok_or_else(|| format!("empty entry in `{operator}`"))?;
                let key = key
                    .as_str()
                    .ok_or_else(|| format!("operator names in `{operator}` must be strings"))?;
                Expression::parse(key, child)
            })
            .collect()
    }

    /// Whether any node runs arbitrary python.
    pub fn uses_python(&self) -> bool {
        match self {
            Expression::WherePython(_) => true,
            Expression::Patterns(children) | Expression::Either(children) => {
                children.iter().any(Expression::uses_python)
            }
            _ => false,
        }
    }

    /// Every pattern string in the tree, in order.
    pub fn patterns(&self) -> Vec<&str> {
        match self {
            Expression::Pattern(p)
            | Expression::PatternNot(p)
            | Expression::PatternInside(p)
            | Expression::PatternNotInside(p) => vec![p.as_str()],
            Expression::WherePython(_) => Vec::new(),
            Expression::Patterns(children) | Expression::Either(children) => {
                children.iter().flat_map(Expression::patterns).collect()
            }
        }
    }
}

/// A validated rule, keeping its original YAML so it can be handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub id: String,
    pub message: String,
    pub languages: Vec<String>,
    pub severity: Severity,
    pub expression: Expression,
    /// Replacement text suggested for a match
    pub fix: Option<String>,
    /// Free-form rule metadata, passed through to the engine untouched
    pub metadata: Option<Value>,
    raw: Mapping,
}

impl Rule {
    pub fn from_value(value: &Value, options: &ValidationOptions) -> Result<Self, String> {
        let mapping = value
            .as_mapping()
            .ok_or_else(|| "each rule must be a mapping".to_string())?;

        let keys: Vec<&str> = mapping.keys().filter_map(Value::as_str).collect();
        if keys.len() != mapping.len() {
            return Err("rule keys must be strings".to_string());
        }

        let missing: Vec<&str> = REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !keys.contains(key))
            .collect();
        if !missing.is_empty() {
            let id = mapping.get(ID_KEY).and_then(Value::as_str).unwrap_or("<unnamed>");
            return Err(format!("rule `{id}` is missing required keys: {}", missing.join(", ")));
        }

        let id = mapping
            .get(ID_KEY)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| "rule `id` must be a non-empty string".to_string())?
            .to_string();

        let unknown: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| {
                !REQUIRED_KEYS.contains(key)
                    && !OPTIONAL_KEYS.contains(key)
                    && !TOP_LEVEL_OPERATORS.contains(key)
            })
            .collect();
        if !unknown.is_empty() {
            return Err(format!("rule `{id}` has invalid keys: {}", unknown.join(", ")));
        }

        let operators: Vec<&str> = keys
            .iter()
            .copied()
            .filter(|key| TOP_LEVEL_OPERATORS.contains(key))
            .collect();
        let operator = match operators.as_slice() {
            [single] => *single,
            [] => {
                return Err(format!(
                    "rule `{id}` needs one of: {}",
                    TOP_LEVEL_OPERATORS.join(", ")
                ))
            }
            many => {
                return Err(format!(
                    "rule `{id}` has more than one top-level operator: {}",
                    many.join(", ")
                ))
            }
        };

        let message = mapping
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("rule `{id}`: `message` must be a string"))?
            .to_string();

        let severity_text = mapping.get("severity").and_then(Value::as_str).unwrap_or_default();
        let severity = Severity::parse(severity_text).ok_or_else(|| {
            format!("rule `{id}`: invalid severity `{severity_text}` (expected ERROR, WARNING or INFO)")
        })?;

        let languages: Vec<String> = mapping
            .get("languages")
            .and_then(Value::as_sequence)
            .map(|langs| langs.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default();
        let declared = mapping
            .get("languages")
            .and_then(Value::as_sequence)
            .map_or(0, Vec::len);
        if languages.is_empty() || languages.len() != declared {
            return Err(format!("rule `{id}`: `languages` must be a non-empty list of strings"));
        }

        let operator_value = mapping
            .get(operator)
            .ok_or_else(|| format!("rule `{id}`: missing `{operator}`"))?;
        let expression = Expression::parse(operator, operator_value)
            .map_err(|reason| format!("rule `{id}`: {reason}"))?;

        if expression.uses_python() && !options.allow_rce {
            return Err(format!(
                "rule `{id}` uses pattern-where-python, which runs arbitrary code; pass {RCE_RULE_FLAG} only if you trust every rule source"
            ));
        }

        let fix = match mapping.get("fix") {
            None => None,
            Some(Value::String(fix)) => Some(fix.clone()),
            Some(_) => return Err(format!("rule `{id}`: `fix` must be a string")),
        };
        let metadata = mapping.get("metadata").cloned();

        if options.validate_patterns {
            for pattern in expression.patterns() {
                validate_pattern(pattern).map_err(|reason| format!("rule `{id}`: {reason}"))?;
            }
        }

        Ok(Self {
            id,
            message,
            languages,
            severity,
            expression,
            fix,
            metadata,
            raw: mapping.clone(),
        })
    }

    pub fn set_id(&mut self, id: String) {
        self.raw.insert(Value::from(ID_KEY), Value::from(id.clone()));
        self.id = id;
    }

    /// The rule exactly as written, with any rewritten id applied
    pub fn raw(&self) -> &Mapping {
        &self.raw
    }
}

/// Knobs that change what counts as a valid rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOptions {
    pub allow_rce: bool,
    pub validate_patterns: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            allow_rce: false,
            validate_patterns: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidConfig {
    pub config_id: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ValidatedConfigs {
    pub valid: BTreeMap<String, Vec<Rule>>,
    pub invalid: Vec<InvalidConfig>,
}

impl ValidatedConfigs {
    pub fn rule_count(&self) -> usize {
        self.valid.values().map(Vec::len).sum()
    }

    pub fn all_rules(&self) -> impl Iterator<Item = &Rule> {
        self.valid.values().flatten()
    }
}

/// Split loaded configs into valid rule sets and rejected configs.
pub fn validate_configs(configs: &ConfigMap, options: &ValidationOptions) -> ValidatedConfigs {
    let mut result = ValidatedConfigs::default();

    for (config_id, config) in configs {
        match config {
            None => result.invalid.push(InvalidConfig {
                config_id: config_id.clone(),
                reason: "config could not be loaded or parsed".to_string(),
            }),
            Some(value) => match validate_single_config(value, options) {
                Ok(rules) => {
                    result.valid.insert(config_id.clone(), rules);
                }
                Err(reason) => result.invalid.push(InvalidConfig {
                    config_id: config_id.clone(),
                    reason,
                }),
            },
        }
    }

    result
}

fn validate_single_config(value: &Value, options: &ValidationOptions) -> Result<Vec<Rule>, String> {
    let rules = value
        .as_mapping()
        .and_then(|m| m.get(RULES_KEY))
        .ok_or_else(|| format!("missing top-level `{RULES_KEY}` key"))?
        .as_sequence()
        .ok_or_else(|| format!("`{RULES_KEY}` must be a list"))?;

    let mut seen = HashSet::new();
    let mut parsed = Vec::with_capacity(rules.len());
    for rule in rules {
        let rule = Rule::from_value(rule, options)?;
        if !seen.insert(rule.id.clone()) {
            return Err(format!("duplicate rule id `{}`", rule.id));
        }
        parsed.push(rule);
    }
    Ok(parsed)
}

/// Cheap syntactic check run before the engine sees a pattern.
pub fn validate_pattern(pattern: &str) -> Result<(), String> {
    if pattern.trim().is_empty() {
        return Err("pattern must not be empty".to_string());
    }

    let mut stack = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in pattern.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let expected = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                if stack.pop() != Some(expected) {
                    return Err(format!("unbalanced `{c}` in pattern `{pattern}`"));
                }
            }
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(format!("unclosed `{open}` in pattern `{pattern}`"));
    }
    Ok(())
}

/// Dotted prefix derived from the directories of a config id.
///
/// Rule `foo` loaded from `test/rules.yaml` is reported as `test.foo`.
pub fn rule_id_prefix(config_id: &str) -> Option<String> {
    let parent = Path::new(config_id).parent()?;
    let parts: Vec<String> = parent
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => {
                let part = part.to_string_lossy();
                (!part.starts_with('.')).then(|| part.into_owned())
            }
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}

pub fn rewrite_rule_ids(configs: &mut ValidatedConfigs) {
    for (config_id, rules) in &mut configs.valid {
        if let Some(prefix) = rule_id_prefix(config_id) {
            for rule in rules.iter_mut() {
                let id = format!("{prefix}.{}", rule.id);
                rule.set_id(id);
            }
        }
    }
}
