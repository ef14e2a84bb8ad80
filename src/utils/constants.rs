// Names, locations and URLs shared across the CLI

pub const PLEASE_FILE_ISSUE_TEXT: &str =
    "An error report would be appreciated! Please file an issue at https://github.com/returntocorp/sgrep/issues/new";

pub const DEFAULT_SGREP_CONFIG_NAME: &str = "sgrep";
pub const DEFAULT_CONFIG_FILE: &str = ".sgrep.yml";
pub const DEFAULT_CONFIG_FOLDER: &str = ".sgrep";

pub const RULES_KEY: &str = "rules";
pub const ID_KEY: &str = "id";
pub const YML_EXTENSIONS: &[&str] = &["yml", "yaml"];

pub const RCE_RULE_FLAG: &str = "--dangerously-allow-arbitrary-code-execution-from-rules";

pub const TEMPLATE_YAML_URL: &str =
    "https://raw.githubusercontent.com/returntocorp/sgrep-rules/develop/template.yaml";

pub const FALLBACK_TEMPLATE: &str = r#"rules:
  - id: eqeq-is-bad
    pattern: $X == $X
    message: "$X == $X is a useless equality check"
    languages: [python]
    severity: ERROR"#;

/// Named rule packs that can be passed to `--config` instead of a path or URL.
pub const RULES_REGISTRY: &[(&str, &str)] = &[
    ("r2c", "https://github.com/returntocorp/sgrep-rules/tarball/master"),
    ("r2c-develop", "https://github.com/returntocorp/sgrep-rules/tarball/develop"),
];

pub const REPO_HOME_DOCKER: &str = "/home/repo/";
pub const IN_DOCKER_ENV: &str = "SGREP_IN_DOCKER";
pub const IN_GH_ACTION_ENV: &str = "GITHUB_WORKSPACE";
pub const ENGINE_ENV: &str = "SGREP_CORE";
pub const DEFAULT_ENGINE_BINARY: &str = "sgrep-core";
