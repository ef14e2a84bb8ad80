// CLI module for command-line interface

pub mod dump_ast;
pub mod generate;
pub mod scan;

use clap::{ArgGroup, Parser};

use crate::models::rule::ValidationOptions;
use crate::services::engine::Engine;
use crate::services::output_writer::OutputFormat;
use crate::utils::environment::{adjust_for_docker, Settings};
use crate::utils::error::Result;

use self::dump_ast::DumpAstCommand;
use self::generate::GenerateCommand;
use self::rule_test::TestCommand;
use self::scan::ScanCommand;

/// Main CLI structure
#[derive(Debug, Parser)]
#[command(name = "sgrep")]
#[command(about = "sgrep CLI. For more information about sgrep, go to https://sgrep.dev")]
#[command(long_about = r#"sgrep CLI. For more information about sgrep, go to https://sgrep.dev

Searches code for structural patterns described by YAML rules. Rules come from
a local .sgrep.yml file or .sgrep/ folder, an explicit file or folder, a URL,
or a named registry pack.

Examples:
  sgrep                                  Scan . with .sgrep.yml or .sgrep/
  sgrep -f rules/ src/                   Scan src/ with every rule under rules/
  sgrep -f r2c                           Scan with the r2c registry pack
  sgrep -e '$X == $X' -l python app.py   Ad-hoc pattern search
  sgrep --generate-config                Write a starter .sgrep.yml
  sgrep --validate -f rules/             Check rule files without scanning
  sgrep --test rules/                    Run annotated rule tests"#)]
#[command(version)]
#[command(group(ArgGroup::new("config_source").args(["generate_config", "config", "pattern"])))]
pub struct Cli {
    /// Files to search (by default, entire current working directory searched)
    #[arg(default_value = ".")]
    pub target: Vec<String>,

    /// Generate starter .sgrep.yml
    #[arg(short = 'g', long, help_heading = "Config")]
    pub generate_config: bool,

    /// Config YAML file or directory of YAML files ending in .yml|.yaml, OR URL of a config file, OR sgrep registry entry name
    #[arg(short = 'f', long, help_heading = "Config")]
    pub config: Option<String>,

    /// sgrep pattern
    #[arg(short = 'e', long, requires = "lang", help_heading = "Config")]
    pub pattern: Option<String>,

    /// Parses pattern and all files in specified language. Must be used with -e/--pattern
    #[arg(short = 'l', long, help_heading = "Config")]
    pub lang: Option<String>,

    /// Validate config file(s). No search is performed
    #[arg(long, help_heading = "Config")]
    pub validate: bool,

    /// Only invoke sgrep if config(s) are valid
    #[arg(long, help_heading = "Config")]
    pub strict: bool,

    /// DANGEROUS: allow rules to run arbitrary code: ONLY ENABLE IF YOU TRUST THE SOURCE OF ALL RULES IN YOUR CONFIG
    #[arg(long = "dangerously-allow-arbitrary-code-execution-from-rules", help_heading = "Config")]
    pub allow_rce: bool,

    /// Try to exclude tests, documentation, and examples (based on filename/path)
    #[arg(long, help_heading = "Config")]
    pub exclude_tests: bool,

    #[arg(long, hide = true)]
    pub precommit: bool,

    /// Do not print anything to stdout. Results can still be saved with -o/--output; the exit code reports success
    #[arg(short = 'q', long, help_heading = "Output")]
    pub quiet: bool,

    /// Do not rewrite rule ids when they appear in nested subfolders (by default, rule 'foo' in test/rules.yaml is renamed 'test.foo')
    #[arg(long, help_heading = "Output")]
    pub no_rewrite_rule_ids: bool,

    /// Save search results to a file or post to URL. Default is to print to stdout
    #[arg(short = 'o', long, help_heading = "Output")]
    pub output: Option<String>,

    /// Convert search output to JSON format
    #[arg(long, help_heading = "Output")]
    pub json: bool,

    /// Run a test suite
    #[arg(long, help_heading = "Output")]
    pub test: bool,

    /// Ignore rules marked as #todoruleid: in test files
    #[arg(long)]
    pub test_ignore_todo: bool,

    /// Output JSON in r2c platform format (currently the same as --json)
    #[arg(long, help_heading = "Output")]
    pub r2c: bool,

    /// Skip validating patterns before running (not recommended)
    #[arg(long, help_heading = "Output")]
    pub skip_pattern_validation: bool,

    /// Show AST of the input file or passed expression and then exit
    #[arg(long, help_heading = "Output")]
    pub dump_ast: bool,

    /// Exit 1 if there are findings. Useful for CI and scripts
    #[arg(long, help_heading = "Output")]
    pub error: bool,

    /// Sets the logging level to verbose, e.g. which files are being processed
    #[arg(short = 'v', long, help_heading = "Logging")]
    pub verbose: bool,
}

impl Cli {
    pub fn output_format(&self) -> OutputFormat {
        if self.json || self.r2c {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            allow_rce: self.allow_rce,
            validate_patterns: !self.skip_pattern_validation,
        }
    }
}

/// CLI command dispatcher
pub struct CliDispatcher;

impl CliDispatcher {
    /// Run the command line and return the process exit code
    pub async fn execute(cli: Cli) -> Result<i32> {
        Self::execute_with(cli, Settings::from_env()).await
    }

    pub async fn execute_with(cli: Cli, settings: Settings) -> Result<i32> {
        adjust_for_docker(&settings, cli.precommit)?;
        let engine = Engine::new(settings.engine_binary.clone());

        if cli.generate_config {
            return GenerateCommand {
                settings,
                quiet: cli.quiet,
            }
            .run()
            .await;
        }

        if cli.test {
            let cmd = TestCommand {
                targets: cli.target.clone(),
                options: cli.validation_options(),
                ignore_todo: cli.test_ignore_todo,
                format: cli.output_format(),
                quiet: cli.quiet,
                engine,
            };
            return cmd.run().await;
        }

        if cli.dump_ast {
            let cmd = DumpAstCommand {
                lang: cli.lang.clone(),
                pattern: cli.pattern.clone(),
                targets: cli.target.clone(),
                engine,
            };
            return cmd.run().await;
        }

        let cmd = ScanCommand {
            targets: cli.target.clone(),
            config: cli.config.clone(),
            pattern: cli.pattern.clone(),
            lang: cli.lang.clone(),
            validate_only: cli.validate,
            strict: cli.strict,
            options: cli.validation_options(),
            exclude_tests: cli.exclude_tests,
            rewrite_rule_ids: !cli.no_rewrite_rule_ids,
            output: cli.output.clone(),
            format: cli.output_format(),
            quiet: cli.quiet,
            error_on_findings: cli.error,
            engine,
            settings,
        };
        cmd.run().await
    }
}
