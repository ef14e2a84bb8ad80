use crate::services::engine::Engine;
use crate::utils::environment::resolve_targets;
use crate::utils::error::{LintError, Result};

/// `--dump-ast`: show how the engine parses a file or a pattern
#[derive(Debug)]
pub struct DumpAstCommand {
    pub lang: Option<String>,
    pub pattern: Option<String>,
    pub targets: Vec<String>,
    pub engine: Engine,
}

impl DumpAstCommand {
    pub async fn run(self) -> Result<i32> {
        let lang = self.lang.as_deref().ok_or_else(|| {
            LintError::ValidationError("--dump-ast needs -l/--lang".to_string())
        })?;

        let targets = resolve_targets(&self.targets);
        if self.pattern.is_none() && targets.len() != 1 {
            return Err(LintError::ValidationError(
                "--dump-ast takes exactly one target file".to_string(),
            ));
        }

        let dumped = self
            .engine
            .dump_ast(lang, targets.first().map(|t| t.as_path()), self.pattern.as_deref())
            .await?;
        print!("{dumped}");
        Ok(0)
    }
}
