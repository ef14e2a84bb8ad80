use crate::services::config_resolver::ConfigResolver;
use crate::utils::environment::Settings;
use crate::utils::error::Result;

/// Write a starter `.sgrep.yml` into the current directory
#[derive(Debug)]
pub struct GenerateCommand {
    pub settings: Settings,
    pub quiet: bool,
}

impl GenerateCommand {
    pub async fn run(self) -> Result<i32> {
        let resolver = ConfigResolver::new(self.settings);
        let written = resolver.generate_config().await?;
        if !self.quiet {
            println!("Template config successfully written to {}", written.display());
        }
        Ok(0)
    }
}
