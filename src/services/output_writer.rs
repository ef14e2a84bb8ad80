use std::fs;
use std::path::Path;

use reqwest::Client;
use tracing::{debug, info};

use crate::models::finding::ScanReport;
use crate::services::config_resolver::is_url;
use crate::utils::error::{LintError, Result};

/// Output format chosen on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Renders a scan report and delivers it to stdout, a file or a URL
#[derive(Debug, Clone)]
pub struct OutputWriter {
    client: Client,
    format: OutputFormat,
    quiet: bool,
}

impl OutputWriter {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self {
            client: Client::new(),
            format,
            quiet,
        }
    }

    pub fn render(&self, report: &ScanReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string(report)?),
            OutputFormat::Text => Ok(render_text(report)),
        }
    }

    /// Print unless quiet, then save to `destination` when given.
    pub async fn emit(&self, report: &ScanReport, destination: Option<&str>) -> Result<()> {
        let rendered = self.render(report)?;

        if !self.quiet && !rendered.is_empty() {
            println!("{rendered}");
        }

        match destination {
            Some(url) if is_url(url) => self.post(url, report).await,
            Some(path) => {
                fs::write(Path::new(path), format!("{rendered}\n"))?;
                info!("results saved to {path}");
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn post(&self, url: &str, report: &ScanReport) -> Result<()> {
        debug!("posting {} results to {url}", report.results.len());
        let response = self.client.post(url).json(report).send().await?;
        if !response.status().is_success() {
            return Err(LintError::NetworkError(format!(
                "posting results to {url} failed with status {}",
                response.status()
            )));
        }
        info!("results posted to {url}");
        Ok(())
    }
}

fn render_text(report: &ScanReport) -> String {
    let mut lines: Vec<String> = report.results.iter().map(|finding| finding.to_text()).collect();
    for error in &report.errors {
        let location = error.path.as_deref().unwrap_or("<unknown>");
        lines.push(format!("error in {location}: {}", error.message));
    }
    lines.join("\n")
}
