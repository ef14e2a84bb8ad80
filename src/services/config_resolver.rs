use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use flate2::read::GzDecoder;
use futures_util::StreamExt;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde_yaml::{Mapping, Value};
use tar::Archive;
use tracing::{debug, error, info};

use crate::models::rule::ConfigMap;
use crate::utils::constants::{
    DEFAULT_CONFIG_FILE, DEFAULT_CONFIG_FOLDER, FALLBACK_TEMPLATE, ID_KEY, RULES_KEY,
    RULES_REGISTRY, TEMPLATE_YAML_URL,
};
use crate::utils::environment::{get_base_path, Settings};
use crate::utils::error::{LintError, Result};
use crate::utils::paths::{has_yaml_extension, is_hidden_config_dir, walk_files};

const TEMPLATE_TIMEOUT: Duration = Duration::from_secs(10);
const REMOTE_CONFIG_ID: &str = "remote-url";

/// Resolves the `--config` argument into parsed YAML configs
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    client: Client,
    base_path: PathBuf,
    download_root: PathBuf,
    registry: BTreeMap<String, String>,
    template_url: String,
    settings: Settings,
}

impl ConfigResolver {
    pub fn new(settings: Settings) -> Self {
        Self {
            client: Client::new(),
            base_path: get_base_path(),
            download_root: std::env::temp_dir(),
            registry: RULES_REGISTRY
                .iter()
                .map(|(name, url)| ((*name).to_string(), (*url).to_string()))
                .collect(),
            template_url: TEMPLATE_YAML_URL.to_string(),
            settings,
        }
    }

    /// Resolve relative locations against `base_path` instead of `.` (for testing)
    pub fn with_base_path(mut self, base_path: PathBuf) -> Self {
        self.base_path = base_path;
        self
    }

    /// Extract downloaded tarballs below `download_root` (for testing)
    pub fn with_download_root(mut self, download_root: PathBuf) -> Self {
        self.download_root = download_root;
        self
    }

    /// Register or replace a named rule pack
    pub fn with_registry_entry(mut self, name: &str, url: &str) -> Self {
        self.registry.insert(name.to_string(), url.to_string());
        self
    }

    pub fn with_template_url(mut self, template_url: String) -> Self {
        self.template_url = template_url;
        self
    }

    /// Resolve a registry name, a URL, a file or folder, or the defaults when `None`.
    pub async fn resolve_config(&self, config: Option<&str>) -> Result<ConfigMap> {
        let started = Instant::now();

        let configs = match config {
            None => self.load_config_from_local_path(None)?,
            Some(location) => match self.registry.get(location) {
                Some(url) => self.download_config(url).await?,
                None if is_url(location) => self.download_config(location).await?,
                None => self.load_config_from_local_path(Some(location))?,
            },
        };

        if !configs.is_empty() {
            debug!(
                "loaded {} configs in {:.3}s",
                configs.len(),
                started.elapsed().as_secs_f64()
            );
        }
        Ok(configs)
    }

    pub fn load_config_from_local_path(&self, location: Option<&str>) -> Result<ConfigMap> {
        let Some(location) = location else {
            let default_file = self.base_path.join(DEFAULT_CONFIG_FILE);
            let default_folder = self.base_path.join(DEFAULT_CONFIG_FOLDER);
            if default_file.exists() {
                return Ok(parse_config_at_path(&default_file, None));
            }
            if default_folder.exists() {
                return Ok(parse_config_folder(&default_folder, true));
            }
            let mut missing = ConfigMap::new();
            missing.insert(default_file.display().to_string(), None);
            return Ok(missing);
        };

        let loc = self.base_path.join(location);
        if !loc.exists() {
            return Err(LintError::ConfigNotFound {
                path: loc,
                hint: self.settings.missing_path_hint(),
            });
        }

        if loc.is_file() {
            Ok(parse_config_at_path(&loc, None))
        } else if loc.is_dir() {
            Ok(parse_config_folder(&loc, false))
        } else {
            Err(LintError::ConfigError(format!(
                "config location `{}` is not a file or folder!",
                loc.display()
            )))
        }
    }

    /// Fetch a config over HTTP: plain YAML or a gzipped tarball of YAML files.
    pub async fn download_config(&self, config_url: &str) -> Result<ConfigMap> {
        debug!("trying to download from {config_url}");

        match self.fetch_config(config_url).await {
            Ok(configs) => Ok(configs),
            Err(LintError::NetworkError(message)) => {
                error!("{message}");
                let mut failed = ConfigMap::new();
                failed.insert(config_url.to_string(), None);
                Ok(failed)
            }
            Err(other) => Err(other),
        }
    }

    async fn fetch_config(&self, config_url: &str) -> Result<ConfigMap> {
        let response = self.client.get(config_url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(LintError::ConfigError(format!(
                "bad status code: {} returned by config url: {}",
                status.as_u16(),
                config_url
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        match content_type.as_deref() {
            Some(ct) if ct.contains("text/plain") => {
                let body = response.text().await?;
                Ok(parse_config_string(REMOTE_CONFIG_ID, &body))
            }
            Some("application/x-gzip" | "application/gzip") => {
                let mut archive = Vec::new();
                let mut stream = response.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    archive.extend_from_slice(&chunk?);
                }
                self.extract_and_parse(config_url, &archive)
            }
            other => Err(LintError::ConfigError(format!(
                "unknown content-type: {} returned by config url: {}. Can not parse",
                other.unwrap_or("<none>"),
                config_url
            ))),
        }
    }

    fn extract_and_parse(&self, config_url: &str, archive: &[u8]) -> Result<ConfigMap> {
        let target = self.download_root.join(URL_SAFE_NO_PAD.encode(config_url));
        let _ = fs::remove_dir_all(&target);
        fs::create_dir_all(&target)?;

        Archive::new(GzDecoder::new(Cursor::new(archive))).unpack(&target)?;

        // GitHub tarballs wrap everything in a single top-level folder
        let mut entries: Vec<PathBuf> = fs::read_dir(&target)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        entries.sort();

        match entries.first() {
            Some(root) => Ok(parse_config_folder(root, true)),
            None => {
                error!("archive from {config_url} contained no folder");
                let mut failed = ConfigMap::new();
                failed.insert(config_url.to_string(), None);
                Ok(failed)
            }
        }
    }

    /// Write a starter `.sgrep.yml`, preferring the published template.
    pub async fn generate_config(&self) -> Result<PathBuf> {
        let destination = self.base_path.join(DEFAULT_CONFIG_FILE);
        if destination.exists() {
            return Err(LintError::ValidationError(format!(
                "{DEFAULT_CONFIG_FILE} already exists. Please remove and try again"
            )));
        }

        let template = match self.fetch_template().await {
            Ok(template) => template,
            Err(err) => {
                debug!("{err}");
                info!("There was a problem downloading the latest template config. Using fallback template");
                FALLBACK_TEMPLATE.to_string()
            }
        };

        fs::write(&destination, template)?;
        Ok(destination)
    }

    async fn fetch_template(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.template_url)
            .timeout(TEMPLATE_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("static regex"))
}

pub fn is_url(candidate: &str) -> bool {
    url_regex().is_match(candidate)
}

fn indent(msg: &str) -> String {
    msg.lines()
        .map(|line| format!("\t{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse YAML text; syntax errors are reported and recorded as `None`.
pub fn parse_config_string(config_id: &str, contents: &str) -> ConfigMap {
    let mut configs = ConfigMap::new();
    match serde_yaml::from_str::<Value>(contents) {
        Ok(value) => {
            configs.insert(config_id.to_string(), Some(value));
        }
        Err(err) => {
            error!("Invalid yaml file {config_id}:\n{}", indent(&err.to_string()));
            configs.insert(config_id.to_string(), None);
        }
    }
    configs
}

/// Parse one file. The config id is relative to `base_path` when given.
pub fn parse_config_at_path(loc: &Path, base_path: Option<&Path>) -> ConfigMap {
    let config_id = base_path
        .and_then(|base| loc.strip_prefix(base).ok())
        .unwrap_or(loc)
        .display()
        .to_string();

    match fs::read_to_string(loc) {
        Ok(contents) => parse_config_string(&config_id, &contents),
        Err(err) => {
            error!("YAML file at {} not found: {err}", loc.display());
            let mut configs = ConfigMap::new();
            configs.insert(loc.display().to_string(), None);
            configs
        }
    }
}

/// Parse every `.yml`/`.yaml` file below `loc` that is not in a hidden directory.
pub fn parse_config_folder(loc: &Path, relative: bool) -> ConfigMap {
    let base = relative.then_some(loc);
    let mut configs = ConfigMap::new();
    for file in walk_files(loc) {
        let checked = file.strip_prefix(loc).unwrap_or(&file);
        if is_hidden_config_dir(checked) || !has_yaml_extension(&file) {
            continue;
        }
        configs.extend(parse_config_at_path(&file, base));
    }
    configs
}

/// Single-rule config built from `-e PATTERN -l LANG`.
pub fn manual_config(pattern: &str, lang: &str) -> ConfigMap {
    let mut rule = Mapping::new();
    rule.insert(Value::from(ID_KEY), Value::from("-"));
    rule.insert(Value::from("pattern"), Value::from(pattern));
    rule.insert(Value::from("message"), Value::from(pattern));
    rule.insert(
        Value::from("languages"),
        Value::Sequence(vec![Value::from(lang)]),
    );
    rule.insert(Value::from("severity"), Value::from("ERROR"));

    let mut config = Mapping::new();
    config.insert(Value::from(RULES_KEY), Value::Sequence(vec![Value::Mapping(rule)]));

    let mut configs = ConfigMap::new();
    configs.insert("manual".to_string(), Some(Value::Mapping(config)));
    configs
}
