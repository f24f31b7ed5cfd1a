use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::CliArgs;

pub const CONFIG_ENV: &str = "KUBE_UTILIZATION_CONFIG";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Optional settings file. Every key can be overridden on the command line.
#[derive(Debug, Clone, Deserialize, Default, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default, alias = "sort")]
    pub sort_by: Option<String>,
    #[serde(default)]
    pub csv: Option<bool>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default, alias = "timeout", alias = "timeout_secs")]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub color: Option<bool>,
}

/// Effective settings for one run.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    pub source: Option<String>,
    pub sort_by: Option<String>,
    pub csv: bool,
    pub context: Option<String>,
    pub request_timeout_secs: u64,
    pub color: bool,
}

impl Settings {
    pub fn resolve(args: &CliArgs) -> Result<Self> {
        let (source, file) = match discover_config_path() {
            Some(path) => (Some(path.display().to_string()), load_config(&path)?),
            None => (None, ConfigFile::default()),
        };
        Ok(Self::merge(args, file, source))
    }

    fn merge(args: &CliArgs, file: ConfigFile, source: Option<String>) -> Self {
        Self {
            source,
            sort_by: args.sort_by.clone().or(file.sort_by),
            csv: args.csv || file.csv.unwrap_or(false),
            context: args.context.clone().or(file.context),
            request_timeout_secs: args
                .request_timeout
                .or(file.request_timeout_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS)
                .max(1),
            color: !args.no_color && file.color.unwrap_or(true),
        }
    }
}

pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let home = std::env::var("HOME").ok().map(PathBuf::from);
    first_existing(Path::new("."), home.as_deref())
}

fn first_existing(cwd: &Path, home: Option<&Path>) -> Option<PathBuf> {
    let cwd_candidates = [
        cwd.join("kube-utilization.yaml"),
        cwd.join("kube-utilization.yml"),
        cwd.join(".kube-utilization.yaml"),
    ];
    if let Some(found) = cwd_candidates.into_iter().find(|candidate| candidate.exists()) {
        return Some(found);
    }

    let home = home?;
    [
        home.join(".config/kube-utilization/config.yaml"),
        home.join(".config/kube-utilization/config.yml"),
    ]
    .into_iter()
    .find(|candidate| candidate.exists())
}
