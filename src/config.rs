use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::KinanError;
use crate::notation::{SourceAllowList, default_source_collections};

pub const DEFAULT_CONFIG_FILE: &str = "kinan.json";
pub const DEFAULT_UNICHEM_URL: &str = "https://www.ebi.ac.uk/unichem/rest";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub results_dir: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub notations: Option<String>,
    #[serde(default)]
    pub unichem: Option<UniChemEntry>,
    #[serde(default)]
    pub sources: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UniChemEntry {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub backoff_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniChemSettings {
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub backoff_ms: u64,
}

impl Default for UniChemSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UNICHEM_URL.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            backoff_ms: 200,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub results_dir: Utf8PathBuf,
    pub source: Option<Utf8PathBuf>,
    pub notations: Option<Utf8PathBuf>,
    pub unichem: UniChemSettings,
    pub sources: SourceAllowList,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            results_dir: Utf8PathBuf::from("results"),
            source: None,
            notations: None,
            unichem: UniChemSettings::default(),
            sources: SourceAllowList::default(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads `path`, or `kinan.json` from the working directory when no path
    /// is given.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KinanError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(KinanError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KinanError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KinanError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    /// Like [`ConfigLoader::resolve`], but falls back to defaults when no
    /// config file exists and none was requested.
    pub fn resolve_or_default(path: Option<&str>) -> Result<ResolvedConfig, KinanError> {
        match Self::resolve(path) {
            Err(KinanError::MissingConfig) => Ok(ResolvedConfig::default()),
            other => other,
        }
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KinanError> {
        let defaults = UniChemSettings::default();
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(KinanError::ConfigParse(format!(
                "unsupported schema_version {schema_version}"
            )));
        }

        let unichem = match config.unichem {
            Some(entry) => UniChemSettings {
                base_url: entry.base_url.unwrap_or(defaults.base_url),
                timeout_secs: entry.timeout_secs.unwrap_or(defaults.timeout_secs),
                max_retries: entry.max_retries.unwrap_or(defaults.max_retries),
                backoff_ms: entry.backoff_ms.unwrap_or(defaults.backoff_ms),
            },
            None => defaults,
        };
        if unichem.timeout_secs == 0 {
            return Err(KinanError::ConfigParse(
                "unichem.timeout_secs must be positive".to_string(),
            ));
        }

        let sources = match config.sources {
            Some(map) if map.is_empty() => {
                return Err(KinanError::ConfigParse(
                    "sources must not be empty".to_string(),
                ));
            }
            Some(map) => SourceAllowList::new(map),
            None => SourceAllowList::new(default_source_collections()),
        };

        Ok(ResolvedConfig {
            schema_version,
            results_dir: Utf8PathBuf::from(config.results_dir.unwrap_or_else(|| "results".to_string())),
            source: config.source.map(Utf8PathBuf::from),
            notations: config.notations.map(Utf8PathBuf::from),
            unichem,
            sources,
        })
    }
}
