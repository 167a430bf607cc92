use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::assess::{
    validate_class_name, ClassificationTable, ThreatLevel, DEFAULT_CONFIDENCE_THRESHOLD,
};

const DEFAULT_API_ADDR: &str = "127.0.0.1:8787";

#[derive(Debug, Deserialize, Default)]
struct SentineldConfigFile {
    api: Option<ApiConfigFile>,
    assessor: Option<AssessorConfigFile>,
    classes: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct AssessorConfigFile {
    confidence_threshold: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct SentineldConfig {
    pub api_addr: String,
    pub confidence_threshold: f64,
    pub class_overrides: Vec<(String, ThreatLevel)>,
}

impl SentineldConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SENTINEL_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: SentineldConfigFile) -> Result<Self> {
        let api_addr = file
            .api
            .and_then(|api| api.addr)
            .unwrap_or_else(|| DEFAULT_API_ADDR.to_string());
        let confidence_threshold = file
            .assessor
            .and_then(|assessor| assessor.confidence_threshold)
            .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD);
        let mut class_overrides = Vec::new();
        if let Some(classes) = file.classes {
            for (name, level) in classes {
                class_overrides.push((name, level.parse::<ThreatLevel>()?));
            }
        }
        Ok(Self {
            api_addr,
            confidence_threshold,
            class_overrides,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("SENTINEL_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api_addr = addr;
            }
        }
        if let Ok(threshold) = std::env::var("SENTINEL_CONFIDENCE_THRESHOLD") {
            let value: f64 = threshold
                .parse()
                .map_err(|_| anyhow!("SENTINEL_CONFIDENCE_THRESHOLD must be a float"))?;
            self.confidence_threshold = value;
        }
        if let Ok(classes) = std::env::var("SENTINEL_CLASSES") {
            let parsed = parse_class_list(&classes)?;
            if !parsed.is_empty() {
                self.class_overrides.extend(parsed);
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if !self.confidence_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.confidence_threshold)
        {
            return Err(anyhow!("confidence_threshold must be within [0.0, 1.0]"));
        }
        for (name, _) in &self.class_overrides {
            validate_class_name(&name.trim().to_lowercase())?;
        }
        Ok(())
    }

    /// Classification table for this deployment: the default maritime table
    /// merged with any configured overrides.
    pub fn classification_table(&self) -> Result<ClassificationTable> {
        ClassificationTable::maritime_default().with_overrides(self.class_overrides.iter().cloned())
    }
}

fn read_config_file(path: &Path) -> Result<SentineldConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

/// Parse "name=LEVEL,name=LEVEL" entries from the environment.
fn parse_class_list(value: &str) -> Result<Vec<(String, ThreatLevel)>> {
    let mut out = Vec::new();
    for entry in value.split(',').map(|e| e.trim()).filter(|e| !e.is_empty()) {
        let (name, level) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("class entries must be name=LEVEL, got '{}'", entry))?;
        out.push((name.trim().to_string(), level.trim().parse::<ThreatLevel>()?));
    }
    Ok(out)
}
