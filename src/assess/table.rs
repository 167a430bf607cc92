use std::collections::BTreeMap;
use std::sync::OnceLock;

use anyhow::{anyhow, Result};

use crate::assess::level::ThreatLevel;

/// A conforming class name is a lowercase model label: letters, digits,
/// spaces, and a small set of punctuation the detection models actually
/// emit in label names.
///
/// Allowed: "submarine", "auv-rov", "mines - v1 2025-05-15 8-03pm"
pub fn validate_class_name(name: &str) -> Result<()> {
    // Compile once for hot paths.
    static CLASS_NAME_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = CLASS_NAME_RE
        .get_or_init(|| regex::Regex::new(r"^[a-z0-9][a-z0-9 :()._-]{0,79}$").unwrap());

    let name = name.to_lowercase();
    if !re.is_match(&name) {
        return Err(anyhow!(
            "class name must match ^[a-z0-9][a-z0-9 :()._-]{{0,79}}$"
        ));
    }
    Ok(())
}

/// Immutable mapping from model class names to threat levels, loaded once at
/// construction.
///
/// Lookup is case-insensitive and falls back to the base label when the
/// model attaches a `:`-separated sub-label (e.g. "submarine:hull_2").
/// Unknown classes are not an error; callers classify them as NONE so novel
/// model outputs never abort processing.
#[derive(Clone, Debug)]
pub struct ClassificationTable {
    entries: BTreeMap<String, ThreatLevel>,
}

impl ClassificationTable {
    /// Threat classes of the underwater detection model.
    pub fn maritime_default() -> Self {
        let entries = [
            ("mines - v1 2025-05-15 8-03pm", ThreatLevel::Critical),
            ("mayin", ThreatLevel::Critical),
            ("mine", ThreatLevel::Critical),
            ("mines", ThreatLevel::Critical),
            ("submarine", ThreatLevel::High),
            ("auv-rov", ThreatLevel::Medium),
            ("auv", ThreatLevel::Medium),
            ("rov", ThreatLevel::Medium),
            ("divers", ThreatLevel::Low),
            ("diver", ThreatLevel::Low),
        ];
        Self {
            entries: entries
                .iter()
                .map(|(name, level)| (name.to_string(), *level))
                .collect(),
        }
    }

    /// Build a table from explicit entries. Keys are normalized to lowercase
    /// and validated against the class-name allowlist.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, ThreatLevel)>,
    {
        let table = Self {
            entries: BTreeMap::new(),
        };
        table.with_overrides(entries)
    }

    /// Merge additional entries over this table. Later entries win.
    pub fn with_overrides<I>(mut self, entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, ThreatLevel)>,
    {
        for (name, level) in entries {
            let normalized = name.trim().to_lowercase();
            validate_class_name(&normalized)?;
            self.entries.insert(normalized, level);
        }
        Ok(self)
    }

    /// Look up a model label. `None` means the class is unrecognized.
    pub fn lookup(&self, class_name: &str) -> Option<ThreatLevel> {
        let normalized = class_name.trim().to_lowercase();
        if let Some(level) = self.entries.get(&normalized) {
            return Some(*level);
        }
        // Sub-label format ("submarine:hull_2") falls back to the base label.
        let base = normalized.split(':').next().unwrap_or(&normalized);
        self.entries.get(base).copied()
    }

    /// Classify a model label. Unrecognized classes are NONE.
    pub fn classify(&self, class_name: &str) -> ThreatLevel {
        self.lookup(class_name).unwrap_or(ThreatLevel::None)
    }

    /// Recognized classes with their levels, in deterministic order.
    pub fn classes(&self) -> &BTreeMap<String, ThreatLevel> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
