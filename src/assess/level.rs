use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use serde::{Deserialize, Serialize};

/// Ordered severity assigned to a detection's class.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ThreatLevel {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    /// Weight of this level in a detection's score contribution.
    pub fn weight(self) -> f64 {
        match self {
            ThreatLevel::None => 0.0,
            ThreatLevel::Low => 0.25,
            ThreatLevel::Medium => 0.5,
            ThreatLevel::High => 0.75,
            ThreatLevel::Critical => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ThreatLevel::None => "NONE",
            ThreatLevel::Low => "LOW",
            ThreatLevel::Medium => "MEDIUM",
            ThreatLevel::High => "HIGH",
            ThreatLevel::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThreatLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_uppercase().as_str() {
            "NONE" => Ok(ThreatLevel::None),
            "LOW" => Ok(ThreatLevel::Low),
            "MEDIUM" => Ok(ThreatLevel::Medium),
            "HIGH" => Ok(ThreatLevel::High),
            "CRITICAL" => Ok(ThreatLevel::Critical),
            other => Err(anyhow!("unknown threat level '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered() {
        assert!(ThreatLevel::None < ThreatLevel::Low);
        assert!(ThreatLevel::Low < ThreatLevel::Medium);
        assert!(ThreatLevel::Medium < ThreatLevel::High);
        assert!(ThreatLevel::High < ThreatLevel::Critical);
    }

    #[test]
    fn weights_track_ordering() {
        let levels = [
            ThreatLevel::None,
            ThreatLevel::Low,
            ThreatLevel::Medium,
            ThreatLevel::High,
            ThreatLevel::Critical,
        ];
        for pair in levels.windows(2) {
            assert!(pair[0].weight() < pair[1].weight());
        }
        assert_eq!(ThreatLevel::None.weight(), 0.0);
        assert_eq!(ThreatLevel::Critical.weight(), 1.0);
    }

    #[test]
    fn serializes_as_uppercase_names() {
        assert_eq!(
            serde_json::to_string(&ThreatLevel::Critical).unwrap(),
            r#""CRITICAL""#
        );
        assert_eq!(
            serde_json::from_str::<ThreatLevel>(r#""MEDIUM""#).unwrap(),
            ThreatLevel::Medium
        );
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("critical".parse::<ThreatLevel>().unwrap(), ThreatLevel::Critical);
        assert_eq!(" High ".parse::<ThreatLevel>().unwrap(), ThreatLevel::High);
        assert!("severe".parse::<ThreatLevel>().is_err());
    }
}
