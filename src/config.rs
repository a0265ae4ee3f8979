//! Skill settings, read from a JSON file
use std::{collections::BTreeMap, fs, path::Path};

use crate::{
    environment::{normalize_aliases, EnvironmentConfig},
    error::Result,
};

pub const DEFAULT_DISCOVER_SECONDS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SkillConfig {
    /// Length of each network scan
    pub discover_seconds: u64,
    pub bind: Option<String>,
    /// Spoken name to device name, keyed in lowercase once loaded
    pub aliases: BTreeMap<String, String>,
}

impl Default for SkillConfig {
    fn default() -> Self {
        SkillConfig {
            discover_seconds: DEFAULT_DISCOVER_SECONDS,
            bind: None,
            aliases: BTreeMap::new(),
        }
    }
}

impl SkillConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<SkillConfig> {
        Self::from_json(&fs::read_to_string(path)?)
    }

    pub fn from_json(data: &str) -> Result<SkillConfig> {
        let mut config: SkillConfig = serde_json::from_str(data)?;
        config.aliases = normalize_aliases(config.aliases);
        Ok(config)
    }

    pub fn environment(&self) -> EnvironmentConfig {
        EnvironmentConfig {
            bind: self.bind.clone(),
            aliases: self.aliases.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_missing_fields() {
        let config = SkillConfig::from_json(r#"{"aliases": {"tea": "Kitchen Kettle"}}"#).unwrap();

        assert_eq!(DEFAULT_DISCOVER_SECONDS, config.discover_seconds);
        assert_eq!(None, config.bind);
        assert_eq!(Some(&String::from("Kitchen Kettle")), config.aliases.get("tea"));
    }

    #[test]
    fn test_full_config() {
        let config =
            SkillConfig::from_json(r#"{"discover_seconds": 10, "bind": "192.168.1.10:0"}"#).unwrap();

        assert_eq!(10, config.discover_seconds);
        assert_eq!(Some(String::from("192.168.1.10:0")), config.environment().bind);
    }

    #[test]
    fn test_alias_keys_lowercased() {
        let config = SkillConfig::from_json(
            r#"{"aliases": {"Tea": "Kitchen Kettle", "tea": "Kettle", "Big Lamp": "Living Room Lamp"}}"#,
        )
        .unwrap();

        assert_eq!(2, config.aliases.len());
        assert_eq!(Some(&String::from("Kettle")), config.aliases.get("tea"));
        assert_eq!(Some(&String::from("Living Room Lamp")), config.environment().aliases.get("big lamp"));
    }

    #[test]
    fn test_invalid_config() {
        assert!(SkillConfig::from_json(r#"{"discover_seconds": "soon"}"#).is_err());
        assert!(SkillConfig::load("/nonexistent/wemo-skill.json").is_err());
    }
}
