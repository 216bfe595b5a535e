// Copyright (c) 2025 - Cowboy AI, Inc.
//! Plan configuration

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::Tags;

/// Provider settings stamped onto every emitted plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanConfig {
    /// Provider the engine targets
    pub provider: String,
    /// Region of the plan; default peer region of peering links
    pub region: String,
    /// Tags merged under each taggable entity's own tags
    #[serde(default)]
    pub default_tags: Tags,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            provider: "aws".to_string(),
            region: "eu-west-1".to_string(),
            default_tags: Tags::new(),
        }
    }
}

impl PlanConfig {
    /// Load configuration from environment variables
    ///
    /// - `TOPOLOGY_PROVIDER` (default `aws`)
    /// - `TOPOLOGY_REGION` (default `eu-west-1`)
    /// - `TOPOLOGY_DEFAULT_TAGS`: comma-separated `key=value` pairs
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let provider = std::env::var("TOPOLOGY_PROVIDER").unwrap_or(defaults.provider);
        let region = std::env::var("TOPOLOGY_REGION").unwrap_or(defaults.region);
        let default_tags = std::env::var("TOPOLOGY_DEFAULT_TAGS")
            .map(|raw| parse_tags(&raw))
            .unwrap_or_default();

        Self {
            provider,
            region,
            default_tags,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_default_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_tags.insert(key.into(), value.into());
        self
    }

    /// Default tags overlaid with an entity's own tags
    pub fn merged_tags(&self, own: &Tags) -> Tags {
        let mut tags = self.default_tags.clone();
        tags.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
        tags
    }
}

/// Parse `key=value,key=value`; malformed pairs are skipped
pub fn parse_tags(raw: &str) -> Tags {
    let mut tags = Tags::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                tags.insert(key.trim().to_string(), value.trim().to_string());
            }
            _ => warn!("Skipping malformed default tag: {:?}", pair),
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlanConfig::default();
        assert_eq!(config.provider, "aws");
        assert_eq!(config.region, "eu-west-1");
        assert!(config.default_tags.is_empty());
    }

    #[test]
    fn test_parse_tags_skips_malformed() {
        let tags = parse_tags("stack=bastion, owner = ops ,broken,=nokey,");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["stack"], "bastion");
        assert_eq!(tags["owner"], "ops");
    }

    #[test]
    fn test_entity_tags_win() {
        let config = PlanConfig::default()
            .with_default_tag("Name", "default")
            .with_default_tag("env", "eu");
        let mut own = Tags::new();
        own.insert("Name".to_string(), "fh-eu-bst".to_string());

        let merged = config.merged_tags(&own);
        assert_eq!(merged["Name"], "fh-eu-bst");
        assert_eq!(merged["env"], "eu");
    }
}
