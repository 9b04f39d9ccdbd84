//! Configuration for building reference trees
//!
//! `TreeConfig` carries the long-lived settings (how deep to render), while
//! `TreeOptions` is what a single call to `build_tree_of_references` receives.
use crate::models::EntityStatus;
use serde::{Deserialize, Serialize};

/// Hard traversal limit, independent of any configured max level
///
/// Guarantees termination on pathological graphs where per-path cycle detection
/// is not enough.
pub const FAILSAFE_MAX_DEPTH: usize = 20;

/// Max level used when references are rendered inline in the entry editor
pub const INLINE_MAX_LEVEL: usize = 5;

/// Max level used by the dedicated references tab
pub const FULL_TAB_MAX_LEVEL: usize = 10;

/// Environment variable overriding `TreeConfig::max_level`
pub const MAX_LEVEL_ENV: &str = "REFGRAPH_MAX_LEVEL";

/// Long-lived tree settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeConfig {
    /// Level past which references collapse into a "+more" placeholder
    pub max_level: usize,

    /// Seed every reference as selected when a tree is built
    pub select_all_by_default: bool,

    /// Statuses considered when seeding selection (empty = all)
    #[serde(default)]
    pub selected_states: Vec<EntityStatus>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::inline()
    }
}

impl TreeConfig {
    pub fn inline() -> Self {
        Self {
            max_level: INLINE_MAX_LEVEL,
            select_all_by_default: true,
            selected_states: Vec::new(),
        }
    }

    pub fn full_tab() -> Self {
        Self {
            max_level: FULL_TAB_MAX_LEVEL,
            ..Self::inline()
        }
    }

    /// Default config with `REFGRAPH_MAX_LEVEL` applied, if set
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();
        if let Ok(raw) = std::env::var(MAX_LEVEL_ENV) {
            config.max_level = raw
                .trim()
                .parse()
                .map_err(|_| format!("{} must be a positive integer, got '{}'", MAX_LEVEL_ENV, raw))?;
            tracing::info!("Using max level from {}: {}", MAX_LEVEL_ENV, config.max_level);
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_level == 0 {
            return Err("max_level must be greater than 0".to_string());
        }

        if self.max_level >= FAILSAFE_MAX_DEPTH {
            return Err(format!(
                "max_level must be below the failsafe depth of {}",
                FAILSAFE_MAX_DEPTH
            ));
        }

        Ok(())
    }

    /// Options for one build, seeded from this config
    pub fn options(&self) -> TreeOptions {
        TreeOptions {
            max_level: self.max_level,
            are_all_references_selected: self.select_all_by_default,
            selected_states: self.selected_states.clone(),
        }
    }
}

/// Per-call options for `build_tree_of_references`
#[derive(Debug, Clone, PartialEq)]
pub struct TreeOptions {
    pub max_level: usize,
    pub are_all_references_selected: bool,
    pub selected_states: Vec<EntityStatus>,
}

impl Default for TreeOptions {
    fn default() -> Self {
        TreeConfig::default().options()
    }
}

impl TreeOptions {
    pub fn with_max_level(max_level: usize) -> Self {
        Self {
            max_level,
            ..Self::default()
        }
    }
}
