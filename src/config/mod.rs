//! Configuration module for scope-link
//!
//! The whole configuration is one [`ScopeConfig`] made of independent
//! sections (see [`settings`]). It can be read from TOML (the default) or
//! JSON, chosen by file extension:
//!
//! ```toml
//! [pipeline]
//! channel_count = 2
//! trigger_level = 12
//!
//! [queues.data]
//! capacity = 64
//! overflow = "drop_oldest"
//!
//! [synthetic]
//! enabled = true
//! ```
//!
//! # Example
//!
//! ```ignore
//! use scope_link::config::ScopeConfig;
//!
//! let config = ScopeConfig::load("scope.toml")?;
//! config.validate()?;
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{Result, ResultExt, ScopeLinkError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default config file name looked up by the binary
pub const DEFAULT_CONFIG_FILE: &str = "scope-link.toml";

// ==================== Queue Set ====================

/// Sizing for every hand-off queue the pipeline uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueSet {
    /// Acquisition source → Trigger
    pub data: QueueConfig,
    /// Trigger → Processor
    pub trigger: QueueConfig,
    /// Processor → PostProcessor
    pub processor: QueueConfig,
    /// Host → controller commands
    pub inbound: QueueConfig,
    /// Pipeline/controller → host packets
    pub outbound: QueueConfig,
}

// ==================== Scope Config ====================

/// Complete controller configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub pipeline: PipelineConfig,
    pub queues: QueueSet,
    pub synthetic: SyntheticConfig,
}

impl ScopeConfig {
    /// Load a config file from disk (JSON if the extension is `.json`, TOML otherwise)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScopeLinkError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config: Self = if is_json {
            serde_json::from_str(&content).map_err(|e| {
                ScopeLinkError::Config(format!("Failed to parse config file {:?}: {}", path, e))
            })?
        } else {
            toml::from_str(&content)?
        };

        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load a config file, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Save as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("Failed to create config directory")?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ScopeLinkError::Serialization(e.to_string()))?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {:?}", path))
    }

    /// Reject configurations the pipeline cannot start with
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate().map_err(ScopeLinkError::Config)?;
        self.synthetic.validate().map_err(ScopeLinkError::Config)?;
        Ok(())
    }
}

// ==================== Tests ====================
