// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Agent configuration with validation.
//!
//! Supports both programmatic and file-based (TOML) configuration.
//!
//! ```toml
//! max_clients = 32
//! read_timeout_ms = 20
//! log_level = "debug"
//!
//! [profiles]
//! my_participant = "<dds><participant><rtps><name>my</name></rtps></participant></dds>"
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::XrceError;

/// Configuration for the XRCE agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum concurrent clients (default: 128).
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Timeout for one-shot middleware reads, in milliseconds (default: 10).
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Sample count used when a read request carries no delivery control.
    #[serde(default = "default_max_samples")]
    pub default_max_samples: u16,

    /// Upper bound applied to client-requested byte rates (0 = no cap).
    #[serde(default)]
    pub max_bytes_per_second_cap: u32,

    /// Maximum `log` level the agent emits (`off`, `error` ... `trace`).
    /// Applied when the agent is built.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Reference name -> XML profile table.
    #[serde(default = "ReferenceProfiles::builtin")]
    pub profiles: ReferenceProfiles,
}

fn default_max_clients() -> usize {
    128
}

fn default_read_timeout_ms() -> u64 {
    10
}

fn default_max_samples() -> u16 {
    1
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_clients: default_max_clients(),
            read_timeout_ms: default_read_timeout_ms(),
            default_max_samples: default_max_samples(),
            max_bytes_per_second_cap: 0,
            log_level: default_log_level(),
            profiles: ReferenceProfiles::builtin(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, XrceError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, XrceError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed `log_level`.
    pub fn level_filter(&self) -> Result<log::LevelFilter, XrceError> {
        self.log_level
            .trim()
            .parse()
            .map_err(|_| XrceError::Config(format!("unknown log_level: {:?}", self.log_level)))
    }

    /// Cap the `log` facade at the configured level.
    pub fn apply_log_level(&self) -> Result<(), XrceError> {
        log::set_max_level(self.level_filter()?);
        Ok(())
    }

    /// Validate configuration. Returns Ok(()) if valid.
    pub fn validate(&self) -> Result<(), XrceError> {
        if self.max_clients == 0 {
            return Err(XrceError::Config("max_clients must be > 0".into()));
        }
        if self.read_timeout_ms == 0 {
            return Err(XrceError::Config("read_timeout_ms must be > 0".into()));
        }
        if self.default_max_samples == 0 {
            return Err(XrceError::Config("default_max_samples must be > 0".into()));
        }
        self.level_filter()?;
        if let Some(name) = self.profiles.names().find(|n| n.trim().is_empty()) {
            return Err(XrceError::Config(format!(
                "profile name must not be blank: {:?}",
                name
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reference profiles
// ---------------------------------------------------------------------------

/// Table of named XML profiles used to resolve `Representation::Reference`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceProfiles {
    entries: BTreeMap<String, String>,
}

impl ReferenceProfiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default XRCE profiles available to every agent.
    pub fn builtin() -> Self {
        let mut p = Self::new();
        p.insert(
            "default_xrce_participant",
            "<dds><participant><rtps><name>default_xrce_participant</name></rtps></participant></dds>",
        );
        p.insert(
            "default_xrce_participant_two",
            "<dds><participant><rtps><name>default_xrce_participant_two</name></rtps></participant></dds>",
        );
        p.insert(
            "shapetype_topic",
            "<dds><topic><kind>WITH_KEY</kind><name>Square</name><dataType>ShapeType</dataType></topic></dds>",
        );
        p.insert(
            "helloworld_topic",
            "<dds><topic><name>HelloWorldTopic</name><dataType>HelloWorld</dataType></topic></dds>",
        );
        p.insert(
            "shapetype_data_writer",
            endpoint_profile("data_writer", "Square", "ShapeType", 5).as_str(),
        );
        p.insert(
            "shapetype_data_writer_two",
            endpoint_profile("data_writer", "Square", "ShapeType", 10).as_str(),
        );
        p.insert(
            "shapetype_data_reader",
            endpoint_profile("data_reader", "Square", "ShapeType", 5).as_str(),
        );
        p.insert(
            "shapetype_data_reader_two",
            endpoint_profile("data_reader", "Square", "ShapeType", 10).as_str(),
        );
        p
    }

    pub fn insert(&mut self, name: impl Into<String>, xml: impl Into<String>) {
        self.entries.insert(name.into(), xml.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn endpoint_profile(tag: &str, topic: &str, type_name: &str, depth: u32) -> String {
    format!(
        "<dds><{tag}><topic><kind>WITH_KEY</kind><name>{topic}</name><dataType>{type_name}</dataType>\
         <historyQos><kind>KEEP_LAST</kind><depth>{depth}</depth></historyQos></topic>\
         <qos><reliability><kind>RELIABLE</kind></reliability></qos></{tag}></dds>"
    )
}
