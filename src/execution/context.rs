use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ops::custom::CustomOpDomain;

/// Flat string options for one execution provider
pub type ProviderOptions = BTreeMap<String, String>;

/// A requested execution provider and its options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    #[serde(default)]
    pub options: ProviderOptions,
}

impl ProviderConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            options: ProviderOptions::new(),
        }
    }

    /// Add an option
    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }
}

/// Options for creating an inference session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Providers in priority order; empty means CPU only
    pub providers: Vec<ProviderConfig>,
    /// Run schema validation before planning
    pub validate_graph: bool,
    /// Log per-node execution times at debug level
    pub enable_profiling: bool,
    /// Prefix for this session's log lines
    pub log_id: String,
    #[serde(skip)]
    pub custom_op_domains: Vec<CustomOpDomain>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            validate_graph: true,
            enable_profiling: false,
            log_id: String::new(),
            custom_op_domains: Vec::new(),
        }
    }
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair provider names with their option maps.
    ///
    /// `options` is either empty or has exactly one entry per provider.
    pub fn from_candidates(providers: &[&str], options: &[ProviderOptions]) -> Result<Self> {
        if !options.is_empty() && options.len() != providers.len() {
            return Err(Error::InvalidConfig(format!(
                "{} provider option maps given for {} providers",
                options.len(),
                providers.len()
            )));
        }

        let providers = providers
            .iter()
            .enumerate()
            .map(|(i, name)| ProviderConfig {
                name: name.to_string(),
                options: options.get(i).cloned().unwrap_or_default(),
            })
            .collect();

        Ok(Self {
            providers,
            ..Self::default()
        })
    }

    /// Read options from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Append a provider
    pub fn with_provider(mut self, provider: ProviderConfig) -> Self {
        self.providers.push(provider);
        self
    }

    /// Make a custom operator domain available to the session
    pub fn add_custom_op_domain(mut self, domain: CustomOpDomain) -> Self {
        self.custom_op_domains.push(domain);
        self
    }

    /// Enable or disable schema validation
    pub fn set_validate_graph(mut self, validate: bool) -> Self {
        self.validate_graph = validate;
        self
    }

    /// Enable or disable profiling
    pub fn enable_profiling(mut self, enable: bool) -> Self {
        self.enable_profiling = enable;
        self
    }

    pub fn set_log_id(mut self, log_id: &str) -> Self {
        self.log_id = log_id.to_string();
        self
    }
}
