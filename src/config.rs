//! Decode configuration
//!
//! [`DecodeOptions`] carries everything a decode pass can be tuned with. It
//! deserializes from YAML with every field optional:
//!
//! ```yaml
//! type_filter: [ATT, GPS]
//! batch_size: 1024
//! max_resync_distance: 65536
//! timestamp_prefix: true
//! dictionary_path: /etc/flightlog/messages.yaml
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::mavlink::MessageDictionary;
use crate::{LogError, Result};

/// Options for one decode pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodeOptions {
    /// Only deliver records of these type names (all types when absent)
    #[serde(default)]
    pub type_filter: Option<Vec<String>>,

    /// Records per `Messages` event (default: 4096)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Give up a resync scan after this many bytes (default: rest of the buffer)
    #[serde(default)]
    pub max_resync_distance: Option<usize>,

    /// Whether MAVLink frames carry an 8-byte timestamp prefix (default: from the hint)
    #[serde(default)]
    pub timestamp_prefix: Option<bool>,

    /// YAML message dictionary replacing the built-in MAVLink definitions
    #[serde(default)]
    pub dictionary_path: Option<PathBuf>,

    /// Name reported in session metadata
    #[serde(default)]
    pub file_name: Option<String>,

    /// Preloaded dictionary, takes precedence over `dictionary_path`
    #[serde(skip)]
    pub dictionary: Option<Arc<MessageDictionary>>,
}

fn default_batch_size() -> usize {
    4096
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            type_filter: None,
            batch_size: default_batch_size(),
            max_resync_distance: None,
            timestamp_prefix: None,
            dictionary_path: None,
            file_name: None,
            dictionary: None,
        }
    }
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let options: Self =
            serde_yaml_ng::from_str(yaml).map_err(|e| LogError::Config { details: e.to_string() })?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| LogError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(LogError::Config { details: "batch_size must be at least 1".to_string() });
        }
        if self.max_resync_distance == Some(0) {
            return Err(LogError::Config {
                details: "max_resync_distance must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }

    pub fn with_type_filter<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.type_filter = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_resync_distance(mut self, distance: usize) -> Self {
        self.max_resync_distance = Some(distance);
        self
    }

    pub fn with_timestamp_prefix(mut self, prefixed: bool) -> Self {
        self.timestamp_prefix = Some(prefixed);
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_dictionary(mut self, dictionary: Arc<MessageDictionary>) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn with_dictionary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dictionary_path = Some(path.into());
        self
    }

    /// The type filter as a lookup set.
    pub fn filter_set(&self) -> Option<HashSet<String>> {
        self.type_filter.as_ref().map(|names| names.iter().cloned().collect())
    }

    /// Dictionary for MAVLink decoding: preloaded, then from file, then built in.
    pub fn resolve_dictionary(&self) -> Result<Arc<MessageDictionary>> {
        if let Some(dictionary) = &self.dictionary {
            return Ok(Arc::clone(dictionary));
        }
        match &self.dictionary_path {
            Some(path) => MessageDictionary::from_yaml_file(path).map(Arc::new),
            None => MessageDictionary::builtin(),
        }
    }
}
