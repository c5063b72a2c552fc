//! BSF Configuration
//!
//! YAML configuration: session pool size and statically provisioned
//! NF instance candidates.

use std::path::Path;

use ogs_sbi::{NfInstance, NfType};
use serde::{Deserialize, Serialize};

use crate::context::MAX_NUM_OF_SESS;
use crate::error::{BsfError, BsfResult};

/// Top-level configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BsfConfig {
    #[serde(default)]
    pub bsf: BsfSection,
}

/// `bsf:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BsfSection {
    #[serde(default = "default_max_sess")]
    pub max_sess: usize,
    #[serde(default)]
    pub nf_instances: Vec<NfInstanceConf>,
}

impl Default for BsfSection {
    fn default() -> Self {
        Self {
            max_sess: MAX_NUM_OF_SESS,
            nf_instances: Vec::new(),
        }
    }
}

fn default_max_sess() -> usize {
    MAX_NUM_OF_SESS
}

/// NF instance candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NfInstanceConf {
    pub id: String,
    pub nf_type: NfType,
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(default)]
    pub ipv4_addresses: Vec<String>,
    #[serde(default)]
    pub ipv6_addresses: Vec<String>,
    #[serde(default)]
    pub priority: u16,
    #[serde(default = "default_capacity")]
    pub capacity: u16,
}

fn default_capacity() -> u16 {
    100
}

impl NfInstanceConf {
    pub fn to_nf_instance(&self) -> NfInstance {
        let mut nf_instance = NfInstance::new(self.id.clone(), self.nf_type);
        nf_instance.fqdn = self.fqdn.clone();
        nf_instance.ipv4_addresses = self.ipv4_addresses.clone();
        nf_instance.ipv6_addresses = self.ipv6_addresses.clone();
        nf_instance.priority = self.priority;
        nf_instance.capacity = self.capacity;
        nf_instance
    }
}

impl BsfConfig {
    pub fn from_yaml_str(content: &str) -> BsfResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| BsfError::Config(format!("Invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file; a missing file yields the defaults
    pub fn from_file(path: impl AsRef<Path>) -> BsfResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("Configuration file not found: {}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| BsfError::Config(format!("{}: {e}", path.display())))?;
        log::debug!("Configuration file loaded ({} bytes)", content.len());
        Self::from_yaml_str(&content)
    }

    fn validate(&self) -> BsfResult<()> {
        if self.bsf.max_sess == 0 {
            return Err(BsfError::Config("bsf.max_sess must be positive".to_string()));
        }
        if let Some(conf) = self.bsf.nf_instances.iter().find(|c| c.id.is_empty()) {
            return Err(BsfError::Config(format!(
                "NF instance of type {} has no id",
                conf.nf_type
            )));
        }
        Ok(())
    }
}
