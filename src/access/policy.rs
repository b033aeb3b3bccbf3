//! YAML role-grant overrides.
//!
//! ```yaml
//! leaves:
//!   admin: [create, read, update, delete]
//!   employee: [read]
//! ```
//!
//! A resource listed in the file has its grants replaced wholesale; unlisted
//! resources keep their built-in grants.

use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::resources::{Grants, ResourceRegistry};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Failed to read policy file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid policy file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

pub fn parse_policy(yaml: &str) -> Result<BTreeMap<String, Grants>, serde_yaml::Error> {
    serde_yaml::from_str(yaml)
}

/// Read the policy file and apply it to `registry`
pub fn load_policy(registry: &mut ResourceRegistry, path: impl AsRef<Path>) -> Result<(), PolicyError> {
    let path = path.as_ref();
    let shown = path.display().to_string();

    let raw = std::fs::read_to_string(path).map_err(|source| PolicyError::Io {
        path: shown.clone(),
        source,
    })?;
    let grants = parse_policy(&raw).map_err(|source| PolicyError::Parse {
        path: shown.clone(),
        source,
    })?;

    let count = grants.len();
    for unknown in registry.replace_grants(grants) {
        warn!("Policy file {} names unknown resource '{}'", shown, unknown);
    }
    info!("Applied access policy for {} resources from {}", count, shown);
    Ok(())
}
