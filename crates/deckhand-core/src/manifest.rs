use std::path::{Path, PathBuf};

use alloy::json_abi::JsonAbi;
use indexmap::IndexMap;

use crate::artifacts::ArtifactLocator;
use crate::broadcast::DeployedContracts;
use crate::errors::{DeckhandError, Result};

pub const DEPLOYMENTS_DIR: &str = "deployments";

/// What a frontend consumes per contract.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub address: String,
    pub abi: JsonAbi,
}

pub type ManifestEntries = IndexMap<String, ManifestEntry>;

/// Consumer-manifest collaborator. The reconciler's obligation is limited to
/// supplying a well-formed name → address map and a chain id; how the
/// manifest is materialized is up to the sink.
pub trait ManifestSink {
    fn publish(&self, chain_id: &str, entries: &ManifestEntries) -> Result<PathBuf>;
}

/// Joins deployed addresses with the ABIs from the compiled artifacts.
pub fn build_entries(
    locator: &ArtifactLocator,
    contracts: &DeployedContracts,
) -> Result<ManifestEntries> {
    let mut entries = ManifestEntries::new();
    for (name, address) in contracts {
        let artifact = locator.locate(name)?;
        entries.insert(name.clone(), ManifestEntry { address: address.clone(), abi: artifact.abi });
    }
    Ok(entries)
}

/// Writes `deployments/<chainId>.json`, one document per chain id.
pub struct JsonManifestSink {
    deployments_dir: PathBuf,
}

impl JsonManifestSink {
    pub fn new(project_root: &Path) -> Self {
        JsonManifestSink { deployments_dir: project_root.join(DEPLOYMENTS_DIR) }
    }
}

impl ManifestSink for JsonManifestSink {
    fn publish(&self, chain_id: &str, entries: &ManifestEntries) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.deployments_dir)?;
        let path = self.deployments_dir.join(format!("{}.json", chain_id));
        let rendered = serde_json::to_string_pretty(entries)
            .map_err(|e| DeckhandError::Config(format!("failed to render manifest: {}", e)))?;
        std::fs::write(&path, rendered)?;
        Ok(path)
    }
}
