use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::errors::{DeckhandError, Result};

/// Name of the project manifest, resolved relative to the working directory.
pub const DEFAULT_MANIFEST_FILE: &str = "deckhand.yml";

pub const DEFAULT_FOUNDRY_DIR: &str = "foundry";
pub const DEFAULT_OUT_DIR: &str = "out";
pub const DEFAULT_BROADCAST_DIR: &str = "broadcast";
pub const DEFAULT_SCRIPT_TARGET: &str = "script/DeployAll.s.sol:DeployAll";
pub const DEFAULT_ENV_FILE: &str = ".env";

pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Dotenv variable holding the password-encrypted deployer keystore.
pub const ENCRYPTED_KEY_ENV: &str = "DEPLOYER_PRIVATE_KEY_ENCRYPTED";
/// Plaintext override, read from the process environment only.
pub const RUNTIME_KEY_ENV: &str = "RUNTIME_DEPLOYER_PRIVATE_KEY";
pub const RPC_URL_ENV: &str = "RPC_URL";

/// Pre-funded dev-node account. Insecure, well-known placeholder: never use
/// it beyond local testing.
pub const DEV_SECRET_KEY: &str =
    "0x5fb92d6e98884f76de468fa3f6278f8807c48bebc13595d45af5bdc4da702133";

/// Chain ids probed first when locating broadcast logs without an explicit
/// chain id: local dev node, then the Polkadot Hub testnets this toolkit is
/// commonly pointed at. Any other chain directory present is considered
/// afterwards, most recently modified first.
pub const PRIORITY_CHAIN_IDS: [&str; 4] = ["31337", "420420420", "420420422", "420420418"];

/// Constructor argument placeholder substituted with the deployer address.
pub const DEPLOYER_PLACEHOLDER: &str = "$deployer";

/// The `deckhand.yml` project manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub name: Option<String>,
    #[serde(default = "default_foundry_dir")]
    pub foundry_dir: String,
    #[serde(default = "default_script_target")]
    pub script_target: String,
    #[serde(default)]
    pub networks: IndexMap<String, NetworkConfig>,
    #[serde(default)]
    pub contracts: Vec<ContractSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: String,
    pub chain_id: Option<String>,
}

/// One contract to deploy, in order of declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractSpec {
    pub name: String,
    /// Source file stem when it differs from the contract name
    /// (e.g. `ERC20Token` compiled from `ERC20.sol`).
    #[serde(default)]
    pub source_file: Option<String>,
    #[serde(default)]
    pub constructor_args: Vec<String>,
}

impl ContractSpec {
    pub fn new(name: &str, source_file: Option<&str>, constructor_args: &[&str]) -> Self {
        ContractSpec {
            name: name.to_string(),
            source_file: source_file.map(|s| s.to_string()),
            constructor_args: constructor_args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn default_foundry_dir() -> String {
    DEFAULT_FOUNDRY_DIR.to_string()
}

fn default_script_target() -> String {
    DEFAULT_SCRIPT_TARGET.to_string()
}

impl Default for ProjectManifest {
    fn default() -> Self {
        ProjectManifest {
            name: None,
            foundry_dir: default_foundry_dir(),
            script_target: default_script_target(),
            networks: IndexMap::new(),
            contracts: Vec::new(),
        }
    }
}

impl ProjectManifest {
    /// Projects without a `deckhand.yml` get the stock scaffold defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            ProjectManifest::from_file(path)
        } else {
            Ok(ProjectManifest::default())
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            DeckhandError::Config(format!("unable to read manifest {}: {}", path.display(), e))
        })?;
        let manifest: ProjectManifest = serde_yml::from_slice(&bytes).map_err(|e| {
            DeckhandError::Config(format!("invalid manifest {}: {}", path.display(), e))
        })?;
        Ok(manifest)
    }

    /// The contract set of the stock scaffold, used when the manifest does
    /// not declare any.
    pub fn default_contracts() -> Vec<ContractSpec> {
        vec![
            ContractSpec::new(
                "ERC20Token",
                Some("ERC20"),
                &["MyToken", "MTK", "1000000000000000000000000"],
            ),
            ContractSpec::new("ERC721Token", Some("ERC721"), &["MyNFT", "MNFT"]),
            ContractSpec::new("YourContract", None, &[DEPLOYER_PLACEHOLDER]),
        ]
    }
}

/// Resolved settings passed into every entry point. No module-level state:
/// environment fallbacks are applied once, here.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub foundry_dir: PathBuf,
    pub script_target: String,
    pub rpc_url: String,
    /// Explicit chain id override, used when the invoking context cannot
    /// discover the chain id itself.
    pub chain_id: Option<String>,
    pub contracts: Vec<ContractSpec>,
    pub env_file: PathBuf,
}

impl DeployConfig {
    pub fn from_manifest(
        manifest: &ProjectManifest,
        project_root: &Path,
        network: Option<&str>,
        rpc_url_override: Option<&str>,
        chain_id_override: Option<&str>,
    ) -> Result<Self> {
        let network_config = match network {
            Some(name) => Some(manifest.networks.get(name).ok_or_else(|| {
                DeckhandError::Config(format!("network '{}' not found in manifest", name))
            })?),
            None => None,
        };

        let rpc_url = rpc_url_override
            .map(|u| u.to_string())
            .or_else(|| network_config.map(|n| n.rpc_url.clone()))
            .or_else(|| std::env::var(RPC_URL_ENV).ok())
            .unwrap_or_else(|| DEFAULT_RPC_URL.to_string());

        let chain_id = chain_id_override
            .map(|c| c.to_string())
            .or_else(|| network_config.and_then(|n| n.chain_id.clone()));

        let contracts = if manifest.contracts.is_empty() {
            ProjectManifest::default_contracts()
        } else {
            manifest.contracts.clone()
        };

        Ok(DeployConfig {
            foundry_dir: project_root.join(&manifest.foundry_dir),
            script_target: manifest.script_target.clone(),
            rpc_url,
            chain_id,
            contracts,
            env_file: project_root.join(DEFAULT_ENV_FILE),
        })
    }

    pub fn out_dir(&self) -> PathBuf {
        self.foundry_dir.join(DEFAULT_OUT_DIR)
    }

    /// A locator over this project's out directory, seeded with the
    /// manifest-declared source-file overrides.
    pub fn artifact_locator(&self) -> crate::artifacts::ArtifactLocator {
        let mut locator = crate::artifacts::ArtifactLocator::new(&self.out_dir());
        for spec in &self.contracts {
            if let Some(stem) = &spec.source_file {
                locator = locator.with_source_file(&spec.name, stem);
            }
        }
        locator
    }

    pub fn broadcast_dir(&self) -> PathBuf {
        self.foundry_dir.join(DEFAULT_BROADCAST_DIR)
    }

    /// `forge` nests broadcast logs under the script file name, without the
    /// `:Contract` selector suffix.
    pub fn script_log_dir(&self) -> PathBuf {
        let file = self
            .script_target
            .split(':')
            .next()
            .and_then(|path| path.rsplit('/').next())
            .unwrap_or(self.script_target.as_str());
        self.broadcast_dir().join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_MANIFEST: &str = r#"
name: my-dapp
foundry_dir: foundry
networks:
  localhost:
    rpc_url: http://127.0.0.1:8545
  paseo:
    rpc_url: https://testnet-passet-hub-eth-rpc.polkadot.io
    chain_id: "420420422"
contracts:
  - name: ERC20Token
    source_file: ERC20
    constructor_args: ["MyToken", "MTK", "1000000000000000000000000"]
  - name: YourContract
    constructor_args: ["$deployer"]
"#;

    #[test]
    fn manifest_parses_networks_and_contracts() {
        let manifest: ProjectManifest = serde_yml::from_str(SAMPLE_MANIFEST).unwrap();
        assert_eq!(manifest.script_target, DEFAULT_SCRIPT_TARGET);
        assert_eq!(manifest.networks.len(), 2);
        assert_eq!(manifest.networks["paseo"].chain_id.as_deref(), Some("420420422"));
        assert_eq!(manifest.contracts[0].source_file.as_deref(), Some("ERC20"));
        assert_eq!(manifest.contracts[1].constructor_args, vec![DEPLOYER_PLACEHOLDER]);
    }

    #[test]
    fn network_selection_resolves_rpc_and_chain_id() {
        let manifest: ProjectManifest = serde_yml::from_str(SAMPLE_MANIFEST).unwrap();
        let config = DeployConfig::from_manifest(
            &manifest,
            Path::new("/tmp/project"),
            Some("paseo"),
            None,
            None,
        )
        .unwrap();
        assert_eq!(config.rpc_url, "https://testnet-passet-hub-eth-rpc.polkadot.io");
        assert_eq!(config.chain_id.as_deref(), Some("420420422"));
        assert_eq!(config.foundry_dir, PathBuf::from("/tmp/project/foundry"));
    }

    #[test]
    fn unknown_network_is_a_config_error() {
        let manifest: ProjectManifest = serde_yml::from_str(SAMPLE_MANIFEST).unwrap();
        let err = DeployConfig::from_manifest(
            &manifest,
            Path::new("/tmp/project"),
            Some("mainnet"),
            None,
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("network 'mainnet' not found"));
    }

    #[test]
    fn overrides_win_over_manifest() {
        let manifest: ProjectManifest = serde_yml::from_str(SAMPLE_MANIFEST).unwrap();
        let config = DeployConfig::from_manifest(
            &manifest,
            Path::new("/tmp/project"),
            Some("paseo"),
            Some("http://10.0.0.1:8545"),
            Some("31337"),
        )
        .unwrap();
        assert_eq!(config.rpc_url, "http://10.0.0.1:8545");
        assert_eq!(config.chain_id.as_deref(), Some("31337"));
    }

    #[test]
    fn script_log_dir_strips_the_contract_selector() {
        let manifest: ProjectManifest = serde_yml::from_str(SAMPLE_MANIFEST).unwrap();
        let config =
            DeployConfig::from_manifest(&manifest, Path::new("/p"), None, None, None).unwrap();
        assert_eq!(config.script_log_dir(), PathBuf::from("/p/foundry/broadcast/DeployAll.s.sol"));
    }
}
