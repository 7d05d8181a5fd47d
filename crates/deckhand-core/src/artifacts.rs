use std::path::{Path, PathBuf};

use alloy::json_abi::JsonAbi;
use indexmap::IndexMap;

use crate::errors::{DeckhandError, Result};

/// Contracts whose declared name differs from their source file name.
const CONTRACT_SOURCE_FILES: [(&str, &str); 2] = [("ERC20Token", "ERC20"), ("ERC721Token", "ERC721")];

/// The `<out>/<file>.sol/<Contract>.json` payload produced by `forge build`.
/// Only the fields this toolkit consumes; everything else is ignored.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledArtifact {
    pub abi: JsonAbi,
    pub bytecode: BytecodeData,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BytecodeData {
    pub object: String,
}

impl CompiledArtifact {
    pub fn bytecode_bytes(&self) -> Result<Vec<u8>> {
        let stripped = self.bytecode.object.trim_start_matches("0x");
        alloy::hex::decode(stripped)
            .map_err(|e| DeckhandError::Config(format!("invalid artifact bytecode: {}", e)))
    }
}

/// Resolves a logical contract name to its compiled artifact by probing an
/// ordered list of candidate layouts under the foundry out directory.
///
/// Lookups are not cached: artifacts change between builds, so every call
/// re-reads from disk.
#[derive(Debug, Clone)]
pub struct ArtifactLocator {
    out_dir: PathBuf,
    source_files: IndexMap<String, String>,
}

impl ArtifactLocator {
    pub fn new(out_dir: &Path) -> Self {
        let source_files = CONTRACT_SOURCE_FILES
            .iter()
            .map(|(name, file)| (name.to_string(), file.to_string()))
            .collect();
        ArtifactLocator { out_dir: out_dir.to_path_buf(), source_files }
    }

    /// Registers a name → source-file-stem mapping, overriding the built-in
    /// table. Manifest-declared `source_file` entries land here.
    pub fn with_source_file(mut self, contract_name: &str, file_stem: &str) -> Self {
        self.source_files.insert(contract_name.to_string(), file_stem.to_string());
        self
    }

    /// Names absent from the table are treated as their own source stem.
    fn source_stem<'a>(&'a self, contract_name: &'a str) -> &'a str {
        self.source_files.get(contract_name).map(|s| s.as_str()).unwrap_or(contract_name)
    }

    /// Candidate layouts, probed in order until the first hit. Some projects
    /// keep sources under `contracts/`, which foundry mirrors in `out/`.
    pub fn candidate_paths(&self, contract_name: &str) -> Vec<PathBuf> {
        let sol_dir = format!("{}.sol", self.source_stem(contract_name));
        let file = format!("{}.json", contract_name);
        vec![
            self.out_dir.join("contracts").join(&sol_dir).join(&file),
            self.out_dir.join(&sol_dir).join(&file),
        ]
    }

    pub fn locate(&self, contract_name: &str) -> Result<CompiledArtifact> {
        let candidates = self.candidate_paths(contract_name);
        let Some(path) = candidates.iter().find(|p| p.exists()) else {
            return Err(DeckhandError::ArtifactNotFound {
                contract: contract_name.to_string(),
                tried: candidates,
            });
        };

        let bytes = std::fs::read(path)?;
        let artifact: CompiledArtifact = serde_json::from_slice(&bytes).map_err(|e| {
            DeckhandError::Config(format!("invalid artifact at {}: {}", path.display(), e))
        })?;
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL_ARTIFACT: &str = r#"{
        "abi": [
            {"type": "constructor", "inputs": [{"name": "owner", "type": "address", "internalType": "address"}], "stateMutability": "nonpayable"}
        ],
        "bytecode": {"object": "0x6080604052"}
    }"#;

    fn write_artifact(out_dir: &Path, sol_dir: &str, name: &str) {
        let dir = out_dir.join(sol_dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(format!("{}.json", name)), MINIMAL_ARTIFACT).unwrap();
    }

    #[test]
    fn locates_mapped_contract_in_first_layout() {
        let tmp = TempDir::new().unwrap();
        write_artifact(&tmp.path().join("contracts"), "ERC20.sol", "ERC20Token");

        let locator = ArtifactLocator::new(tmp.path());
        let artifact = locator.locate("ERC20Token").unwrap();
        assert_eq!(artifact.bytecode.object, "0x6080604052");
        assert!(artifact.abi.constructor.is_some());
    }

    #[test]
    fn falls_back_to_flat_layout() {
        let tmp = TempDir::new().unwrap();
        write_artifact(tmp.path(), "ERC721.sol", "ERC721Token");

        let locator = ArtifactLocator::new(tmp.path());
        assert!(locator.locate("ERC721Token").is_ok());
    }

    #[test]
    fn unmapped_name_uses_identity_stem() {
        let tmp = TempDir::new().unwrap();
        write_artifact(tmp.path(), "YourContract.sol", "YourContract");

        let locator = ArtifactLocator::new(tmp.path());
        assert!(locator.locate("YourContract").is_ok());
    }

    #[test]
    fn manifest_override_beats_builtin_table() {
        let tmp = TempDir::new().unwrap();
        write_artifact(tmp.path(), "Token.sol", "ERC20Token");

        let locator = ArtifactLocator::new(tmp.path()).with_source_file("ERC20Token", "Token");
        assert!(locator.locate("ERC20Token").is_ok());
    }

    #[test]
    fn missing_artifact_enumerates_every_probed_path() {
        let tmp = TempDir::new().unwrap();
        let locator = ArtifactLocator::new(tmp.path());
        let err = locator.locate("ERC20Token").unwrap_err();
        match &err {
            DeckhandError::ArtifactNotFound { contract, tried } => {
                assert_eq!(contract, "ERC20Token");
                assert_eq!(tried.len(), 2);
                assert!(tried[0].ends_with("contracts/ERC20.sol/ERC20Token.json"));
                assert!(tried[1].ends_with("ERC20.sol/ERC20Token.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bytecode_hex_decodes_with_and_without_prefix() {
        let artifact: CompiledArtifact = serde_json::from_str(MINIMAL_ARTIFACT).unwrap();
        assert_eq!(artifact.bytecode_bytes().unwrap(), vec![0x60, 0x80, 0x60, 0x40, 0x52]);
    }
}
