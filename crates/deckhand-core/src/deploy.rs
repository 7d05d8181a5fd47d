use alloy::dyn_abi::{DynSolType, DynSolValue, JsonAbiExt};
use alloy::primitives::{Address, TxHash, U256};
use alloy_signer_local::PrivateKeySigner;

use crate::artifacts::{ArtifactLocator, CompiledArtifact};
use crate::config::{ContractSpec, DeployConfig, DEPLOYER_PLACEHOLDER};
use crate::errors::{DeckhandError, Result};
use crate::rpc::EvmRpc;

#[derive(Debug, Clone)]
pub struct DeployedContract {
    pub name: String,
    pub address: Address,
    pub tx_hash: TxHash,
}

/// In-process deployment driver: loads the compiled artifact for each spec,
/// submits a creation transaction over RPC and awaits inclusion.
///
/// There is no partial retry. When contract N of M fails, the whole run
/// aborts; contracts 1..N-1 stay deployed and were already reported to the
/// caller one by one.
pub struct ContractDeployer {
    rpc: EvmRpc,
    locator: ArtifactLocator,
}

impl ContractDeployer {
    pub fn new(config: &DeployConfig, signer: PrivateKeySigner) -> Result<Self> {
        let rpc = EvmRpc::new(&config.rpc_url, signer)?;
        Ok(ContractDeployer { rpc, locator: config.artifact_locator() })
    }

    pub fn deployer_address(&self) -> Address {
        self.rpc.sender()
    }

    pub async fn balance(&self) -> Result<U256> {
        self.rpc.get_balance().await
    }

    pub async fn chain_id(&self) -> Result<u64> {
        self.rpc.get_chain_id().await
    }

    pub fn load_artifact(&self, spec: &ContractSpec) -> Result<CompiledArtifact> {
        self.locator.locate(&spec.name)
    }

    pub async fn deploy(&self, spec: &ContractSpec) -> Result<DeployedContract> {
        let artifact = self.load_artifact(spec)?;
        let code = creation_code(&artifact, &spec.constructor_args, self.deployer_address())
            .map_err(|e| {
                DeckhandError::deployment_failed(format!("{}: {}", spec.name, e))
            })?;
        let (address, tx_hash) = self.rpc.deploy_contract(code).await.map_err(|e| {
            DeckhandError::deployment_failed(format!("{}: {}", spec.name, e))
        })?;
        Ok(DeployedContract { name: spec.name.clone(), address, tx_hash })
    }
}

/// Creation code is the compiled bytecode with the ABI-encoded constructor
/// arguments appended. Argument strings are coerced against the declared
/// constructor parameter types; `$deployer` resolves to the sender address.
pub fn creation_code(
    artifact: &CompiledArtifact,
    constructor_args: &[String],
    deployer: Address,
) -> Result<Vec<u8>> {
    let mut code = artifact.bytecode_bytes()?;

    let Some(constructor) = &artifact.abi.constructor else {
        if constructor_args.is_empty() {
            return Ok(code);
        }
        return Err(DeckhandError::Config(format!(
            "{} constructor argument(s) given, but the contract has no constructor",
            constructor_args.len()
        )));
    };

    if constructor.inputs.len() != constructor_args.len() {
        return Err(DeckhandError::Config(format!(
            "constructor takes {} argument(s), {} given",
            constructor.inputs.len(),
            constructor_args.len()
        )));
    }

    let mut values = Vec::with_capacity(constructor_args.len());
    for (param, raw) in constructor.inputs.iter().zip(constructor_args) {
        let raw = if raw == DEPLOYER_PLACEHOLDER {
            deployer.to_string()
        } else {
            raw.clone()
        };
        let ty = DynSolType::parse(&param.ty).map_err(|e| {
            DeckhandError::Config(format!("unsupported constructor type {}: {}", param.ty, e))
        })?;
        let value: DynSolValue = ty.coerce_str(&raw).map_err(|e| {
            DeckhandError::Config(format!(
                "argument '{}' does not coerce to {}: {}",
                raw, param.ty, e
            ))
        })?;
        values.push(value);
    }

    let encoded = constructor.abi_encode_input(&values).map_err(|e| {
        DeckhandError::Config(format!("failed to encode constructor arguments: {}", e))
    })?;
    code.extend_from_slice(&encoded);
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn artifact(abi: &str, bytecode: &str) -> CompiledArtifact {
        let json = format!(r#"{{"abi": {abi}, "bytecode": {{"object": "{bytecode}"}}}}"#);
        serde_json::from_str(&json).unwrap()
    }

    const OWNER_CONSTRUCTOR: &str = r#"[
        {"type": "constructor", "inputs": [{"name": "owner", "type": "address", "internalType": "address"}], "stateMutability": "nonpayable"}
    ]"#;

    const TOKEN_CONSTRUCTOR: &str = r#"[
        {"type": "constructor", "inputs": [
            {"name": "name", "type": "string", "internalType": "string"},
            {"name": "symbol", "type": "string", "internalType": "string"},
            {"name": "initialSupply", "type": "uint256", "internalType": "uint256"}
        ], "stateMutability": "nonpayable"}
    ]"#;

    fn deployer() -> Address {
        Address::from_str("0xed940451b58fda5c5d1074a687c9a4486d1e8cd7").unwrap()
    }

    #[test]
    fn no_constructor_keeps_bytecode_untouched() {
        let artifact = artifact("[]", "0x6001600101");
        let code = creation_code(&artifact, &[], Address::ZERO).unwrap();
        assert_eq!(code, vec![0x60, 0x01, 0x60, 0x01, 0x01]);
    }

    #[test]
    fn args_without_constructor_are_rejected() {
        let artifact = artifact("[]", "0x60016001");
        let err = creation_code(&artifact, &["MyToken".to_string()], Address::ZERO).unwrap_err();
        assert!(err.to_string().contains("no constructor"));
    }

    #[test]
    fn arity_mismatch_is_rejected() {
        let artifact = artifact(TOKEN_CONSTRUCTOR, "0x00");
        let err = creation_code(&artifact, &["MyToken".to_string()], Address::ZERO).unwrap_err();
        assert!(err.to_string().contains("takes 3 argument(s), 1 given"));
    }

    #[test]
    fn deployer_placeholder_encodes_the_sender_address() {
        let artifact = artifact(OWNER_CONSTRUCTOR, "0x6080");
        let sender = deployer();
        let code =
            creation_code(&artifact, &[DEPLOYER_PLACEHOLDER.to_string()], sender).unwrap();
        // bytecode (2 bytes) + one abi word
        assert_eq!(code.len(), 2 + 32);
        assert_eq!(&code[code.len() - 20..], sender.as_slice());
    }

    #[test]
    fn token_constructor_args_coerce_from_strings() {
        let artifact = artifact(TOKEN_CONSTRUCTOR, "0x6080");
        let args = vec![
            "MyToken".to_string(),
            "MTK".to_string(),
            "1000000000000000000000000".to_string(),
        ];
        let code = creation_code(&artifact, &args, Address::ZERO).unwrap();
        assert!(code.len() > 2 + 32 * 3);
        assert!(code.starts_with(&[0x60, 0x80]));
    }

    #[test]
    fn non_numeric_uint_arg_is_rejected() {
        let artifact = artifact(TOKEN_CONSTRUCTOR, "0x6080");
        let args =
            vec!["MyToken".to_string(), "MTK".to_string(), "lots".to_string()];
        let err = creation_code(&artifact, &args, Address::ZERO).unwrap_err();
        assert!(err.to_string().contains("does not coerce"));
    }
}
