use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy_signer_local::PrivateKeySigner;
use url::Url;

use crate::errors::{DeckhandError, Result};

/// Thin wallet-backed JSON-RPC client. Gas, nonce and chain id are filled by
/// the provider; timeouts are delegated to the underlying transport.
pub struct EvmRpc {
    pub url: Url,
    sender: Address,
    provider: DynProvider,
}

impl EvmRpc {
    pub fn new(rpc_url: &str, signer: PrivateKeySigner) -> Result<Self> {
        let url = Url::parse(rpc_url)
            .map_err(|e| DeckhandError::Config(format!("invalid rpc url {}: {}", rpc_url, e)))?;
        let sender = signer.address();
        let wallet = EthereumWallet::from(signer);
        let provider = ProviderBuilder::new().wallet(wallet).on_http(url.clone()).erased();
        Ok(EvmRpc { url, sender, provider })
    }

    pub fn sender(&self) -> Address {
        self.sender
    }

    pub async fn get_balance(&self) -> Result<U256> {
        self.provider
            .get_balance(self.sender)
            .await
            .map_err(|e| DeckhandError::Rpc(e.to_string()))
    }

    pub async fn get_chain_id(&self) -> Result<u64> {
        self.provider.get_chain_id().await.map_err(|e| DeckhandError::Rpc(e.to_string()))
    }

    /// Submits a contract-creation transaction and awaits inclusion.
    pub async fn deploy_contract(&self, creation_code: Vec<u8>) -> Result<(Address, TxHash)> {
        let tx = TransactionRequest::default().with_deploy_code(creation_code);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| DeckhandError::Rpc(e.to_string()))?;
        let receipt =
            pending.get_receipt().await.map_err(|e| DeckhandError::Rpc(e.to_string()))?;
        let address = receipt
            .contract_address
            .ok_or_else(|| DeckhandError::Rpc("receipt carries no contract address".into()))?;
        Ok((address, receipt.transaction_hash))
    }
}
