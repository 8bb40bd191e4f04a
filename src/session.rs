//! Wallet session: provider + signer pair and the events that invalidate it.
//!
//! The session is an external collaborator from the contract layer's point
//! of view: it supplies the signer that handles are bound to, and its
//! events (account switch, network switch, disconnect) force a re-bind.

use crate::contracts::EthClient;
use crate::error::Error;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256};
use std::sync::Arc;
use tracing::info;

/// Wallet-provider events the binder reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    AccountsChanged,
    NetworkChanged,
    Disconnected,
}

/// A provider/signer pair. Connection absence is an expected state, not an
/// error: a disconnected session still carries a provider for reads.
pub struct WalletSession {
    provider: Arc<Provider<Http>>,
    client: Option<Arc<EthClient>>,
    address: Option<Address>,
    chain_id: Option<u64>,
}

impl WalletSession {
    /// Session without a signer. Cheap; does not touch the network.
    pub fn disconnected(rpc_url: &str) -> Result<Self, Error> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| Error::Rpc(format!("invalid RPC url {rpc_url}: {e}")))?;
        Ok(Self {
            provider: Arc::new(provider),
            client: None,
            address: None,
            chain_id: None,
        })
    }

    /// Signer-bound session for a caller that already knows the chain id.
    /// Does not touch the network.
    pub fn with_wallet(rpc_url: &str, wallet: LocalWallet, chain_id: u64) -> Result<Self, Error> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| Error::Rpc(format!("invalid RPC url {rpc_url}: {e}")))?;
        let wallet = wallet.with_chain_id(chain_id);
        let address = wallet.address();
        let client = SignerMiddleware::new(provider.clone(), wallet);
        Ok(Self {
            provider: Arc::new(provider),
            client: Some(Arc::new(client)),
            address: Some(address),
            chain_id: Some(chain_id),
        })
    }

    /// Connect and verify the node is on the expected chain.
    pub async fn connect(
        rpc_url: &str,
        wallet: LocalWallet,
        expected_chain_id: u64,
    ) -> Result<Self, Error> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| Error::Rpc(format!("invalid RPC url {rpc_url}: {e}")))?;
        let onchain = provider
            .get_chainid()
            .await
            .map_err(|e| Error::Rpc(format!("chain id query failed: {e}")))?
            .as_u64();
        if onchain != expected_chain_id {
            return Err(Error::Rpc(format!(
                "wrong network: connected to chain {onchain}, expected {expected_chain_id}"
            )));
        }
        let session = Self::with_wallet(rpc_url, wallet, onchain)?;
        info!(
            chain_id = onchain,
            address = ?session.address,
            "Wallet session connected"
        );
        Ok(session)
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// The signer-bound client, when a wallet is attached.
    pub fn signer_client(&self) -> Option<Arc<EthClient>> {
        self.client.as_ref().map(Arc::clone)
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }

    pub fn provider(&self) -> Arc<Provider<Http>> {
        Arc::clone(&self.provider)
    }

    /// Native balance of the connected account.
    pub async fn balance(&self) -> Result<U256, Error> {
        let address = self.address.ok_or(Error::NotConnected)?;
        self.provider
            .get_balance(address, None)
            .await
            .map_err(|e| Error::Rpc(format!("getBalance: {e}")))
    }
}
