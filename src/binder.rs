//! Contract binder: the single place handles are constructed.
//!
//! Handles are signer-bound; a stale signer must never be used for a
//! subsequent transaction, so every account or network change resets the
//! binder and forces a re-bind. Higher components acquire handles here
//! rather than constructing their own.

use crate::config::ConfigStore;
use crate::contracts::{
    BalanceSource, EthersMarket, EthersNft, MarketHandle, NftHandle, ProviderBalance,
};
use crate::error::Error;
use crate::session::{SessionEvent, WalletSession};
use ethers::types::{Address, U256};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Outcome of a bind attempt. A missing signer is an expected state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindStatus {
    Ready,
    NotReady,
}

struct Bound {
    nft: Arc<dyn NftHandle>,
    market: Arc<dyn MarketHandle>,
    balance: Arc<dyn BalanceSource>,
    signer: Address,
}

pub struct ContractBinder {
    store: Arc<ConfigStore>,
    bound: RwLock<Option<Bound>>,
}

impl ContractBinder {
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self {
            store,
            bound: RwLock::new(None),
        }
    }

    /// Construct both handles from the session's signer and the configured
    /// addresses. Returns `NotReady` without error when the session has no
    /// signer attached.
    pub async fn bind(&self, session: &WalletSession) -> Result<BindStatus, Error> {
        let (Some(client), Some(signer)) = (session.signer_client(), session.address()) else {
            warn!("Wallet not connected, skipping contract bind");
            return Ok(BindStatus::NotReady);
        };

        let nft_cfg = self.store.nft_contract().await?;
        let market_cfg = self.store.market_contract().await?;
        let nft_address: Address = nft_cfg.address.parse().map_err(|e| {
            Error::ConfigUnavailable(format!("invalid NFT contract address {}: {e}", nft_cfg.address))
        })?;
        let market_address: Address = market_cfg.address.parse().map_err(|e| {
            Error::ConfigUnavailable(format!(
                "invalid market contract address {}: {e}",
                market_cfg.address
            ))
        })?;

        let nft = Arc::new(EthersNft::new(nft_address, Arc::clone(&client))?);
        let market = Arc::new(EthersMarket::new(market_address, Arc::clone(&client))?);
        let balance = Arc::new(ProviderBalance::new(client));
        self.install(nft, market, balance, signer).await;
        info!(
            nft = %nft_cfg.address,
            market = %market_cfg.address,
            signer = ?signer,
            "Contracts bound"
        );
        Ok(BindStatus::Ready)
    }

    pub(crate) async fn install(
        &self,
        nft: Arc<dyn NftHandle>,
        market: Arc<dyn MarketHandle>,
        balance: Arc<dyn BalanceSource>,
        signer: Address,
    ) {
        *self.bound.write().await = Some(Bound {
            nft,
            market,
            balance,
            signer,
        });
    }

    /// Null all handles. Called on every account or network change.
    pub async fn reset(&self) {
        if self.bound.write().await.take().is_some() {
            info!("Contract handles reset");
        }
    }

    /// React to a wallet-provider event.
    pub async fn handle_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::AccountsChanged
            | SessionEvent::NetworkChanged
            | SessionEvent::Disconnected => self.reset().await,
            SessionEvent::Connected => {}
        }
    }

    pub async fn is_ready(&self) -> bool {
        self.bound.read().await.is_some()
    }

    pub async fn nft_handle(&self) -> Result<Arc<dyn NftHandle>, Error> {
        self.bound
            .read()
            .await
            .as_ref()
            .map(|b| Arc::clone(&b.nft))
            .ok_or(Error::NotInitialized)
    }

    pub async fn market_handle(&self) -> Result<Arc<dyn MarketHandle>, Error> {
        self.bound
            .read()
            .await
            .as_ref()
            .map(|b| Arc::clone(&b.market))
            .ok_or(Error::NotInitialized)
    }

    /// Address of the signer the current handles are bound to.
    pub async fn signer_address(&self) -> Result<Address, Error> {
        self.bound
            .read()
            .await
            .as_ref()
            .map(|b| b.signer)
            .ok_or(Error::NotInitialized)
    }

    /// Native balance of the bound signer.
    pub async fn signer_balance(&self) -> Result<U256, Error> {
        let (balance, signer) = {
            let guard = self.bound.read().await;
            let bound = guard.as_ref().ok_or(Error::NotInitialized)?;
            (Arc::clone(&bound.balance), bound.signer)
        };
        balance.balance(signer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample_store;
    use crate::contracts::testing::{addr, CallLog, MockBalance, MockMarket, MockNft};
    use crate::session::WalletSession;
    use ethers::signers::{LocalWallet, Signer};

    fn empty_log() -> CallLog {
        CallLog::default()
    }

    async fn binder_with_mocks() -> ContractBinder {
        let binder = ContractBinder::new(Arc::new(sample_store()));
        let log = empty_log();
        binder
            .install(
                Arc::new(MockNft::new(Arc::clone(&log))),
                Arc::new(MockMarket::new(log)),
                Arc::new(MockBalance {
                    amount: U256::from(1u64),
                }),
                addr(0xabc),
            )
            .await;
        binder
    }

    #[tokio::test]
    async fn test_bind_without_signer_is_not_ready() {
        let binder = ContractBinder::new(Arc::new(sample_store()));
        let session = WalletSession::disconnected("http://localhost:8545").unwrap();
        let status = binder.bind(&session).await.unwrap();
        assert_eq!(status, BindStatus::NotReady);
        assert!(!binder.is_ready().await);
        assert_eq!(
            binder.nft_handle().await.err().unwrap().kind(),
            "not_initialized"
        );
    }

    #[tokio::test]
    async fn test_bind_with_signer_constructs_handles() {
        let binder = ContractBinder::new(Arc::new(sample_store()));
        let wallet = LocalWallet::new(&mut ethers::core::rand::thread_rng());
        let expected = wallet.address();
        let session =
            WalletSession::with_wallet("http://localhost:8545", wallet, 11155111).unwrap();

        let status = binder.bind(&session).await.unwrap();
        assert_eq!(status, BindStatus::Ready);
        assert!(binder.is_ready().await);
        assert!(binder.nft_handle().await.is_ok());
        assert!(binder.market_handle().await.is_ok());
        assert_eq!(binder.signer_address().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_reset_invalidates_handles() {
        let binder = binder_with_mocks().await;
        assert!(binder.nft_handle().await.is_ok());

        binder.reset().await;
        assert_eq!(
            binder.nft_handle().await.err().unwrap().kind(),
            "not_initialized"
        );
        assert_eq!(
            binder.market_handle().await.err().unwrap().kind(),
            "not_initialized"
        );
        assert_eq!(
            binder.signer_balance().await.unwrap_err().kind(),
            "not_initialized"
        );
    }

    #[tokio::test]
    async fn test_account_change_event_resets() {
        let binder = binder_with_mocks().await;
        binder.handle_event(SessionEvent::AccountsChanged).await;
        assert!(!binder.is_ready().await);
    }

    #[tokio::test]
    async fn test_connected_event_keeps_handles() {
        let binder = binder_with_mocks().await;
        binder.handle_event(SessionEvent::Connected).await;
        assert!(binder.is_ready().await);
    }
}
