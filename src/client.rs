//! Composition root: wires the config store, binder, IPFS client, and the
//! marketplace and mint services together in dependency order.

use crate::binder::{BindStatus, ContractBinder};
use crate::config::ConfigStore;
use crate::ipfs::IpfsClient;
use crate::market::MarketplaceFacade;
use crate::mint::MintService;
use crate::session::{SessionEvent, WalletSession};
use crate::settings::Settings;
use crate::Error;
use ethers::signers::LocalWallet;
use std::sync::Arc;

pub struct MarketClient {
    settings: Settings,
    store: Arc<ConfigStore>,
    binder: Arc<ContractBinder>,
    facade: MarketplaceFacade,
    minting: MintService,
}

impl MarketClient {
    pub fn new(settings: Settings) -> Result<Self, Error> {
        let store = Arc::new(ConfigStore::from_boxed(settings.config_source()?));
        let binder = Arc::new(ContractBinder::new(Arc::clone(&store)));
        let ipfs: Arc<dyn crate::ipfs::IpfsApi> = Arc::new(IpfsClient::new(Arc::clone(&store))?);
        let facade = MarketplaceFacade::new(
            Arc::clone(&store),
            Arc::clone(&binder),
            Arc::clone(&ipfs),
        );
        let minting = MintService::new(Arc::clone(&store), Arc::clone(&binder), ipfs);
        Ok(Self {
            settings,
            store,
            binder,
            facade,
            minting,
        })
    }

    /// Fetch and cache the deploy artifact. Safe to call more than once.
    pub async fn init(&self) -> Result<(), Error> {
        self.store.ensure_loaded().await?;
        Ok(())
    }

    /// Connect a wallet on the configured network and bind the contracts
    /// to it.
    pub async fn connect(&self, wallet: LocalWallet) -> Result<WalletSession, Error> {
        let chain_id = self.store.chain_id().await?;
        let session = WalletSession::connect(&self.settings.rpc_url, wallet, chain_id).await?;
        self.binder.bind(&session).await?;
        Ok(session)
    }

    /// Re-bind an existing session, for callers that build sessions
    /// themselves.
    pub async fn bind(&self, session: &WalletSession) -> Result<BindStatus, Error> {
        self.binder.bind(session).await
    }

    /// Forward a wallet-provider event to the binder.
    pub async fn on_session_event(&self, event: SessionEvent) {
        self.binder.handle_event(event).await;
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn market(&self) -> &MarketplaceFacade {
        &self.facade
    }

    pub fn minting(&self) -> &MintService {
        &self.minting
    }

    pub async fn is_ready(&self) -> bool {
        self.binder.is_ready().await
    }
}
