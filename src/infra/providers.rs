//! Ride providers: one per brand, either synthesized from rate cards or
//! backed by the Beckn network.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use thiserror::Error;
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info};

use crate::domain::entities::{ProviderId, RideRequest, RideResult};
use crate::domain::fare::FareSynthesizer;
use crate::domain::rate_card::{ProviderCatalog, RateCatalog};
use crate::infra::beckn::{BecknClient, BecknError};
use crate::infra::transactions::TransactionStore;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Beckn(#[from] BecknError),
}

#[async_trait]
pub trait RideProvider: Send + Sync {
    fn id(&self) -> ProviderId;

    async fn fetch_quotes(&self, request: &RideRequest) -> Result<Vec<RideResult>, ProviderError>;
}

/// Requested time, or now in the local offset.
pub fn quote_time(when: Option<OffsetDateTime>, local_offset: UtcOffset) -> OffsetDateTime {
    when.unwrap_or_else(|| OffsetDateTime::now_utc().to_offset(local_offset))
}

pub struct SyntheticProvider {
    catalog: ProviderCatalog,
    synthesizer: Arc<FareSynthesizer>,
    local_offset: UtcOffset,
}

impl SyntheticProvider {
    pub fn new(
        catalog: ProviderCatalog,
        synthesizer: Arc<FareSynthesizer>,
        local_offset: UtcOffset,
    ) -> Self {
        Self {
            catalog,
            synthesizer,
            local_offset,
        }
    }
}

#[async_trait]
impl RideProvider for SyntheticProvider {
    fn id(&self) -> ProviderId {
        self.catalog.id
    }

    async fn fetch_quotes(&self, request: &RideRequest) -> Result<Vec<RideResult>, ProviderError> {
        let at = quote_time(request.when, self.local_offset);
        let quotes = self.synthesizer.quote_provider(&self.catalog, request, at);
        debug!(
            provider = %self.catalog.id,
            count = quotes.len(),
            hour = at.hour(),
            "synthesized quotes"
        );
        Ok(quotes)
    }
}

/// Namma Yatri over Beckn: send `search`, then wait for the callback.
pub struct BecknProvider {
    client: BecknClient,
    store: Arc<TransactionStore>,
    callback_timeout: Duration,
}

impl BecknProvider {
    pub fn new(
        client: BecknClient,
        store: Arc<TransactionStore>,
        callback_timeout: Duration,
    ) -> Self {
        Self {
            client,
            store,
            callback_timeout,
        }
    }
}

#[async_trait]
impl RideProvider for BecknProvider {
    fn id(&self) -> ProviderId {
        ProviderId::NammaYatri
    }

    async fn fetch_quotes(&self, request: &RideRequest) -> Result<Vec<RideResult>, ProviderError> {
        let context = self.client.new_search_context();
        let transaction_id = context.transaction_id.clone();

        // Registered before sending so an immediate callback finds it.
        self.store.begin(&transaction_id, request.clone()).await;
        if let Err(error) = self.client.search(&context, request).await {
            self.store.remove(&transaction_id).await;
            return Err(error.into());
        }
        info!(%transaction_id, "beckn search initiated");

        let offers = self.store.wait(&transaction_id, self.callback_timeout).await?;
        Ok(offers)
    }
}

/// Providers keyed by wire tag, so listing is alphabetical.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<&'static str, Arc<dyn RideProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn RideProvider>) {
        self.providers.insert(provider.id().as_str(), provider);
    }

    /// One synthetic provider per brand in the catalog. A Beckn provider, when
    /// given, replaces the synthetic Namma Yatri.
    pub fn from_catalog(
        catalog: &RateCatalog,
        synthesizer: Arc<FareSynthesizer>,
        local_offset: UtcOffset,
        beckn: Option<BecknProvider>,
    ) -> Self {
        let mut registry = Self::new();
        for provider in &catalog.providers {
            registry.register(Arc::new(SyntheticProvider::new(
                provider.clone(),
                synthesizer.clone(),
                local_offset,
            )));
        }
        if let Some(beckn) = beckn {
            registry.register(Arc::new(beckn));
        }
        registry
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.providers.keys().copied().collect()
    }

    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn RideProvider>> {
        self.providers.values()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
