//! Fan a compare request out to every registered provider.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use crate::domain::comparison::{build_response, cache_key};
use crate::domain::entities::{CompareResponse, Location, ProviderId, RideRequest, VehicleClass};
use crate::infra::cache::TtlCache;
use crate::infra::providers::{quote_time, ProviderRegistry};

#[derive(Debug, Error)]
pub enum CompareError {
    #[error("All providers failed to respond")]
    AllProvidersFailed { failed: Vec<ProviderId> },
}

/// Everything a quote depends on. The public `cacheKey` rounds coordinates
/// and ignores the time, so it cannot key cached responses.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ResponseKey {
    pickup: (u64, u64),
    dropoff: (u64, u64),
    vehicle: Option<VehicleClass>,
    seats: Option<u8>,
    hour: u8,
    offset_seconds: i32,
}

impl ResponseKey {
    fn new(request: &RideRequest, local_offset: UtcOffset) -> Self {
        let at = quote_time(request.when, local_offset);
        let point = |location: &Location| (location.lat.to_bits(), location.lng.to_bits());
        Self {
            pickup: point(&request.pickup),
            dropoff: point(&request.dropoff),
            vehicle: request.vehicle_type,
            seats: request.seater_capacity,
            hour: at.hour(),
            offset_seconds: at.offset().whole_seconds(),
        }
    }
}

pub struct RideAggregator {
    registry: ProviderRegistry,
    cache: TtlCache<ResponseKey, CompareResponse>,
    local_offset: UtcOffset,
}

pub fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

impl RideAggregator {
    /// `local_offset` must match the one the providers quote in.
    pub fn new(registry: ProviderRegistry, cache_ttl: Duration, local_offset: UtcOffset) -> Self {
        Self {
            registry,
            cache: TtlCache::new(cache_ttl),
            local_offset,
        }
    }

    pub fn list_platforms(&self) -> Vec<&'static str> {
        self.registry.names()
    }

    pub async fn compare(&self, request: RideRequest) -> Result<CompareResponse, CompareError> {
        let key = cache_key(&request);
        let response_key = ResponseKey::new(&request, self.local_offset);
        if let Some(hit) = self.cache.get_fresh(&response_key).await {
            debug!(cache_key = %key, "serving cached comparison");
            return Ok(hit.data);
        }

        let request = Arc::new(request);
        let mut tasks = JoinSet::new();
        let mut pending: BTreeSet<ProviderId> = BTreeSet::new();
        for provider in self.registry.providers() {
            let provider = provider.clone();
            let request = request.clone();
            pending.insert(provider.id());
            tasks.spawn(async move {
                let id = provider.id();
                (id, provider.fetch_quotes(&request).await)
            });
        }

        let mut results = Vec::new();
        let mut failed = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(quotes))) => {
                    pending.remove(&id);
                    results.extend(quotes);
                }
                Ok((id, Err(err))) => {
                    pending.remove(&id);
                    warn!(provider = %id, error = %err, "provider returned error");
                    failed.push(id);
                }
                Err(err) => error!(error = %err, "provider task aborted"),
            }
        }
        // Whatever never reported back panicked.
        failed.extend(pending);

        if results.is_empty() && !failed.is_empty() {
            return Err(CompareError::AllProvidersFailed { failed });
        }

        let response = build_response(results, key, timestamp(), self.registry.len(), failed);
        if response.meta.failed_providers.is_empty() {
            self.cache.insert(response_key, response.clone()).await;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use time::macros::{datetime, offset};

    use super::*;
    use crate::domain::entities::{Eta, Location, Price, RideResult};
    use crate::domain::fare::{FareSynthesizer, JitterMode};
    use crate::domain::rate_card::RateCatalog;
    use crate::domain::traffic::TrafficProfile;
    use crate::infra::beckn::BecknError;
    use crate::infra::providers::{ProviderError, RideProvider};

    struct Fixed {
        id: ProviderId,
        price: Option<f64>,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(id: ProviderId, price: Option<f64>) -> Arc<Self> {
            Arc::new(Self {
                id,
                price,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl RideProvider for Fixed {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn fetch_quotes(
            &self,
            _request: &RideRequest,
        ) -> Result<Vec<RideResult>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let Some(price) = self.price else {
                return Err(BecknError::Failed("down".into()).into());
            };
            Ok(vec![RideResult {
                provider: self.id,
                service_type: "Test".into(),
                price: Price {
                    value: price,
                    currency: "₹".into(),
                    confidence: 0.9,
                },
                eta: Eta {
                    seconds: 300,
                    text: "5 min".into(),
                },
                distance: 1000,
                deep_link: String::new(),
                surge: None,
                meta: None,
            }])
        }
    }

    fn request() -> RideRequest {
        RideRequest::new(
            Location::new(28.6139, 77.2090, "a"),
            Location::new(28.5355, 77.3910, "b"),
        )
    }

    #[tokio::test]
    async fn failures_are_isolated() {
        let mut registry = ProviderRegistry::new();
        registry.register(Fixed::new(ProviderId::Uber, Some(250.0)));
        registry.register(Fixed::new(ProviderId::Ola, None));
        registry.register(Fixed::new(ProviderId::Rapido, Some(120.0)));

        let aggregator = RideAggregator::new(registry, Duration::ZERO, offset!(+05:30));
        let response = aggregator.compare(request()).await.expect("partial success");
        let providers: Vec<_> = response.results.iter().map(|r| r.provider).collect();
        assert_eq!(providers, [ProviderId::Rapido, ProviderId::Uber]);
        assert_eq!(response.meta.failed_providers, [ProviderId::Ola]);
        assert_eq!(response.meta.total_providers, 3);
        assert!(response.meta.cache_key.starts_with("cabsync_"));
    }

    #[tokio::test]
    async fn all_failed_is_an_error() {
        let mut registry = ProviderRegistry::new();
        registry.register(Fixed::new(ProviderId::Uber, None));
        registry.register(Fixed::new(ProviderId::Ola, None));

        let aggregator = RideAggregator::new(registry, Duration::ZERO, offset!(+05:30));
        let err = aggregator.compare(request()).await.expect_err("all failed");
        assert_eq!(err.to_string(), "All providers failed to respond");
    }

    #[tokio::test]
    async fn empty_results_without_failures_is_ok() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(crate::infra::providers::SyntheticProvider::new(
            RateCatalog::default()
                .provider(ProviderId::Uber)
                .expect("uber")
                .clone(),
            Arc::new(FareSynthesizer::default()),
            offset!(+05:30),
        )));
        let aggregator = RideAggregator::new(registry, Duration::ZERO, offset!(+05:30));
        let mut request = request();
        request.seater_capacity = Some(2);
        let response = aggregator.compare(request).await.expect("ok");
        assert!(response.results.is_empty());
        assert!(response.meta.failed_providers.is_empty());
    }

    #[tokio::test]
    async fn cached_responses_keep_original_timestamp() {
        let uber = Fixed::new(ProviderId::Uber, Some(200.0));
        let mut registry = ProviderRegistry::new();
        registry.register(uber.clone());
        let aggregator = RideAggregator::new(registry, Duration::from_secs(60), offset!(+05:30));

        let mut req = request();
        req.when = Some(datetime!(2026-03-02 14:00 +05:30));
        let first = aggregator.compare(req.clone()).await.expect("first");
        let second = aggregator.compare(req).await.expect("second");
        assert_eq!(first, second);
        assert_eq!(uber.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_jitter_comparison_is_reproducible() {
        let synth = Arc::new(FareSynthesizer::new(TrafficProfile::default(), JitterMode::Disabled));
        let registry =
            ProviderRegistry::from_catalog(&RateCatalog::default(), synth, offset!(+05:30), None);
        let aggregator = RideAggregator::new(registry, Duration::ZERO, offset!(+05:30));

        let mut req = request();
        req.when = Some(datetime!(2026-03-02 14:00 +05:30));
        let a = aggregator.compare(req.clone()).await.expect("a");
        let b = aggregator.compare(req).await.expect("b");
        assert_eq!(a.results, b.results);
        assert!(!a.results.is_empty());
        assert!(a
            .results
            .windows(2)
            .all(|w| w[0].price.value <= w[1].price.value));
    }

    fn catalog_aggregator(cache_ttl: Duration) -> RideAggregator {
        let synth = Arc::new(FareSynthesizer::new(TrafficProfile::default(), JitterMode::Disabled));
        let registry =
            ProviderRegistry::from_catalog(&RateCatalog::default(), synth, offset!(+05:30), None);
        RideAggregator::new(registry, cache_ttl, offset!(+05:30))
    }

    #[tokio::test]
    async fn same_instant_in_another_offset_is_quoted_separately() {
        let cached = catalog_aggregator(Duration::from_secs(60));
        let uncached = catalog_aggregator(Duration::ZERO);

        let mut peak = request();
        peak.when = Some(datetime!(2026-03-02 10:00 +00:00));
        let mut off_peak = request();
        off_peak.when = Some(datetime!(2026-03-02 11:00 +01:00));

        let first = cached.compare(peak.clone()).await.expect("peak");
        let served = cached.compare(off_peak.clone()).await.expect("off-peak");
        let expected = uncached.compare(off_peak).await.expect("off-peak uncached");

        assert_eq!(served.results, expected.results);
        assert_ne!(first.results, served.results);
        assert_eq!(first.meta.cache_key, served.meta.cache_key);
    }

    #[tokio::test]
    async fn nearby_pickups_do_not_share_cached_quotes() {
        let aggregator = catalog_aggregator(Duration::from_secs(60));

        let mut first = request();
        first.when = Some(datetime!(2026-03-02 14:00 +05:30));
        let mut nearby = first.clone();
        nearby.pickup.lat = 28.6136;

        let a = aggregator.compare(first).await.expect("first");
        let b = aggregator.compare(nearby).await.expect("nearby");

        assert_eq!(a.meta.cache_key, b.meta.cache_key);
        assert!(a.results.iter().all(|r| r.deep_link.contains("28.613900")));
        assert!(b.results.iter().all(|r| r.deep_link.contains("28.613600")));
        assert_ne!(a.results[0].distance, b.results[0].distance);
    }
}
