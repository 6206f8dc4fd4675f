use std::cmp::Ordering;

use sha2::{Digest, Sha256};

use super::entities::{CompareResponse, ProviderId, ResponseMeta, RideRequest, RideResult};

pub const CACHE_KEY_PREFIX: &str = "cabsync_";
const CACHE_KEY_HEX_LEN: usize = 12;

/// Stable key for a compare request. Coordinates are truncated to 3 dp
/// (~100 m) so nearby pickups share a key.
pub fn cache_key(request: &RideRequest) -> String {
    let vehicle = request.vehicle_type.map_or("any", |v| v.as_str());
    let raw = format!(
        "{:.3}:{:.3}:{:.3}:{:.3}:{}",
        request.pickup.lat, request.pickup.lng, request.dropoff.lat, request.dropoff.lng, vehicle
    );
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{CACHE_KEY_PREFIX}{}", &digest[..CACHE_KEY_HEX_LEN])
}

/// Cheapest first, then fastest pickup, then provider tag.
pub fn compare_results(a: &RideResult, b: &RideResult) -> Ordering {
    a.price
        .value
        .total_cmp(&b.price.value)
        .then_with(|| a.eta.seconds.cmp(&b.eta.seconds))
        .then_with(|| a.provider.as_str().cmp(b.provider.as_str()))
}

pub fn sort_results(results: &mut [RideResult]) {
    results.sort_by(compare_results);
}

/// Sort `results` and attach response metadata.
pub fn build_response(
    mut results: Vec<RideResult>,
    cache_key: String,
    queried_at: String,
    total_providers: usize,
    mut failed_providers: Vec<ProviderId>,
) -> CompareResponse {
    sort_results(&mut results);
    failed_providers.sort_by_key(|p| p.as_str());
    failed_providers.dedup();
    CompareResponse {
        results,
        meta: ResponseMeta {
            queried_at,
            cache_key,
            total_providers,
            failed_providers,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{Eta, Location, Price, VehicleClass};

    fn result(provider: ProviderId, price: f64, eta_seconds: u32) -> RideResult {
        RideResult {
            provider,
            service_type: format!("{} Test", provider.display_name()),
            price: Price {
                value: price,
                currency: "₹".into(),
                confidence: 0.9,
            },
            eta: Eta {
                seconds: eta_seconds,
                text: format!("{} min", eta_seconds / 60),
            },
            distance: 1000,
            deep_link: String::new(),
            surge: None,
            meta: None,
        }
    }

    #[test]
    fn sorts_by_price_then_eta_then_provider() {
        let mut results = vec![
            result(ProviderId::Uber, 200.0, 300),
            result(ProviderId::Rapido, 150.0, 600),
            result(ProviderId::Ola, 150.0, 300),
            result(ProviderId::NammaYatri, 150.0, 300),
        ];
        sort_results(&mut results);
        let order: Vec<_> = results.iter().map(|r| r.provider).collect();
        assert_eq!(
            order,
            [
                ProviderId::NammaYatri,
                ProviderId::Ola,
                ProviderId::Rapido,
                ProviderId::Uber
            ]
        );
    }

    #[test]
    fn cache_key_is_prefixed_and_stable() {
        let mut request = RideRequest::new(
            Location::new(28.6139, 77.2090, "a"),
            Location::new(28.5355, 77.3910, "b"),
        );
        let key = cache_key(&request);
        assert!(key.starts_with(CACHE_KEY_PREFIX));
        assert_eq!(key.len(), CACHE_KEY_PREFIX.len() + CACHE_KEY_HEX_LEN);
        assert!(key[CACHE_KEY_PREFIX.len()..].chars().all(|c| c.is_ascii_hexdigit()));

        request.pickup.address = "somewhere else".into();
        request.pickup.lat = 28.61391;
        assert_eq!(cache_key(&request), key);

        request.vehicle_type = Some(VehicleClass::Auto);
        assert_ne!(cache_key(&request), key);
    }

    #[test]
    fn response_lists_failed_providers_once_and_sorted() {
        let response = build_response(
            vec![result(ProviderId::Ola, 90.0, 120)],
            "cabsync_abc".into(),
            "2026-03-02T08:00:00Z".into(),
            4,
            vec![ProviderId::Uber, ProviderId::NammaYatri, ProviderId::Uber],
        );
        assert_eq!(
            response.meta.failed_providers,
            [ProviderId::NammaYatri, ProviderId::Uber]
        );
        assert_eq!(response.meta.total_providers, 4);
    }
}
