//! Synthetic fare and ETA estimates from rate cards.
//!
//! Formula per service tier:
//!
//! ```text
//! minutes = km / avg_speed_kmph * 60 * traffic
//! price   = (base_fare + per_km * km + per_min * minutes) * jitter * surge
//! price   = round_to_five(max(price, min_fare))
//! ```
//!
//! `jitter` is uniform in `[1 - JITTER_SPREAD, 1 + JITTER_SPREAD]` and surge
//! fires with the tier's `surge_chance`. With [`JitterMode::Disabled`] both are
//! fixed at 1.0 so identical requests give identical quotes.

use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use super::entities::{Eta, Location, Price, RideMeta, RideRequest, RideResult};
use super::rate_card::{ProviderCatalog, ServiceRateCard};
use super::traffic::TrafficProfile;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Floor applied to trip distances so a pickup next to the drop-off still
/// produces a sane fare.
pub const MIN_TRIP_KM: f64 = 0.75;

pub const JITTER_SPREAD: f64 = 0.08;

const SEED_NAMESPACE: &str = "cabsync";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterMode {
    /// RNG seeded from the provider, service and trip endpoints.
    #[default]
    Seeded,
    /// Fresh entropy on every quote.
    Random,
    /// No jitter, no surge, ETA at the middle of the range.
    Disabled,
}

impl FromStr for JitterMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "seeded" => Ok(JitterMode::Seeded),
            "random" => Ok(JitterMode::Random),
            "off" | "disabled" | "none" => Ok(JitterMode::Disabled),
            other => Err(format!("unknown jitter mode '{other}'")),
        }
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(from: &Location, to: &Location) -> f64 {
    let (lat1, lon1) = (from.lat.to_radians(), from.lng.to_radians());
    let (lat2, lon2) = (to.lat.to_radians(), to.lng.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_KM * c
}

/// Billable trip distance: haversine floored at [`MIN_TRIP_KM`].
pub fn trip_distance_km(from: &Location, to: &Location) -> f64 {
    haversine_km(from, to).max(MIN_TRIP_KM)
}

/// Round to the nearest 5 currency units without dropping below `min_fare`.
pub fn round_to_five(price: f64, min_fare: f64) -> f64 {
    let clamped = price.max(min_fare);
    let rounded = (clamped / 5.0).round() * 5.0;
    if rounded < min_fare {
        (min_fare / 5.0).ceil() * 5.0
    } else {
        rounded
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Distance and duration shared by every tier of one request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TripEstimate {
    pub distance_km: f64,
    pub traffic_multiplier: f64,
    pub hour: u8,
}

impl TripEstimate {
    pub fn distance_meters(&self) -> u32 {
        (self.distance_km * 1000.0) as u32
    }

    pub fn duration_minutes(&self, avg_speed_kmph: f64) -> f64 {
        self.distance_km / avg_speed_kmph * 60.0 * self.traffic_multiplier
    }
}

#[derive(Clone, Debug)]
pub struct FareSynthesizer {
    traffic: TrafficProfile,
    jitter: JitterMode,
}

impl FareSynthesizer {
    pub fn new(traffic: TrafficProfile, jitter: JitterMode) -> Self {
        Self { traffic, jitter }
    }

    pub fn estimate_trip(&self, request: &RideRequest, at: OffsetDateTime) -> TripEstimate {
        let hour = at.hour();
        TripEstimate {
            distance_km: trip_distance_km(&request.pickup, &request.dropoff),
            traffic_multiplier: self.traffic.factor_at_hour(hour),
            hour,
        }
    }

    /// Quote every tier of `provider` that passes the request's filters.
    pub fn quote_provider(
        &self,
        provider: &ProviderCatalog,
        request: &RideRequest,
        at: OffsetDateTime,
    ) -> Vec<RideResult> {
        let trip = self.estimate_trip(request, at);
        provider
            .services
            .iter()
            .filter(|service| request.accepts(service.vehicle_type, Some(service.vehicle_capacity)))
            .map(|service| self.quote_service(provider, service, request, &trip))
            .collect()
    }

    pub fn quote_service(
        &self,
        provider: &ProviderCatalog,
        service: &ServiceRateCard,
        request: &RideRequest,
        trip: &TripEstimate,
    ) -> RideResult {
        let draws = self.draw(provider, service, request);

        let minutes = trip.duration_minutes(service.avg_speed_kmph);
        let raw = service.base_fare + service.per_km * trip.distance_km + service.per_min * minutes;
        let price = round_to_five(raw * draws.jitter * draws.surge, service.min_fare);

        let (eta_lo, eta_hi) = service.eta_range_minutes;
        let pickup_minutes =
            (eta_lo + (eta_hi - eta_lo) * draws.eta_position) * trip.traffic_multiplier;

        let co2_estimate = (service.co2_per_km > 0.0)
            .then(|| (service.co2_per_km * trip.distance_km * 10.0).round() / 10.0);
        let meta = RideMeta {
            vehicle_capacity: Some(service.vehicle_capacity),
            rating: service.rating,
            co2_estimate,
        };

        RideResult {
            provider: provider.id,
            service_type: service.service_type.clone(),
            price: Price {
                value: price,
                currency: provider.currency.clone(),
                confidence: service.confidence,
            },
            eta: Eta::from_minutes(pickup_minutes),
            distance: trip.distance_meters(),
            deep_link: build_deep_link(&provider.base_deep_link, request, &service.slug()),
            surge: (draws.surge > 1.0).then(|| round2(draws.surge)),
            meta: (!meta.is_empty()).then_some(meta),
        }
    }

    fn draw(
        &self,
        provider: &ProviderCatalog,
        service: &ServiceRateCard,
        request: &RideRequest,
    ) -> Draws {
        let mut rng = match self.jitter {
            JitterMode::Disabled => return Draws::neutral(),
            JitterMode::Random => StdRng::from_entropy(),
            JitterMode::Seeded => StdRng::seed_from_u64(quote_seed(provider, service, request)),
        };

        let jitter = rng.gen_range(1.0 - JITTER_SPREAD..=1.0 + JITTER_SPREAD);
        let surge_roll: f64 = rng.gen();
        let (surge_lo, surge_hi) = service.surge_range;
        let surge = if surge_roll < service.surge_chance {
            rng.gen_range(surge_lo..=surge_hi)
        } else {
            1.0
        };
        let eta_position: f64 = rng.gen();

        Draws {
            jitter,
            surge,
            eta_position,
        }
    }
}

impl Default for FareSynthesizer {
    fn default() -> Self {
        Self::new(TrafficProfile::default(), JitterMode::default())
    }
}

struct Draws {
    jitter: f64,
    surge: f64,
    /// Position inside the ETA range, 0.0..1.0.
    eta_position: f64,
}

impl Draws {
    fn neutral() -> Self {
        Self {
            jitter: 1.0,
            surge: 1.0,
            eta_position: 0.5,
        }
    }
}

fn quote_seed(provider: &ProviderCatalog, service: &ServiceRateCard, request: &RideRequest) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "{SEED_NAMESPACE}::{}::{}::{:.5},{:.5}::{:.5},{:.5}",
            provider.id,
            service.service_type,
            request.pickup.lat,
            request.pickup.lng,
            request.dropoff.lat,
            request.dropoff.lng,
        )
        .as_bytes(),
    );
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn build_deep_link(template: &str, request: &RideRequest, slug: &str) -> String {
    template
        .replace("{pickup_lat}", &format!("{:.6}", request.pickup.lat))
        .replace("{pickup_lng}", &format!("{:.6}", request.pickup.lng))
        .replace("{dropoff_lat}", &format!("{:.6}", request.dropoff.lat))
        .replace("{dropoff_lng}", &format!("{:.6}", request.dropoff.lng))
        .replace("{service_slug}", slug)
}
