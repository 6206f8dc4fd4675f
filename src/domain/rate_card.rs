//! Per-provider rate cards used to synthesize plausible quotes.
//!
//! The built-in catalog covers the four compared brands. A JSON file with the
//! same shape can replace it at startup (see [`RateCatalog::from_json`]).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::entities::{ProviderId, VehicleClass, DEFAULT_CURRENCY};

#[derive(Debug, Error)]
pub enum RateCardError {
    #[error("invalid rate card JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{service}: {reason}")]
    Invalid { service: String, reason: String },
    #[error("rate card catalog is empty")]
    Empty,
}

/// Constants for one service tier (e.g. "Uber Go").
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceRateCard {
    pub service_type: String,
    pub vehicle_type: VehicleClass,
    pub base_fare: f64,
    pub per_km: f64,
    pub per_min: f64,
    pub min_fare: f64,
    pub avg_speed_kmph: f64,
    /// Pickup wait window, minutes.
    pub eta_range_minutes: (f64, f64),
    pub vehicle_capacity: u8,
    #[serde(default)]
    pub rating: Option<f32>,
    /// Grams of CO2 per km; zero disables the estimate.
    #[serde(default)]
    pub co2_per_km: f64,
    pub confidence: f32,
    pub surge_chance: f64,
    pub surge_range: (f64, f64),
}

impl ServiceRateCard {
    pub fn slug(&self) -> String {
        self.service_type
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join("-")
    }

    fn validate(&self) -> Result<(), RateCardError> {
        let fail = |reason: &str| {
            Err(RateCardError::Invalid {
                service: self.service_type.clone(),
                reason: reason.to_string(),
            })
        };

        let amounts = [self.base_fare, self.per_km, self.per_min, self.min_fare];
        if amounts.iter().any(|value| !value.is_finite() || *value < 0.0) {
            return fail("fares must be finite and non-negative");
        }
        if !(self.avg_speed_kmph.is_finite() && self.avg_speed_kmph > 0.0) {
            return fail("average speed must be positive");
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return fail("confidence must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.surge_chance) {
            return fail("surge chance must be within [0, 1]");
        }
        let (surge_lo, surge_hi) = self.surge_range;
        if !(surge_lo >= 1.0 && surge_lo <= surge_hi) {
            return fail("surge range must be ordered and start at or above 1.0");
        }
        let (eta_lo, eta_hi) = self.eta_range_minutes;
        if !(eta_lo >= 0.0 && eta_lo <= eta_hi) {
            return fail("eta range must be ordered and non-negative");
        }
        if self.vehicle_capacity == 0 {
            return fail("vehicle capacity must be at least 1");
        }
        Ok(())
    }
}

/// All service tiers offered by one brand.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProviderCatalog {
    pub id: ProviderId,
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Template with `{pickup_lat}`, `{pickup_lng}`, `{dropoff_lat}`,
    /// `{dropoff_lng}` and `{service_slug}` placeholders.
    pub base_deep_link: String,
    pub services: Vec<ServiceRateCard>,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RateCatalog {
    pub providers: Vec<ProviderCatalog>,
}

impl RateCatalog {
    pub fn from_json(raw: &str) -> Result<Self, RateCardError> {
        let catalog: RateCatalog = serde_json::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn validate(&self) -> Result<(), RateCardError> {
        if self.providers.iter().all(|p| p.services.is_empty()) {
            return Err(RateCardError::Empty);
        }
        for provider in &self.providers {
            for service in &provider.services {
                service.validate()?;
            }
        }
        Ok(())
    }

    pub fn provider(&self, id: ProviderId) -> Option<&ProviderCatalog> {
        self.providers.iter().find(|p| p.id == id)
    }
}

impl Default for RateCatalog {
    fn default() -> Self {
        Self {
            providers: vec![uber(), ola(), rapido(), namma_yatri()],
        }
    }
}

/// Builder for the built-in tiers. Unset surge means surge never fires.
struct Tier(ServiceRateCard);

fn tier(service_type: &str, vehicle_type: VehicleClass, vehicle_capacity: u8) -> Tier {
    Tier(ServiceRateCard {
        service_type: service_type.to_string(),
        vehicle_type,
        base_fare: 0.0,
        per_km: 0.0,
        per_min: 0.0,
        min_fare: 0.0,
        avg_speed_kmph: 25.0,
        eta_range_minutes: (5.0, 10.0),
        vehicle_capacity,
        rating: None,
        co2_per_km: 0.0,
        confidence: 0.8,
        surge_chance: 0.0,
        surge_range: (1.0, 1.0),
    })
}

impl Tier {
    fn fare(mut self, base_fare: f64, per_km: f64, per_min: f64) -> Self {
        self.0.base_fare = base_fare;
        self.0.per_km = per_km;
        self.0.per_min = per_min;
        self
    }

    fn min_fare(mut self, min_fare: f64) -> Self {
        self.0.min_fare = min_fare;
        self
    }

    fn speed(mut self, avg_speed_kmph: f64) -> Self {
        self.0.avg_speed_kmph = avg_speed_kmph;
        self
    }

    fn eta(mut self, low: f64, high: f64) -> Self {
        self.0.eta_range_minutes = (low, high);
        self
    }

    fn rating(mut self, rating: f32) -> Self {
        self.0.rating = Some(rating);
        self
    }

    fn co2(mut self, grams_per_km: f64) -> Self {
        self.0.co2_per_km = grams_per_km;
        self
    }

    fn confidence(mut self, confidence: f32) -> Self {
        self.0.confidence = confidence;
        self
    }

    fn surge(mut self, chance: f64, low: f64, high: f64) -> Self {
        self.0.surge_chance = chance;
        self.0.surge_range = (low, high);
        self
    }

    fn build(self) -> ServiceRateCard {
        self.0
    }
}

fn uber() -> ProviderCatalog {
    use VehicleClass::*;
    ProviderCatalog {
        id: ProviderId::Uber,
        currency: default_currency(),
        base_deep_link: "https://m.uber.com/ul/?action=setPickup&pickup[latitude]={pickup_lat}\
            &pickup[longitude]={pickup_lng}&dropoff[latitude]={dropoff_lat}\
            &dropoff[longitude]={dropoff_lng}&productType={service_slug}"
            .to_string(),
        services: vec![
            tier("Uber Go", Car, 4)
                .fare(55.0, 11.8, 1.6)
                .min_fare(120.0)
                .speed(30.0)
                .eta(5.0, 12.0)
                .rating(4.82)
                .co2(165.0)
                .confidence(0.95)
                .surge(0.3, 1.2, 1.7)
                .build(),
            tier("Uber Premier", Car, 4)
                .fare(85.0, 16.5, 2.4)
                .min_fare(190.0)
                .speed(32.0)
                .eta(6.0, 14.0)
                .rating(4.9)
                .co2(175.0)
                .confidence(0.97)
                .surge(0.35, 1.2, 1.6)
                .build(),
            tier("Uber Auto", Auto, 3)
                .fare(38.0, 9.2, 1.15)
                .min_fare(85.0)
                .speed(25.0)
                .eta(4.0, 10.0)
                .rating(4.65)
                .co2(95.0)
                .confidence(0.93)
                .surge(0.25, 1.1, 1.4)
                .build(),
        ],
    }
}

fn ola() -> ProviderCatalog {
    use VehicleClass::*;
    ProviderCatalog {
        id: ProviderId::Ola,
        currency: default_currency(),
        base_deep_link: "https://book.olacabs.com/?pickup_lat={pickup_lat}&pickup_lng={pickup_lng}\
            &drop_lat={dropoff_lat}&drop_lng={dropoff_lng}&category={service_slug}"
            .to_string(),
        services: vec![
            tier("Ola Auto", Auto, 3)
                .fare(34.0, 9.0, 1.05)
                .min_fare(80.0)
                .speed(24.0)
                .eta(4.0, 11.0)
                .rating(4.52)
                .co2(90.0)
                .confidence(0.91)
                .surge(0.28, 1.1, 1.5)
                .build(),
            tier("Ola Bike", Bike, 1)
                .fare(28.0, 7.1, 0.85)
                .min_fare(65.0)
                .speed(32.0)
                .eta(3.0, 9.0)
                .rating(4.48)
                .co2(55.0)
                .confidence(0.88)
                .surge(0.18, 1.05, 1.25)
                .build(),
            tier("Ola Prime Sedan", Car, 4)
                .fare(72.0, 14.8, 2.1)
                .min_fare(170.0)
                .speed(30.0)
                .eta(6.0, 15.0)
                .rating(4.7)
                .co2(170.0)
                .confidence(0.92)
                .surge(0.32, 1.15, 1.55)
                .build(),
            tier("Ola XL", Suv, 6)
                .fare(105.0, 18.5, 2.8)
                .min_fare(260.0)
                .speed(28.0)
                .eta(8.0, 16.0)
                .rating(4.68)
                .co2(210.0)
                .confidence(0.89)
                .surge(0.32, 1.15, 1.55)
                .build(),
        ],
    }
}

fn rapido() -> ProviderCatalog {
    use VehicleClass::*;
    ProviderCatalog {
        id: ProviderId::Rapido,
        currency: default_currency(),
        base_deep_link: "https://rapido.bike/book/ride?pickup_lat={pickup_lat}\
            &pickup_lng={pickup_lng}&drop_lat={dropoff_lat}\
            &drop_lng={dropoff_lng}&variant={service_slug}"
            .to_string(),
        services: vec![
            tier("Rapido Bike", Bike, 1)
                .fare(25.0, 6.4, 0.76)
                .min_fare(60.0)
                .speed(34.0)
                .eta(3.0, 8.0)
                .rating(4.35)
                .co2(50.0)
                .confidence(0.78)
                .surge(0.16, 1.05, 1.2)
                .build(),
            tier("Rapido Auto", Auto, 3)
                .fare(30.0, 8.4, 1.0)
                .min_fare(70.0)
                .speed(24.0)
                .eta(4.0, 10.0)
                .rating(4.28)
                .co2(88.0)
                .confidence(0.8)
                .surge(0.22, 1.05, 1.35)
                .build(),
            tier("Rapido Cab Economy", Car, 4)
                .fare(60.0, 12.2, 1.8)
                .min_fare(150.0)
                .speed(29.0)
                .eta(6.0, 13.0)
                .rating(4.6)
                .co2(160.0)
                .confidence(0.86)
                .surge(0.27, 1.1, 1.45)
                .build(),
        ],
    }
}

fn namma_yatri() -> ProviderCatalog {
    use VehicleClass::*;
    ProviderCatalog {
        id: ProviderId::NammaYatri,
        currency: default_currency(),
        base_deep_link: "nammayatri://search?pickup_lat={pickup_lat}&pickup_lng={pickup_lng}\
            &drop_lat={dropoff_lat}&drop_lng={dropoff_lng}&variant={service_slug}"
            .to_string(),
        services: vec![
            tier("Namma Yatri Auto", Auto, 3)
                .fare(30.0, 15.0, 0.5)
                .min_fare(30.0)
                .speed(22.0)
                .eta(3.0, 9.0)
                .rating(4.5)
                .co2(90.0)
                .confidence(0.85)
                .build(),
            tier("Namma Yatri Cab", Car, 4)
                .fare(82.0, 15.8, 2.35)
                .min_fare(200.0)
                .speed(31.0)
                .eta(7.0, 14.0)
                .rating(4.74)
                .co2(175.0)
                .confidence(0.9)
                .surge(0.3, 1.15, 1.5)
                .build(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_covers_every_brand_and_validates() {
        let catalog = RateCatalog::default();
        catalog.validate().expect("built-in catalog is valid");
        for id in ProviderId::ALL {
            let provider = catalog.provider(id).expect("brand present");
            assert!(!provider.services.is_empty(), "{id} has no services");
        }
    }

    #[test]
    fn slug_is_lowercase_and_dashed() {
        let catalog = RateCatalog::default();
        let sedan = &catalog.provider(ProviderId::Ola).expect("ola").services[2];
        assert_eq!(sedan.slug(), "ola-prime-sedan");
    }

    #[test]
    fn json_round_trip_keeps_catalog() {
        let catalog = RateCatalog::default();
        let raw = serde_json::to_string(&catalog).expect("serialize");
        let parsed = RateCatalog::from_json(&raw).expect("parse");
        assert_eq!(parsed, catalog);
    }

    #[test]
    fn rejects_negative_fares_and_inverted_surge() {
        let mut catalog = RateCatalog::default();
        catalog.providers[0].services[0].min_fare = -5.0;
        assert!(matches!(
            catalog.validate(),
            Err(RateCardError::Invalid { .. })
        ));

        let mut catalog = RateCatalog::default();
        catalog.providers[1].services[0].surge_range = (1.5, 1.1);
        let err = catalog.validate().expect_err("inverted surge range");
        assert!(err.to_string().starts_with("Ola Auto"));
    }

    #[test]
    fn rejects_empty_catalog() {
        let err = RateCatalog::from_json(r#"{"providers": []}"#).expect_err("empty");
        assert!(matches!(err, RateCardError::Empty));
    }
}
