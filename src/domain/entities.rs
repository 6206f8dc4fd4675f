use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

/// Currency symbol used for every built-in rate card.
pub const DEFAULT_CURRENCY: &str = "₹";

/// Ride-hailing brands whose offers are compared.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    Uber,
    Ola,
    Rapido,
    NammaYatri,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::Uber,
        ProviderId::Ola,
        ProviderId::Rapido,
        ProviderId::NammaYatri,
    ];

    /// Wire tag, also used as the registry key.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Uber => "uber",
            ProviderId::Ola => "ola",
            ProviderId::Rapido => "rapido",
            ProviderId::NammaYatri => "namma_yatri",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderId::Uber => "Uber",
            ProviderId::Ola => "Ola",
            ProviderId::Rapido => "Rapido",
            ProviderId::NammaYatri => "Namma Yatri",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read case-insensitively. Names outside the four classes become
/// [`VehicleClass::Other`], which no service matches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum VehicleClass {
    Bike,
    Auto,
    Car,
    Suv,
    Other,
}

impl From<String> for VehicleClass {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bike" => VehicleClass::Bike,
            "auto" => VehicleClass::Auto,
            "car" => VehicleClass::Car,
            "suv" => VehicleClass::Suv,
            _ => VehicleClass::Other,
        }
    }
}

impl VehicleClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Bike => "bike",
            VehicleClass::Auto => "auto",
            VehicleClass::Car => "car",
            VehicleClass::Suv => "suv",
            VehicleClass::Other => "other",
        }
    }

    /// Best-effort classification from a free-text service name
    /// ("Auto Rickshaw", "Moto", "Cab XL").
    pub fn from_service_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("auto") {
            VehicleClass::Auto
        } else if lower.contains("bike") || lower.contains("moto") {
            VehicleClass::Bike
        } else if lower.contains("xl") || lower.contains("suv") {
            VehicleClass::Suv
        } else {
            VehicleClass::Car
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field} latitude {value} is outside [-90, 90]")]
    Latitude { field: &'static str, value: f64 },
    #[error("{field} longitude {value} is outside [-180, 180]")]
    Longitude { field: &'static str, value: f64 },
    #[error("seaterCapacity must be at least 1")]
    SeaterCapacity,
}

/// A geocoded point. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
}

impl Location {
    pub fn new(lat: f64, lng: f64, address: impl Into<String>) -> Self {
        Self {
            lat,
            lng,
            address: address.into(),
            place_id: None,
        }
    }

    pub fn validate(&self, field: &'static str) -> Result<(), ValidationError> {
        validate_coordinates(field, self.lat, self.lng)
    }
}

/// Range check shared by request bodies and query strings. NaN fails both checks.
pub fn validate_coordinates(
    field: &'static str,
    lat: f64,
    lng: f64,
) -> Result<(), ValidationError> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ValidationError::Latitude { field, value: lat });
    }
    if !(-180.0..=180.0).contains(&lng) {
        return Err(ValidationError::Longitude { field, value: lng });
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideRequest {
    pub pickup: Location,
    pub dropoff: Location,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub when: Option<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<VehicleClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seater_capacity: Option<u8>,
}

impl RideRequest {
    pub fn new(pickup: Location, dropoff: Location) -> Self {
        Self {
            pickup,
            dropoff,
            when: None,
            vehicle_type: None,
            seater_capacity: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pickup.validate("pickup")?;
        self.dropoff.validate("dropoff")?;
        if self.seater_capacity == Some(0) {
            return Err(ValidationError::SeaterCapacity);
        }
        Ok(())
    }

    /// True when a service of the given class and capacity passes the
    /// request's optional filters.
    pub fn accepts(&self, class: VehicleClass, capacity: Option<u8>) -> bool {
        if let Some(wanted) = self.vehicle_type {
            if wanted != class {
                return false;
            }
        }
        if let Some(seats) = self.seater_capacity {
            if capacity != Some(seats) {
                return false;
            }
        }
        true
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Price {
    pub value: f64,
    pub currency: String,
    /// 1.0 for a live quote, lower for synthesized estimates.
    pub confidence: f32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Eta {
    pub seconds: u32,
    pub text: String,
}

impl Eta {
    /// Pickup ETA from fractional minutes, floored at 30 seconds / "1 min".
    pub fn from_minutes(minutes: f64) -> Self {
        let seconds = (minutes.max(0.0) * 60.0) as u32;
        let display_minutes = minutes.round().max(1.0) as u32;
        Self {
            seconds: seconds.max(30),
            text: format!("{display_minutes} min"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_capacity: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub co2_estimate: Option<f64>,
}

impl RideMeta {
    pub fn is_empty(&self) -> bool {
        self.vehicle_capacity.is_none() && self.rating.is_none() && self.co2_estimate.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RideResult {
    pub provider: ProviderId,
    pub service_type: String,
    pub price: Price,
    pub eta: Eta,
    /// Trip distance in meters.
    pub distance: u32,
    #[serde(default)]
    pub deep_link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surge: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<RideMeta>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub queried_at: String,
    pub cache_key: String,
    pub total_providers: usize,
    #[serde(default)]
    pub failed_providers: Vec<ProviderId>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompareResponse {
    pub results: Vec<RideResult>,
    pub meta: ResponseMeta,
}

/// Where a location suggestion came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    Nominatim,
    Photon,
    Gazetteer,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSuggestion {
    pub name: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    pub source: SuggestionSource,
    #[serde(default)]
    pub score: f64,
}
