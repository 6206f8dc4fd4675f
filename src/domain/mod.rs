//! Pure ride-comparison logic: no IO lives here.

pub mod comparison;
pub mod entities;
pub mod fare;
pub mod gazetteer;
pub mod location_ranking;
pub mod rate_card;
pub mod traffic;

pub use comparison::{build_response, cache_key, sort_results};
pub use entities::{
    CompareResponse, Eta, Location, LocationSuggestion, Price, ProviderId, ResponseMeta, RideMeta,
    RideRequest, RideResult, SuggestionSource, ValidationError, VehicleClass,
};
pub use fare::{FareSynthesizer, JitterMode};
pub use rate_card::{RateCardError, RateCatalog};
pub use traffic::TrafficProfile;
