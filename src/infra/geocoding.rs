//! Geocoding clients (Nominatim, Photon) and the location search service
//! that merges them.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::entities::{LocationSuggestion, SuggestionSource};
use crate::domain::gazetteer;
use crate::domain::location_ranking::{is_searchable, normalize_query, rank};
use crate::infra::cache::{CacheStatus, CachedPayload, TtlCache};

/// Proximity hints bias results within roughly this many degrees.
const VIEWBOX_HALF_SPAN_DEG: f64 = 0.5;
/// Gazetteer entries within this radius stand in for a failed reverse lookup.
pub const REVERSE_FALLBACK_RADIUS_M: f64 = 500.0;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("http request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geocoder error: {0}")]
    Upstream(String),
}

fn base_url(raw: &str) -> Result<Url, url::ParseError> {
    if raw.ends_with('/') {
        Url::parse(raw)
    } else {
        Url::parse(&format!("{raw}/"))
    }
}

#[derive(Clone)]
pub struct NominatimClient {
    http: Client,
    base_url: Url,
}

impl NominatimClient {
    pub fn new(http: Client, base: &str) -> Result<Self, GeocodeError> {
        Ok(Self {
            http,
            base_url: base_url(base)?,
        })
    }

    pub async fn search(
        &self,
        query: &str,
        proximity: Option<(f64, f64)>,
        limit: usize,
    ) -> Result<Vec<LocationSuggestion>, GeocodeError> {
        let mut url = self.base_url.join("search")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", query)
                .append_pair("format", "jsonv2")
                .append_pair("limit", &limit.to_string())
                .append_pair("accept-language", "en");
            if let Some((lat, lng)) = proximity {
                let viewbox = format!(
                    "{},{},{},{}",
                    lng - VIEWBOX_HALF_SPAN_DEG,
                    lat + VIEWBOX_HALF_SPAN_DEG,
                    lng + VIEWBOX_HALF_SPAN_DEG,
                    lat - VIEWBOX_HALF_SPAN_DEG
                );
                pairs.append_pair("viewbox", &viewbox).append_pair("bounded", "0");
            }
        }

        let places: Vec<NominatimPlace> = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(places.into_iter().filter_map(NominatimPlace::into_suggestion).collect())
    }

    pub async fn reverse(&self, lat: f64, lng: f64) -> Result<String, GeocodeError> {
        let mut url = self.base_url.join("reverse")?;
        url.query_pairs_mut()
            .append_pair("lat", &lat.to_string())
            .append_pair("lon", &lng.to_string())
            .append_pair("format", "jsonv2")
            .append_pair("zoom", "18")
            .append_pair("accept-language", "en");

        let body: NominatimReverse = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match (body.display_name, body.error) {
            (Some(name), _) if !name.trim().is_empty() => Ok(name),
            (_, Some(error)) => Err(GeocodeError::Upstream(error)),
            _ => Err(GeocodeError::Upstream("empty reverse geocode result".into())),
        }
    }
}

#[derive(Clone)]
pub struct PhotonClient {
    http: Client,
    base_url: Url,
}

impl PhotonClient {
    pub fn new(http: Client, base: &str) -> Result<Self, GeocodeError> {
        Ok(Self {
            http,
            base_url: base_url(base)?,
        })
    }

    pub async fn search(
        &self,
        query: &str,
        proximity: Option<(f64, f64)>,
        limit: usize,
    ) -> Result<Vec<LocationSuggestion>, GeocodeError> {
        let mut url = self.base_url.join("api")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs
                .append_pair("q", query)
                .append_pair("limit", &limit.to_string())
                .append_pair("lang", "en");
            if let Some((lat, lng)) = proximity {
                pairs
                    .append_pair("lat", &lat.to_string())
                    .append_pair("lon", &lng.to_string());
            }
        }

        let collection: PhotonCollection = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(collection
            .features
            .into_iter()
            .filter_map(PhotonFeature::into_suggestion)
            .collect())
    }
}

/// Where a search response came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchSource {
    Geocoder,
    Cache,
    StaleCache,
    Gazetteer,
    None,
}

#[derive(Clone, Debug)]
pub struct SearchOutcome {
    pub results: Vec<LocationSuggestion>,
    pub source: SearchSource,
}

impl SearchOutcome {
    fn empty() -> Self {
        Self {
            results: Vec::new(),
            source: SearchSource::None,
        }
    }
}

impl From<CachedPayload<Vec<LocationSuggestion>>> for SearchOutcome {
    fn from(payload: CachedPayload<Vec<LocationSuggestion>>) -> Self {
        let source = match payload.status {
            CacheStatus::Fresh => SearchSource::Geocoder,
            CacheStatus::Cached => SearchSource::Cache,
            CacheStatus::Stale => SearchSource::StaleCache,
        };
        Self {
            results: payload.data,
            source,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReverseSource {
    Nominatim,
    Gazetteer,
    Coordinates,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReverseOutcome {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub source: ReverseSource,
}

/// `(normalized query, proximity rounded to ~1 km, limit)`.
type SearchKey = (String, Option<(i64, i64)>, usize);

fn search_key(query: &str, proximity: Option<(f64, f64)>, limit: usize) -> SearchKey {
    let hint = proximity
        .map(|(lat, lng)| ((lat * 100.0).round() as i64, (lng * 100.0).round() as i64));
    (query.to_string(), hint, limit)
}

/// Fans a query out to both geocoders, merges and ranks the answers.
pub struct LocationSearch {
    nominatim: NominatimClient,
    photon: PhotonClient,
    cache: TtlCache<SearchKey, Vec<LocationSuggestion>>,
}

impl LocationSearch {
    pub fn new(nominatim: NominatimClient, photon: PhotonClient, cache_ttl: Duration) -> Self {
        Self {
            nominatim,
            photon,
            cache: TtlCache::new(cache_ttl),
        }
    }

    pub async fn search(
        &self,
        raw_query: &str,
        proximity: Option<(f64, f64)>,
        limit: usize,
    ) -> SearchOutcome {
        let query = normalize_query(raw_query);
        if !is_searchable(&query) {
            return SearchOutcome::empty();
        }

        let key = search_key(&query, proximity, limit);
        if let Some(hit) = self.cache.get_fresh(&key).await {
            debug!(query = %query, status = hit.status.as_str(), "serving cached location search");
            return hit.into();
        }

        let (nominatim, photon) = tokio::join!(
            self.nominatim.search(&query, proximity, limit),
            self.photon.search(&query, proximity, limit),
        );

        let mut merged = Vec::new();
        let mut failures = 0;
        for (backend, outcome) in [("nominatim", nominatim), ("photon", photon)] {
            match outcome {
                Ok(found) => {
                    debug!(backend, count = found.len(), "geocoder answered");
                    merged.extend(found);
                }
                Err(error) => {
                    warn!(backend, %error, "geocoder request failed");
                    failures += 1;
                }
            }
        }

        if !merged.is_empty() {
            let results = rank(&query, merged, limit);
            return self.cache.insert(key, results).await.into();
        }

        if failures > 0 {
            if let Some(stale) = self.cache.get_stale(&key).await {
                warn!(
                    query = %query,
                    status = stale.status.as_str(),
                    "geocoders unavailable, serving stale results"
                );
                return stale.into();
            }
        }

        SearchOutcome {
            results: gazetteer::search(&query, limit),
            source: SearchSource::Gazetteer,
        }
    }

    pub async fn reverse(&self, lat: f64, lng: f64) -> ReverseOutcome {
        match self.nominatim.reverse(lat, lng).await {
            Ok(address) => {
                return ReverseOutcome {
                    address,
                    lat,
                    lng,
                    source: ReverseSource::Nominatim,
                }
            }
            Err(error) => warn!(%error, lat, lng, "reverse geocode failed"),
        }

        match gazetteer::nearest(lat, lng, REVERSE_FALLBACK_RADIUS_M) {
            Some(entry) => ReverseOutcome {
                address: entry.address.to_string(),
                lat,
                lng,
                source: ReverseSource::Gazetteer,
            },
            None => ReverseOutcome {
                address: format!("{lat:.5}, {lng:.5}"),
                lat,
                lng,
                source: ReverseSource::Coordinates,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    #[serde(default, deserialize_with = "string_or_number")]
    place_id: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    lat: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    lon: Option<String>,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    importance: Option<f64>,
}

impl NominatimPlace {
    fn into_suggestion(self) -> Option<LocationSuggestion> {
        let lat = self.lat?.parse::<f64>().ok()?;
        let lng = self.lon?.parse::<f64>().ok()?;
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.display_name.split(',').next().map(|s| s.trim().to_string()))
            .filter(|n| !n.is_empty())?;
        Some(LocationSuggestion {
            name,
            address: self.display_name,
            lat,
            lng,
            place_id: self.place_id,
            place_type: self.kind,
            importance: self.importance,
            source: SuggestionSource::Nominatim,
            score: 0.0,
        })
    }
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotonCollection {
    #[serde(default)]
    features: Vec<PhotonFeature>,
}

#[derive(Debug, Deserialize)]
struct PhotonFeature {
    geometry: PhotonGeometry,
    #[serde(default)]
    properties: PhotonProperties,
}

#[derive(Debug, Deserialize)]
struct PhotonGeometry {
    /// `[lng, lat]`.
    coordinates: Vec<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct PhotonProperties {
    #[serde(default, deserialize_with = "string_or_number")]
    osm_id: Option<String>,
    #[serde(default)]
    osm_type: Option<String>,
    #[serde(default)]
    osm_value: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    housenumber: Option<String>,
    #[serde(default)]
    street: Option<String>,
    #[serde(default)]
    district: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

impl PhotonFeature {
    fn into_suggestion(self) -> Option<LocationSuggestion> {
        let (lng, lat) = match self.geometry.coordinates.as_slice() {
            [lng, lat, ..] => (*lng, *lat),
            _ => return None,
        };
        let props = self.properties;
        let street = match (&props.street, &props.housenumber) {
            (Some(street), Some(number)) => Some(format!("{number} {street}")),
            (Some(street), None) => Some(street.clone()),
            _ => None,
        };
        let name = props.name.clone().or_else(|| street.clone())?;

        let mut parts: Vec<String> = Vec::new();
        for part in [
            Some(name.clone()),
            street,
            props.district,
            props.city,
            props.state,
            props.country,
        ]
        .into_iter()
        .flatten()
        {
            if parts.last() != Some(&part) {
                parts.push(part);
            }
        }

        let place_id = props
            .osm_id
            .map(|id| format!("{}{id}", props.osm_type.unwrap_or_default()));
        Some(LocationSuggestion {
            name,
            address: parts.join(", "),
            lat,
            lng,
            place_id,
            place_type: props.osm_value,
            importance: None,
            source: SuggestionSource::Photon,
            score: 0.0,
        })
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct StringOrNumber;

    impl<'de> serde::de::Visitor<'de> for StringOrNumber {
        type Value = Option<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_string<E>(self, value: String) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Some(value.to_string()))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(None)
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}
