//! Beckn mobility client: `search` requests to a gateway and parsing of the
//! asynchronous `on_search` callbacks.

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::entities::{
    Eta, Location, Price, ProviderId, RideMeta, RideRequest, RideResult, VehicleClass,
    DEFAULT_CURRENCY,
};
use crate::infra::transactions::TransactionStore;

pub const DOMAIN: &str = "mobility";
pub const COUNTRY: &str = "IND";
pub const CORE_VERSION: &str = "1.1.0";

const DEFAULT_ETA_SECONDS: u32 = 300;
const DEFAULT_ETA_TEXT: &str = "Unknown";
const DEFAULT_SERVICE_NAME: &str = "Auto Rickshaw";
const DEFAULT_RATING: f32 = 4.5;
const DEFAULT_CO2_ESTIMATE: f64 = 0.12;

#[derive(Debug, Error)]
pub enum BecknError {
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("beckn gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("beckn gateway returned {status}: {body}")]
    Gateway { status: StatusCode, body: String },
    #[error("{0}")]
    Failed(String),
    #[error("unknown transaction {0}")]
    UnknownTransaction(String),
}

/// Identity this app presents to the Beckn network.
#[derive(Clone, Debug)]
pub struct BecknSettings {
    pub gateway_url: String,
    pub bap_id: String,
    pub bap_uri: String,
    pub city_code: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BecknContext {
    pub domain: String,
    pub country: String,
    pub city: String,
    pub action: String,
    #[serde(alias = "core_version")]
    pub version: String,
    pub bap_id: String,
    pub bap_uri: String,
    pub transaction_id: String,
    pub message_id: String,
    pub timestamp: String,
}

impl BecknContext {
    /// Fresh context with new transaction and message ids.
    pub fn new(action: &str, settings: &BecknSettings) -> Self {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            domain: DOMAIN.to_string(),
            country: COUNTRY.to_string(),
            city: settings.city_code.clone(),
            action: action.to_string(),
            version: CORE_VERSION.to_string(),
            bap_id: settings.bap_id.clone(),
            bap_uri: settings.bap_uri.clone(),
            transaction_id: Uuid::new_v4().to_string(),
            message_id: Uuid::new_v4().to_string(),
            timestamp,
        }
    }
}

fn gps(location: &Location) -> String {
    format!("{},{}", location.lat, location.lng)
}

pub fn search_payload(context: &BecknContext, request: &RideRequest) -> Value {
    json!({
        "context": context,
        "message": {
            "intent": {
                "fulfillment": {
                    "start": {"location": {"gps": gps(&request.pickup)}},
                    "end": {"location": {"gps": gps(&request.dropoff)}}
                }
            }
        }
    })
}

#[derive(Clone)]
pub struct BecknClient {
    http: Client,
    gateway: Url,
    settings: BecknSettings,
}

impl BecknClient {
    pub fn new(http: Client, settings: BecknSettings) -> Result<Self, BecknError> {
        let base = settings.gateway_url.trim_end_matches('/');
        let gateway = Url::parse(&format!("{base}/"))?;
        Ok(Self {
            http,
            gateway,
            settings,
        })
    }

    pub fn new_search_context(&self) -> BecknContext {
        BecknContext::new("search", &self.settings)
    }

    /// POST `{gateway}/search`. The gateway only ACKs here; offers arrive
    /// later on the callback.
    pub async fn search(
        &self,
        context: &BecknContext,
        request: &RideRequest,
    ) -> Result<(), BecknError> {
        let url = self.gateway.join("search")?;
        let response = self
            .http
            .post(url)
            .json(&search_payload(context, request))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, transaction_id = %context.transaction_id, "beckn search rejected");
            return Err(BecknError::Gateway { status, body });
        }
        info!(transaction_id = %context.transaction_id, "beckn search acknowledged");
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct OnSearchCallback {
    #[serde(default)]
    pub context: Value,
    #[serde(default)]
    pub message: Value,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AckStatus {
    Ack,
    Nack,
}

#[derive(Debug, Serialize)]
pub struct AckResponse {
    message: AckMessage,
}

#[derive(Debug, Serialize)]
struct AckMessage {
    ack: AckBody,
}

#[derive(Debug, Serialize)]
struct AckBody {
    status: AckStatus,
}

impl AckResponse {
    pub fn new(status: AckStatus) -> Self {
        Self {
            message: AckMessage {
                ack: AckBody { status },
            },
        }
    }
}

/// Record an `on_search` callback against its transaction.
pub async fn handle_on_search(store: &TransactionStore, callback: OnSearchCallback) -> AckStatus {
    let Some(transaction_id) = callback
        .context
        .get("transaction_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
    else {
        warn!("beckn callback without transaction_id");
        return AckStatus::Nack;
    };

    if let Some(error) = callback.error.as_ref().filter(|e| is_set(e)) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Unknown error")
            .to_string();
        warn!(transaction_id, error = %message, "beckn provider reported an error");
        return match store.fail(transaction_id, message).await {
            Ok(()) => AckStatus::Ack,
            Err(err) => {
                warn!(%err, "beckn error callback for unknown transaction");
                AckStatus::Nack
            }
        };
    }

    let results = parse_catalog(&callback.message);
    let count = results.len();
    match store.complete(transaction_id, results).await {
        Ok(()) => {
            info!(transaction_id, offers = count, "processed beckn on_search");
            AckStatus::Ack
        }
        Err(err) => {
            warn!(%err, "beckn callback for unknown transaction");
            AckStatus::Nack
        }
    }
}

/// Null, `false`, zero and empty strings, arrays or objects count as unset.
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// `message.catalog.providers[].items[]` to ride results. Items that do not
/// parse are skipped.
pub fn parse_catalog(message: &Value) -> Vec<RideResult> {
    let providers = message
        .pointer("/catalog/providers")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    providers
        .iter()
        .filter_map(|provider| provider.get("items").and_then(Value::as_array))
        .flatten()
        .filter_map(|item| match serde_json::from_value::<CatalogItem>(item.clone()) {
            Ok(parsed) => parsed.into_result(),
            Err(error) => {
                warn!(%error, "skipping unparseable beckn item");
                None
            }
        })
        .collect()
}

/// Seconds from text such as "ETA 5 mins"; 300 when no minutes are given.
pub fn parse_eta_seconds(text: &str) -> u32 {
    if !text.to_lowercase().contains("min") {
        return DEFAULT_ETA_SECONDS;
    }
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits
        .parse::<u32>()
        .ok()
        .and_then(|minutes| minutes.checked_mul(60))
        .unwrap_or(DEFAULT_ETA_SECONDS)
}

#[derive(Debug, Deserialize)]
struct CatalogItem {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    descriptor: Descriptor,
    #[serde(default)]
    price: CatalogPrice,
    #[serde(default)]
    fulfillment: Fulfillment,
}

#[derive(Debug, Default, Deserialize)]
struct Descriptor {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPrice {
    #[serde(default)]
    value: PriceValue,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PriceValue {
    Number(f64),
    Text(String),
}

/// Items that carry no price are quoted at zero.
impl Default for PriceValue {
    fn default() -> Self {
        PriceValue::Number(0.0)
    }
}

impl PriceValue {
    fn amount(&self) -> Option<f64> {
        let amount = match self {
            PriceValue::Number(value) => Some(*value),
            PriceValue::Text(text) => text.trim().parse::<f64>().ok(),
        };
        amount.filter(|value| value.is_finite() && *value >= 0.0)
    }
}

#[derive(Debug, Default, Deserialize)]
struct Fulfillment {
    #[serde(default)]
    state: FulfillmentState,
}

#[derive(Debug, Default, Deserialize)]
struct FulfillmentState {
    #[serde(default)]
    descriptor: Descriptor,
}

impl CatalogItem {
    fn into_result(self) -> Option<RideResult> {
        let Some(value) = self.price.value.amount() else {
            warn!(price = ?self.price.value, "skipping beckn item with invalid price");
            return None;
        };
        let service_type = self
            .descriptor
            .name
            .unwrap_or_else(|| DEFAULT_SERVICE_NAME.to_string());
        let eta_text = self
            .fulfillment
            .state
            .descriptor
            .name
            .unwrap_or_else(|| DEFAULT_ETA_TEXT.to_string());
        let item_id = match self.id {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => String::new(),
        };
        let capacity = if VehicleClass::from_service_name(&service_type) == VehicleClass::Auto {
            3
        } else {
            4
        };

        Some(RideResult {
            provider: ProviderId::NammaYatri,
            price: Price {
                value,
                currency: DEFAULT_CURRENCY.to_string(),
                confidence: 1.0,
            },
            eta: Eta {
                seconds: parse_eta_seconds(&eta_text),
                text: eta_text,
            },
            distance: 0,
            deep_link: format!("nammayatri://ride/{item_id}"),
            surge: None,
            meta: Some(RideMeta {
                vehicle_capacity: Some(capacity),
                rating: Some(DEFAULT_RATING),
                co2_estimate: Some(DEFAULT_CO2_ESTIMATE),
            }),
            service_type,
        })
    }
}
