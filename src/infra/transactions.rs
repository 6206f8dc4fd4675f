//! In-flight Beckn searches awaiting their `on_search` callback.

use std::{collections::HashMap, sync::Arc, time::Duration};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::entities::{RideRequest, RideResult, VehicleClass};
use crate::infra::beckn::BecknError;

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(10 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Timeout,
}

#[derive(Clone, Debug)]
pub struct TransactionState {
    pub transaction_id: String,
    pub request: RideRequest,
    pub status: TransactionStatus,
    pub results: Vec<RideResult>,
    pub error: Option<String>,
    pub created_at: Instant,
    pub callback_received_at: Option<OffsetDateTime>,
    notify: Arc<Notify>,
}

impl TransactionState {
    fn new(transaction_id: String, request: RideRequest) -> Self {
        Self {
            transaction_id,
            request,
            status: TransactionStatus::Pending,
            results: Vec::new(),
            error: None,
            created_at: Instant::now(),
            callback_received_at: None,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Offers that pass the original request's vehicle and seat filters.
    fn matching_offers(&self) -> Vec<RideResult> {
        self.results
            .iter()
            .filter(|offer| {
                let capacity = offer.meta.as_ref().and_then(|m| m.vehicle_capacity);
                self.request
                    .accepts(VehicleClass::from_service_name(&offer.service_type), capacity)
            })
            .cloned()
            .collect()
    }

    fn settle(&mut self, status: TransactionStatus) {
        debug!(transaction_id = %self.transaction_id, ?status, "beckn transaction settled");
        self.status = status;
        self.callback_received_at = Some(OffsetDateTime::now_utc());
        // notify_one keeps a permit when nobody is waiting yet.
        self.notify.notify_one();
    }
}

/// Transaction table keyed by Beckn `transaction_id`.
pub struct TransactionStore {
    entries: Mutex<HashMap<String, TransactionState>>,
    retention: Duration,
}

impl Default for TransactionStore {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl TransactionStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            retention,
        }
    }

    /// Register a pending search. Entries older than the retention window are
    /// dropped first.
    pub async fn begin(&self, transaction_id: &str, request: RideRequest) {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, state| state.created_at.elapsed() < self.retention);
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "purged expired beckn transactions");
        }
        entries.insert(
            transaction_id.to_string(),
            TransactionState::new(transaction_id.to_string(), request),
        );
    }

    pub async fn complete(
        &self,
        transaction_id: &str,
        results: Vec<RideResult>,
    ) -> Result<(), BecknError> {
        let mut entries = self.entries.lock().await;
        let state = entries
            .get_mut(transaction_id)
            .ok_or_else(|| BecknError::UnknownTransaction(transaction_id.to_string()))?;
        state.results = results;
        state.settle(TransactionStatus::Completed);
        Ok(())
    }

    pub async fn fail(&self, transaction_id: &str, error: String) -> Result<(), BecknError> {
        let mut entries = self.entries.lock().await;
        let state = entries
            .get_mut(transaction_id)
            .ok_or_else(|| BecknError::UnknownTransaction(transaction_id.to_string()))?;
        state.error = Some(error);
        state.settle(TransactionStatus::Failed);
        Ok(())
    }

    pub async fn remove(&self, transaction_id: &str) -> Option<TransactionState> {
        self.entries.lock().await.remove(transaction_id)
    }

    pub async fn contains(&self, transaction_id: &str) -> bool {
        self.entries.lock().await.contains_key(transaction_id)
    }

    pub async fn get(&self, transaction_id: &str) -> Option<TransactionState> {
        self.entries.lock().await.get(transaction_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Wait up to `timeout` for the callback.
    ///
    /// Completed yields the parsed offers, failed yields
    /// [`BecknError::Failed`], and a timeout marks the entry and yields no
    /// offers.
    pub async fn wait(
        &self,
        transaction_id: &str,
        timeout: Duration,
    ) -> Result<Vec<RideResult>, BecknError> {
        let notify = {
            let entries = self.entries.lock().await;
            let state = entries
                .get(transaction_id)
                .ok_or_else(|| BecknError::UnknownTransaction(transaction_id.to_string()))?;
            state.notify.clone()
        };

        let notified = tokio::time::timeout(timeout, notify.notified()).await.is_ok();

        let mut entries = self.entries.lock().await;
        let state = entries
            .get_mut(transaction_id)
            .ok_or_else(|| BecknError::UnknownTransaction(transaction_id.to_string()))?;

        match state.status {
            TransactionStatus::Completed => {
                let offers = state.matching_offers();
                info!(
                    transaction_id,
                    received = state.results.len(),
                    offers = offers.len(),
                    "beckn callback received"
                );
                Ok(offers)
            }
            TransactionStatus::Failed => Err(BecknError::Failed(
                state.error.clone().unwrap_or_else(|| "Beckn search failed".to_string()),
            )),
            TransactionStatus::Pending | TransactionStatus::Timeout => {
                if !notified {
                    warn!(transaction_id, ?timeout, "beckn search timed out");
                }
                state.status = TransactionStatus::Timeout;
                Ok(Vec::new())
            }
        }
    }
}
