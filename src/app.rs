use std::{future::Future, sync::Arc, time::Duration};

use reqwest::Client;
use thiserror::Error;
use tokio::{
    net::TcpListener,
    signal::{self, ctrl_c},
};
use tracing::info;

use crate::config::{Config, ConfigError};
use crate::domain::fare::FareSynthesizer;
use crate::domain::traffic::TrafficProfile;
use crate::http;
use crate::infra::aggregator::RideAggregator;
use crate::infra::beckn::{BecknClient, BecknError, BecknSettings};
use crate::infra::geocoding::{GeocodeError, LocationSearch, NominatimClient, PhotonClient};
use crate::infra::providers::{BecknProvider, ProviderRegistry};
use crate::infra::transactions::TransactionStore;
use crate::util::version::user_agent;

/// Timeout for the gateway's synchronous ACK, not for the callback.
const BECKN_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error(transparent)]
    Geocoder(#[from] GeocodeError),
    #[error(transparent)]
    Beckn(#[from] BecknError),
    #[error("no ride providers configured")]
    NoProviders,
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared across all handlers.
pub struct AppState {
    pub config: Config,
    pub aggregator: RideAggregator,
    pub locations: LocationSearch,
    pub transactions: Arc<TransactionStore>,
}

impl AppState {
    pub fn from_config(config: Config) -> Result<Arc<Self>, StartupError> {
        let catalog = config.rate_catalog()?;
        let synthesizer = Arc::new(FareSynthesizer::new(
            TrafficProfile::default(),
            config.fare_jitter,
        ));
        let transactions = Arc::new(TransactionStore::default());

        let beckn = if config.namma_yatri_enabled {
            let http = Client::builder()
                .user_agent(user_agent())
                .timeout(BECKN_REQUEST_TIMEOUT)
                .build()?;
            let client = BecknClient::new(
                http,
                BecknSettings {
                    gateway_url: config.beckn_gateway_url.clone(),
                    bap_id: config.bap_id.clone(),
                    bap_uri: config.bap_uri.clone(),
                    city_code: config.beckn_city_code.clone(),
                },
            )?;
            info!(gateway = %config.beckn_gateway_url, "Namma Yatri quotes via Beckn");
            Some(BecknProvider::new(
                client,
                transactions.clone(),
                config.beckn_callback_timeout,
            ))
        } else {
            info!("Namma Yatri quotes synthesized from rate cards");
            None
        };

        let registry =
            ProviderRegistry::from_catalog(&catalog, synthesizer, config.local_offset, beckn);
        if registry.is_empty() {
            return Err(StartupError::NoProviders);
        }
        let aggregator =
            RideAggregator::new(registry, config.compare_cache_ttl, config.local_offset);

        let geocoder_http = Client::builder()
            .user_agent(user_agent())
            .timeout(config.geocoder_timeout)
            .build()?;
        let locations = LocationSearch::new(
            NominatimClient::new(geocoder_http.clone(), &config.nominatim_url)?,
            PhotonClient::new(geocoder_http, &config.photon_url)?,
            config.location_cache_ttl,
        );

        Ok(Arc::new(Self {
            config,
            aggregator,
            locations,
            transactions,
        }))
    }
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = http::router(state);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

pub async fn start_server(config: Config) -> Result<(), StartupError> {
    info!("Initializing state...");
    let address = config.bind_address();
    let state = AppState::from_config(config)?;
    info!(
        providers = ?state.aggregator.list_platforms(),
        "Starting server..."
    );

    info!("Binding to {address}");
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    serve(listener, state, shutdown_signal()).await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(err) => {
                tracing::error!("Failed to install Ctrl+C handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                tracing::error!("Failed to install signal handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
