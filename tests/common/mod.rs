#![allow(dead_code)]

use std::{future, sync::Arc, time::Duration};

use axum::Router;
use cabsync::domain::fare::JitterMode;
use cabsync::{serve, AppState, Config};
use tokio::net::TcpListener;

/// Nothing listens here, so geocoder calls fail fast.
pub const UNREACHABLE: &str = "http://127.0.0.1:9/";

pub fn test_config() -> Config {
    Config {
        fare_jitter: JitterMode::Disabled,
        nominatim_url: UNREACHABLE.to_string(),
        photon_url: UNREACHABLE.to_string(),
        geocoder_timeout: Duration::from_millis(500),
        compare_cache_ttl: Duration::ZERO,
        ..Config::default()
    }
}

pub struct TestApp {
    pub base: String,
    pub state: Arc<AppState>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }
}

/// Bind first so the config can refer to the app's own address.
pub async fn spawn_app_with(configure: impl FnOnce(&str) -> Config) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let base = format!("http://{}", listener.local_addr().expect("local addr"));
    let state = AppState::from_config(configure(&base)).expect("app state");
    tokio::spawn(serve(listener, state.clone(), future::pending()));
    TestApp {
        base,
        state,
        client: reqwest::Client::new(),
    }
}

pub async fn spawn_app(config: Config) -> TestApp {
    spawn_app_with(|_| config).await
}

/// Serve a stub upstream; returns its base URL with a trailing slash.
pub async fn spawn_stub(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub");
    let addr = listener.local_addr().expect("stub addr");
    tokio::spawn(async move { axum::serve(listener, router).await.expect("stub serve") });
    format!("http://{addr}/")
}
