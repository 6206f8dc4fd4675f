mod common;

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use cabsync::Config;
use common::{spawn_app, spawn_stub, test_config};
use serde_json::{json, Value};

#[derive(Clone, Default)]
struct Upstream {
    down: Arc<AtomicBool>,
}

async fn nominatim_search(State(upstream): State<Upstream>) -> impl IntoResponse {
    if upstream.down.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    Json(json!([
        {
            "place_id": 1001,
            "lat": "12.9756",
            "lon": "77.6066",
            "display_name": "MG Road, Bengaluru, Karnataka, India",
            "name": "MG Road",
            "type": "primary",
            "importance": 0.4
        },
        {
            "place_id": 1002,
            "lat": "12.9763",
            "lon": "77.6033",
            "display_name": "MG Road Metro Station, Bengaluru, Karnataka, India",
            "name": "MG Road Metro Station",
            "type": "station",
            "importance": 0.5
        }
    ]))
    .into_response()
}

async fn photon_search(State(upstream): State<Upstream>) -> impl IntoResponse {
    if upstream.down.load(Ordering::SeqCst) {
        return StatusCode::BAD_GATEWAY.into_response();
    }
    Json(json!({"features": [
        {
            "geometry": {"coordinates": [77.60662, 12.97561]},
            "properties": {
                "osm_id": 9,
                "osm_type": "W",
                "osm_value": "primary",
                "name": "MG Road",
                "city": "Bengaluru",
                "state": "Karnataka",
                "country": "India"
            }
        },
        {
            "geometry": {"coordinates": [77.6101, 12.9735]},
            "properties": {"osm_id": 10, "osm_type": "N", "osm_value": "mall",
                           "name": "MG Road Boulevard", "city": "Bengaluru", "country": "India"}
        }
    ]}))
    .into_response()
}

async fn nominatim_reverse() -> Json<Value> {
    Json(json!({"display_name": "Cubbon Park, Bengaluru, Karnataka, India"}))
}

async fn geocoder_stubs(upstream: Upstream) -> (String, String) {
    let nominatim = Router::new()
        .route("/search", get(nominatim_search))
        .route("/reverse", get(nominatim_reverse))
        .with_state(upstream.clone());
    let photon = Router::new()
        .route("/api", get(photon_search))
        .with_state(upstream);
    (spawn_stub(nominatim).await, spawn_stub(photon).await)
}

async fn search(app: &common::TestApp, query: &str) -> (StatusCode, Value) {
    let response = app
        .client
        .get(app.url("/api/locations/search"))
        .query(&[("q", query)])
        .send()
        .await
        .expect("search");
    let status = response.status();
    (status, response.json().await.expect("json"))
}

#[tokio::test]
async fn merges_and_deduplicates_geocoder_results() {
    let upstream = Upstream::default();
    let (nominatim_url, photon_url) = geocoder_stubs(upstream).await;
    let app = spawn_app(Config {
        nominatim_url,
        photon_url,
        ..test_config()
    })
    .await;

    let (status, body) = search(&app, "  MG   road ").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "geocoder");

    let results = body["results"].as_array().expect("results");
    assert_eq!(results.len(), 3, "{body}");
    let mg_roads = results.iter().filter(|r| r["name"] == "MG Road").count();
    assert_eq!(mg_roads, 1);
    assert_eq!(results[0]["name"], "MG Road");
    assert_eq!(results[0]["source"], "nominatim");
    let scores: Vec<f64> = results
        .iter()
        .map(|r| r["score"].as_f64().expect("score"))
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn falls_back_to_gazetteer_when_geocoders_fail() {
    let app = spawn_app(test_config()).await;

    let (status, body) = search(&app, "connaught place").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "gazetteer");
    let results = body["results"].as_array().expect("results");
    assert_eq!(results.len(), 1);
    assert!(results[0]["address"]
        .as_str()
        .expect("address")
        .contains("Connaught Place, New Delhi"));
}

#[tokio::test]
async fn serves_stale_results_when_geocoders_go_down() {
    let upstream = Upstream::default();
    let (nominatim_url, photon_url) = geocoder_stubs(upstream.clone()).await;
    let app = spawn_app(Config {
        nominatim_url,
        photon_url,
        location_cache_ttl: Duration::from_millis(200),
        ..test_config()
    })
    .await;

    let (_, first) = search(&app, "mg road").await;
    assert_eq!(first["source"], "geocoder");

    let (_, cached) = search(&app, "mg road").await;
    assert_eq!(cached["source"], "cache");

    tokio::time::sleep(Duration::from_millis(300)).await;
    upstream.down.store(true, Ordering::SeqCst);

    let (_, stale) = search(&app, "mg road").await;
    assert_eq!(stale["source"], "stale_cache");
    assert_eq!(stale["results"], first["results"]);
}

#[tokio::test]
async fn short_queries_and_bad_hints() {
    let app = spawn_app(test_config()).await;

    let (status, body) = search(&app, " a ").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"], json!([]));
    assert_eq!(body["source"], "none");

    let response = app
        .client
        .get(app.url("/api/locations/search"))
        .query(&[("q", "mg road"), ("lat", "12.97")])
        .send()
        .await
        .expect("search");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .client
        .get(app.url("/api/locations/search"))
        .query(&[("q", "mg road"), ("lat", "97"), ("lng", "77.6")])
        .send()
        .await
        .expect("search");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn reverse_geocoding_and_fallbacks() {
    let (nominatim_url, photon_url) = geocoder_stubs(Upstream::default()).await;
    let live = spawn_app(Config {
        nominatim_url,
        photon_url,
        ..test_config()
    })
    .await;
    let body: Value = live
        .client
        .get(live.url("/api/locations/reverse?lat=12.9763&lng=77.5929"))
        .send()
        .await
        .expect("reverse")
        .json()
        .await
        .expect("json");
    assert_eq!(body["address"], "Cubbon Park, Bengaluru, Karnataka, India");
    assert_eq!(body["source"], "nominatim");

    let offline = spawn_app(test_config()).await;
    let body: Value = offline
        .client
        .get(offline.url("/api/locations/reverse?lat=12.9760&lng=77.6060"))
        .send()
        .await
        .expect("reverse")
        .json()
        .await
        .expect("json");
    assert_eq!(body["source"], "gazetteer");
    assert!(body["address"].as_str().expect("address").contains("Bengaluru"));

    let body: Value = offline
        .client
        .get(offline.url("/api/locations/reverse?lat=10.5&lng=20.25"))
        .send()
        .await
        .expect("reverse")
        .json()
        .await
        .expect("json");
    assert_eq!(body["source"], "coordinates");
    assert_eq!(body["address"], "10.50000, 20.25000");

    let response = offline
        .client
        .get(offline.url("/api/locations/reverse?lat=abc&lng=1"))
        .send()
        .await
        .expect("reverse");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
