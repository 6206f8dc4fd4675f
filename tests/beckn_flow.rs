mod common;

use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use cabsync::Config;
use common::{spawn_app_with, spawn_stub, test_config, TestApp};
use serde_json::{json, Value};

#[derive(Clone, Copy)]
enum Gateway {
    Callback,
    Reject,
    Silent,
}

fn catalog(transaction_id: &str) -> Value {
    json!({
        "context": {"transaction_id": transaction_id, "action": "on_search"},
        "message": {"catalog": {"providers": [{"items": [
            {
                "id": "ny-auto-7",
                "descriptor": {"name": "Auto Rickshaw"},
                "price": {"value": "142.50"},
                "fulfillment": {"state": {"descriptor": {"name": "ETA 4 mins"}}}
            },
            {
                "id": "ny-cab-2",
                "descriptor": {"name": "Cab"},
                "price": {"value": 260},
                "fulfillment": {"state": {"descriptor": {"name": "ETA 9 mins"}}}
            },
            {
                "id": "ny-broken",
                "descriptor": {"name": "Cab"},
                "price": {"value": "n/a"}
            }
        ]}]}}
    })
}

async fn gateway_search(State(mode): State<Gateway>, Json(body): Json<Value>) -> impl IntoResponse {
    match mode {
        Gateway::Reject => {
            return (StatusCode::INTERNAL_SERVER_ERROR, "gateway down").into_response()
        }
        Gateway::Silent => {}
        Gateway::Callback => {
            let transaction_id = body["context"]["transaction_id"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            let bap_uri = body["context"]["bap_uri"].as_str().unwrap_or_default().to_string();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let ack: Value = reqwest::Client::new()
                    .post(format!("{bap_uri}/on_search"))
                    .json(&catalog(&transaction_id))
                    .send()
                    .await
                    .expect("callback")
                    .json()
                    .await
                    .expect("ack json");
                assert_eq!(ack["message"]["ack"]["status"], "ACK");
            });
        }
    }
    Json(json!({"message": {"ack": {"status": "ACK"}}})).into_response()
}

async fn app_with_gateway(mode: Gateway, callback_timeout: Duration) -> TestApp {
    let gateway = spawn_stub(
        Router::new()
            .route("/search", post(gateway_search))
            .with_state(mode),
    )
    .await;
    spawn_app_with(|base| Config {
        namma_yatri_enabled: true,
        beckn_gateway_url: gateway,
        bap_uri: format!("{base}/api/beckn"),
        beckn_callback_timeout: callback_timeout,
        ..test_config()
    })
    .await
}

async fn compare(app: &TestApp) -> Value {
    let response = app
        .client
        .post(app.url("/api/compare"))
        .json(&json!({
            "pickup": {"lat": 12.9716, "lng": 77.5946, "address": "Cubbon Park"},
            "dropoff": {"lat": 12.9352, "lng": 77.6245, "address": "Koramangala"},
            "when": "2026-03-02T14:30:00+05:30"
        }))
        .send()
        .await
        .expect("compare");
    assert_eq!(response.status(), StatusCode::OK);
    response.json().await.expect("json")
}

fn namma_yatri(body: &Value) -> Vec<&Value> {
    body["results"]
        .as_array()
        .expect("results")
        .iter()
        .filter(|r| r["provider"] == "namma_yatri")
        .collect()
}

#[tokio::test]
async fn callback_offers_join_the_comparison() {
    let app = app_with_gateway(Gateway::Callback, Duration::from_secs(3)).await;

    let body = compare(&app).await;
    let offers = namma_yatri(&body);
    assert_eq!(offers.len(), 2, "{body}");
    assert!(offers.iter().all(|o| o["price"]["confidence"] == 1.0));

    let auto = offers
        .iter()
        .find(|o| o["serviceType"] == "Auto Rickshaw")
        .expect("auto offer");
    assert_eq!(auto["price"]["value"], 142.5);
    assert_eq!(auto["eta"]["seconds"], 240);
    assert_eq!(auto["deepLink"], "nammayatri://ride/ny-auto-7");
    assert_eq!(body["meta"]["failedProviders"], json!([]));
}

#[tokio::test]
async fn rejected_search_marks_provider_failed() {
    let app = app_with_gateway(Gateway::Reject, Duration::from_secs(3)).await;

    let body = compare(&app).await;
    assert!(namma_yatri(&body).is_empty());
    assert_eq!(body["meta"]["failedProviders"], json!(["namma_yatri"]));
    assert!(!body["results"].as_array().expect("results").is_empty());
    assert_eq!(app.state.transactions.len().await, 0);
}

#[tokio::test]
async fn missing_callback_times_out_quietly() {
    let app = app_with_gateway(Gateway::Silent, Duration::from_millis(200)).await;

    let body = compare(&app).await;
    assert!(namma_yatri(&body).is_empty());
    assert_eq!(body["meta"]["failedProviders"], json!([]));
}

#[tokio::test]
async fn callbacks_for_unknown_transactions_are_nacked() {
    let app = app_with_gateway(Gateway::Silent, Duration::from_millis(200)).await;

    let ack: Value = app
        .client
        .post(app.url("/api/beckn/on_search"))
        .json(&catalog("no-such-transaction"))
        .send()
        .await
        .expect("callback")
        .json()
        .await
        .expect("ack");
    assert_eq!(ack["message"]["ack"]["status"], "NACK");
}
