use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use server::{create_router, AppState, ServerConfig};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn app(worldpop_base: &str) -> Router {
    app_with(worldpop_base, &[])
}

fn app_with(worldpop_base: &str, overrides: &[(&str, &str)]) -> Router {
    let base = worldpop_base.to_string();
    let config = ServerConfig::from_lookup(|key| {
        if let Some((_, value)) = overrides.iter().find(|(k, _)| *k == key) {
            return Some(value.to_string());
        }
        match key {
            "WORLDPOP_BASE_URL" => Some(base.clone()),
            "WORLDPOP_API_KEY" => Some("wp-key".to_string()),
            "WORLDPOP_POLL_INTERVAL_MS" => Some("5".to_string()),
            "WORLDPOP_POLL_ATTEMPTS" => Some("3".to_string()),
            _ => None,
        }
    })
    .unwrap();
    create_router(AppState::new(config))
}

async fn post(app: Router, body: impl Into<Body>) -> (StatusCode, Value) {
    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/worldpop-population")
                .header("content-type", "application/json")
                .body(body.into())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1 << 20).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn query() -> String {
    json!({
        "geojson": {
            "type": "Feature",
            "properties": {},
            "geometry": {
                "type": "Polygon",
                "coordinates": [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]]]
            }
        }
    })
    .to_string()
}

#[tokio::test]
async fn rejects_bad_bodies() {
    let (status, body) = post(app("http://127.0.0.1:9"), "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Invalid JSON body"}));

    let (status, body) = post(app("http://127.0.0.1:9"), r#"{"dataset": "wpgppop"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"error": "Missing geojson"}));
}

#[tokio::test]
async fn non_object_geojson_is_rejected_before_upstream() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"taskid": "t-1"})))
        .expect(0)
        .mount(&upstream)
        .await;

    for geojson in [json!(false), json!(""), json!(0), json!([]), json!("Polygon")] {
        let body = json!({ "geojson": geojson }).to_string();
        let (status, reply) = post(app(&upstream.uri()), body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "geojson {geojson}");
        assert_eq!(reply, json!({"error": "Missing geojson"}));
    }
}

#[tokio::test]
async fn synchronous_finish_returns_total() {
    let upstream = MockServer::start().await;
    let stats = json!({
        "status": "finished",
        "error": false,
        "data": {"total_population": 18211.4}
    });
    Mock::given(method("GET"))
        .and(path("/services/stats"))
        .and(query_param("dataset", "wpgppop"))
        .and(query_param("year", "2020"))
        .and(query_param("runasync", "false"))
        .and(query_param("key", "wp-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stats.clone()))
        .expect(1)
        .mount(&upstream)
        .await;

    let (status, body) = post(app(&upstream.uri()), query()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"total_population": 18211.4, "raw": stats}));
}

#[tokio::test]
async fn task_is_polled_until_finished() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services/stats"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "created", "taskid": "t-42"})),
        )
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/t-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "started"})))
        .up_to_n_times(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/t-42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"status": "finished", "data": {"total_population": 950.0}}),
        ))
        .mount(&upstream)
        .await;

    let (status, body) = post(app(&upstream.uri()), query()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_population"], json!(950.0));
    assert_eq!(body["raw"]["status"], json!("finished"));
}

#[tokio::test]
async fn unfinished_task_times_out_with_taskid() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"taskid": "slow"})))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/slow"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "started"})))
        .expect(3)
        .mount(&upstream)
        .await;

    let (status, body) = post(app(&upstream.uri()), query()).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(
        body,
        json!({"error": "Timed out waiting for WorldPop task to finish", "taskid": "slow"})
    );
}

#[tokio::test]
async fn task_error_is_bad_gateway() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"taskid": "t1"})))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"status": "error", "error": true, "error_message": "Polygon outside coverage"}),
        ))
        .mount(&upstream)
        .await;

    let (status, body) = post(app(&upstream.uri()), query()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], json!("Polygon outside coverage"));
    assert_eq!(body["raw"]["status"], json!("error"));
}

#[tokio::test]
async fn missing_taskid_is_bad_gateway() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "created"})))
        .mount(&upstream)
        .await;

    let (status, body) = post(app(&upstream.uri()), query()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], json!("WorldPop did not return taskid"));
}

#[tokio::test]
async fn non_json_reply_is_truncated_into_error() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services/stats"))
        .respond_with(ResponseTemplate::new(503).set_body_string("x".repeat(800)))
        .mount(&upstream)
        .await;

    let (status, body) = post(app(&upstream.uri()), query()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], json!("WorldPop returned non-JSON response"));
    assert_eq!(body["raw_text"].as_str().map(str::len), Some(500));
}

#[tokio::test]
async fn non_json_while_polling_is_bad_gateway() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"taskid": "t2"})))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/t2"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
        .mount(&upstream)
        .await;

    let (status, body) = post(app(&upstream.uri()), query()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["raw_text"], json!("<html>Bad Gateway</html>"));
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    // Nothing listens on the discard port.
    let (status, body) = post(app("http://127.0.0.1:9"), query()).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Failed to reach WorldPop"), "{message}");
}

#[tokio::test]
async fn hung_task_poll_times_out_with_taskid() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"taskid": "hang"})))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/hang"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "finished", "data": {"total_population": 1.0}}))
                .set_delay(Duration::from_secs(600)),
        )
        .mount(&upstream)
        .await;

    let app = app_with(&upstream.uri(), &[("WORLDPOP_POLL_TIMEOUT_MS", "50")]);
    let (status, body) = tokio::time::timeout(Duration::from_millis(1_500), post(app, query()))
        .await
        .expect("proxy should give up on a hung task");
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(
        body,
        json!({"error": "Timed out waiting for WorldPop task to finish", "taskid": "hang"})
    );
}

#[tokio::test]
async fn hung_stats_request_is_gateway_timeout() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/services/stats"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"taskid": "t-1"}))
                .set_delay(Duration::from_secs(600)),
        )
        .mount(&upstream)
        .await;

    let app = app_with(&upstream.uri(), &[("WORLDPOP_REQUEST_TIMEOUT_MS", "50")]);
    let (status, body) = tokio::time::timeout(Duration::from_millis(1_500), post(app, query()))
        .await
        .expect("proxy should give up on a hung stats request");
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body, json!({"error": "Failed to reach WorldPop: timed out"}));
}
