use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use housing_dashboard::{
    router, AppState, DatasetStore, HousingDataset, HousingFeatures, ModelSource, ModelStore,
    Regressor,
};

/// Answers 2.5 for the all-zero input and a weighted sum otherwise, so
/// tests can tell which features reached the model.
struct Probe;

impl Regressor for Probe {
    fn predict(&self, features: &HousingFeatures) -> f64 {
        if *features == HousingFeatures::default() {
            2.5
        } else {
            features
                .to_array()
                .iter()
                .enumerate()
                .map(|(i, v)| (i + 1) as f64 * v)
                .sum()
        }
    }
}

fn small_dataset() -> HousingDataset {
    let col = |k: f64| (0..40).map(|i| (i as f64) * k + (i % 4) as f64).collect::<Vec<_>>();
    HousingDataset::from_columns(
        [col(0.2), col(1.0), col(0.1), col(0.02), col(30.0), col(0.05), col(0.01), col(-0.01)],
        col(0.1),
    )
    .unwrap()
}

fn app_with(models: ModelStore) -> Router {
    router(AppState::new(models, DatasetStore::preloaded(small_dataset())))
}

fn app() -> Router {
    app_with(ModelStore::with_model(Arc::new(Probe)))
}

fn unavailable_app(dir: &tempfile::TempDir) -> Router {
    app_with(ModelStore::new(ModelSource {
        path: dir.path().join("model.bin"),
        url: "http://127.0.0.1:1/model.bin".to_string(),
        timeout: Duration::from_secs(1),
    }))
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn form_post(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn json_post(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn landing_page_renders() {
    let response = app().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("California Housing Price Dashboard"));
}

#[tokio::test]
async fn untouched_form_predicts_from_zeros() {
    let response = app()
        .oneshot(form_post(
            "MedInc=&HouseAge=&AveRooms=&AveBedrms=&Population=&AveOccup=&Latitude=&Longitude=",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let html = body_text(response).await;
    assert!(html.contains("Estimated house price"));
    assert!(html.contains("$250,000.00"));
    assert!(html.contains("setView([0, 0], 12)"));
}

#[tokio::test]
async fn submitted_values_are_echoed_and_mapped() {
    let response = app()
        .oneshot(form_post("MedInc=1&Latitude=37.88&Longitude=-122.23"))
        .await
        .unwrap();
    let html = body_text(response).await;
    assert!(html.contains(r#"value="37.88""#));
    assert!(html.contains("setView([37.88, -122.23], 12)"));
    assert!(html.contains("Predicted location"));
}

#[tokio::test]
async fn non_numeric_input_is_reported() {
    let response = app().oneshot(form_post("MedInc=lots")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("MedInc"));
    assert!(html.contains("is not a number"));
    assert!(!html.contains("Estimated house price"));
}

#[tokio::test]
async fn json_prediction_is_order_invariant() {
    let forward = json!({
        "MedInc": 8.3252, "HouseAge": 41.0, "AveRooms": 6.98, "AveBedrms": 1.02,
        "Population": 322.0, "AveOccup": 2.55, "Latitude": 37.88, "Longitude": -122.23
    });
    // Same features with the keys written in reverse order.
    let reversed = r#"{"Longitude": -122.23, "Latitude": 37.88, "AveOccup": 2.55,
        "Population": 322.0, "AveBedrms": 1.02, "AveRooms": 6.98, "HouseAge": 41.0,
        "MedInc": 8.3252}"#;

    let a = app().oneshot(json_post(forward)).await.unwrap();
    assert_eq!(a.status(), StatusCode::OK);
    let a: Value = serde_json::from_str(&body_text(a).await).unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(reversed))
        .unwrap();
    let b = app().oneshot(request).await.unwrap();
    let b: Value = serde_json::from_str(&body_text(b).await).unwrap();

    assert_eq!(a, b);
    assert_eq!(a["latitude"], json!(37.88));
}

#[tokio::test]
async fn json_defaults_and_scaling() {
    let response = app().oneshot(json_post(json!({}))).await.unwrap();
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["raw"], json!(2.5));
    assert_eq!(body["price"], json!(250000.0));
    assert_eq!(body["formatted"], json!("$250,000.00"));
}

#[tokio::test]
async fn json_rejects_unknown_features() {
    let response = app().oneshot(json_post(json!({ "Rooms": 3 }))).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert!(body["error"].as_str().unwrap().contains("Rooms"));
}

#[tokio::test]
async fn unavailable_model_disables_prediction() {
    let dir = tempfile::tempdir().unwrap();

    let response = unavailable_app(&dir).oneshot(get("/predict")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("model is unavailable"));
    assert!(html.contains("<button type=\"submit\" disabled>"));

    let response = unavailable_app(&dir)
        .oneshot(json_post(json!({ "MedInc": 3.0 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    // Other views keep working.
    let response = unavailable_app(&dir).oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn explore_renders_charts_and_validates_selection() {
    let response = app().oneshot(get("/explore?x=HouseAge&y=target")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert_eq!(html.matches("<svg").count(), 5);
    assert!(html.contains("HouseAge vs. target"));

    let response = app().oneshot(get("/explore?x=target")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
