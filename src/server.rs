//! HTTP routes for the dashboard.

use std::sync::Arc;

use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use log::{info, warn};
use serde_json::{json, Map, Value};

use crate::dataset::DatasetStore;
use crate::error::FeatureError;
use crate::features::{FeatureForm, HousingFeatures};
use crate::model::{ModelStore, Regressor};
use crate::predict::{predict, Prediction};
use crate::views::explore::{self, ExploreQuery, Selection};
use crate::views::layout::{error_page, Page};
use crate::views::landing;
use crate::views::prediction::{self, ModelStatus, Outcome, PredictionView};

/// Shared handles every request works from.
#[derive(Clone)]
pub struct AppState {
    pub models: Arc<ModelStore>,
    pub datasets: Arc<DatasetStore>,
}

impl AppState {
    pub fn new(models: ModelStore, datasets: DatasetStore) -> Self {
        Self {
            models: Arc::new(models),
            datasets: Arc::new(datasets),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/explore", get(explore_page))
        .route("/predict", get(predict_page).post(predict_submit))
        .route("/api/predict", post(api_predict))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;
    let status = response.status();
    if status.is_server_error() {
        warn!("{} {} -> {}", method, uri, status);
    } else {
        info!("{} {} -> {}", method, uri, status);
    }
    response
}

/// Runs blocking work (downloads, decoding, rendering) off the async runtime.
async fn blocking<T, F>(work: F) -> Result<T, String>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| format!("background task failed: {}", e))
}

fn html_error(status: StatusCode, active: Page, message: &str) -> Response {
    (status, Html(error_page(active, message))).into_response()
}

async fn home() -> Html<String> {
    Html(landing::render())
}

async fn explore_page(State(state): State<AppState>, Query(query): Query<ExploreQuery>) -> Response {
    let selection = match Selection::from_query(&query) {
        Ok(selection) => selection,
        Err(message) => return html_error(StatusCode::BAD_REQUEST, Page::Explore, &message),
    };

    let datasets = Arc::clone(&state.datasets);
    let rendered = blocking(move || -> Result<String, String> {
        let dataset = datasets
            .get()
            .map_err(|e| format!("The dataset could not be loaded: {}", e))?;
        explore::render(&dataset, &selection).map_err(|e| format!("Chart rendering failed: {}", e))
    })
    .await;

    match rendered {
        Ok(Ok(page)) => Html(page).into_response(),
        Ok(Err(message)) | Err(message) => {
            html_error(StatusCode::SERVICE_UNAVAILABLE, Page::Explore, &message)
        }
    }
}

async fn acquire_model(models: Arc<ModelStore>) -> Result<Arc<dyn Regressor>, String> {
    blocking(move || models.acquire().map_err(|e| e.to_string())).await?
}

async fn predict_page(State(state): State<AppState>) -> Html<String> {
    let status = match acquire_model(Arc::clone(&state.models)).await {
        Ok(_) => ModelStatus::Ready,
        Err(reason) => ModelStatus::Unavailable(reason),
    };
    Html(prediction::render(&PredictionView::new(status)))
}

async fn predict_submit(State(state): State<AppState>, Form(form): Form<FeatureForm>) -> Html<String> {
    let inputs = form.raw_values();
    let view = match acquire_model(Arc::clone(&state.models)).await {
        Err(reason) => PredictionView {
            status: ModelStatus::Unavailable(reason),
            inputs,
            outcome: None,
        },
        Ok(model) => {
            let outcome = match form.parse() {
                Ok(features) => Outcome::Estimate(predict(model.as_ref(), &features)),
                Err(e) => Outcome::InvalidInput(e.to_string()),
            };
            PredictionView {
                status: ModelStatus::Ready,
                inputs,
                outcome: Some(outcome),
            }
        }
    };
    Html(prediction::render(&view))
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl ToString) -> ApiError {
    (status, Json(json!({ "error": message.to_string() })))
}

/// Accepts the features as one JSON object keyed by name, in any order.
fn features_from_json(body: &Map<String, Value>) -> Result<HousingFeatures, FeatureError> {
    let mut pairs = Vec::with_capacity(body.len());
    for (name, value) in body {
        let number = value.as_f64().ok_or_else(|| FeatureError::NotNumeric {
            feature: name.clone(),
            value: value.to_string(),
        })?;
        pairs.push((name.as_str(), number));
    }
    HousingFeatures::from_pairs(pairs)
}

async fn api_predict(
    State(state): State<AppState>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<Prediction>, ApiError> {
    let features = features_from_json(&body).map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
    let model = acquire_model(Arc::clone(&state.models))
        .await
        .map_err(|e| api_error(StatusCode::SERVICE_UNAVAILABLE, e))?;
    Ok(Json(predict(model.as_ref(), &features)))
}
