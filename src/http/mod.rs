//! HTTP API: JSON endpoints, CSV download and the HTML dashboard.

mod dashboard;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    extract::{
        rejection::{FormRejection, JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use tokio::sync::watch;
use tower::{timeout::TimeoutLayer, BoxError, ServiceBuilder};
use tower_http::{
    catch_panic::CatchPanicLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::adapters::csv_export::CSV_FILENAME;
use crate::adapters::StorageError;
use crate::application::AssessmentService;
use crate::domain::intake::{parse_age, parse_measurement};
use crate::domain::{describe_errors, AssessmentRecord, Field, InputError, PatientInput};
use crate::ports::Storage;
use crate::NutricareError;

// --- Error Handling ---
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg, code) = match self {
            AppError::BadRequest(s) => (StatusCode::BAD_REQUEST, s, "INVALID_REQUEST"),
            AppError::NotFound(s) => (StatusCode::NOT_FOUND, s, "NOT_FOUND"),
            AppError::Internal(e) => {
                tracing::error!(target: "http", "Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };
        (
            status,
            Json(serde_json::json!({ "error": {"code": code, "message": msg} })),
        )
            .into_response()
    }
}

impl From<NutricareError> for AppError {
    fn from(e: NutricareError) -> Self {
        match e {
            NutricareError::Validation(errors) => AppError::BadRequest(format!(
                "Invalid patient data: {}",
                describe_errors(&errors)
            )),
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<FormRejection> for AppError {
    fn from(rejection: FormRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

async fn map_middleware_error(err: BoxError) -> impl IntoResponse {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(serde_json::json!({
                "error": { "code": "TIMEOUT", "message": "request timed out" }
            })),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({
                "error": { "code": "INTERNAL_ERROR", "message": err.to_string() }
            })),
        )
    }
}

type SharedService<S> = Arc<AssessmentService<S>>;

/// Run a blocking service call off the async workers.
async fn blocking<S, T, F>(service: &SharedService<S>, f: F) -> Result<T, AppError>
where
    S: Storage + 'static,
    S::Error: Into<StorageError>,
    T: Send + 'static,
    F: FnOnce(&AssessmentService<S>) -> Result<T, NutricareError> + Send + 'static,
{
    let service = Arc::clone(service);
    tokio::task::spawn_blocking(move || f(&service))
        .await
        .map_err(|e| AppError::Internal(e.into()))?
        .map_err(AppError::from)
}

// --- Request Types ---
#[derive(Debug, Default, Deserialize)]
struct ListParams {
    offset: Option<usize>,
    limit: Option<usize>,
}

const DEFAULT_PAGE_LIMIT: usize = 50;
const MAX_PAGE_LIMIT: usize = 500;

/// Dashboard form fields arrive as text; they are parsed here so every
/// problem is reported at once.
#[derive(Debug, Deserialize)]
struct PatientForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    age: String,
    #[serde(default)]
    weight_kg: String,
    #[serde(default)]
    height_cm: String,
    #[serde(default)]
    muac_mm: String,
}

impl PatientForm {
    fn into_input(self) -> Result<PatientInput, Vec<InputError>> {
        let mut errors = Vec::new();
        let mut check = |r: Result<f64, InputError>| match r {
            Ok(v) => v,
            Err(e) => {
                errors.push(e);
                0.0
            }
        };
        let weight_kg = check(parse_measurement(Field::Weight, &self.weight_kg));
        let height_cm = check(parse_measurement(Field::Height, &self.height_cm));
        let muac_mm = check(parse_measurement(Field::Muac, &self.muac_mm));

        let age_years = parse_age(&self.age).unwrap_or_else(|e| {
            errors.push(e);
            0
        });
        if self.name.trim().is_empty() {
            errors.insert(0, InputError::EmptyName);
        }

        if errors.is_empty() {
            Ok(PatientInput {
                name: self.name,
                age_years,
                weight_kg,
                height_cm,
                muac_mm,
            })
        } else {
            Err(errors)
        }
    }
}

// --- Handlers ---
async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Nutricare Web API is running!" }))
}

async fn create_patient<S>(
    State(service): State<SharedService<S>>,
    payload: Result<Json<PatientInput>, JsonRejection>,
) -> Result<Json<AssessmentRecord>, AppError>
where
    S: Storage + 'static,
    S::Error: Into<StorageError>,
{
    let Json(input) = payload?;
    let record = blocking(&service, move |svc| svc.record(input)).await?;
    Ok(Json(record))
}

async fn list_patients<S>(
    State(service): State<SharedService<S>>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError>
where
    S: Storage + 'static,
    S::Error: Into<StorageError>,
{
    if params.offset.is_none() && params.limit.is_none() {
        let records = blocking(&service, |svc| svc.list()).await?;
        return Ok(Json(records).into_response());
    }

    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let page = blocking(&service, move |svc| svc.page(offset, limit)).await?;

    let next_offset = page.next_offset();
    let mut response = Json(page.items).into_response();
    let headers = response.headers_mut();
    headers.insert("x-total-count", HeaderValue::from(page.total_count));
    if let Some(next) = next_offset {
        headers.insert("x-next-offset", HeaderValue::from(next));
    }
    Ok(response)
}

async fn get_patient<S>(
    State(service): State<SharedService<S>>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<AssessmentRecord>, AppError>
where
    S: Storage + 'static,
    S::Error: Into<StorageError>,
{
    let Path(id) = id?;
    blocking(&service, move |svc| svc.get(id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Patient {id} not found")))
}

async fn export_csv<S>(State(service): State<SharedService<S>>) -> Result<Response, AppError>
where
    S: Storage + 'static,
    S::Error: Into<StorageError>,
{
    let bytes = blocking(&service, |svc| {
        let mut buf = Vec::new();
        svc.export_csv(&mut buf)?;
        Ok(buf)
    })
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={CSV_FILENAME}"),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn dashboard_page<S>(State(service): State<SharedService<S>>) -> Result<Html<String>, AppError>
where
    S: Storage + 'static,
    S::Error: Into<StorageError>,
{
    let (records, summary) = blocking(&service, |svc| {
        let records = svc.list()?;
        let summary = crate::application::NutritionSummary::from_records(&records);
        Ok((records, summary))
    })
    .await?;
    Ok(Html(dashboard::render(&records, &summary)))
}

async fn dashboard_add<S>(
    State(service): State<SharedService<S>>,
    form: Result<Form<PatientForm>, FormRejection>,
) -> Result<Json<AssessmentRecord>, AppError>
where
    S: Storage + 'static,
    S::Error: Into<StorageError>,
{
    let Form(form) = form?;
    let input = form.into_input().map_err(NutricareError::Validation)?;
    let record = blocking(&service, move |svc| svc.record(input)).await?;
    Ok(Json(record))
}

// --- Server ---
pub struct HttpConfig {
    pub listen_addr: String,
    pub body_limit_kb: usize,
    pub request_timeout: Duration,
}

/// Build the application router with all middleware applied.
pub fn router<S>(service: SharedService<S>, config: &HttpConfig) -> Router
where
    S: Storage + 'static,
    S::Error: Into<StorageError>,
{
    Router::new()
        .route("/", get(root_handler))
        .route("/patients", post(create_patient::<S>).get(list_patients::<S>))
        .route("/patients/:id", get(get_patient::<S>))
        .route("/export", get(export_csv::<S>))
        .route("/dashboard", get(dashboard_page::<S>))
        .route("/dashboard/add", post(dashboard_add::<S>))
        .with_state(service)
        // `HandleErrorLayer` must wrap the fallible timeout layer to make the service infallible.
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(map_middleware_error))
                .layer(TimeoutLayer::new(config.request_timeout)),
        )
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(config.body_limit_kb * 1024))
}

/// Serve the API until the shutdown channel fires.
///
/// # Errors
/// Returns error if the listen address is invalid or cannot be bound.
pub async fn run_server<S>(
    config: HttpConfig,
    service: SharedService<S>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()>
where
    S: Storage + 'static,
    S::Error: Into<StorageError>,
{
    let app = router(service, &config);

    let addr: SocketAddr = config.listen_addr.parse()?;
    tracing::info!(target: "http", "NutriCare HTTP API listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_rx.changed().await.ok();
        tracing::info!(target: "http", "shutting down gracefully");
    });

    server.await.map_err(|e| {
        tracing::error!(target: "http", error = %e, "server error");
        anyhow::Error::from(e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStorage;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_app() -> Router {
        let service = Arc::new(AssessmentService::new(Arc::new(MemoryStorage::new())));
        router(
            service,
            &HttpConfig {
                listen_addr: "127.0.0.1:0".to_string(),
                body_limit_kb: 16,
                request_timeout: Duration::from_secs(5),
            },
        )
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
        let response = app.clone().oneshot(request).await.expect("Should respond");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        (status, bytes.to_vec(), headers)
    }

    fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("Should build request")
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("Should build request")
    }

    fn error_code(body: &[u8]) -> String {
        let value: serde_json::Value = serde_json::from_slice(body).expect("Should be JSON");
        value["error"]["code"].as_str().unwrap_or_default().to_string()
    }

    #[tokio::test]
    async fn test_root() {
        let app = test_app();
        let (status, body, _) = send(&app, get_request("/")).await;
        assert_eq!(status, StatusCode::OK);
        let value: serde_json::Value = serde_json::from_slice(&body).expect("Should be JSON");
        assert_eq!(value["message"], "Nutricare Web API is running!");
    }

    #[tokio::test]
    async fn test_create_and_fetch_patient() {
        let app = test_app();
        let (status, body, _) = send(
            &app,
            json_request(
                "POST",
                "/patients",
                serde_json::json!({
                    "name": "Amina", "age": 3, "weight_kg": 15.0, "height_cm": 100.0, "muac_mm": 120.0
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let created: serde_json::Value = serde_json::from_slice(&body).expect("Should be JSON");
        assert_eq!(created["id"], 1);
        assert_eq!(created["name"], "Amina");
        assert_eq!(created["age"], 3);
        assert_eq!(created["bmi"], 15.0);
        assert_eq!(created["build"], "Severely underweight");
        assert_eq!(created["nutrition_status"], "MAM");
        assert!(created["recommendation"]
            .as_str()
            .expect("string")
            .starts_with("Moderate Acute Malnutrition"));

        let (status, body, _) = send(&app, get_request("/patients/1")).await;
        assert_eq!(status, StatusCode::OK);
        let fetched: serde_json::Value = serde_json::from_slice(&body).expect("Should be JSON");
        assert_eq!(fetched, created);

        let (status, body, _) = send(&app, get_request("/patients")).await;
        assert_eq!(status, StatusCode::OK);
        let all: Vec<serde_json::Value> = serde_json::from_slice(&body).expect("Should be JSON");
        assert_eq!(all, vec![created]);
    }

    #[tokio::test]
    async fn test_validation_errors_are_400() {
        let app = test_app();
        let (status, body, _) = send(
            &app,
            json_request(
                "POST",
                "/patients",
                serde_json::json!({
                    "name": "", "age": 3, "weight_kg": 15.0, "height_cm": 0.0, "muac_mm": 120.0
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let value: serde_json::Value = serde_json::from_slice(&body).expect("Should be JSON");
        assert_eq!(value["error"]["code"], "INVALID_REQUEST");
        let message = value["error"]["message"].as_str().expect("string");
        assert!(message.contains("name must not be empty"));
        assert!(message.contains("height must be a positive number"));

        let (status, body, _) = send(
            &app,
            json_request("POST", "/patients", serde_json::json!({ "name": "Amina" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_missing_patient_is_404() {
        let app = test_app();
        let (status, body, _) = send(&app, get_request("/patients/42")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_code(&body), "NOT_FOUND");

        let (status, body, _) = send(&app, get_request("/patients/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_pagination_sets_total_header() {
        let app = test_app();
        for name in ["A", "B", "C"] {
            send(
                &app,
                json_request(
                    "POST",
                    "/patients",
                    serde_json::json!({
                        "name": name, "age": 2, "weight_kg": 11.0, "height_cm": 85.0, "muac_mm": 130.0
                    }),
                ),
            )
            .await;
        }

        let (status, body, headers) = send(&app, get_request("/patients?offset=1&limit=1")).await;
        assert_eq!(status, StatusCode::OK);
        let page: Vec<serde_json::Value> = serde_json::from_slice(&body).expect("Should be JSON");
        assert_eq!(page.len(), 1);
        assert_eq!(page[0]["name"], "B");
        assert_eq!(headers.get("x-total-count").and_then(|v| v.to_str().ok()), Some("3"));
        assert_eq!(headers.get("x-next-offset").and_then(|v| v.to_str().ok()), Some("2"));

        let (_, _, headers) = send(&app, get_request("/patients?offset=2&limit=5")).await;
        assert!(headers.get("x-next-offset").is_none());
    }

    #[tokio::test]
    async fn test_pagination_with_huge_offset_is_empty() {
        let storage = crate::adapters::sqlite::SqliteStorage::in_memory().expect("Should create db");
        let service = Arc::new(AssessmentService::new(Arc::new(storage)));
        let app = router(
            service,
            &HttpConfig {
                listen_addr: "127.0.0.1:0".to_string(),
                body_limit_kb: 16,
                request_timeout: Duration::from_secs(5),
            },
        );
        send(
            &app,
            json_request(
                "POST",
                "/patients",
                serde_json::json!({
                    "name": "Amina", "age": 3, "weight_kg": 15.0, "height_cm": 100.0, "muac_mm": 120.0
                }),
            ),
        )
        .await;

        let uri = format!("/patients?offset={}", usize::MAX);
        let (status, body, headers) = send(&app, get_request(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        let page: Vec<serde_json::Value> = serde_json::from_slice(&body).expect("Should be JSON");
        assert!(page.is_empty());
        assert_eq!(headers.get("x-total-count").and_then(|v| v.to_str().ok()), Some("1"));
        assert!(headers.get("x-next-offset").is_none());
    }

    #[tokio::test]
    async fn test_export_csv() {
        let app = test_app();
        send(
            &app,
            json_request(
                "POST",
                "/patients",
                serde_json::json!({
                    "name": "Amina", "age": 3, "weight_kg": 20.0, "height_cm": 110.0, "muac_mm": 130.0
                }),
            ),
        )
        .await;

        let (status, body, headers) = send(&app, get_request("/export")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()),
            Some("text/csv")
        );
        assert_eq!(
            headers
                .get(header::CONTENT_DISPOSITION)
                .and_then(|v| v.to_str().ok()),
            Some("attachment; filename=patients.csv")
        );
        let text = String::from_utf8(body).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("id,name,age,weight_kg,height_cm,muac_mm,bmi,build,nutrition_status,recommendation")
        );
        assert!(lines
            .next()
            .expect("row")
            .starts_with("1,Amina,3,20.0,110.0,130.0,16.53,Underweight,Normal,"));
    }

    #[tokio::test]
    async fn test_dashboard_add_and_render() {
        let app = test_app();
        let form = Request::builder()
            .method("POST")
            .uri("/dashboard/add")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(
                "name=Baraka&age=2&weight_kg=9&height_cm=80&muac_mm=110",
            ))
            .expect("Should build request");
        let (status, body, _) = send(&app, form).await;
        assert_eq!(status, StatusCode::OK);
        let created: serde_json::Value = serde_json::from_slice(&body).expect("Should be JSON");
        assert_eq!(created["nutrition_status"], "SAM");

        let (status, body, _) = send(&app, get_request("/dashboard")).await;
        assert_eq!(status, StatusCode::OK);
        let html = String::from_utf8(body).expect("utf8");
        assert!(html.contains("Baraka"));
        assert!(html.contains("action=\"/dashboard/add\""));
    }

    #[tokio::test]
    async fn test_dashboard_form_reports_every_problem() {
        let app = test_app();
        let form = Request::builder()
            .method("POST")
            .uri("/dashboard/add")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("name=&age=two&weight_kg=9&height_cm=-1&muac_mm=110"))
            .expect("Should build request");
        let (status, body, _) = send(&app, form).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let value: serde_json::Value = serde_json::from_slice(&body).expect("Should be JSON");
        let message = value["error"]["message"].as_str().expect("string");
        assert!(message.contains("name must not be empty"));
        assert!(message.contains("age must be a number"));
        assert!(message.contains("height must be a positive number"));
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected() {
        let app = test_app();
        let big = "x".repeat(32 * 1024);
        let (status, _, _) = send(
            &app,
            json_request(
                "POST",
                "/patients",
                serde_json::json!({
                    "name": big, "age": 3, "weight_kg": 15.0, "height_cm": 100.0, "muac_mm": 120.0
                }),
            ),
        )
        .await;
        assert!(status.is_client_error());
    }
}
