use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use housing_shared::validation::validate_form;
use housing_shared::{Application, ApplicationForm, ApplicationPatch, ApplicationStatus};
use housing_store::{
    ApplicationQuery, Database, Page, RankedApplication, SaveReceipt, Statistics, Vault,
    VaultEvent,
};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

/// The one vault of this process. Every handler takes the lock for the whole
/// operation, so dedup, insert, eviction and the write are atomic.
pub type SharedVault = Arc<Mutex<Vault<Database>>>;

#[derive(Clone)]
pub struct AppState {
    pub vault: SharedVault,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(server_info))
        .route("/applications", post(submit_application))
        .route(
            "/admin/applications",
            get(admin_list_applications).delete(admin_clear),
        )
        .route("/admin/applications/ranked", get(admin_ranked))
        .route(
            "/admin/applications/by-national-id/:national_id",
            get(admin_find_by_national_id),
        )
        .route(
            "/admin/applications/:id",
            patch(admin_update_application).delete(admin_delete),
        )
        .route("/admin/applications/:id/status", patch(admin_update_status))
        .route("/admin/cleanup", post(admin_cleanup))
        .route("/admin/statistics", get(admin_statistics))
        .route("/admin/export.json", get(admin_export_json))
        .route("/admin/export.csv", get(admin_export_csv))
        .route("/admin/events", get(admin_events))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerInfoResponse {
    name: String,
    version: &'static str,
    registration_open: bool,
    capacity: usize,
    applications: usize,
}

#[derive(Deserialize)]
struct RankedParams {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct StatusUpdateRequest {
    status: ApplicationStatus,
}

#[derive(Deserialize)]
struct CleanupParams {
    max_age_days: Option<i64>,
}

#[derive(Serialize)]
struct CleanupResponse {
    removed: usize,
    remaining: usize,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_info(State(state): State<AppState>) -> Json<ServerInfoResponse> {
    let vault = state.vault.lock().await;
    Json(ServerInfoResponse {
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
        registration_open: state.config.registration_open,
        capacity: vault.capacity(),
        applications: vault.len(),
    })
}

/// Public registration endpoint: validate, then hand the form to the vault.
async fn submit_application(
    State(state): State<AppState>,
    Json(form): Json<ApplicationForm>,
) -> Result<(StatusCode, Json<SaveReceipt>), ServerError> {
    if !state.config.registration_open {
        return Err(ServerError::RegistrationClosed);
    }

    validate_form(&form)?;

    let receipt = state.vault.lock().await.save(form)?;

    info!(
        reference = %receipt.reference_number,
        outcome = ?receipt.outcome,
        "Application received"
    );
    Ok((StatusCode::CREATED, Json(receipt)))
}

fn verify_admin_token(headers: &HeaderMap, config: &ServerConfig) -> Result<(), ServerError> {
    let Some(ref expected) = config.admin_token else {
        return Err(ServerError::Forbidden(
            "Admin API is disabled (no ADMIN_TOKEN configured)".into(),
        ));
    };

    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    // Constant-time comparison to prevent timing attacks on admin token.
    use subtle::ConstantTimeEq;
    let token_bytes = token.as_bytes();
    let expected_bytes = expected.as_bytes();
    if token_bytes.len() != expected_bytes.len()
        || token_bytes.ct_eq(expected_bytes).unwrap_u8() != 1
    {
        return Err(ServerError::Forbidden("Invalid admin token".into()));
    }

    Ok(())
}

async fn admin_list_applications(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<ApplicationQuery>,
) -> Result<Json<Page<Application>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let page = state.vault.lock().await.query(&query);
    Ok(Json(page))
}

async fn admin_ranked(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<RankedParams>,
) -> Result<Json<Vec<RankedApplication>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let vault = state.vault.lock().await;
    let ranked = match params.limit {
        Some(limit) => vault.top_priority(limit),
        None => vault.ranked_by_priority(),
    };
    Ok(Json(ranked))
}

async fn admin_find_by_national_id(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(national_id): Path<String>,
) -> Result<Json<Application>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    state
        .vault
        .lock()
        .await
        .find_by_national_id(&national_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("no application for {national_id}")))
}

async fn admin_update_status(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<Application>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let mut vault = state.vault.lock().await;
    if !vault.update_status(id, req.status)? {
        return Err(ServerError::NotFound(format!("application {id}")));
    }

    info!(id = %id, status = %req.status, "Admin changed application status");
    vault
        .get(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ServerError::NotFound(format!("application {id}")))
}

/// Admin edit. The merged record must still pass the registration rules.
async fn admin_update_application(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ApplicationPatch>,
) -> Result<Json<Application>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    if patch.is_empty() {
        return Err(ServerError::BadRequest("nothing to update".into()));
    }

    let mut vault = state.vault.lock().await;
    let Some(current) = vault.get(id) else {
        return Err(ServerError::NotFound(format!("application {id}")));
    };

    let mut merged = current.form.clone();
    patch.apply_to(&mut merged);
    validate_form(&merged)?;

    let updated = vault
        .update_application(id, &patch)?
        .ok_or_else(|| ServerError::NotFound(format!("application {id}")))?;

    info!(id = %id, "Admin edited application");
    Ok(Json(updated))
}

async fn admin_delete(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    if !state.vault.lock().await.delete(id)? {
        return Err(ServerError::NotFound(format!("application {id}")));
    }

    info!(id = %id, "Admin deleted application");
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn admin_clear(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    state.vault.lock().await.clear()?;

    info!("Admin cleared the vault");
    Ok(Json(serde_json::json!({ "cleared": true })))
}

async fn admin_cleanup(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(params): Query<CleanupParams>,
) -> Result<Json<CleanupResponse>, ServerError> {
    verify_admin_token(&headers, &state.config)?;

    let days = params
        .max_age_days
        .unwrap_or(state.config.cleanup_max_age_days);
    if days < 0 {
        return Err(ServerError::BadRequest("max_age_days must not be negative".into()));
    }

    let max_age = chrono::Duration::try_days(days)
        .ok_or_else(|| ServerError::BadRequest("max_age_days is out of range".into()))?;

    let mut vault = state.vault.lock().await;
    let removed = vault.cleanup_older_than(max_age)?;

    Ok(Json(CleanupResponse {
        removed,
        remaining: vault.len(),
    }))
}

async fn admin_statistics(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Statistics>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    Ok(Json(state.vault.lock().await.statistics()))
}

async fn admin_export_json(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let json = state.vault.lock().await.export_json()?;
    Ok(([(header::CONTENT_TYPE, "application/json")], json))
}

async fn admin_export_csv(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    let csv = state.vault.lock().await.export_csv();
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"applications.csv\"",
            ),
        ],
        csv,
    ))
}

async fn admin_events(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<VaultEvent>>, ServerError> {
    verify_admin_token(&headers, &state.config)?;
    Ok(Json(state.vault.lock().await.events().to_vec()))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use housing_store::{Codec, Database};
    use tower::ServiceExt;

    const TOKEN: &str = "test-admin-token";

    fn test_state(config: ServerConfig) -> AppState {
        let vault = Vault::open(Database::open_in_memory().unwrap(), Codec::Plain);
        AppState {
            vault: Arc::new(Mutex::new(vault)),
            rate_limiter: RateLimiter::from_config(&config),
            config: Arc::new(config),
        }
    }

    fn admin_config() -> ServerConfig {
        ServerConfig {
            admin_token: Some(TOKEN.to_string()),
            ..ServerConfig::default()
        }
    }

    fn form_json(national_id: &str) -> serde_json::Value {
        serde_json::json!({
            "fullName": "أحمد محمد العتيبي",
            "nationalId": national_id,
            "phone": "0512345678",
            "email": "ahmed@nu.edu.sa",
            "gender": "male",
            "province": "نجران",
            "gpa": 4.75,
            "specialization": "علوم الحاسب",
            "roomType": "premium"
        })
    }

    fn post_json(uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn admin_get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_submit_then_lookup() {
        let state = test_state(admin_config());
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(post_json("/applications", &form_json("1087654321")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let receipt = body_json(response).await;
        assert_eq!(receipt["application"]["fees"], 6000);
        assert_eq!(receipt["outcome"], "inserted");

        let response = app
            .clone()
            .oneshot(admin_get("/admin/applications/by-national-id/1087654321"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let found = body_json(response).await;
        assert_eq!(found["referenceNumber"], receipt["referenceNumber"]);

        let response = app
            .oneshot(admin_get("/admin/applications/ranked?limit=1"))
            .await
            .unwrap();
        let ranked = body_json(response).await;
        assert_eq!(ranked[0]["priorityScore"], 67);
    }

    #[tokio::test]
    async fn test_invalid_form_is_rejected_with_issues() {
        let app = build_router(test_state(admin_config()));
        let mut body = form_json("123");
        body["phone"] = "999".into();

        let response = app.oneshot(post_json("/applications", &body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(response).await;
        assert_eq!(json["issues"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_closed_registration() {
        let config = ServerConfig {
            registration_open: false,
            ..admin_config()
        };
        let app = build_router(test_state(config));

        let response = app
            .oneshot(post_json("/applications", &form_json("1087654321")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_admin_requires_token() {
        let app = build_router(test_state(admin_config()));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/admin/statistics")
                    .header(header::AUTHORIZATION, "Bearer wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app.oneshot(admin_get("/admin/statistics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["total"], 0);
    }

    #[tokio::test]
    async fn test_admin_disabled_without_token() {
        let app = build_router(test_state(ServerConfig::default()));
        let response = app.oneshot(admin_get("/admin/statistics")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_status_update_and_delete() {
        let state = test_state(admin_config());
        let receipt = state
            .vault
            .lock()
            .await
            .save(serde_json::from_value(form_json("1087654321")).unwrap())
            .unwrap();
        let id = receipt.application.id;
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::PATCH)
                    .uri(format!("/admin/applications/{id}/status"))
                    .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"status":"confirmed"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "confirmed");

        let delete_req = || {
            Request::builder()
                .method(Method::DELETE)
                .uri(format!("/admin/applications/{id}"))
                .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                .body(Body::empty())
                .unwrap()
        };
        let response = app.clone().oneshot(delete_req()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(delete_req()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(state.vault.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_csv_export_has_header() {
        let state = test_state(admin_config());
        state
            .vault
            .lock()
            .await
            .save(serde_json::from_value(form_json("1087654321")).unwrap())
            .unwrap();
        let app = build_router(state);

        let response = app.oneshot(admin_get("/admin/export.csv")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/csv; charset=utf-8"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("Reference Number,Full Name,National ID"));
        assert_eq!(text.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_filtered_listing() {
        let state = test_state(admin_config());
        {
            let mut vault = state.vault.lock().await;
            vault
                .save(serde_json::from_value(form_json("1087654321")).unwrap())
                .unwrap();
            let mut other = form_json("1098765432");
            other["gender"] = "female".into();
            vault.save(serde_json::from_value(other).unwrap()).unwrap();
        }
        let app = build_router(state);

        let response = app
            .oneshot(admin_get("/admin/applications?gender=female&sort=gpa_desc&per_page=10"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let page = body_json(response).await;
        assert_eq!(page["totalItems"], 1);
        assert_eq!(page["items"][0]["nationalId"], "1098765432");
    }

    fn admin_request(method: Method, uri: &str, body: Option<&str>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"));
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_admin_edit_application() {
        let state = test_state(admin_config());
        let id = {
            let mut vault = state.vault.lock().await;
            vault
                .save(serde_json::from_value(form_json("1098765432")).unwrap())
                .unwrap();
            vault
                .save(serde_json::from_value(form_json("1087654321")).unwrap())
                .unwrap()
                .application
                .id
        };
        let app = build_router(state.clone());
        let uri = format!("/admin/applications/{id}");

        let response = app
            .clone()
            .oneshot(admin_request(
                Method::PATCH,
                &uri,
                Some(r#"{"phone": "0598765432", "roomType": "suite", "status": "confirmed"}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let edited = body_json(response).await;
        assert_eq!(edited["phone"], "0598765432");
        assert_eq!(edited["fees"], 8000);
        assert_eq!(edited["status"], "confirmed");

        // another applicant already holds this national ID
        let response = app
            .clone()
            .oneshot(admin_request(
                Method::PATCH,
                &uri,
                Some(r#"{"nationalId": "1098765432"}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        // edits must still pass the registration rules
        let response = app
            .clone()
            .oneshot(admin_request(Method::PATCH, &uri, Some(r#"{"phone": "12"}"#)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app
            .clone()
            .oneshot(admin_request(Method::PATCH, &uri, Some("{}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(admin_request(
                Method::PATCH,
                &format!("/admin/applications/{}", Uuid::new_v4()),
                Some(r#"{"phone": "0598765432"}"#),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let vault = state.vault.lock().await;
        let stored = vault.get(id).unwrap();
        assert_eq!(stored.form.phone, "0598765432");
        assert_eq!(stored.national_id(), "1087654321");
    }

    #[tokio::test]
    async fn test_cleanup_rejects_out_of_range_age() {
        let state = test_state(admin_config());
        state
            .vault
            .lock()
            .await
            .save(serde_json::from_value(form_json("1087654321")).unwrap())
            .unwrap();
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(admin_request(
                Method::POST,
                &format!("/admin/cleanup?max_age_days={}", i64::MAX),
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(admin_request(
                Method::POST,
                "/admin/cleanup?max_age_days=1000000000",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["removed"], 0);

        let response = app
            .oneshot(admin_request(Method::POST, "/admin/cleanup?max_age_days=-1", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(state.vault.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_registration_is_throttled_per_client() {
        let config = ServerConfig {
            registration_burst: 1.0,
            trust_proxy_headers: true,
            ..admin_config()
        };
        let app = build_router(test_state(config));

        let submit = |client: &str, national_id: &str| {
            let mut req = post_json("/applications", &form_json(national_id));
            req.headers_mut()
                .insert("x-forwarded-for", client.parse().unwrap());
            req
        };

        let response = app
            .clone()
            .oneshot(submit("203.0.113.7", "1087654321"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(submit("203.0.113.7", "1098765432"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(body_json(response).await["error"].is_string());

        // a different client and the admin routes keep working
        let response = app
            .clone()
            .oneshot(submit("203.0.113.8", "1098765432"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let mut req = admin_get("/admin/statistics");
        req.headers_mut()
            .insert("x-forwarded-for", "203.0.113.7".parse().unwrap());
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["total"], 2);
    }
}
