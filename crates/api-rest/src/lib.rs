//! # API REST
//!
//! REST API implementation for MedCheck.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS)
//!
//! Uses `api-shared` for common types and `medcheck-core` for the audit itself.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::{pb, HealthService};
use medcheck_core::{wire, AuditError, AuditService, CoreConfig};

/// Application state shared across REST API handlers
#[derive(Clone)]
pub struct AppState {
    audit_service: AuditService,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            audit_service: AuditService::new(cfg),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, lookup_reference, compare, reconcile, contest),
    components(schemas(
        pb::HealthRes,
        pb::Doctor,
        pb::BilledProcedure,
        pb::ComparisonResult,
        pb::Summary,
        pb::GroupSummary,
        pb::ProcedureTally,
        pb::CompareReq,
        pb::CompareRes,
        pb::Party,
        pb::Participation,
        pb::GuideProcedure,
        pb::Guide,
        pb::StatementLine,
        pb::Statement,
        pb::ReconcileReq,
        pb::ReconcileRes,
        pb::ContestReq,
        pb::ContestRes,
        pb::LookupReferenceRes,
    ))
)]
pub struct ApiDoc;

/// Build the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/reference/:code", get(lookup_reference))
        .route("/compare", post(compare))
        .route("/reconcile", post(reconcile))
        .route("/contest", post(contest))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn bad_request(context: &str, err: AuditError) -> (StatusCode, String) {
    tracing::error!("{} error: {:?}", context, err);
    (StatusCode::BAD_REQUEST, err.to_string())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = pb::HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<pb::HealthRes> {
    Json(HealthService::check_health())
}

#[derive(Debug, Deserialize)]
struct RoleQuery {
    #[serde(default)]
    role: String,
}

#[utoipa::path(
    get,
    path = "/reference/{code}",
    params(
        ("code" = String, Path, description = "CBHPM procedure code"),
        ("role" = Option<String>, Query, description = "Role as printed on the guide")
    ),
    responses(
        (status = 200, description = "Reference entry", body = pb::LookupReferenceRes),
        (status = 404, description = "Code not in the reference table")
    )
)]
/// Look up a procedure in the reference table
///
/// `found` tells whether a value exists for the requested role; `values` lists every role.
#[axum::debug_handler]
async fn lookup_reference(
    State(state): State<AppState>,
    AxumPath(code): AxumPath<String>,
    Query(query): Query<RoleQuery>,
) -> Result<Json<pb::LookupReferenceRes>, (StatusCode, &'static str)> {
    let req = pb::LookupReferenceReq {
        code,
        role: query.role,
    };
    match wire::lookup(&state.audit_service, &req) {
        Some(res) => Ok(Json(res)),
        None => Err((StatusCode::NOT_FOUND, "Procedure code not in reference table")),
    }
}

#[utoipa::path(
    post,
    path = "/compare",
    request_body = pb::CompareReq,
    responses(
        (status = 200, description = "Audit of the billed procedures", body = pb::CompareRes),
        (status = 400, description = "Bad request")
    )
)]
/// Compare billed procedures against the reference table
///
/// # Errors
/// Returns `400 Bad Request` if an amount cannot be parsed or the group key is unknown.
#[axum::debug_handler]
async fn compare(
    State(state): State<AppState>,
    Json(req): Json<pb::CompareReq>,
) -> Result<Json<pb::CompareRes>, (StatusCode, String)> {
    wire::compare(&state.audit_service, req)
        .map(Json)
        .map_err(|e| bad_request("Compare", e))
}

#[utoipa::path(
    post,
    path = "/reconcile",
    request_body = pb::ReconcileReq,
    responses(
        (status = 200, description = "Reconciled audit", body = pb::ReconcileRes),
        (status = 400, description = "Bad request")
    )
)]
/// Pair guides with payer statements and audit the result
#[axum::debug_handler]
async fn reconcile(
    State(state): State<AppState>,
    Json(req): Json<pb::ReconcileReq>,
) -> Result<Json<pb::ReconcileRes>, (StatusCode, String)> {
    wire::reconcile(&state.audit_service, req)
        .map(Json)
        .map_err(|e| bad_request("Reconcile", e))
}

#[utoipa::path(
    post,
    path = "/contest",
    request_body = pb::ContestReq,
    responses(
        (status = 200, description = "Comparison and contestation letter", body = pb::ContestRes),
        (status = 400, description = "Bad request")
    )
)]
#[axum::debug_handler]
async fn contest(
    State(state): State<AppState>,
    Json(req): Json<pb::ContestReq>,
) -> Result<Json<pb::ContestRes>, (StatusCode, String)> {
    let today = chrono::Local::now().date_naive();
    wire::contest(&state.audit_service, req, today)
        .map(Json)
        .map_err(|e| bad_request("Contest", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> Router {
        let cfg = CoreConfig::from_env_values(None, None, None, None).unwrap();
        router(AppState::new(Arc::new(cfg)))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["ok"], true);
    }

    #[tokio::test]
    async fn reference_lookup_by_role() {
        let response = app()
            .oneshot(
                Request::get("/reference/30602246?role=Anestesista")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["found"], true);
        assert_eq!(json["value"], "456.40");
    }

    #[tokio::test]
    async fn unknown_reference_is_404() {
        let response = app()
            .oneshot(Request::get("/reference/00000000").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn compare_accepts_partial_bodies() {
        let body = serde_json::json!({
            "procedures": [
                {"code": "30602246", "role": "Cirurgião", "paid_amount": "3772.88", "was_paid": true},
                {"code": "30602076"}
            ],
            "group_by": "role"
        });
        let response = app().oneshot(post_json("/compare", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["results"][0]["status"], "matches");
        assert_eq!(json["results"][1]["status"], "not_paid");
        assert_eq!(json["results"][1]["role"], "Cirurgião");
        assert_eq!(json["summary"]["total"], 2);
    }

    #[tokio::test]
    async fn compare_rejects_bad_amounts() {
        let body = serde_json::json!({"procedures": [{"paid_amount": "abc"}]});
        let response = app().oneshot(post_json("/compare", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn contest_returns_letter() {
        let body = serde_json::json!({
            "procedure": {"code": "30602246", "role": "Cirurgião", "paid_amount": "3000", "was_paid": true},
            "reason_given": "pacote",
            "date": "05/09/2024",
            "doctor_name": "Ana Souza",
            "doctor_crm": "7546"
        });
        let response = app().oneshot(post_json("/contest", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["contestable"], true);
        assert_eq!(json["reason"], "pacote_servico");
        assert!(json["text"].as_str().unwrap().contains("Dr(a). Ana Souza"));
    }
}
