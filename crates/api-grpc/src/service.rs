// Re-export the proto module from the shared `api-shared` crate so callers
// can continue to reference `api_grpc::service::pb`.
pub use api_shared::pb;

use api_shared::auth;
use api_shared::HealthService;
use medcheck_core::{wire, AuditError, AuditService, CoreConfig};
use std::sync::Arc;
use tonic::service::Interceptor;
use tonic::{Request, Response, Status};

// Use the shared api-shared crate for generated protobuf types.
use api_shared::pb::{
    med_check_server::MedCheck, CompareReq, CompareRes, ContestReq, ContestRes, HealthRes,
    LookupReferenceReq, LookupReferenceRes, ReconcileReq, ReconcileRes,
};

/// Authentication interceptor for gRPC requests
///
/// Holds the `API_KEY` resolved at startup and checks it against the `x-api-key` header.
#[derive(Clone, Debug, Default)]
pub struct AuthInterceptor {
    expected_key: Option<Arc<str>>,
}

impl AuthInterceptor {
    pub fn new(expected_key: Option<String>) -> Self {
        Self {
            expected_key: expected_key.map(Arc::from),
        }
    }
}

impl Interceptor for AuthInterceptor {
    fn call(&mut self, req: Request<()>) -> Result<Request<()>, Status> {
        let api_key = req
            .metadata()
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| Status::unauthenticated("Missing x-api-key header"))?;

        auth::validate_api_key(api_key, self.expected_key.as_deref())?;
        Ok(req)
    }
}

fn invalid_argument(err: AuditError) -> Status {
    tracing::warn!("rejected request: {}", err);
    Status::invalid_argument(err.to_string())
}

#[derive(Clone)]
pub struct MedCheckService {
    audit_service: AuditService,
}

impl MedCheckService {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self {
            audit_service: AuditService::new(cfg),
        }
    }
}

#[tonic::async_trait]
impl MedCheck for MedCheckService {
    async fn health(&self, _req: Request<()>) -> Result<Response<HealthRes>, Status> {
        let health_res = HealthService::check_health();
        Ok(Response::new(health_res))
    }

    async fn lookup_reference(
        &self,
        req: Request<LookupReferenceReq>,
    ) -> Result<Response<LookupReferenceRes>, Status> {
        let req = req.into_inner();
        match wire::lookup(&self.audit_service, &req) {
            Some(res) => Ok(Response::new(res)),
            None => Err(Status::not_found(format!(
                "procedure code {} not in reference table",
                req.code.trim()
            ))),
        }
    }

    async fn compare(&self, req: Request<CompareReq>) -> Result<Response<CompareRes>, Status> {
        wire::compare(&self.audit_service, req.into_inner())
            .map(Response::new)
            .map_err(invalid_argument)
    }

    async fn reconcile(
        &self,
        req: Request<ReconcileReq>,
    ) -> Result<Response<ReconcileRes>, Status> {
        wire::reconcile(&self.audit_service, req.into_inner())
            .map(Response::new)
            .map_err(invalid_argument)
    }

    async fn contest(&self, req: Request<ContestReq>) -> Result<Response<ContestRes>, Status> {
        let today = chrono::Local::now().date_naive();
        wire::contest(&self.audit_service, req.into_inner(), today)
            .map(Response::new)
            .map_err(invalid_argument)
    }
}
