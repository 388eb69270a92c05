use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::audit::AuditSink;
use super::case::Case;
use super::domain::{CaseId, CaseStatus, CaseworkActor, RuleId, Team};
use super::flags::{Flag, FlagStatus, FlaggingRule};
use super::repository::{CaseRepository, FlagRegistry, RegistryError, RepositoryError};
use super::service::{CaseworkService, CaseworkServiceError};

/// Router builder exposing the casework engine over HTTP. Actor
/// identity arrives in the request body: authentication is owned by the
/// layer in front of this service.
pub fn casework_router<R, F, A>(service: Arc<CaseworkService<R, F, A>>) -> Router
where
    R: CaseRepository + 'static,
    F: FlagRegistry + 'static,
    A: AuditSink + 'static,
{
    Router::new()
        .route("/api/v1/cases", post(register_case_handler::<R, F, A>))
        .route(
            "/api/v1/cases/:case_id/submit",
            post(submit_case_handler::<R, F, A>),
        )
        .route(
            "/api/v1/cases/:case_id/status",
            patch(change_status_handler::<R, F, A>),
        )
        .route(
            "/api/v1/cases/:case_id/flags",
            get(case_flags_handler::<R, F, A>),
        )
        .route("/api/v1/flags", post(create_flag_handler::<R, F, A>))
        .route(
            "/api/v1/flagging-rules",
            post(create_rule_handler::<R, F, A>),
        )
        .route(
            "/api/v1/flagging-rules/:rule_id/status",
            patch(rule_status_handler::<R, F, A>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub actor: CaseworkActor,
    pub status: CaseStatus,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub actor: CaseworkActor,
}

#[derive(Debug, Deserialize)]
pub struct CreateFlagRequest {
    pub actor: CaseworkActor,
    pub flag: Flag,
}

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub actor: CaseworkActor,
    pub rule: FlaggingRule,
}

#[derive(Debug, Deserialize)]
pub struct RuleStatusRequest {
    pub actor: CaseworkActor,
    pub status: FlagStatus,
}

#[derive(Debug, Deserialize)]
pub struct FlagsQuery {
    pub team: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub distinct: Option<bool>,
}

pub(crate) async fn register_case_handler<R, F, A>(
    State(service): State<Arc<CaseworkService<R, F, A>>>,
    axum::Json(case): axum::Json<Case>,
) -> Response
where
    R: CaseRepository + 'static,
    F: FlagRegistry + 'static,
    A: AuditSink + 'static,
{
    match service.register_case(case) {
        Ok(stored) => (StatusCode::CREATED, axum::Json(status_view(&stored))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_case_handler<R, F, A>(
    State(service): State<Arc<CaseworkService<R, F, A>>>,
    Path(case_id): Path<String>,
    axum::Json(request): axum::Json<SubmitRequest>,
) -> Response
where
    R: CaseRepository + 'static,
    F: FlagRegistry + 'static,
    A: AuditSink + 'static,
{
    match service.submit_case(&CaseId(case_id), &request.actor) {
        Ok(case) => (StatusCode::OK, axum::Json(status_view(&case))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn change_status_handler<R, F, A>(
    State(service): State<Arc<CaseworkService<R, F, A>>>,
    Path(case_id): Path<String>,
    axum::Json(request): axum::Json<ChangeStatusRequest>,
) -> Response
where
    R: CaseRepository + 'static,
    F: FlagRegistry + 'static,
    A: AuditSink + 'static,
{
    match service.change_status(
        &CaseId(case_id),
        &request.actor,
        request.status,
        request.note,
    ) {
        Ok(case) => (StatusCode::OK, axum::Json(status_view(&case))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn case_flags_handler<R, F, A>(
    State(service): State<Arc<CaseworkService<R, F, A>>>,
    Path(case_id): Path<String>,
    Query(query): Query<FlagsQuery>,
) -> Response
where
    R: CaseRepository + 'static,
    F: FlagRegistry + 'static,
    A: AuditSink + 'static,
{
    let team = Team(query.team);
    match service.ordered_flags(
        &CaseId(case_id),
        &team,
        query.limit,
        query.distinct.unwrap_or(false),
    ) {
        Ok(flags) => (StatusCode::OK, axum::Json(json!({ "flags": flags }))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_flag_handler<R, F, A>(
    State(service): State<Arc<CaseworkService<R, F, A>>>,
    axum::Json(request): axum::Json<CreateFlagRequest>,
) -> Response
where
    R: CaseRepository + 'static,
    F: FlagRegistry + 'static,
    A: AuditSink + 'static,
{
    match service.create_flag(&request.actor, request.flag) {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_rule_handler<R, F, A>(
    State(service): State<Arc<CaseworkService<R, F, A>>>,
    axum::Json(request): axum::Json<CreateRuleRequest>,
) -> Response
where
    R: CaseRepository + 'static,
    F: FlagRegistry + 'static,
    A: AuditSink + 'static,
{
    match service.create_rule(&request.actor, request.rule) {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn rule_status_handler<R, F, A>(
    State(service): State<Arc<CaseworkService<R, F, A>>>,
    Path(rule_id): Path<String>,
    axum::Json(request): axum::Json<RuleStatusRequest>,
) -> Response
where
    R: CaseRepository + 'static,
    F: FlagRegistry + 'static,
    A: AuditSink + 'static,
{
    match service.set_rule_status(&request.actor, &RuleId(rule_id), request.status) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(error) => error_response(error),
    }
}

fn status_view(case: &Case) -> serde_json::Value {
    json!({
        "case_id": case.id,
        "reference": case.reference,
        "status": case.status.label(),
    })
}

/// Map service errors onto HTTP statuses. Guard rejections surface the
/// failed rule verbatim so callers can render an actionable message.
fn error_response(error: CaseworkServiceError) -> Response {
    let status = match &error {
        CaseworkServiceError::Transition(_)
        | CaseworkServiceError::RuleManagementDenied
        | CaseworkServiceError::FlagActivationDenied
        | CaseworkServiceError::FlagRemovalDenied { .. } => StatusCode::FORBIDDEN,
        CaseworkServiceError::RuleValidation(_) | CaseworkServiceError::NotDraft(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CaseworkServiceError::Repository(RepositoryError::NotFound)
        | CaseworkServiceError::Registry(RegistryError::NotFound) => StatusCode::NOT_FOUND,
        CaseworkServiceError::Repository(RepositoryError::Conflict)
        | CaseworkServiceError::Registry(RegistryError::Conflict) => StatusCode::CONFLICT,
        CaseworkServiceError::Repository(_) | CaseworkServiceError::Registry(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (status, axum::Json(json!({ "error": error.to_string() }))).into_response()
}
