//! # API Endpoint Handlers
//!
//! Store calls are synchronous redb transactions; each handler runs its
//! work on the blocking pool through [`with_portal`].

use super::{
    AppState,
    extract::{ApiJson, ApiPath, ApiQuery},
    types::{
        ApiFailure, ApiResponse, AssessmentJson, BatchQuery, DecisionRequest, EvaluateRequest,
        HealthResponse, IncludeQuery, ModuleRequest, ProgramQuery, RegistrationDetailJson,
        RegistrationJson, RegistrationQuery, StatusResponse, SubmitRequest,
    },
};
use crate::audit;
use axum::{Json, extract::State, http::StatusCode};
use certis_core::{
    Batch, BatchId, BatchPatch, CapacityView, CertisError, EvaluatorId, Module, ModuleId,
    ModulePatch, NewBatch, NewModule, NewProgram, Page, Portal, Program, ProgramId,
    ProgramIncludes, ProgramPatch, ProgramView, Reconciliation, RegistrationId, Removed, SubjectId,
    Target,
};
use std::sync::Arc;

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiFailure>;
type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiFailure>;

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

fn created<T>(data: T) -> Created<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(data))))
}

/// Run `f` against the portal on the blocking pool.
async fn with_portal<T, F>(state: &AppState, f: F) -> Result<T, ApiFailure>
where
    T: Send + 'static,
    F: FnOnce(&Portal) -> Result<T, CertisError> + Send + 'static,
{
    let portal = Arc::clone(&state.portal);
    match tokio::task::spawn_blocking(move || f(&portal)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            audit::failure(&e);
            Err(e.into())
        }
        Err(e) => {
            tracing::error!(error = %e, "blocking task failed");
            Err(ApiFailure::internal("worker task failed"))
        }
    }
}

// =============================================================================
// HEALTH & STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Entity counts and registrations by status.
pub async fn status_handler(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let metrics = with_portal(&state, Portal::metrics).await?;
    ok(metrics.into())
}

// =============================================================================
// PROGRAMS
// =============================================================================

pub async fn list_programs(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProgramQuery>,
) -> ApiResult<Page<Program>> {
    let filter = query.filter()?;
    let (order, page) = (query.order()?, query.page());
    ok(with_portal(&state, move |p| p.list_programs(&filter, order, page)).await?)
}

pub async fn create_program(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewProgram>,
) -> Created<Program> {
    let program = with_portal(&state, move |p| p.create_program(input)).await?;
    tracing::info!(event = "program_created", program_id = program.id.0, kind = %program.kind);
    created(program)
}

pub async fn get_program(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiQuery(query): ApiQuery<IncludeQuery>,
) -> ApiResult<ProgramView> {
    let includes = match query.include.as_deref() {
        Some(list) => ProgramIncludes::parse(list)?,
        None => ProgramIncludes::default(),
    };
    ok(with_portal(&state, move |p| p.load_program(ProgramId(id), includes)).await?)
}

pub async fn update_program(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(patch): ApiJson<ProgramPatch>,
) -> ApiResult<Program> {
    ok(with_portal(&state, move |p| p.update_program(ProgramId(id), &patch)).await?)
}

pub async fn delete_program(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<Removed> {
    let removed = with_portal(&state, move |p| p.delete_program(ProgramId(id))).await?;
    tracing::info!(
        event = "program_deleted",
        program_id = id,
        registrations = removed.registrations
    );
    ok(removed)
}

// =============================================================================
// MODULES
// =============================================================================

pub async fn list_modules(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<Vec<Module>> {
    ok(with_portal(&state, move |p| p.list_modules(ProgramId(id))).await?)
}

pub async fn create_module(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(body): ApiJson<ModuleRequest>,
) -> Created<Module> {
    let input = NewModule {
        program_id: ProgramId(id),
        title: body.title,
        position: body.position,
        material_url: body.material_url,
    };
    created(with_portal(&state, move |p| p.create_module(input)).await?)
}

pub async fn update_module(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(patch): ApiJson<ModulePatch>,
) -> ApiResult<Module> {
    ok(with_portal(&state, move |p| p.update_module(ModuleId(id), &patch)).await?)
}

pub async fn delete_module(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<Module> {
    ok(with_portal(&state, move |p| p.delete_module(ModuleId(id))).await?)
}

// =============================================================================
// BATCHES
// =============================================================================

pub async fn list_batches(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<Vec<Batch>> {
    ok(with_portal(&state, move |p| p.list_batches(ProgramId(id))).await?)
}

pub async fn find_batches(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<BatchQuery>,
) -> ApiResult<Page<Batch>> {
    let filter = query.filter();
    let (order, page) = (query.order()?, query.page());
    ok(with_portal(&state, move |p| p.find_batches(&filter, order, page)).await?)
}

pub async fn create_batch(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewBatch>,
) -> Created<Batch> {
    created(with_portal(&state, move |p| p.create_batch(input)).await?)
}

pub async fn get_batch(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<Batch> {
    ok(with_portal(&state, move |p| p.get_batch(BatchId(id))).await?)
}

pub async fn update_batch(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(patch): ApiJson<BatchPatch>,
) -> ApiResult<Batch> {
    ok(with_portal(&state, move |p| p.update_batch(BatchId(id), &patch)).await?)
}

pub async fn delete_batch(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<Removed> {
    ok(with_portal(&state, move |p| p.delete_batch(BatchId(id))).await?)
}

// =============================================================================
// REGISTRATIONS
// =============================================================================

pub async fn list_registrations(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<RegistrationQuery>,
) -> ApiResult<Page<RegistrationJson>> {
    let filter = query.filter()?;
    let (order, page) = (query.order()?, query.page());
    let page = with_portal(&state, move |p| p.list_registrations(&filter, order, page)).await?;
    ok(page.map(RegistrationJson::from))
}

pub async fn submit_registration(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SubmitRequest>,
) -> Created<RegistrationJson> {
    let target = request.target()?;
    let (subject, details) = (SubjectId(request.subject_id), request.details());
    let reg = with_portal(&state, move |p| {
        p.submit_registration(subject, target, details)
    })
    .await?;
    audit::registration_submitted(&reg);
    created(reg.into())
}

pub async fn get_registration(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<RegistrationDetailJson> {
    let detail = with_portal(&state, move |p| p.registration_detail(RegistrationId(id))).await?;
    ok(detail.into())
}

pub async fn delete_registration(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<RegistrationJson> {
    let reg = with_portal(&state, move |p| p.delete_registration(RegistrationId(id))).await?;
    tracing::info!(event = "registration_deleted", registration_id = id, status = %reg.status);
    ok(reg.into())
}

pub async fn decide_registration(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(request): ApiJson<DecisionRequest>,
) -> ApiResult<RegistrationJson> {
    let reg = with_portal(&state, move |p| {
        p.decide_registration(RegistrationId(id), request.decision, request.note)
    })
    .await?;
    audit::registration_decided(&reg);
    ok(reg.into())
}

pub async fn cancel_registration(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<RegistrationJson> {
    let reg = with_portal(&state, move |p| p.cancel_registration(RegistrationId(id))).await?;
    audit::registration_cancelled(&reg);
    ok(reg.into())
}

// =============================================================================
// ASSESSMENTS
// =============================================================================

pub async fn get_assessment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
) -> ApiResult<AssessmentJson> {
    match with_portal(&state, move |p| p.get_assessment(RegistrationId(id))).await? {
        Some(assessment) => ok(assessment.into()),
        None => Err(ApiFailure::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("Registration {} has no assessment", id),
        )),
    }
}

pub async fn evaluate_registration(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(request): ApiJson<EvaluateRequest>,
) -> ApiResult<AssessmentJson> {
    let scores = request.scores.to_raw()?;
    let evaluator = EvaluatorId(request.evaluator_id);
    let assessment = with_portal(&state, move |p| {
        p.evaluate_registration(RegistrationId(id), &scores, evaluator, request.notes)
    })
    .await?;
    audit::assessment_recorded(&assessment);
    ok(assessment.into())
}

// =============================================================================
// CAPACITY
// =============================================================================

pub async fn get_capacity(
    State(state): State<AppState>,
    ApiPath((kind, id)): ApiPath<(String, u64)>,
) -> ApiResult<CapacityView> {
    let target = Target::from_parts(&kind, id)?;
    ok(with_portal(&state, move |p| p.get_capacity(target)).await?)
}

pub async fn reconcile_capacity(
    State(state): State<AppState>,
    ApiPath((kind, id)): ApiPath<(String, u64)>,
) -> ApiResult<Reconciliation> {
    let target = Target::from_parts(&kind, id)?;
    let rec = with_portal(&state, move |p| p.reconcile(target)).await?;
    audit::capacity_reconciled(&rec);
    ok(rec)
}

pub async fn reconcile_all(State(state): State<AppState>) -> ApiResult<Vec<Reconciliation>> {
    let all = with_portal(&state, Portal::reconcile_all).await?;
    all.iter().for_each(audit::capacity_reconciled);
    ok(all)
}
