//! # API Types
//!
//! Request and response types for the HTTP API.
//!
//! Every response is wrapped in [`ApiResponse`]:
//!
//! ```json
//! { "success": false, "error": { "code": "capacity_exceeded", "message": "..." } }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use certis_core::query::{
    batch as batch_filter, program as program_filter, registration as registration_filter,
};
use certis_core::{
    Assessment, Batch, BatchId, CertisError, Decision, Filter, PageRequest, PortalMetrics, Program,
    ProgramId, ProgramKind, Registration, RegistrationDetail, RegistrationDetails,
    RegistrationStatus, SortOrder, SubjectId, Target,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// ENVELOPE
// =============================================================================

/// Uniform response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Machine-readable code plus a human message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// An error response: status code plus envelope.
#[derive(Debug, Clone)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub error: ApiError,
}

impl ApiFailure {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            error: ApiError {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
    }
}

/// HTTP status for each core error.
#[must_use]
pub fn status_for(err: &CertisError) -> StatusCode {
    match err {
        CertisError::NotFound { .. } => StatusCode::NOT_FOUND,
        CertisError::ValidationFailed { .. } | CertisError::OutOfRange { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CertisError::InvalidTransition { .. }
        | CertisError::InvalidState { .. }
        | CertisError::AlreadyRegistered { .. }
        | CertisError::CapacityExceeded { .. } => StatusCode::CONFLICT,
        CertisError::Storage(_) | CertisError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<CertisError> for ApiFailure {
    fn from(err: CertisError) -> Self {
        Self::new(status_for(&err), err.code(), err.to_string())
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(self.error),
        };
        (self.status, Json(body)).into_response()
    }
}

// =============================================================================
// SERVICE RESPONSES
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub cancelled: u64,
}

/// Entity counts and registrations by status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub programs: u64,
    pub modules: u64,
    pub batches: u64,
    pub registrations: u64,
    pub assessments: u64,
    pub registrations_by_status: StatusCounts,
}

impl From<PortalMetrics> for StatusResponse {
    fn from(m: PortalMetrics) -> Self {
        Self {
            programs: m.programs,
            modules: m.modules,
            batches: m.batches,
            registrations: m.registrations,
            assessments: m.assessments,
            registrations_by_status: StatusCounts {
                pending: m.pending,
                approved: m.approved,
                rejected: m.rejected,
                cancelled: m.cancelled,
            },
        }
    }
}

// =============================================================================
// CATALOG
// =============================================================================

/// Body of `POST /programs/{id}/modules`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleRequest {
    pub title: String,
    #[serde(default)]
    pub position: Option<u32>,
    #[serde(default)]
    pub material_url: Option<String>,
}

/// `?include=batches,modules`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IncludeQuery {
    pub include: Option<String>,
}

/// Query string of `GET /programs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgramQuery {
    pub kind: Option<String>,
    pub active: Option<bool>,
    pub q: Option<String>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub sort: Option<String>,
}

impl ProgramQuery {
    pub fn filter(&self) -> Result<Filter<Program>, CertisError> {
        let kind = self
            .kind
            .as_deref()
            .map(str::parse::<ProgramKind>)
            .transpose()?;
        let mut filter = Filter::all()
            .and_opt(kind, program_filter::of_kind)
            .and_opt(self.q.as_deref(), program_filter::name_contains);
        if self.active == Some(true) {
            filter = filter.and(program_filter::active());
        }
        Ok(filter)
    }

    pub fn order(&self) -> Result<SortOrder, CertisError> {
        parse_order(self.sort.as_deref())
    }

    #[must_use]
    pub fn page(&self) -> PageRequest {
        page_request(self.page, self.per_page)
    }
}

/// Query string of `GET /batches`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchQuery {
    pub program: Option<u64>,
    pub active: Option<bool>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub sort: Option<String>,
}

impl BatchQuery {
    #[must_use]
    pub fn filter(&self) -> Filter<Batch> {
        let filter =
            Filter::all().and_opt(self.program.map(ProgramId), batch_filter::of_program);
        if self.active == Some(true) {
            filter.and(batch_filter::active())
        } else {
            filter
        }
    }

    pub fn order(&self) -> Result<SortOrder, CertisError> {
        parse_order(self.sort.as_deref())
    }

    #[must_use]
    pub fn page(&self) -> PageRequest {
        page_request(self.page, self.per_page)
    }
}

// =============================================================================
// REGISTRATIONS
// =============================================================================

/// Body of `POST /registrations`. Exactly one of `batch_id` / `position_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub subject_id: u64,
    #[serde(default)]
    pub batch_id: Option<u64>,
    #[serde(default)]
    pub position_id: Option<u64>,
    #[serde(default)]
    pub motivation: Option<String>,
    #[serde(default)]
    pub documents: Vec<String>,
}

impl SubmitRequest {
    pub fn target(&self) -> Result<Target, CertisError> {
        match (self.batch_id, self.position_id) {
            (Some(id), None) => Ok(Target::Batch(BatchId(id))),
            (None, Some(id)) => Ok(Target::Position(ProgramId(id))),
            _ => Err(CertisError::validation(
                "target",
                "give exactly one of batch_id or position_id",
            )),
        }
    }

    #[must_use]
    pub fn details(&self) -> RegistrationDetails {
        RegistrationDetails {
            motivation: self.motivation.clone(),
            documents: self.documents.clone(),
        }
    }
}

/// Body of `POST /registrations/{id}/decision`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub decision: Decision,
    #[serde(default)]
    pub note: Option<String>,
}

/// Query string of `GET /registrations`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistrationQuery {
    pub status: Option<String>,
    pub subject: Option<u64>,
    pub batch: Option<u64>,
    pub position: Option<u64>,
    pub page: Option<usize>,
    pub per_page: Option<usize>,
    pub sort: Option<String>,
}

impl RegistrationQuery {
    pub fn filter(&self) -> Result<Filter<Registration>, CertisError> {
        let status = self
            .status
            .as_deref()
            .map(str::parse::<RegistrationStatus>)
            .transpose()?;
        Ok(Filter::all()
            .and_opt(status, registration_filter::with_status)
            .and_opt(self.subject.map(SubjectId), registration_filter::for_subject)
            .and_opt(
                self.batch.map(|id| Target::Batch(BatchId(id))),
                registration_filter::for_target,
            )
            .and_opt(
                self.position.map(|id| Target::Position(ProgramId(id))),
                registration_filter::for_target,
            ))
    }

    pub fn order(&self) -> Result<SortOrder, CertisError> {
        parse_order(self.sort.as_deref())
    }

    #[must_use]
    pub fn page(&self) -> PageRequest {
        page_request(self.page, self.per_page)
    }
}

/// Target as `{ "kind": "batch", "id": 3 }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetJson {
    pub kind: String,
    pub id: u64,
}

impl From<Target> for TargetJson {
    fn from(target: Target) -> Self {
        Self {
            kind: target.kind_str().to_string(),
            id: target.key().1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationJson {
    pub id: u64,
    pub subject_id: u64,
    pub target: TargetJson,
    pub status: RegistrationStatus,
    pub motivation: Option<String>,
    pub documents: Vec<String>,
    pub submitted_at: DateTime<Utc>,
    pub admin_note: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl From<Registration> for RegistrationJson {
    fn from(reg: Registration) -> Self {
        Self {
            id: reg.id.0,
            subject_id: reg.subject.0,
            target: reg.target.into(),
            status: reg.status,
            motivation: reg.details.motivation,
            documents: reg.details.documents,
            submitted_at: reg.submitted_at,
            admin_note: reg.admin_note,
            processed_at: reg.processed_at,
            cancelled_at: reg.cancelled_at,
        }
    }
}

/// A registration with its assessment, if one was recorded.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationDetailJson {
    #[serde(flatten)]
    pub registration: RegistrationJson,
    pub assessment: Option<AssessmentJson>,
}

impl From<RegistrationDetail> for RegistrationDetailJson {
    fn from(detail: RegistrationDetail) -> Self {
        Self {
            registration: detail.registration.into(),
            assessment: detail.assessment.map(AssessmentJson::from),
        }
    }
}

// =============================================================================
// ASSESSMENTS
// =============================================================================

/// Component scores as an object or as a list of `{name, score}`.
///
/// Each score may be a JSON number or a decimal string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoresInput {
    Map(serde_json::Map<String, Value>),
    List(Vec<ScoreEntry>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub name: String,
    pub score: Value,
}

impl ScoresInput {
    /// `(name, decimal text)` pairs in submission order.
    pub fn to_raw(&self) -> Result<Vec<(String, String)>, CertisError> {
        match self {
            ScoresInput::Map(map) => map
                .iter()
                .map(|(name, value)| Ok((name.clone(), score_text(name, value)?)))
                .collect(),
            ScoresInput::List(entries) => entries
                .iter()
                .map(|e| Ok((e.name.clone(), score_text(&e.name, &e.score)?)))
                .collect(),
        }
    }
}

/// Decimal text of a JSON score.
///
/// serde_json is built with `arbitrary_precision`, so a number renders as the
/// exact literal the client sent (`69.999`, `1e300`), never a rounded `f64`.
fn score_text(name: &str, value: &Value) -> Result<String, CertisError> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s.clone()),
        other => Err(CertisError::validation(
            name,
            format!("score must be a number or decimal string, got {}", other),
        )),
    }
}

/// Body of `POST /registrations/{id}/assessment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub evaluator_id: u64,
    pub scores: ScoresInput,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentJson {
    pub name: String,
    pub score: String,
}

/// Assessment with scores rendered as two-decimal strings (`"68.00"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentJson {
    pub id: u64,
    pub registration_id: u64,
    pub components: Vec<ComponentJson>,
    pub final_score: String,
    pub passed: bool,
    pub grade: String,
    pub grade_label: String,
    pub evaluator_id: u64,
    pub evaluated_at: DateTime<Utc>,
    pub notes: Option<String>,
}

impl From<Assessment> for AssessmentJson {
    fn from(a: Assessment) -> Self {
        Self {
            id: a.id.0,
            registration_id: a.registration.0,
            components: a
                .components
                .into_iter()
                .map(|c| ComponentJson {
                    name: c.name,
                    score: c.score.to_string(),
                })
                .collect(),
            final_score: a.final_score.to_string(),
            passed: a.passed,
            grade: a.grade.letter().to_string(),
            grade_label: a.grade.label().to_string(),
            evaluator_id: a.evaluator.0,
            evaluated_at: a.evaluated_at,
            notes: a.notes,
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn parse_order(sort: Option<&str>) -> Result<SortOrder, CertisError> {
    sort.map(str::parse).transpose().map(Option::unwrap_or_default)
}

fn page_request(page: Option<usize>, per_page: Option<usize>) -> PageRequest {
    PageRequest::new(page.unwrap_or(1), per_page.unwrap_or(0))
}
