use std::sync::Arc;

use axum::{
    extract::{Path, Query, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, warn};

use super::domain::{parse_cgpa, Stream, SubmissionForm, SubmissionId};
use super::eligibility::EligibilityCriteria;
use super::error::{CollaboratorError, PlacementError, ValidationError};
use super::identity::{
    bearer_token, Identity, IdentityError, IdentityProvider, SessionToken, SignInRequest,
};
use super::service::PlacementService;
use super::store::{StoreError, SubmissionStore};

type SharedService<S, I> = Arc<PlacementService<S, I>>;

/// Router builder exposing sign-in, student, admin and company endpoints.
/// Everything except sign-in sits behind [`require_identity`].
pub fn placement_router<S, I>(service: SharedService<S, I>) -> Router
where
    S: SubmissionStore + 'static,
    I: IdentityProvider + 'static,
{
    let protected = Router::new()
        .route("/api/v1/auth/sign-out", post(sign_out_handler::<S, I>))
        .route("/api/v1/auth/me", get(me_handler))
        .route(
            "/api/v1/submissions/me",
            put(submit_handler::<S, I>).get(my_submission_handler::<S, I>),
        )
        .route(
            "/api/v1/submissions/me/eligibility",
            get(student_eligibility_handler::<S, I>),
        )
        .route(
            "/api/v1/admin/submissions",
            get(list_submissions_handler::<S, I>),
        )
        .route(
            "/api/v1/admin/submissions/:submission_id",
            axum::routing::delete(delete_submission_handler::<S, I>),
        )
        .route(
            "/api/v1/admin/submissions/:submission_id/eligibility",
            post(mark_eligible_handler::<S, I>).delete(remove_eligibility_handler::<S, I>),
        )
        .route("/api/v1/admin/export", get(export_handler::<S, I>))
        .route("/api/v1/companies", get(company_overview_handler::<S, I>))
        .route_layer(middleware::from_fn_with_state(
            service.clone(),
            require_identity::<S, I>,
        ));

    Router::new()
        .route("/api/v1/auth/sign-in", post(sign_in_handler::<S, I>))
        .merge(protected)
        .with_state(service)
}

impl IntoResponse for PlacementError {
    fn into_response(self) -> Response {
        let status = match &self {
            PlacementError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PlacementError::EmptyInput(_) => StatusCode::NOT_FOUND,
            PlacementError::Collaborator(CollaboratorError::Store(StoreError::NotFound)) => {
                StatusCode::NOT_FOUND
            }
            PlacementError::Collaborator(CollaboratorError::Store(StoreError::Conflict)) => {
                StatusCode::CONFLICT
            }
            PlacementError::Collaborator(CollaboratorError::Identity(IdentityError::Rejected(_))) => {
                StatusCode::UNAUTHORIZED
            }
            PlacementError::Collaborator(_) | PlacementError::Encoding(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self, "placement request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

fn unauthenticated() -> Response {
    let payload = json!({
        "error": "authentication required",
        "redirect": "/login",
    });
    (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
}

/// Resolve the bearer token into an [`Identity`] and hand both to the
/// handler through request extensions.
pub(crate) async fn require_identity<S, I>(
    State(service): State<SharedService<S, I>>,
    mut request: Request,
    next: Next,
) -> Response
where
    S: SubmissionStore + 'static,
    I: IdentityProvider + 'static,
{
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token);

    let Some(token) = token else {
        return unauthenticated();
    };

    let identity = match service.current_user(&token) {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            warn!("unknown or expired session token");
            return unauthenticated();
        }
        Err(err) => return err.into_response(),
    };

    request.extensions_mut().insert(identity);
    request.extensions_mut().insert(token);
    next.run(request).await
}

/// Admin filter query parameters. Empty values mean "no constraint".
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CriteriaQuery {
    #[serde(default)]
    pub(crate) min_cgpa: Option<String>,
    #[serde(default)]
    pub(crate) stream: Option<String>,
    #[serde(default)]
    pub(crate) company: Option<String>,
}

impl CriteriaQuery {
    pub(crate) fn criteria(&self) -> Result<EligibilityCriteria, ValidationError> {
        let min_cgpa = match self.min_cgpa.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => parse_cgpa(raw)?,
            _ => 0.0,
        };
        let stream = Stream::parse_filter(self.stream.as_deref().unwrap_or_default())?;
        Ok(EligibilityCriteria::new(min_cgpa, stream))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MarkEligibleRequest {
    pub(crate) company: String,
    #[serde(default)]
    pub(crate) interview_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CompanyQuery {
    #[serde(default)]
    pub(crate) company: Option<String>,
}

pub(crate) async fn sign_in_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Json(request): Json<SignInRequest>,
) -> Result<Response, PlacementError>
where
    S: SubmissionStore + 'static,
    I: IdentityProvider + 'static,
{
    let session = service.sign_in(request)?;
    Ok((StatusCode::OK, Json(session)).into_response())
}

pub(crate) async fn sign_out_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Extension(token): Extension<SessionToken>,
) -> Result<Response, PlacementError>
where
    S: SubmissionStore + 'static,
    I: IdentityProvider + 'static,
{
    service.sign_out(&token)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn me_handler(Extension(identity): Extension<Identity>) -> Json<Identity> {
    Json(identity)
}

pub(crate) async fn submit_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Extension(identity): Extension<Identity>,
    Json(form): Json<SubmissionForm>,
) -> Result<Response, PlacementError>
where
    S: SubmissionStore + 'static,
    I: IdentityProvider + 'static,
{
    let receipt = service.submit(&identity, form)?;
    let status = if receipt.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(receipt)).into_response())
}

pub(crate) async fn my_submission_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Extension(identity): Extension<Identity>,
) -> Result<Response, PlacementError>
where
    S: SubmissionStore + 'static,
    I: IdentityProvider + 'static,
{
    match service.my_submission(&identity)? {
        Some(submission) => Ok((StatusCode::OK, Json(submission)).into_response()),
        None => {
            let payload = json!({ "error": "no submission yet" });
            Ok((StatusCode::NOT_FOUND, Json(payload)).into_response())
        }
    }
}

pub(crate) async fn student_eligibility_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Extension(identity): Extension<Identity>,
) -> Result<Response, PlacementError>
where
    S: SubmissionStore + 'static,
    I: IdentityProvider + 'static,
{
    let companies = service.student_eligibility(&identity)?;
    Ok((StatusCode::OK, Json(json!({ "companies": companies }))).into_response())
}

pub(crate) async fn list_submissions_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Query(query): Query<CriteriaQuery>,
) -> Result<Response, PlacementError>
where
    S: SubmissionStore + 'static,
    I: IdentityProvider + 'static,
{
    let criteria = query.criteria()?;
    let rows = service.list_submissions(&criteria, query.company.as_deref())?;
    Ok((StatusCode::OK, Json(rows)).into_response())
}

pub(crate) async fn mark_eligible_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Path(submission_id): Path<String>,
    Json(request): Json<MarkEligibleRequest>,
) -> Result<Response, PlacementError>
where
    S: SubmissionStore + 'static,
    I: IdentityProvider + 'static,
{
    let id = SubmissionId(submission_id);
    let submission = service.mark_eligible(
        &id,
        &request.company,
        request.interview_date.as_deref(),
    )?;
    Ok((StatusCode::OK, Json(submission)).into_response())
}

pub(crate) async fn remove_eligibility_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Path(submission_id): Path<String>,
    Query(query): Query<CompanyQuery>,
) -> Result<Response, PlacementError>
where
    S: SubmissionStore + 'static,
    I: IdentityProvider + 'static,
{
    let id = SubmissionId(submission_id);
    let company = query.company.unwrap_or_default();
    let submission = service.remove_eligibility(&id, &company)?;
    Ok((StatusCode::OK, Json(submission)).into_response())
}

pub(crate) async fn delete_submission_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Path(submission_id): Path<String>,
) -> Result<Response, PlacementError>
where
    S: SubmissionStore + 'static,
    I: IdentityProvider + 'static,
{
    service.delete_submission(&SubmissionId(submission_id))?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn export_handler<S, I>(
    State(service): State<SharedService<S, I>>,
    Query(query): Query<CriteriaQuery>,
) -> Result<Response, PlacementError>
where
    S: SubmissionStore + 'static,
    I: IdentityProvider + 'static,
{
    let criteria = query.criteria()?;
    let company = query.company.unwrap_or_default();
    let document = service.export_eligible(&criteria, &company)?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        header_safe_filename(&document.filename)
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, mime::TEXT_CSV_UTF_8.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        document.body,
    )
        .into_response())
}

/// Company keys may carry any character; header values may not.
fn header_safe_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub(crate) async fn company_overview_handler<S, I>(
    State(service): State<SharedService<S, I>>,
) -> Result<Response, PlacementError>
where
    S: SubmissionStore + 'static,
    I: IdentityProvider + 'static,
{
    let companies = service.company_overview()?;
    Ok((StatusCode::OK, Json(companies)).into_response())
}
