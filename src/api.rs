//! JSON HTTP adapter over the game-state engine.
//!
//! Authentication happens upstream; the authenticated user id arrives in the
//! `X-User-Id` header (and their email in `X-User-Email`, needed to accept
//! invitations).

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{BingoError, BingoResult, ErrorCategory};
use crate::state::AppState;
use crate::types::*;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Error body returned for every failed request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for BingoError {
    fn into_response(self) -> Response {
        let status = match (&self, self.category()) {
            (BingoError::UnsupportedMediaType(_), _) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            (BingoError::PayloadTooLarge { .. }, _) => StatusCode::PAYLOAD_TOO_LARGE,
            (_, ErrorCategory::Authorization) => StatusCode::FORBIDDEN,
            (_, ErrorCategory::NotFound) => StatusCode::NOT_FOUND,
            (_, ErrorCategory::Precondition) => StatusCode::CONFLICT,
            (_, ErrorCategory::Validation) => StatusCode::BAD_REQUEST,
            (_, ErrorCategory::Storage) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let details = match &self {
            BingoError::ResolutionsIncomplete {
                member,
                actual,
                expected,
            } => Some(serde_json::json!({
                "member": member,
                "actual": actual,
                "expected": expected,
            })),
            BingoError::InsufficientMembers { count } => {
                Some(serde_json::json!({ "count": count }))
            }
            _ => None,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
        }

        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind().to_string(),
            details,
        };
        (status, Json(body)).into_response()
    }
}

/// The authenticated caller
#[derive(Debug, Clone)]
pub struct Requester {
    pub user_id: UserId,
    pub email: Option<String>,
}

impl<S: Send + Sync> FromRequestParts<S> for Requester {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        match header(USER_ID_HEADER) {
            Some(user_id) => Ok(Requester {
                user_id,
                email: header(USER_EMAIL_HEADER),
            }),
            None => Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorBody {
                    error: "Not authenticated".to_string(),
                    kind: "UNAUTHENTICATED".to_string(),
                    details: None,
                }),
            )
                .into_response()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TeamResolutionRequest {
    pub resolution_text: String,
}

#[derive(Debug, Deserialize)]
pub struct InvitationRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinRequest {
    pub invite_code: String,
}

#[derive(Debug, Deserialize)]
pub struct ProvidedResolutionRequest {
    pub to_user_id: UserId,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolutionTextRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CellStateRequest {
    pub state: String,
}

/// Proof upload; `data` is the base64-encoded image
#[derive(Debug, Deserialize)]
pub struct ProofUploadRequest {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewRequest {
    #[serde(default)]
    pub comment: Option<String>,
}

type ApiState = State<Arc<AppState>>;

pub fn router(state: Arc<AppState>) -> Router {
    // Base64 inflates uploads by a third
    let body_limit = state.config.max_upload_bytes / 3 * 4 + 64 * 1024;

    Router::new()
        .route("/api/teams", post(create_team).get(list_teams))
        .route("/api/teams/join", post(join_team))
        .route("/api/teams/{team_id}", get(get_team))
        .route("/api/teams/{team_id}/resolution", put(set_team_resolution))
        .route("/api/teams/{team_id}/invitations", post(create_invitation))
        .route(
            "/api/teams/{team_id}/provided-resolutions",
            post(upsert_provided_resolution),
        )
        .route(
            "/api/teams/{team_id}/provided-resolutions/to-create",
            get(resolutions_to_create),
        )
        .route(
            "/api/teams/{team_id}/provided-resolutions/for-me",
            get(resolutions_for_me),
        )
        .route("/api/teams/{team_id}/start-bingo", post(start_game))
        .route("/api/teams/{team_id}/my-card", get(get_my_card))
        .route("/api/teams/{team_id}/cards", get(list_team_cards))
        .route("/api/teams/{team_id}/cards/{user_id}", get(get_user_card))
        .route("/api/cells/{cell_id}/state", put(set_cell_state))
        .route(
            "/api/cells/{cell_id}/proofs",
            post(submit_proof).get(list_cell_proofs),
        )
        .route("/api/proofs/{proof_id}/approve", put(approve_proof))
        .route("/api/proofs/{proof_id}/decline", put(decline_proof))
        .route(
            "/api/resolutions",
            post(create_personal_resolution).get(list_personal_resolutions),
        )
        .route(
            "/api/resolutions/{id}",
            get(get_personal_resolution)
                .put(update_personal_resolution)
                .delete(delete_personal_resolution),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

// ========== Teams ==========

async fn create_team(
    State(state): ApiState,
    requester: Requester,
    Json(req): Json<CreateTeamRequest>,
) -> BingoResult<(StatusCode, Json<Team>)> {
    let team = state.create_team(&requester.user_id, &req.name).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

async fn list_teams(State(state): ApiState, requester: Requester) -> Json<Vec<Team>> {
    Json(state.list_teams_for_user(&requester.user_id).await)
}

async fn get_team(
    State(state): ApiState,
    requester: Requester,
    Path(team_id): Path<TeamId>,
) -> BingoResult<Json<TeamOverview>> {
    Ok(Json(state.get_team(&team_id, &requester.user_id).await?))
}

async fn set_team_resolution(
    State(state): ApiState,
    requester: Requester,
    Path(team_id): Path<TeamId>,
    Json(req): Json<TeamResolutionRequest>,
) -> BingoResult<StatusCode> {
    state
        .set_team_resolution(&team_id, &requester.user_id, &req.resolution_text)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_invitation(
    State(state): ApiState,
    requester: Requester,
    Path(team_id): Path<TeamId>,
    Json(req): Json<InvitationRequest>,
) -> BingoResult<(StatusCode, Json<Invitation>)> {
    let invitation = state
        .create_invitation(&team_id, &requester.user_id, &req.email)
        .await?;
    Ok((StatusCode::CREATED, Json(invitation)))
}

async fn join_team(
    State(state): ApiState,
    requester: Requester,
    Json(req): Json<JoinRequest>,
) -> BingoResult<Json<Team>> {
    let email = requester
        .email
        .ok_or_else(|| BingoError::InvalidInput("Missing requester email".to_string()))?;
    Ok(Json(
        state
            .join_team(&req.invite_code, &requester.user_id, &email)
            .await?,
    ))
}

// ========== Provided resolutions ==========

async fn upsert_provided_resolution(
    State(state): ApiState,
    requester: Requester,
    Path(team_id): Path<TeamId>,
    Json(req): Json<ProvidedResolutionRequest>,
) -> BingoResult<Json<ProvidedResolution>> {
    let resolution = state
        .upsert_provided_resolution(&team_id, &requester.user_id, &req.to_user_id, &req.text)
        .await?;
    Ok(Json(resolution))
}

async fn resolutions_to_create(
    State(state): ApiState,
    requester: Requester,
    Path(team_id): Path<TeamId>,
) -> BingoResult<Json<Vec<ResolutionToCreate>>> {
    Ok(Json(
        state
            .resolutions_to_create(&team_id, &requester.user_id)
            .await?,
    ))
}

async fn resolutions_for_me(
    State(state): ApiState,
    requester: Requester,
    Path(team_id): Path<TeamId>,
) -> BingoResult<Json<Vec<ProvidedResolution>>> {
    Ok(Json(
        state.resolutions_for_me(&team_id, &requester.user_id).await?,
    ))
}

// ========== Game ==========

async fn start_game(
    State(state): ApiState,
    requester: Requester,
    Path(team_id): Path<TeamId>,
) -> BingoResult<StatusCode> {
    state.start_game(&team_id, &requester.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_my_card(
    State(state): ApiState,
    requester: Requester,
    Path(team_id): Path<TeamId>,
) -> BingoResult<Json<CardView>> {
    Ok(Json(
        state
            .get_card_for_viewer(&team_id, &requester.user_id, &requester.user_id)
            .await?,
    ))
}

async fn get_user_card(
    State(state): ApiState,
    requester: Requester,
    Path((team_id, user_id)): Path<(TeamId, UserId)>,
) -> BingoResult<Json<CardView>> {
    Ok(Json(
        state
            .get_card_for_viewer(&team_id, &requester.user_id, &user_id)
            .await?,
    ))
}

async fn list_team_cards(
    State(state): ApiState,
    requester: Requester,
    Path(team_id): Path<TeamId>,
) -> BingoResult<Json<Vec<BingoCard>>> {
    Ok(Json(state.list_team_cards(&team_id, &requester.user_id).await?))
}

async fn set_cell_state(
    State(state): ApiState,
    requester: Requester,
    Path(cell_id): Path<CellId>,
    Json(req): Json<CellStateRequest>,
) -> BingoResult<Json<BingoCell>> {
    Ok(Json(
        state
            .set_cell_state(&cell_id, &requester.user_id, &req.state)
            .await?,
    ))
}

// ========== Proofs ==========

async fn submit_proof(
    State(state): ApiState,
    requester: Requester,
    Path(cell_id): Path<CellId>,
    Json(req): Json<ProofUploadRequest>,
) -> BingoResult<(StatusCode, Json<Proof>)> {
    let bytes = STANDARD
        .decode(req.data.trim())
        .map_err(|e| BingoError::InvalidInput(format!("Invalid base64 image data: {}", e)))?;
    let proof = state
        .submit_proof(&cell_id, &requester.user_id, &bytes, &req.mime_type)
        .await?;
    Ok((StatusCode::CREATED, Json(proof)))
}

async fn list_cell_proofs(
    State(state): ApiState,
    requester: Requester,
    Path(cell_id): Path<CellId>,
) -> BingoResult<Json<Vec<Proof>>> {
    Ok(Json(
        state.list_cell_proofs(&cell_id, &requester.user_id).await?,
    ))
}

/// Review bodies are optional; an empty body means no comment
fn parse_review_body(body: &[u8]) -> BingoResult<ReviewRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ReviewRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| BingoError::InvalidInput(format!("Invalid review body: {}", e)))
}

async fn approve_proof(
    State(state): ApiState,
    requester: Requester,
    Path(proof_id): Path<ProofId>,
    body: Bytes,
) -> BingoResult<Json<Proof>> {
    let req = parse_review_body(&body)?;
    Ok(Json(
        state
            .review_proof(
                &proof_id,
                &requester.user_id,
                ReviewDecision::Approve,
                req.comment.as_deref(),
            )
            .await?,
    ))
}

async fn decline_proof(
    State(state): ApiState,
    requester: Requester,
    Path(proof_id): Path<ProofId>,
    body: Bytes,
) -> BingoResult<Json<Proof>> {
    // A missing comment is reported by the engine, not rejected here
    let req = parse_review_body(&body)?;
    Ok(Json(
        state
            .review_proof(
                &proof_id,
                &requester.user_id,
                ReviewDecision::Decline,
                req.comment.as_deref(),
            )
            .await?,
    ))
}

// ========== Personal resolutions ==========

async fn create_personal_resolution(
    State(state): ApiState,
    requester: Requester,
    Json(req): Json<ResolutionTextRequest>,
) -> BingoResult<(StatusCode, Json<PersonalResolution>)> {
    let resolution = state
        .create_personal_resolution(&requester.user_id, &req.text)
        .await?;
    Ok((StatusCode::CREATED, Json(resolution)))
}

async fn list_personal_resolutions(
    State(state): ApiState,
    requester: Requester,
) -> Json<Vec<PersonalResolution>> {
    Json(state.list_personal_resolutions(&requester.user_id).await)
}

async fn get_personal_resolution(
    State(state): ApiState,
    requester: Requester,
    Path(id): Path<PersonalResolutionId>,
) -> BingoResult<Json<PersonalResolution>> {
    Ok(Json(
        state
            .get_personal_resolution(&requester.user_id, &id)
            .await?,
    ))
}

async fn update_personal_resolution(
    State(state): ApiState,
    requester: Requester,
    Path(id): Path<PersonalResolutionId>,
    Json(req): Json<ResolutionTextRequest>,
) -> BingoResult<Json<PersonalResolution>> {
    Ok(Json(
        state
            .update_personal_resolution(&requester.user_id, &id, &req.text)
            .await?,
    ))
}

async fn delete_personal_resolution(
    State(state): ApiState,
    requester: Requester,
    Path(id): Path<PersonalResolutionId>,
) -> BingoResult<StatusCode> {
    state
        .delete_personal_resolution(&requester.user_id, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
