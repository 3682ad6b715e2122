// handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::PollError;
use crate::models::{
    CastVoteRequest, CreatePollRequest, HasVotedResponse, Poll, PollWithProposals,
    UpdateStatusRequest, VoterIdResponse,
};
use crate::poll::generate_voter_id;
use crate::state::AppState;

/// Create a poll and its proposals
pub async fn create_poll(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePollRequest>,
) -> Result<(StatusCode, Json<Poll>), PollError> {
    if req.title.trim().is_empty() {
        return Err(PollError::MalformedPayload("title must not be empty".to_string()));
    }

    let poll = state
        .polls
        .create_poll(&req.title, &req.proposals, &req.admin_email)
        .await?;

    Ok((StatusCode::CREATED, Json(poll)))
}

/// Poll as seen by voters
pub async fn get_poll_for_voter(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<PollWithProposals>, PollError> {
    get_poll(&state, &token, false).await
}

/// Poll as seen by its admin
pub async fn get_poll_for_admin(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Json<PollWithProposals>, PollError> {
    get_poll(&state, &token, true).await
}

async fn get_poll(state: &AppState, token: &str, is_admin: bool) -> Result<Json<PollWithProposals>, PollError> {
    state
        .polls
        .get_poll_by_token(token, is_admin)
        .await?
        .map(Json)
        .ok_or(PollError::NotFound)
}

pub async fn has_voted(
    State(state): State<Arc<AppState>>,
    Path((poll_id, voter_id)): Path<(Uuid, String)>,
) -> Result<Json<HasVotedResponse>, PollError> {
    let has_voted = state.polls.has_voted(poll_id, &voter_id).await?;
    Ok(Json(HasVotedResponse { has_voted }))
}

/// Vote on a poll
pub async fn cast_vote(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<Uuid>,
    Json(req): Json<CastVoteRequest>,
) -> Result<StatusCode, PollError> {
    state
        .polls
        .cast_vote(poll_id, &req.voter_id, req.vote_order)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(poll_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<StatusCode, PollError> {
    state.polls.update_poll_status(poll_id, &req.status).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn new_voter_id() -> Json<VoterIdResponse> {
    Json(VoterIdResponse {
        voter_id: generate_voter_id(),
    })
}
