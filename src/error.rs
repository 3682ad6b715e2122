// error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum PollError {
    #[error("Store write failed: {0}")]
    StoreWrite(#[source] StoreError),

    #[error("Store read failed: {0}")]
    StoreRead(#[source] StoreError),

    /// The store's uniqueness constraint on `(poll_id, voter_id)` rejected a vote.
    #[error("Already voted")]
    AlreadyVoted,

    #[error("Poll not found")]
    NotFound,

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

impl PollError {
    pub(crate) fn write(e: StoreError) -> Self {
        if e.is_conflict() {
            PollError::AlreadyVoted
        } else {
            PollError::StoreWrite(e)
        }
    }
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        let status = match &self {
            PollError::StoreWrite(_) | PollError::StoreRead(_) => StatusCode::INTERNAL_SERVER_ERROR,
            PollError::AlreadyVoted => StatusCode::CONFLICT,
            PollError::NotFound => StatusCode::NOT_FOUND,
            PollError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
        };

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_on_write_means_already_voted() {
        let e = PollError::write(StoreError::Conflict {
            constraint: "votes_poll_id_voter_id_key".to_string(),
        });
        assert!(matches!(e, PollError::AlreadyVoted));

        let e = PollError::write(StoreError::Unavailable("down".to_string()));
        assert!(matches!(e, PollError::StoreWrite(_)));
    }

    #[test]
    fn status_codes() {
        let cases = [
            (PollError::StoreRead(StoreError::Unavailable("x".into())), StatusCode::INTERNAL_SERVER_ERROR),
            (PollError::AlreadyVoted, StatusCode::CONFLICT),
            (PollError::NotFound, StatusCode::NOT_FOUND),
            (PollError::MalformedPayload("title".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
