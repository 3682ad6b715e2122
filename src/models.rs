// models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle state of a poll.
///
/// The full set of states is owned by the database schema. Only `VOTING` and
/// `CLOSED` are known here; anything else round-trips untouched as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PollStatus {
    Voting,
    Closed,
    Other(String),
}

impl PollStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PollStatus::Voting => "VOTING",
            PollStatus::Closed => "CLOSED",
            PollStatus::Other(s) => s,
        }
    }
}

impl From<String> for PollStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "VOTING" => PollStatus::Voting,
            "CLOSED" => PollStatus::Closed,
            _ => PollStatus::Other(s),
        }
    }
}

impl From<&str> for PollStatus {
    fn from(s: &str) -> Self {
        PollStatus::from(s.to_string())
    }
}

impl From<PollStatus> for String {
    fn from(status: PollStatus) -> Self {
        match status {
            PollStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the two poll secrets a lookup matches against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Admin,
    Vote,
}

impl TokenKind {
    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin {
            TokenKind::Admin
        } else {
            TokenKind::Vote
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            TokenKind::Admin => "admin_token",
            TokenKind::Vote => "vote_token",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Poll {
    pub id: Uuid,
    pub title: String,
    #[sqlx(try_from = "String")]
    pub status: PollStatus,
    pub admin_email: String,
    pub admin_token: String,
    pub vote_token: String,
    pub num_voters: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Proposal {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub title: String,
    pub sort_order: i32,
}

/// The part of a proposal exposed alongside a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalSummary {
    pub id: Uuid,
    pub title: String,
}

impl From<Proposal> for ProposalSummary {
    fn from(p: Proposal) -> Self {
        Self {
            id: p.id,
            title: p.title,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollWithProposals {
    #[serde(flatten)]
    pub poll: Poll,
    pub proposals: Vec<ProposalSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vote {
    pub id: Uuid,
    pub poll_id: Uuid,
    pub voter_id: String,
    pub vote_order: Value,
    pub created_at: DateTime<Utc>,
}

/// Row written by `create_poll`. Id, tokens and timestamps come from the store.
#[derive(Debug, Clone)]
pub struct NewPoll {
    pub title: String,
    pub status: PollStatus,
    pub admin_email: String,
    pub num_voters: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProposal {
    pub poll_id: Uuid,
    pub title: String,
    pub sort_order: i32,
}

#[derive(Debug, Clone)]
pub struct NewVote {
    pub poll_id: Uuid,
    pub voter_id: String,
    pub vote_order: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProposalInput {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    pub title: String,
    #[serde(default)]
    pub proposals: Vec<ProposalInput>,
    pub admin_email: String,
}

#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub voter_id: String,
    pub vote_order: Value,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: PollStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HasVotedResponse {
    pub has_voted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VoterIdResponse {
    pub voter_id: String,
}
