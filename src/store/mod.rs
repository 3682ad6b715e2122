//! Data access gateway.
//!
//! Every table read and write the poll service performs goes through [`Store`]. The
//! service never talks to a database directly, so a handle can be swapped for the
//! in-process [`MemStore`] in tests or local runs.

use std::future::Future;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{NewPoll, NewProposal, NewVote, Poll, PollStatus, Proposal, TokenKind};

pub mod memory;
pub mod postgres;

pub use memory::MemStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Unique constraint violated: {constraint}")]
    Conflict { constraint: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Backend(#[from] sqlx::Error),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

pub trait Store: Send + Sync + 'static {
    /// Insert a poll and return the stored row, including store-assigned id and tokens.
    fn insert_poll(&self, poll: NewPoll) -> impl Future<Output = Result<Poll, StoreError>> + Send;

    /// Insert a batch of proposals in a single statement.
    fn insert_proposals(
        &self,
        proposals: &[NewProposal],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Zero or one poll whose `kind` token equals `token`.
    fn find_poll_by_token(
        &self,
        kind: TokenKind,
        token: &str,
    ) -> impl Future<Output = Result<Option<Poll>, StoreError>> + Send;

    /// All proposals of a poll, ascending by `sort_order`.
    fn list_proposals(
        &self,
        poll_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Proposal>, StoreError>> + Send;

    /// Id of the vote cast by `voter_id` on `poll_id`, if any.
    fn find_vote(
        &self,
        poll_id: Uuid,
        voter_id: &str,
    ) -> impl Future<Output = Result<Option<Uuid>, StoreError>> + Send;

    fn insert_vote(&self, vote: NewVote) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remote `increment_voters` procedure: atomic `num_voters += 1`.
    fn increment_voters(&self, poll_id: Uuid) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Current `num_voters` of exactly one poll. `None` when the column is null.
    fn num_voters(
        &self,
        poll_id: Uuid,
    ) -> impl Future<Output = Result<Option<i32>, StoreError>> + Send;

    fn set_num_voters(
        &self,
        poll_id: Uuid,
        num_voters: i32,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn update_status(
        &self,
        poll_id: Uuid,
        status: &PollStatus,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}
