//! In-process [`Store`] used by tests and by `POLL_STORE=memory` runs.
//!
//! Tables live behind a tokio `RwLock`. Faults can be injected per operation, and
//! `interleave` makes every call yield to the scheduler first so concurrent
//! callers run step by step in lockstep.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::{NewPoll, NewProposal, NewVote, Poll, PollStatus, Proposal, TokenKind, Vote};

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Operation {
    InsertPoll,
    InsertProposals,
    FindPollByToken,
    ListProposals,
    FindVote,
    InsertVote,
    IncrementVoters,
    ReadNumVoters,
    SetNumVoters,
    UpdateStatus,
}

#[derive(Debug, Default)]
struct Tables {
    polls: BTreeMap<Uuid, Poll>,
    proposals: Vec<Proposal>,
    votes: Vec<Vote>,
}

#[derive(Debug, Clone, Default)]
pub struct MemStore {
    tables: Arc<RwLock<Tables>>,
    /// `None` fails forever, `Some(n)` fails the next `n` calls.
    failing: Arc<StdRwLock<BTreeMap<Operation, Option<u32>>>>,
    interleave: Arc<AtomicBool>,
    unique_votes: bool,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject a second vote for the same `(poll_id, voter_id)` with a conflict.
    pub fn with_unique_votes(mut self) -> Self {
        self.unique_votes = true;
        self
    }

    /// Make `op` fail with [`StoreError::Unavailable`] until cleared.
    pub fn fail(&self, op: Operation) {
        self.failing.write().unwrap_or_else(PoisonError::into_inner).insert(op, None);
    }

    /// Make the next `times` calls of `op` fail.
    pub fn fail_times(&self, op: Operation, times: u32) {
        self.failing.write().unwrap_or_else(PoisonError::into_inner).insert(op, Some(times));
    }

    pub fn recover(&self, op: Operation) {
        self.failing.write().unwrap_or_else(PoisonError::into_inner).remove(&op);
    }

    pub fn set_interleave(&self, on: bool) {
        self.interleave.store(on, Ordering::Relaxed);
    }

    pub async fn poll(&self, poll_id: Uuid) -> Option<Poll> {
        self.tables.read().await.polls.get(&poll_id).cloned()
    }

    pub async fn polls(&self) -> Vec<Poll> {
        self.tables.read().await.polls.values().cloned().collect()
    }

    /// Proposals of a poll in insertion order.
    pub async fn raw_proposals(&self, poll_id: Uuid) -> Vec<Proposal> {
        let tables = self.tables.read().await;
        tables.proposals.iter().filter(|p| p.poll_id == poll_id).cloned().collect()
    }

    pub async fn votes(&self, poll_id: Uuid) -> Vec<Vote> {
        let tables = self.tables.read().await;
        tables.votes.iter().filter(|v| v.poll_id == poll_id).cloned().collect()
    }

    async fn enter(&self, op: Operation) -> Result<(), StoreError> {
        if self.interleave.load(Ordering::Relaxed) {
            tokio::task::yield_now().await;
        }

        let failing = {
            let mut failing = self.failing.write().unwrap_or_else(PoisonError::into_inner);
            match failing.get_mut(&op) {
                None => false,
                Some(None) => true,
                Some(Some(0)) => {
                    failing.remove(&op);
                    false
                }
                Some(Some(left)) => {
                    *left -= 1;
                    true
                }
            }
        };
        if failing {
            return Err(StoreError::Unavailable(format!("{op:?} is failing")));
        }
        Ok(())
    }
}

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

impl Store for MemStore {
    async fn insert_poll(&self, poll: NewPoll) -> Result<Poll, StoreError> {
        self.enter(Operation::InsertPoll).await?;

        let row = Poll {
            id: Uuid::new_v4(),
            title: poll.title,
            status: poll.status,
            admin_email: poll.admin_email,
            admin_token: new_token(),
            vote_token: new_token(),
            num_voters: poll.num_voters,
            created_at: Utc::now(),
        };
        self.tables.write().await.polls.insert(row.id, row.clone());
        Ok(row)
    }

    async fn insert_proposals(&self, proposals: &[NewProposal]) -> Result<(), StoreError> {
        self.enter(Operation::InsertProposals).await?;

        let mut tables = self.tables.write().await;
        tables.proposals.extend(proposals.iter().map(|p| Proposal {
            id: Uuid::new_v4(),
            poll_id: p.poll_id,
            title: p.title.clone(),
            sort_order: p.sort_order,
        }));
        Ok(())
    }

    async fn find_poll_by_token(&self, kind: TokenKind, token: &str) -> Result<Option<Poll>, StoreError> {
        self.enter(Operation::FindPollByToken).await?;

        let tables = self.tables.read().await;
        let found = tables.polls.values().find(|p| match kind {
            TokenKind::Admin => p.admin_token == token,
            TokenKind::Vote => p.vote_token == token,
        });
        Ok(found.cloned())
    }

    async fn list_proposals(&self, poll_id: Uuid) -> Result<Vec<Proposal>, StoreError> {
        self.enter(Operation::ListProposals).await?;

        let mut proposals = self.raw_proposals(poll_id).await;
        proposals.sort_by_key(|p| p.sort_order);
        Ok(proposals)
    }

    async fn find_vote(&self, poll_id: Uuid, voter_id: &str) -> Result<Option<Uuid>, StoreError> {
        self.enter(Operation::FindVote).await?;

        let tables = self.tables.read().await;
        let found = tables.votes.iter().find(|v| v.poll_id == poll_id && v.voter_id == voter_id);
        Ok(found.map(|v| v.id))
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<(), StoreError> {
        self.enter(Operation::InsertVote).await?;

        let mut tables = self.tables.write().await;
        if self.unique_votes
            && tables.votes.iter().any(|v| v.poll_id == vote.poll_id && v.voter_id == vote.voter_id)
        {
            return Err(StoreError::Conflict {
                constraint: "votes_poll_id_voter_id_key".to_string(),
            });
        }

        tables.votes.push(Vote {
            id: Uuid::new_v4(),
            poll_id: vote.poll_id,
            voter_id: vote.voter_id,
            vote_order: vote.vote_order,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn increment_voters(&self, poll_id: Uuid) -> Result<(), StoreError> {
        self.enter(Operation::IncrementVoters).await?;

        if let Some(poll) = self.tables.write().await.polls.get_mut(&poll_id) {
            poll.num_voters += 1;
        }
        Ok(())
    }

    async fn num_voters(&self, poll_id: Uuid) -> Result<Option<i32>, StoreError> {
        self.enter(Operation::ReadNumVoters).await?;

        let tables = self.tables.read().await;
        match tables.polls.get(&poll_id) {
            Some(poll) => Ok(Some(poll.num_voters)),
            None => Err(StoreError::Backend(sqlx::Error::RowNotFound)),
        }
    }

    async fn set_num_voters(&self, poll_id: Uuid, num_voters: i32) -> Result<(), StoreError> {
        self.enter(Operation::SetNumVoters).await?;

        if let Some(poll) = self.tables.write().await.polls.get_mut(&poll_id) {
            poll.num_voters = num_voters;
        }
        Ok(())
    }

    async fn update_status(&self, poll_id: Uuid, status: &PollStatus) -> Result<(), StoreError> {
        self.enter(Operation::UpdateStatus).await?;

        if let Some(poll) = self.tables.write().await.polls.get_mut(&poll_id) {
            poll.status = status.clone();
        }
        Ok(())
    }
}
