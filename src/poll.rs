// src/poll.rs
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::PollError;
use crate::models::{
    NewPoll, NewProposal, NewVote, Poll, PollStatus, PollWithProposals, ProposalInput, TokenKind,
};
use crate::store::{Store, StoreError};

const VOTER_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const VOTER_ID_SUFFIX_LEN: usize = 11;

/// What `cast_vote` does when the remote `increment_voters` procedure fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CounterPolicy {
    /// Read `num_voters` and write it back plus one.
    ///
    /// Two voters falling back at the same time can both read the same count, so
    /// one increment is lost. Failures of the fallback itself are only logged.
    #[default]
    ReadModifyWrite,

    /// Call the atomic procedure again, sleeping `backoff * attempt` before each
    /// retry. When every retry fails the increment is dropped and logged.
    Retry { attempts: u32, backoff: Duration },
}

/// Poll and voting operations over a [`Store`].
///
/// Each operation is a sequence of store calls, one after another. Nothing is
/// wrapped in a transaction and nothing here serializes concurrent callers.
#[derive(Debug, Clone)]
pub struct PollService<S> {
    store: S,
    counter: CounterPolicy,
}

impl<S: Store> PollService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            counter: CounterPolicy::default(),
        }
    }

    pub fn with_counter_policy(mut self, counter: CounterPolicy) -> Self {
        self.counter = counter;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a poll in `VOTING` state with no voters, then its proposals in order.
    ///
    /// The two writes are independent: if the proposals fail, the poll row stays.
    #[instrument(skip(self, proposals, admin_email), fields(proposals = proposals.len()))]
    pub async fn create_poll(
        &self,
        title: &str,
        proposals: &[ProposalInput],
        admin_email: &str,
    ) -> Result<Poll, PollError> {
        let poll = self
            .store
            .insert_poll(NewPoll {
                title: title.to_string(),
                status: PollStatus::Voting,
                admin_email: admin_email.to_string(),
                num_voters: 0,
            })
            .await
            .map_err(PollError::StoreWrite)?;

        if !proposals.is_empty() {
            let rows: Vec<NewProposal> = proposals
                .iter()
                .enumerate()
                .map(|(index, p)| NewProposal {
                    poll_id: poll.id,
                    title: p.title.clone(),
                    sort_order: index as i32,
                })
                .collect();

            self.store.insert_proposals(&rows).await.map_err(|e| {
                error!(poll_id = %poll.id, error = %e, "Proposals insert failed, poll left without proposals");
                PollError::StoreWrite(e)
            })?;
        }

        info!(poll_id = %poll.id, "Poll created");
        Ok(poll)
    }

    /// Resolve a poll by its admin or voter token.
    ///
    /// `Ok(None)` means no poll carries that token.
    #[instrument(skip(self, token))]
    pub async fn get_poll_by_token(
        &self,
        token: &str,
        is_admin: bool,
    ) -> Result<Option<PollWithProposals>, PollError> {
        let kind = TokenKind::from_admin_flag(is_admin);
        let poll = match self
            .store
            .find_poll_by_token(kind, token)
            .await
            .map_err(PollError::StoreRead)?
        {
            Some(poll) => poll,
            None => {
                debug!("No poll for token");
                return Ok(None);
            }
        };

        let proposals = self
            .store
            .list_proposals(poll.id)
            .await
            .map_err(PollError::StoreRead)?;

        Ok(Some(PollWithProposals {
            poll,
            proposals: proposals.into_iter().map(Into::into).collect(),
        }))
    }

    /// Whether `voter_id` already has a vote on the poll.
    ///
    /// Checking this before `cast_vote` does not stop a concurrent duplicate; only
    /// a uniqueness constraint in the store does.
    #[instrument(skip(self))]
    pub async fn has_voted(&self, poll_id: Uuid, voter_id: &str) -> Result<bool, PollError> {
        let vote = self
            .store
            .find_vote(poll_id, voter_id)
            .await
            .map_err(PollError::StoreRead)?;
        Ok(vote.is_some())
    }

    /// Record a vote and bump the poll's voter counter.
    ///
    /// The vote is inserted without any duplicate check. Once it is stored, the
    /// call succeeds even if the counter could not be incremented.
    #[instrument(skip(self, vote_order))]
    pub async fn cast_vote(
        &self,
        poll_id: Uuid,
        voter_id: &str,
        vote_order: Value,
    ) -> Result<(), PollError> {
        self.store
            .insert_vote(NewVote {
                poll_id,
                voter_id: voter_id.to_string(),
                vote_order,
            })
            .await
            .map_err(PollError::write)?;

        if let Err(e) = self.store.increment_voters(poll_id).await {
            self.recover_counter(poll_id, e).await;
        }

        info!("Vote recorded");
        Ok(())
    }

    async fn recover_counter(&self, poll_id: Uuid, cause: StoreError) {
        match self.counter {
            CounterPolicy::ReadModifyWrite => {
                warn!(error = %cause, "increment_voters failed, falling back to read-modify-write");

                let current = match self.store.num_voters(poll_id).await {
                    Ok(n) => n.unwrap_or(0),
                    Err(e) => {
                        warn!(error = %e, "Reading num_voters failed, assuming 0");
                        0
                    }
                };

                if let Err(e) = self.store.set_num_voters(poll_id, current.saturating_add(1)).await {
                    warn!(error = %e, "Fallback num_voters update failed, counter not incremented");
                }
            }
            CounterPolicy::Retry { attempts, backoff } => {
                let mut last = cause;
                for attempt in 1..=attempts {
                    tokio::time::sleep(backoff * attempt).await;
                    match self.store.increment_voters(poll_id).await {
                        Ok(()) => {
                            debug!(attempt, "increment_voters succeeded on retry");
                            return;
                        }
                        Err(e) => {
                            warn!(attempt, error = %e, "increment_voters retry failed");
                            last = e;
                        }
                    }
                }
                error!(attempts, error = %last, "increment_voters gave up, counter not incremented");
            }
        }
    }

    /// Set the poll's status. The value is written as given.
    #[instrument(skip(self))]
    pub async fn update_poll_status(&self, poll_id: Uuid, status: &PollStatus) -> Result<(), PollError> {
        self.store
            .update_status(poll_id, status)
            .await
            .map_err(PollError::StoreWrite)?;
        info!("Poll status updated");
        Ok(())
    }
}

/// A client-side voter id: `voter_<unix millis>_<random base-36 suffix>`.
///
/// Unique in practice but not guaranteed: two calls in the same millisecond can
/// collide if their suffixes do. The suffix comes from a non-cryptographic RNG.
pub fn generate_voter_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..VOTER_ID_SUFFIX_LEN)
        .map(|_| VOTER_ID_ALPHABET[rng.gen_range(0..VOTER_ID_ALPHABET.len())] as char)
        .collect();

    format!("voter_{}_{}", Utc::now().timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::memory::Operation;
    use crate::store::MemStore;

    fn proposals(titles: &[&str]) -> Vec<ProposalInput> {
        titles.iter().map(|t| ProposalInput { title: t.to_string() }).collect()
    }

    #[tokio::test]
    async fn create_poll_without_proposals_skips_proposal_write() {
        let store = MemStore::new();
        store.fail(Operation::InsertProposals);
        let service = PollService::new(store.clone());

        let poll = service.create_poll("Empty", &[], "admin@example.com").await.unwrap();

        assert!(store.raw_proposals(poll.id).await.is_empty());
    }

    #[tokio::test]
    async fn create_poll_forces_initial_state() {
        let service = PollService::new(MemStore::new());

        let poll = service
            .create_poll("Lunch", &proposals(&["Pizza"]), "admin@example.com")
            .await
            .unwrap();

        assert_eq!(poll.status, PollStatus::Voting);
        assert_eq!(poll.num_voters, 0);
        assert_eq!(poll.admin_email, "admin@example.com");
    }

    #[tokio::test]
    async fn vote_conflict_leaves_counter_alone() {
        let store = MemStore::new().with_unique_votes();
        let service = PollService::new(store.clone());
        let poll = service.create_poll("Lunch", &[], "a@example.com").await.unwrap();

        service.cast_vote(poll.id, "voter_1", json!([])).await.unwrap();
        let err = service.cast_vote(poll.id, "voter_1", json!([])).await.unwrap_err();

        assert!(matches!(err, PollError::AlreadyVoted));
        assert_eq!(store.poll(poll.id).await.unwrap().num_voters, 1);
    }

    #[tokio::test]
    async fn retry_policy_recovers_from_transient_failure() {
        let store = MemStore::new();
        let service = PollService::new(store.clone()).with_counter_policy(CounterPolicy::Retry {
            attempts: 3,
            backoff: Duration::from_millis(1),
        });
        let poll = service.create_poll("Lunch", &[], "a@example.com").await.unwrap();

        store.fail_times(Operation::IncrementVoters, 2);
        store.fail(Operation::SetNumVoters);
        service.cast_vote(poll.id, "voter_1", json!([])).await.unwrap();

        assert_eq!(store.poll(poll.id).await.unwrap().num_voters, 1);
    }

    #[tokio::test]
    async fn retry_policy_gives_up_without_read_modify_write() {
        let store = MemStore::new();
        let service = PollService::new(store.clone()).with_counter_policy(CounterPolicy::Retry {
            attempts: 2,
            backoff: Duration::from_millis(1),
        });
        let poll = service.create_poll("Lunch", &[], "a@example.com").await.unwrap();

        store.fail(Operation::IncrementVoters);
        store.fail(Operation::ReadNumVoters);
        service.cast_vote(poll.id, "voter_1", json!([])).await.unwrap();

        assert_eq!(store.votes(poll.id).await.len(), 1);
        assert_eq!(store.poll(poll.id).await.unwrap().num_voters, 0);
    }

    #[test]
    fn voter_id_shape() {
        let id = generate_voter_id();
        let parts: Vec<&str> = id.splitn(3, '_').collect();

        assert_eq!(parts[0], "voter");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), VOTER_ID_SUFFIX_LEN);
        assert!(parts[2].bytes().all(|b| VOTER_ID_ALPHABET.contains(&b)));
    }
}
