use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::config::{Config, StoreBackend};
use crate::db::create_pool;
use crate::models::{NewPoll, NewProposal, NewVote, Poll, PollStatus, Proposal, TokenKind};
use crate::poll::PollService;
use crate::store::{MemStore, PgStore, Store, StoreError};

/// The store picked at startup by `POLL_STORE`.
#[derive(Debug, Clone)]
pub enum AnyStore {
    Postgres(PgStore),
    Memory(MemStore),
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            AnyStore::Postgres($store) => $call.await,
            AnyStore::Memory($store) => $call.await,
        }
    };
}

impl Store for AnyStore {
    async fn insert_poll(&self, poll: NewPoll) -> Result<Poll, StoreError> {
        dispatch!(self, s => s.insert_poll(poll))
    }

    async fn insert_proposals(&self, proposals: &[NewProposal]) -> Result<(), StoreError> {
        dispatch!(self, s => s.insert_proposals(proposals))
    }

    async fn find_poll_by_token(&self, kind: TokenKind, token: &str) -> Result<Option<Poll>, StoreError> {
        dispatch!(self, s => s.find_poll_by_token(kind, token))
    }

    async fn list_proposals(&self, poll_id: Uuid) -> Result<Vec<Proposal>, StoreError> {
        dispatch!(self, s => s.list_proposals(poll_id))
    }

    async fn find_vote(&self, poll_id: Uuid, voter_id: &str) -> Result<Option<Uuid>, StoreError> {
        dispatch!(self, s => s.find_vote(poll_id, voter_id))
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<(), StoreError> {
        dispatch!(self, s => s.insert_vote(vote))
    }

    async fn increment_voters(&self, poll_id: Uuid) -> Result<(), StoreError> {
        dispatch!(self, s => s.increment_voters(poll_id))
    }

    async fn num_voters(&self, poll_id: Uuid) -> Result<Option<i32>, StoreError> {
        dispatch!(self, s => s.num_voters(poll_id))
    }

    async fn set_num_voters(&self, poll_id: Uuid, num_voters: i32) -> Result<(), StoreError> {
        dispatch!(self, s => s.set_num_voters(poll_id, num_voters))
    }

    async fn update_status(&self, poll_id: Uuid, status: &PollStatus) -> Result<(), StoreError> {
        dispatch!(self, s => s.update_status(poll_id, status))
    }
}

pub struct AppState {
    pub config: Config,
    pub polls: PollService<AnyStore>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Arc<Self>, sqlx::Error> {
        let store = match &config.backend {
            StoreBackend::Postgres {
                database_url,
                max_connections,
            } => AnyStore::Postgres(PgStore::new(create_pool(database_url, *max_connections).await?)),
            StoreBackend::Memory => {
                info!("Using in-memory store, data is lost on shutdown");
                AnyStore::Memory(MemStore::new())
            }
        };

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: AnyStore) -> Arc<Self> {
        let polls = PollService::new(store).with_counter_policy(config.counter_policy);
        Arc::new(Self { config, polls })
    }
}
