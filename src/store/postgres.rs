// store/postgres.rs
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::models::{NewPoll, NewProposal, NewVote, Poll, PollStatus, Proposal, TokenKind};

/// [`Store`] over the hosted Postgres database.
///
/// Tables `polls`, `proposals` and `votes` plus the `increment_voters(poll_id)`
/// function are managed outside this crate. Token columns are filled by column
/// defaults on insert.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn write_error(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Conflict {
                constraint: db.constraint().unwrap_or("unique").to_string(),
            };
        }
    }
    StoreError::Backend(e)
}

impl Store for PgStore {
    async fn insert_poll(&self, poll: NewPoll) -> Result<Poll, StoreError> {
        sqlx::query_as::<_, Poll>(
            "INSERT INTO polls (title, status, admin_email, num_voters)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(&poll.title)
        .bind(poll.status.as_str())
        .bind(&poll.admin_email)
        .bind(poll.num_voters)
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)
    }

    async fn insert_proposals(&self, proposals: &[NewProposal]) -> Result<(), StoreError> {
        if proposals.is_empty() {
            return Ok(());
        }

        let mut builder =
            QueryBuilder::<Postgres>::new("INSERT INTO proposals (poll_id, title, sort_order) ");
        builder.push_values(proposals, |mut row, p| {
            row.push_bind(p.poll_id)
                .push_bind(p.title.clone())
                .push_bind(p.sort_order);
        });

        let result = builder.build().execute(&self.pool).await.map_err(write_error)?;
        debug!(rows = result.rows_affected(), "Inserted proposals");
        Ok(())
    }

    async fn find_poll_by_token(&self, kind: TokenKind, token: &str) -> Result<Option<Poll>, StoreError> {
        let sql = format!("SELECT * FROM polls WHERE {} = $1", kind.column());
        let poll = sqlx::query_as::<_, Poll>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(poll)
    }

    async fn list_proposals(&self, poll_id: Uuid) -> Result<Vec<Proposal>, StoreError> {
        let proposals = sqlx::query_as::<_, Proposal>(
            "SELECT id, poll_id, title, sort_order FROM proposals
             WHERE poll_id = $1
             ORDER BY sort_order",
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(proposals)
    }

    async fn find_vote(&self, poll_id: Uuid, voter_id: &str) -> Result<Option<Uuid>, StoreError> {
        let id = sqlx::query_scalar::<_, Uuid>("SELECT id FROM votes WHERE poll_id = $1 AND voter_id = $2")
            .bind(poll_id)
            .bind(voter_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(id)
    }

    async fn insert_vote(&self, vote: NewVote) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO votes (poll_id, voter_id, vote_order) VALUES ($1, $2, $3)")
            .bind(vote.poll_id)
            .bind(&vote.voter_id)
            .bind(&vote.vote_order)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn increment_voters(&self, poll_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("SELECT increment_voters(poll_id => $1)")
            .bind(poll_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn num_voters(&self, poll_id: Uuid) -> Result<Option<i32>, StoreError> {
        let n = sqlx::query_scalar::<_, Option<i32>>("SELECT num_voters FROM polls WHERE id = $1")
            .bind(poll_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn set_num_voters(&self, poll_id: Uuid, num_voters: i32) -> Result<(), StoreError> {
        sqlx::query("UPDATE polls SET num_voters = $1 WHERE id = $2")
            .bind(num_voters)
            .bind(poll_id)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }

    async fn update_status(&self, poll_id: Uuid, status: &PollStatus) -> Result<(), StoreError> {
        sqlx::query("UPDATE polls SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(poll_id)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;
        Ok(())
    }
}
