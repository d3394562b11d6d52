use async_trait::async_trait;
use formgate_db::table::IdempotencyKeys;
use formgate_shared::dispatch::SubmissionId;
use sea_query::{Expr, ExprTrait, OnConflict, Query, SqliteQueryBuilder};
use sea_query_sqlx::SqlxBinder;
use sqlx::SqlitePool;

use super::{IdempotencyKey, KeyClaim, KeyStore};

// An expired holder can be evicted between the upsert and the lookup.
const CLAIM_ROUNDS: usize = 3;

#[derive(Clone)]
pub struct SqliteKeyStore {
    pool: SqlitePool,
}

impl SqliteKeyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn try_claim(
        &self,
        key: &IdempotencyKey,
        submission_id: &SubmissionId,
        now: u64,
        expires_at: u64,
    ) -> formgate_shared::Result<bool> {
        let statement = Query::insert()
            .into_table(IdempotencyKeys::Table)
            .columns([
                IdempotencyKeys::Key,
                IdempotencyKeys::SubmissionId,
                IdempotencyKeys::CreatedAt,
                IdempotencyKeys::ExpiresAt,
            ])
            .values_panic([
                key.as_str().into(),
                submission_id.as_str().into(),
                now.into(),
                expires_at.into(),
            ])
            .on_conflict(
                OnConflict::column(IdempotencyKeys::Key)
                    .update_columns([
                        IdempotencyKeys::SubmissionId,
                        IdempotencyKeys::CreatedAt,
                        IdempotencyKeys::ExpiresAt,
                    ])
                    .action_and_where(
                        Expr::col((IdempotencyKeys::Table, IdempotencyKeys::ExpiresAt)).lte(now),
                    )
                    .to_owned(),
            )
            .to_owned();

        let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
        let result = sqlx::query_with(&sql, values).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }

    async fn holder(&self, key: &IdempotencyKey) -> formgate_shared::Result<Option<KeyClaim>> {
        let statement = Query::select()
            .columns([IdempotencyKeys::SubmissionId, IdempotencyKeys::CreatedAt])
            .from(IdempotencyKeys::Table)
            .and_where(Expr::col(IdempotencyKeys::Key).eq(key.as_str()))
            .limit(1)
            .to_owned();

        let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
        let holder = sqlx::query_as_with::<_, (String, u64), _>(&sql, values)
            .fetch_optional(&self.pool)
            .await?;

        Ok(holder.map(|(id, claimed_at)| KeyClaim::Held {
            submission_id: SubmissionId::from(id),
            claimed_at,
        }))
    }
}

#[async_trait]
impl KeyStore for SqliteKeyStore {
    async fn check_and_insert(
        &self,
        key: &IdempotencyKey,
        submission_id: &SubmissionId,
        now: u64,
        expires_at: u64,
    ) -> formgate_shared::Result<KeyClaim> {
        for _ in 0..CLAIM_ROUNDS {
            if self.try_claim(key, submission_id, now, expires_at).await? {
                return Ok(KeyClaim::Claimed);
            }

            if let Some(held) = self.holder(key).await? {
                return Ok(held);
            }
        }

        formgate_shared::bail!("idempotency key {key} could not be claimed");
    }

    async fn take_over(
        &self,
        key: &IdempotencyKey,
        holder: &SubmissionId,
        submission_id: &SubmissionId,
        now: u64,
        expires_at: u64,
    ) -> formgate_shared::Result<bool> {
        let statement = Query::update()
            .table(IdempotencyKeys::Table)
            .value(IdempotencyKeys::SubmissionId, submission_id.as_str())
            .value(IdempotencyKeys::CreatedAt, now)
            .value(IdempotencyKeys::ExpiresAt, expires_at)
            .and_where(Expr::col(IdempotencyKeys::Key).eq(key.as_str()))
            .and_where(Expr::col(IdempotencyKeys::SubmissionId).eq(holder.as_str()))
            .to_owned();

        let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
        let result = sqlx::query_with(&sql, values).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }

    async fn release(
        &self,
        key: &IdempotencyKey,
        submission_id: &SubmissionId,
    ) -> formgate_shared::Result<()> {
        let statement = Query::delete()
            .from_table(IdempotencyKeys::Table)
            .and_where(Expr::col(IdempotencyKeys::Key).eq(key.as_str()))
            .and_where(Expr::col(IdempotencyKeys::SubmissionId).eq(submission_id.as_str()))
            .to_owned();

        let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&self.pool).await?;

        Ok(())
    }

    async fn evict_expired(&self, now: u64) -> formgate_shared::Result<u64> {
        let statement = Query::delete()
            .from_table(IdempotencyKeys::Table)
            .and_where(Expr::col(IdempotencyKeys::ExpiresAt).lte(now))
            .to_owned();

        let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
        let result = sqlx::query_with(&sql, values).execute(&self.pool).await?;

        Ok(result.rows_affected())
    }
}
