use async_trait::async_trait;
use formgate_db::table::DispatchRecords;
use formgate_shared::dispatch::{DispatchRecord, DispatchStatus, SubmissionId, TargetState};
use formgate_shared::form::{FormSubmission, FormType};
use sea_query::{Expr, ExprTrait, Order, Query, SelectStatement, SqliteQueryBuilder};
use sea_query_sqlx::SqlxBinder;
use sqlx::SqlitePool;
use sqlx::prelude::FromRow;
use sqlx::types::{Json, Text};

use super::DispatchLog;

#[derive(Debug, FromRow)]
struct DispatchRow {
    submission_id: String,
    form_type: Text<FormType>,
    status: Text<DispatchStatus>,
    attempts: u32,
    last_error: Option<String>,
    notification_status: Text<DispatchStatus>,
    notification_attempts: u32,
    notification_error: Option<String>,
    storage_status: Text<DispatchStatus>,
    storage_attempts: u32,
    storage_error: Option<String>,
    payload: Json<FormSubmission>,
    created_at: u64,
    updated_at: u64,
}

impl From<DispatchRow> for DispatchRecord {
    fn from(row: DispatchRow) -> Self {
        Self {
            submission_id: SubmissionId::from(row.submission_id),
            form_type: row.form_type.0,
            status: row.status.0,
            attempts: row.attempts,
            last_error: row.last_error,
            notification: TargetState {
                status: row.notification_status.0,
                attempts: row.notification_attempts,
                last_error: row.notification_error,
            },
            storage: TargetState {
                status: row.storage_status.0,
                attempts: row.storage_attempts,
                last_error: row.storage_error,
            },
            payload: row.payload.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const COLUMNS: [DispatchRecords; 14] = [
    DispatchRecords::SubmissionId,
    DispatchRecords::FormType,
    DispatchRecords::Status,
    DispatchRecords::Attempts,
    DispatchRecords::LastError,
    DispatchRecords::NotificationStatus,
    DispatchRecords::NotificationAttempts,
    DispatchRecords::NotificationError,
    DispatchRecords::StorageStatus,
    DispatchRecords::StorageAttempts,
    DispatchRecords::StorageError,
    DispatchRecords::Payload,
    DispatchRecords::CreatedAt,
    DispatchRecords::UpdatedAt,
];

/// Progress columns rewritten on every attempt.
fn progress_values(record: &DispatchRecord) -> [(DispatchRecords, Expr); 9] {
    [
        (DispatchRecords::Status, record.status.to_string().into()),
        (DispatchRecords::Attempts, record.attempts.into()),
        (DispatchRecords::LastError, record.last_error.clone().into()),
        (
            DispatchRecords::NotificationStatus,
            record.notification.status.to_string().into(),
        ),
        (
            DispatchRecords::NotificationAttempts,
            record.notification.attempts.into(),
        ),
        (
            DispatchRecords::NotificationError,
            record.notification.last_error.clone().into(),
        ),
        (
            DispatchRecords::StorageStatus,
            record.storage.status.to_string().into(),
        ),
        (DispatchRecords::StorageAttempts, record.storage.attempts.into()),
        (
            DispatchRecords::StorageError,
            record.storage.last_error.clone().into(),
        ),
    ]
}

#[derive(Clone)]
pub struct SqliteDispatchLog {
    pool: SqlitePool,
}

impl SqliteDispatchLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn select() -> SelectStatement {
        Query::select()
            .columns(COLUMNS)
            .from(DispatchRecords::Table)
            .to_owned()
    }
}

#[async_trait]
impl DispatchLog for SqliteDispatchLog {
    async fn insert(&self, record: &DispatchRecord) -> formgate_shared::Result<()> {
        let payload = serde_json::to_string(&record.payload)?;
        let statement = Query::insert()
            .into_table(DispatchRecords::Table)
            .columns(COLUMNS)
            .values_panic([
                record.submission_id.as_str().into(),
                record.form_type.to_string().into(),
                record.status.to_string().into(),
                record.attempts.into(),
                record.last_error.clone().into(),
                record.notification.status.to_string().into(),
                record.notification.attempts.into(),
                record.notification.last_error.clone().into(),
                record.storage.status.to_string().into(),
                record.storage.attempts.into(),
                record.storage.last_error.clone().into(),
                payload.into(),
                record.created_at.into(),
                record.updated_at.into(),
            ])
            .to_owned();

        let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&self.pool).await?;

        Ok(())
    }

    async fn get(&self, id: &SubmissionId) -> formgate_shared::Result<Option<DispatchRecord>> {
        let statement = Self::select()
            .and_where(Expr::col(DispatchRecords::SubmissionId).eq(id.as_str()))
            .limit(1)
            .to_owned();

        let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
        let row = sqlx::query_as_with::<_, DispatchRow, _>(&sql, values)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    async fn update(&self, record: &DispatchRecord) -> formgate_shared::Result<()> {
        let statement = Query::update()
            .table(DispatchRecords::Table)
            .values(progress_values(record))
            .value(DispatchRecords::UpdatedAt, record.updated_at)
            .and_where(Expr::col(DispatchRecords::SubmissionId).eq(record.submission_id.as_str()))
            .to_owned();

        let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
        let result = sqlx::query_with(&sql, values).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            formgate_shared::bail!("dispatch record {} not found", record.submission_id);
        }

        Ok(())
    }

    async fn pending(&self) -> formgate_shared::Result<Vec<DispatchRecord>> {
        let statement = Self::select()
            .and_where(Expr::col(DispatchRecords::Status).eq(DispatchStatus::Pending.to_string()))
            .order_by(DispatchRecords::SubmissionId, Order::Asc)
            .to_owned();

        let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
        let rows = sqlx::query_as_with::<_, DispatchRow, _>(&sql, values)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
