use std::sync::Arc;

use async_trait::async_trait;
use formgate_db::table::{ContactSubmissions, QuoteSubmissions};
use formgate_shared::dispatch::{DeliveryError, RecordId, SubmissionId};
use formgate_shared::form::{ContactRequest, FormSubmission, QuoteRequest};
use sea_query::{OnConflict, Query, SqliteQueryBuilder};
use sea_query_sqlx::SqlxBinder;
use sqlx::SqlitePool;

use crate::{Clock, RecordStore};

// SQLITE_BUSY and SQLITE_LOCKED clear up on their own.
const RETRYABLE_CODES: [&str; 2] = ["5", "6"];

/// Keeps one row per submission in `contact_submissions` or
/// `quote_submissions`. Redelivery of the same submission is a no-op.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    async fn persist_contact(
        &self,
        submission_id: &SubmissionId,
        contact: &ContactRequest,
    ) -> Result<RecordId, sqlx::Error> {
        let statement = Query::insert()
            .into_table(ContactSubmissions::Table)
            .columns([
                ContactSubmissions::Id,
                ContactSubmissions::Name,
                ContactSubmissions::Email,
                ContactSubmissions::Phone,
                ContactSubmissions::Subject,
                ContactSubmissions::Message,
                ContactSubmissions::CreatedAt,
            ])
            .values_panic([
                submission_id.as_str().into(),
                contact.name.to_owned().into(),
                contact.email.to_owned().into(),
                contact.phone.to_owned().into(),
                contact.subject.to_owned().into(),
                contact.message.to_owned().into(),
                self.clock.now().into(),
            ])
            .on_conflict(
                OnConflict::column(ContactSubmissions::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .to_owned();

        let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&self.pool).await?;

        Ok(submission_id.to_string())
    }

    async fn persist_quote(
        &self,
        submission_id: &SubmissionId,
        quote: &QuoteRequest,
    ) -> Result<RecordId, sqlx::Error> {
        let fields = serde_json::to_string(&quote.fields)
            .map_err(|err| sqlx::Error::Encode(Box::new(err)))?;

        let statement = Query::insert()
            .into_table(QuoteSubmissions::Table)
            .columns([
                QuoteSubmissions::Id,
                QuoteSubmissions::EquipmentType,
                QuoteSubmissions::Name,
                QuoteSubmissions::Email,
                QuoteSubmissions::Fields,
                QuoteSubmissions::CreatedAt,
            ])
            .values_panic([
                submission_id.as_str().into(),
                quote.text("equipmentType").map(ToOwned::to_owned).into(),
                quote.text("name").map(ToOwned::to_owned).into(),
                quote.text("email").map(ToOwned::to_owned).into(),
                fields.into(),
                self.clock.now().into(),
            ])
            .on_conflict(
                OnConflict::column(QuoteSubmissions::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .to_owned();

        let (sql, values) = statement.build_sqlx(SqliteQueryBuilder);
        sqlx::query_with(&sql, values).execute(&self.pool).await?;

        Ok(submission_id.quote_id())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn persist(
        &self,
        submission_id: &SubmissionId,
        submission: &FormSubmission,
    ) -> Result<RecordId, DeliveryError> {
        let result = match submission {
            FormSubmission::Contact(contact) => self.persist_contact(submission_id, contact).await,
            FormSubmission::Quote(quote) => self.persist_quote(submission_id, quote).await,
        };

        result.map_err(classify)
    }
}

fn classify(err: sqlx::Error) -> DeliveryError {
    let transient = match &err {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(db) => db
            .code()
            .is_some_and(|code| RETRYABLE_CODES.contains(&code.as_ref())),
        _ => false,
    };

    if transient {
        DeliveryError::transient(err)
    } else {
        DeliveryError::permanent(err)
    }
}
