use sea_query::{ColumnDef, Table, TableCreateStatement, TableDropStatement};

use crate::table::IdempotencyKeys;

pub struct Operation;

fn up_statement() -> TableCreateStatement {
    Table::create()
        .table(IdempotencyKeys::Table)
        .col(
            ColumnDef::new(IdempotencyKeys::Key)
                .string()
                .not_null()
                .string_len(64)
                .primary_key(),
        )
        .col(
            ColumnDef::new(IdempotencyKeys::SubmissionId)
                .string()
                .not_null()
                .string_len(26),
        )
        .col(
            ColumnDef::new(IdempotencyKeys::CreatedAt)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(IdempotencyKeys::ExpiresAt)
                .big_integer()
                .not_null(),
        )
        .to_owned()
}

fn down_statement() -> TableDropStatement {
    Table::drop().table(IdempotencyKeys::Table).to_owned()
}

#[async_trait::async_trait]
impl sqlx_migrator::Operation<sqlx::Sqlite> for Operation {
    async fn up(
        &self,
        connection: &mut sqlx::SqliteConnection,
    ) -> Result<(), sqlx_migrator::Error> {
        let statment = up_statement().to_string(sea_query::SqliteQueryBuilder);
        sqlx::query(&statment).execute(connection).await?;

        Ok(())
    }

    async fn down(
        &self,
        connection: &mut sqlx::SqliteConnection,
    ) -> Result<(), sqlx_migrator::Error> {
        let statment = down_statement().to_string(sea_query::SqliteQueryBuilder);
        sqlx::query(&statment).execute(connection).await?;

        Ok(())
    }
}
