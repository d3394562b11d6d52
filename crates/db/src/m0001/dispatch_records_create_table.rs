use sea_query::{ColumnDef, Table, TableCreateStatement, TableDropStatement};

use crate::table::DispatchRecords;

pub struct Operation;

fn up_statement() -> TableCreateStatement {
    Table::create()
        .table(DispatchRecords::Table)
        .col(
            ColumnDef::new(DispatchRecords::SubmissionId)
                .string()
                .not_null()
                .string_len(26)
                .primary_key(),
        )
        .col(
            ColumnDef::new(DispatchRecords::FormType)
                .string()
                .not_null()
                .string_len(15),
        )
        .col(
            ColumnDef::new(DispatchRecords::Status)
                .string()
                .not_null()
                .string_len(15),
        )
        .col(
            ColumnDef::new(DispatchRecords::Attempts)
                .integer()
                .not_null()
                .default(0),
        )
        .col(ColumnDef::new(DispatchRecords::LastError).text())
        .col(
            ColumnDef::new(DispatchRecords::NotificationStatus)
                .string()
                .not_null()
                .string_len(15),
        )
        .col(
            ColumnDef::new(DispatchRecords::NotificationAttempts)
                .integer()
                .not_null()
                .default(0),
        )
        .col(ColumnDef::new(DispatchRecords::NotificationError).text())
        .col(
            ColumnDef::new(DispatchRecords::StorageStatus)
                .string()
                .not_null()
                .string_len(15),
        )
        .col(
            ColumnDef::new(DispatchRecords::StorageAttempts)
                .integer()
                .not_null()
                .default(0),
        )
        .col(ColumnDef::new(DispatchRecords::StorageError).text())
        .col(ColumnDef::new(DispatchRecords::Payload).text().not_null())
        .col(
            ColumnDef::new(DispatchRecords::CreatedAt)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(DispatchRecords::UpdatedAt)
                .big_integer()
                .not_null(),
        )
        .to_owned()
}

fn down_statement() -> TableDropStatement {
    Table::drop().table(DispatchRecords::Table).to_owned()
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
