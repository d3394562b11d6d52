use sea_query::{ColumnDef, Table, TableCreateStatement, TableDropStatement};

use crate::table::QuoteSubmissions;

pub struct Operation;

fn up_statement() -> TableCreateStatement {
    Table::create()
        .table(QuoteSubmissions::Table)
        .col(
            ColumnDef::new(QuoteSubmissions::Id)
                .string()
                .not_null()
                .string_len(26)
                .primary_key(),
        )
        .col(ColumnDef::new(QuoteSubmissions::EquipmentType).string())
        .col(ColumnDef::new(QuoteSubmissions::Name).string())
        .col(ColumnDef::new(QuoteSubmissions::Email).string())
        .col(ColumnDef::new(QuoteSubmissions::Fields).text().not_null())
        .col(
            ColumnDef::new(QuoteSubmissions::CreatedAt)
                .big_integer()
                .not_null(),
        )
        .to_owned()
}

fn down_statement() -> TableDropStatement {
    Table::drop().table(QuoteSubmissions::Table).to_owned()
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
