use sea_query::{ColumnDef, Table, TableCreateStatement, TableDropStatement};

use crate::table::ContactSubmissions;

pub struct Operation;

fn up_statement() -> TableCreateStatement {
    Table::create()
        .table(ContactSubmissions::Table)
        .col(
            ColumnDef::new(ContactSubmissions::Id)
                .string()
                .not_null()
                .string_len(26)
                .primary_key(),
        )
        .col(
            ColumnDef::new(ContactSubmissions::Name)
                .string()
                .not_null()
                .string_len(100),
        )
        .col(
            ColumnDef::new(ContactSubmissions::Email)
                .string()
                .not_null()
                .string_len(320),
        )
        .col(
            ColumnDef::new(ContactSubmissions::Phone)
                .string()
                .not_null()
                .string_len(50),
        )
        .col(
            ColumnDef::new(ContactSubmissions::Subject)
                .string()
                .not_null()
                .string_len(200),
        )
        .col(
            ColumnDef::new(ContactSubmissions::Message)
                .text()
                .not_null(),
        )
        .col(
            ColumnDef::new(ContactSubmissions::CreatedAt)
                .big_integer()
                .not_null(),
        )
        .to_owned()
}

fn down_statement() -> TableDropStatement {
    Table::drop().table(ContactSubmissions::Table).to_owned()
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
