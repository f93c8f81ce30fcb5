use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PriceQuotes::Table)
                    .col(
                        ColumnDef::new(PriceQuotes::AssetId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PriceQuotes::PriceUsd)
                            .decimal_len(38, 12)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PriceQuotes::FetchedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PriceQuotes::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub enum PriceQuotes {
    Table,
    AssetId,
    PriceUsd,
    FetchedAt,
}
