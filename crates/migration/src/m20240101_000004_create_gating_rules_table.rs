use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(GatingRules::Table)
                    .col(
                        ColumnDef::new(GatingRules::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(GatingRules::GuildId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(GatingRules::RoleId).big_integer().not_null())
                    .col(ColumnDef::new(GatingRules::Kind).integer().not_null())
                    .col(ColumnDef::new(GatingRules::Enabled).boolean().not_null())
                    .col(ColumnDef::new(GatingRules::Mint).string())
                    .col(ColumnDef::new(GatingRules::ThresholdAmount).decimal_len(38, 12))
                    .col(ColumnDef::new(GatingRules::ThresholdUsd).decimal_len(38, 12))
                    .col(ColumnDef::new(GatingRules::PriceSource).integer())
                    .col(ColumnDef::new(GatingRules::PriceAssetId).string())
                    .col(ColumnDef::new(GatingRules::CollectionAddress).string())
                    .col(ColumnDef::new(GatingRules::ThresholdCount).big_integer())
                    .col(
                        ColumnDef::new(GatingRules::CreatedBy)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(GatingRules::CreatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .col(
                        ColumnDef::new(GatingRules::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(GatingRules::Table, GatingRules::GuildId)
                            .to(crate::Guilds::Table, crate::Guilds::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_gating_rules_guild_enabled")
                    .table(GatingRules::Table)
                    .col(GatingRules::GuildId)
                    .col(GatingRules::Enabled)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GatingRules::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub enum GatingRules {
    Table,
    Id,
    GuildId,
    RoleId,
    Kind,
    Enabled,
    Mint,
    ThresholdAmount,
    ThresholdUsd,
    PriceSource,
    PriceAssetId,
    CollectionAddress,
    ThresholdCount,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}
