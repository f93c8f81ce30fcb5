use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WalletLinks::Table)
                    .col(
                        ColumnDef::new(WalletLinks::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WalletLinks::GuildId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WalletLinks::MemberId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WalletLinks::WalletPubkey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WalletLinks::VerifiedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WalletLinks::LastCheckedAt).timestamp())
                    .col(
                        ColumnDef::new(WalletLinks::CreatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .col(
                        ColumnDef::new(WalletLinks::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .from(WalletLinks::Table, WalletLinks::GuildId)
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
                    .name("idx_wallet_links_guild_member")
                    .table(WalletLinks::Table)
                    .col(WalletLinks::GuildId)
                    .col(WalletLinks::MemberId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WalletLinks::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub enum WalletLinks {
    Table,
    Id,
    GuildId,
    MemberId,
    WalletPubkey,
    VerifiedAt,
    LastCheckedAt,
    CreatedAt,
    UpdatedAt,
}
