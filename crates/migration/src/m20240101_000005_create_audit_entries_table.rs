use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AuditEntries::Table)
                    .col(
                        ColumnDef::new(AuditEntries::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AuditEntries::GuildId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AuditEntries::MemberId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(AuditEntries::RuleId).big_integer())
                    .col(ColumnDef::new(AuditEntries::RoleId).big_integer())
                    .col(ColumnDef::new(AuditEntries::Action).integer().not_null())
                    .col(ColumnDef::new(AuditEntries::Reason).text().not_null())
                    .col(
                        ColumnDef::new(AuditEntries::CreatedAt)
                            .timestamp()
                            .not_null()
                            .extra("DEFAULT CURRENT_TIMESTAMP".to_string()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_audit_entries_created_at")
                    .table(AuditEntries::Table)
                    .col(AuditEntries::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditEntries::Table).to_owned())
            .await
    }
}

/// Learn more at https://docs.rs/sea-query#iden
#[derive(Iden)]
pub enum AuditEntries {
    Table,
    Id,
    GuildId,
    MemberId,
    RuleId,
    RoleId,
    Action,
    Reason,
    CreatedAt,
}
