pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_guilds_table;
mod m20240101_000002_create_wallet_links_table;
mod m20240101_000003_create_verify_sessions_table;
mod m20240101_000004_create_gating_rules_table;
mod m20240101_000005_create_audit_entries_table;
mod m20240101_000006_create_price_quotes_table;

pub(crate) use m20240101_000001_create_guilds_table::Guilds;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_guilds_table::Migration),
            Box::new(m20240101_000002_create_wallet_links_table::Migration),
            Box::new(m20240101_000003_create_verify_sessions_table::Migration),
            Box::new(m20240101_000004_create_gating_rules_table::Migration),
            Box::new(m20240101_000005_create_audit_entries_table::Migration),
            Box::new(m20240101_000006_create_price_quotes_table::Migration),
        ]
    }
}
