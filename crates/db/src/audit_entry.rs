//! Append-only audit log of role mutations and verification events.
//!
//! Entries are pruned by the retention cleanup cycle, never updated.

use sea_orm::{entity::prelude::*, ActiveValue};
use serde::Serialize;

/// Audit entry model.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "audit_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub guild_id: i64,
    pub member_id: i64,
    pub rule_id: Option<i64>,
    pub role_id: Option<i64>,
    pub action: Action,
    pub reason: String,
    pub created_at: TimeDateTime,
}

/// Audited action kinds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize)]
#[sea_orm(rs_type = "i16", db_type = "Integer")]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[sea_orm(num_value = 0)]
    RoleAdded,
    #[sea_orm(num_value = 1)]
    RoleRemoved,
    #[sea_orm(num_value = 2)]
    VerifySuccess,
    #[sea_orm(num_value = 3)]
    VerifyReplaced,
    #[sea_orm(num_value = 4)]
    VerifyUnlinked,
}

/// Audit entry model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Active model for a new audit entry.
pub fn record(
    guild_id: i64,
    member_id: i64,
    rule_id: Option<i64>,
    role_id: Option<i64>,
    action: Action,
    reason: impl Into<String>,
) -> ActiveModel {
    ActiveModel {
        guild_id: ActiveValue::Set(guild_id),
        member_id: ActiveValue::Set(member_id),
        rule_id: ActiveValue::Set(rule_id),
        role_id: ActiveValue::Set(role_id),
        action: ActiveValue::Set(action),
        reason: ActiveValue::Set(reason.into()),
        created_at: ActiveValue::Set(crate::now()),
        ..Default::default()
    }
}
