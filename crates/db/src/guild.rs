//! Discord guild known to the gating service.
//!
//! A guild row is created on first interaction and acts as the
//! isolation boundary for wallet links and gating rules.

use sea_orm::{entity::prelude::*, ActiveValue};

/// Guild model. The primary key is the Discord guild snowflake.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "guilds")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    pub created_at: TimeDateTime,
    pub updated_at: TimeDateTime,
}

/// Guild model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::wallet_link::Entity")]
    WalletLink,

    #[sea_orm(has_many = "super::gating_rule::Entity")]
    GatingRule,
}

impl Related<super::wallet_link::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WalletLink.def()
    }
}

impl Related<super::gating_rule::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::GatingRule.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Active model for a guild seen for the first time.
pub fn on_first_interaction(guild_id: i64) -> ActiveModel {
    let now = crate::now();

    ActiveModel {
        id: ActiveValue::Set(guild_id),
        created_at: ActiveValue::Set(now),
        updated_at: ActiveValue::Set(now),
    }
}
