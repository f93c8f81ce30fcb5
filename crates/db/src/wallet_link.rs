//! Verified wallet linked to a single guild member.
//!
//! Wallet ownership is proven by signing a server-chosen challenge
//! message with the wallet's Ed25519 key. At most one link exists
//! per `(guild_id, member_id)` pair; re-verification with a different
//! wallet replaces the stored public key.

use sea_orm::{entity::prelude::*, ActiveValue};

/// Wallet link model. `wallet_pubkey` is the base58 form of a
/// 32-byte Ed25519 public key.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "wallet_links")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub guild_id: i64,
    pub member_id: i64,
    pub wallet_pubkey: String,
    pub verified_at: TimeDateTime,
    pub last_checked_at: Option<TimeDateTime>,
    pub created_at: TimeDateTime,
    pub updated_at: TimeDateTime,
}

/// Wallet link model relations.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::guild::Entity",
        from = "Column::GuildId",
        to = "super::guild::Column::Id"
    )]
    Guild,
}

impl Related<super::guild::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Guild.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Active model for a freshly verified link.
pub fn verified(guild_id: i64, member_id: i64, wallet_pubkey: String) -> ActiveModel {
    let now = crate::now();

    ActiveModel {
        guild_id: ActiveValue::Set(guild_id),
        member_id: ActiveValue::Set(member_id),
        wallet_pubkey: ActiveValue::Set(wallet_pubkey),
        verified_at: ActiveValue::Set(now),
        last_checked_at: ActiveValue::Set(None),
        created_at: ActiveValue::Set(now),
        updated_at: ActiveValue::Set(now),
        ..Default::default()
    }
}
