//! Single-use wallet verification session.
//!
//! A session stores the server-chosen challenge message a member must
//! sign to prove wallet ownership. Sessions expire after a short TTL
//! and are consumed exactly once by a successful verification; an
//! expired or used session cannot be re-accepted.

use rand::{thread_rng, Rng};
use sea_orm::{entity::prelude::*, ActiveValue};
use time::{format_description::well_known::Rfc3339, Duration, PrimitiveDateTime};

/// Verification session model. `nonce` is globally unique.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "verify_sessions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub guild_id: i64,
    pub member_id: i64,
    pub nonce: String,
    pub challenge_message: String,
    pub expires_at: TimeDateTime,
    pub used_at: Option<TimeDateTime>,
    pub created_at: TimeDateTime,
}

/// Verification session model relations.
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

impl Model {
    /// Check whether the session was already consumed.
    pub fn is_used(&self) -> bool {
        self.used_at.is_some()
    }

    /// Check whether the session expired at the provided point in time.
    pub fn is_expired(&self, now: PrimitiveDateTime) -> bool {
        self.expires_at <= now
    }
}

/// Exact challenge message a member is expected to sign.
///
/// Any deviation from this format invalidates previously issued
/// signatures, so keep it stable.
pub fn challenge_message(
    guild_id: i64,
    member_id: i64,
    nonce: &str,
    expires_at: PrimitiveDateTime,
) -> String {
    let exp = expires_at
        .assume_utc()
        .format(&Rfc3339)
        .expect("well-formed timestamp");

    format!("Verify Discord {member_id} in Guild {guild_id} nonce {nonce} exp {exp}")
}

/// Generate a new session with a fresh 128-bit nonce.
pub fn generate(guild_id: i64, member_id: i64, ttl: Duration) -> ActiveModel {
    let nonce = format!("{:032x}", thread_rng().gen::<u128>());

    let now = crate::now();
    let expires_at = now + ttl;

    ActiveModel {
        guild_id: ActiveValue::Set(guild_id),
        member_id: ActiveValue::Set(member_id),
        challenge_message: ActiveValue::Set(challenge_message(
            guild_id, member_id, &nonce, expires_at,
        )),
        nonce: ActiveValue::Set(nonce),
        expires_at: ActiveValue::Set(expires_at),
        used_at: ActiveValue::Set(None),
        created_at: ActiveValue::Set(now),
        ..Default::default()
    }
}
