use std::error::Error;

use axum::async_trait;
use common::config::Config;
use db::{guild, sea_query::OnConflict, verify_session, Database, DatabaseConnection, Duration, EntityTrait};
use hyper::body::{self, Bytes, HttpBody};
use migration::MigratorTrait;
use serde::Serialize;

use crate::token;

pub(crate) async fn create_database() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("unable to create test database");

    migration::Migrator::up(&db, None)
        .await
        .expect("unable to run migrations");

    db
}

/// Store a verification session and sign a matching token, bypassing
/// the HTTP route.
pub(crate) async fn create_session(
    db: &DatabaseConnection,
    config: &Config,
    guild_id: i64,
    member_id: i64,
) -> (String, verify_session::Model) {
    guild::Entity::insert(guild::on_first_interaction(guild_id))
        .on_conflict(OnConflict::column(guild::Column::Id).do_nothing().to_owned())
        .exec_without_returning(db)
        .await
        .expect("unable to create guild");

    let session = verify_session::Entity::insert(verify_session::generate(
        guild_id,
        member_id,
        Duration::minutes(config.verification.session_ttl_minutes as i64),
    ))
    .exec_with_returning(db)
    .await
    .expect("unable to create session");

    let signed = token::sign(
        &token::TokenClaims {
            guild_id,
            member_id,
            session_id: session.id,
            exp: session.expires_at.assume_utc().unix_timestamp(),
        },
        &config.verification.hmac_secret,
    );

    (signed, session)
}

pub(crate) trait RequestBodyExt: Sized {
    fn from_json<B: Serialize>(val: B) -> Self;
}

impl<T> RequestBodyExt for T
where
    T: HttpBody + From<Vec<u8>>,
{
    fn from_json<B: Serialize>(val: B) -> Self {
        T::from(serde_json::to_vec(&val).expect("unable to serialize"))
    }
}

#[async_trait(?Send)]
pub(crate) trait ResponseBodyExt {
    async fn bytes(self) -> Bytes;

    async fn text(self) -> String;

    async fn json(self) -> serde_json::Value;
}

#[async_trait(?Send)]
impl<T> ResponseBodyExt for T
where
    T: HttpBody,
    T::Error: Error,
{
    async fn bytes(self) -> Bytes {
        body::to_bytes(self)
            .await
            .expect("unable to convert to bytes")
    }

    async fn text(self) -> String {
        String::from_utf8(self.bytes().await.to_vec()).expect("unable to convert to text")
    }

    async fn json(self) -> serde_json::Value {
        serde_json::from_slice(&self.bytes().await).expect("unable to convert to json")
    }
}
