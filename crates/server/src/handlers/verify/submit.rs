use axum::{extract::State, Json};
use db::{
    audit_entry, verify_session, wallet_link, ActiveModelTrait, ActiveValue, ColumnTrait,
    EntityTrait, QueryFilter, TransactionErrorExt, TransactionTrait,
};
use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use worker::Job;

use crate::AppState;

use super::{load_session, VerifyError};

/// Signature submission request.
#[derive(Deserialize)]
pub(super) struct SubmitRequest {
    token: String,
    wallet_pubkey: String,
    signature_base58: String,
}

/// Signature submission response.
#[derive(Serialize)]
pub(super) struct SubmitResponse {
    ok: bool,
    server_id: i64,
    member_id: i64,
    /// Whether a previously linked wallet was replaced.
    replaced: bool,
}

/// Accept a signed challenge and link the wallet to the member.
///
/// The session is burned before the link upsert: if the upsert fails,
/// the member restarts verification rather than getting a replayable
/// session back.
pub(super) async fn submit(
    State(state): State<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, VerifyError> {
    let session = load_session(&state, &request.token).await?;

    let pubkey: [u8; 32] = bs58::decode(&request.wallet_pubkey)
        .into_vec()
        .map_err(|_| VerifyError::InvalidSignature)?
        .try_into()
        .map_err(|_| VerifyError::InvalidSignature)?;

    let signature: [u8; 64] = bs58::decode(&request.signature_base58)
        .into_vec()
        .map_err(|_| VerifyError::InvalidSignature)?
        .try_into()
        .map_err(|_| VerifyError::InvalidSignature)?;

    let key = VerifyingKey::from_bytes(&pubkey).map_err(|_| VerifyError::InvalidSignature)?;

    key.verify_strict(
        session.challenge_message.as_bytes(),
        &Signature::from_bytes(&signature),
    )
    .map_err(|_| VerifyError::InvalidSignature)?;

    // Burn the session first. The conditional update makes sure that of
    // two concurrent submits exactly one passes this gate.
    let burned = verify_session::Entity::update_many()
        .col_expr(verify_session::Column::UsedAt, db::now().into())
        .filter(verify_session::Column::Id.eq(session.id))
        .filter(verify_session::Column::UsedAt.is_null())
        .exec(state.db.as_ref())
        .await?
        .rows_affected;

    if burned == 0 {
        return Err(VerifyError::SessionInvalid);
    }

    let guild_id = session.guild_id;
    let member_id = session.member_id;
    let wallet_pubkey = request.wallet_pubkey.clone();

    let replaced = state
        .db
        .transaction::<_, bool, VerifyError>(|txn| {
            Box::pin(async move {
                let existing = wallet_link::Entity::find()
                    .filter(wallet_link::Column::GuildId.eq(guild_id))
                    .filter(wallet_link::Column::MemberId.eq(member_id))
                    .one(txn)
                    .await?;

                let replaced = match existing {
                    Some(link) => {
                        let replaced = link.wallet_pubkey != wallet_pubkey;

                        let now = db::now();
                        let mut active: wallet_link::ActiveModel = link.into();
                        active.wallet_pubkey = ActiveValue::Set(wallet_pubkey.clone());
                        active.verified_at = ActiveValue::Set(now);
                        active.updated_at = ActiveValue::Set(now);
                        active.update(txn).await?;

                        replaced
                    }
                    None => {
                        wallet_link::Entity::insert(wallet_link::verified(
                            guild_id,
                            member_id,
                            wallet_pubkey.clone(),
                        ))
                        .exec_without_returning(txn)
                        .await?;

                        false
                    }
                };

                let action = if replaced {
                    audit_entry::Action::VerifyReplaced
                } else {
                    audit_entry::Action::VerifySuccess
                };

                audit_entry::Entity::insert(audit_entry::record(
                    guild_id,
                    member_id,
                    None,
                    None,
                    action,
                    format!("wallet {wallet_pubkey} verified"),
                ))
                .exec_without_returning(txn)
                .await?;

                Ok(replaced)
            })
        })
        .await
        .into_raw_result()?;

    // The link is persisted, so the recheck sees the new wallet.
    state.queue.enqueue(Job::Recheck {
        guild_id,
        member_id: Some(member_id),
    });

    Ok(Json(SubmitResponse {
        ok: true,
        server_id: guild_id,
        member_id,
        replaced,
    }))
}
