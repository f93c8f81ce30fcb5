use axum::{extract::State, Json};
use axum_derive_error::ErrorResponse;
use db::{audit_entry, wallet_link, ColumnTrait, DbErr, EntityTrait, QueryFilter};
use derive_more::{Display, Error, From};
use serde::{Deserialize, Serialize};
use worker::Job;

use crate::AppState;

/// Errors that may occur during unlinking.
#[derive(ErrorResponse, Display, From, Error)]
pub(super) enum UnlinkError {
    /// Database-related error.
    DatabaseError(DbErr),
}

/// Unlink request.
#[derive(Deserialize)]
pub(super) struct UnlinkRequest {
    guild_id: i64,
    discord_user_id: i64,
}

/// Unlink response. `unlinked` is false when no link existed.
#[derive(Serialize)]
pub(super) struct UnlinkResponse {
    ok: bool,
    unlinked: bool,
}

/// Delete a member's wallet link and queue removal of every role
/// this service manages in the guild.
pub(super) async fn unlink(
    State(state): State<AppState>,
    Json(request): Json<UnlinkRequest>,
) -> Result<Json<UnlinkResponse>, UnlinkError> {
    let removed = wallet_link::Entity::delete_many()
        .filter(wallet_link::Column::GuildId.eq(request.guild_id))
        .filter(wallet_link::Column::MemberId.eq(request.discord_user_id))
        .exec(state.db.as_ref())
        .await?
        .rows_affected;

    let unlinked = removed > 0;

    if unlinked {
        audit_entry::Entity::insert(audit_entry::record(
            request.guild_id,
            request.discord_user_id,
            None,
            None,
            audit_entry::Action::VerifyUnlinked,
            "wallet unlinked",
        ))
        .exec_without_returning(state.db.as_ref())
        .await?;

        state.queue.enqueue(Job::RemoveManagedRoles {
            guild_id: request.guild_id,
            member_id: request.discord_user_id,
        });
    }

    Ok(Json(UnlinkResponse { ok: true, unlinked }))
}
