//! # Chat platform client
//!
//! This crate isolates the rest of the workspace from the Discord REST API
//! behind the [`ChatPlatform`] trait. The reconciliation worker only needs a
//! handful of operations: resolving guilds and members, checking whether the
//! bot may manage a role, and adding or removing roles.
//!
//! The gateway connection and slash command plumbing live outside this
//! service; only plain REST calls are issued here.

use async_trait::async_trait;
use derive_more::{Display, Error, From};
use serenity::{
    http::{Http, HttpError, StatusCode},
    model::prelude::{GuildId, Permissions, RoleId, UserId},
};
use tokio::sync::OnceCell;

/// Errors that may occur while talking to the chat platform.
#[derive(Debug, Display, Error, From)]
pub enum ChatError {
    /// Discord API error.
    ApiError(serenity::Error),
}

/// Chat platform operations required for role reconciliation.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Check that a guild resolves through the API.
    async fn guild_exists(&self, guild_id: u64) -> Result<bool, ChatError>;

    /// Role ids currently held by a member.
    ///
    /// Returns [`None`] when the member is not part of the guild.
    async fn member_roles(&self, guild_id: u64, member_id: u64)
        -> Result<Option<Vec<u64>>, ChatError>;

    /// Check that the bot may manage the target role: it must hold the
    /// role-management permission and its highest role must rank strictly
    /// above the target.
    async fn can_manage_role(&self, guild_id: u64, role_id: u64) -> Result<bool, ChatError>;

    /// Grant a role to a member.
    async fn add_role(
        &self,
        guild_id: u64,
        member_id: u64,
        role_id: u64,
        reason: &str,
    ) -> Result<(), ChatError>;

    /// Revoke a role from a member.
    async fn remove_role(
        &self,
        guild_id: u64,
        member_id: u64,
        role_id: u64,
        reason: &str,
    ) -> Result<(), ChatError>;
}

/// [`ChatPlatform`] implementation backed by the Discord REST API.
pub struct DiscordGate {
    http: Http,
    bot_id: OnceCell<UserId>,
}

impl DiscordGate {
    /// Create a new client from a bot token.
    pub fn new(bot_token: &str) -> Self {
        Self {
            http: Http::new(bot_token),
            bot_id: OnceCell::new(),
        }
    }

    /// Identifier of the bot user, fetched once and cached.
    async fn bot_id(&self) -> Result<UserId, ChatError> {
        let id = self
            .bot_id
            .get_or_try_init(|| async {
                self.http
                    .get_current_user()
                    .await
                    .map(|user| user.id)
                    .map_err(ChatError::from)
            })
            .await?;

        Ok(*id)
    }
}

/// Check whether an API error is a plain 404.
fn is_not_found(error: &serenity::Error) -> bool {
    matches!(
        error,
        serenity::Error::Http(HttpError::UnsuccessfulRequest(response))
            if response.status_code == StatusCode::NOT_FOUND
    )
}

#[async_trait]
impl ChatPlatform for DiscordGate {
    async fn guild_exists(&self, guild_id: u64) -> Result<bool, ChatError> {
        match self.http.get_guild(GuildId::new(guild_id)).await {
            Ok(_) => Ok(true),
            Err(error) if is_not_found(&error) => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    async fn member_roles(
        &self,
        guild_id: u64,
        member_id: u64,
    ) -> Result<Option<Vec<u64>>, ChatError> {
        match self
            .http
            .get_member(GuildId::new(guild_id), UserId::new(member_id))
            .await
        {
            Ok(member) => Ok(Some(member.roles.iter().map(|role| role.get()).collect())),
            Err(error) if is_not_found(&error) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    async fn can_manage_role(&self, guild_id: u64, role_id: u64) -> Result<bool, ChatError> {
        let guild = GuildId::new(guild_id);

        let bot_id = self.bot_id().await?;

        let Some(bot_roles) = self.member_roles(guild_id, bot_id.get()).await? else {
            return Ok(false);
        };

        let roles = self.http.get_guild_roles(guild).await?;

        let Some(target) = roles.iter().find(|role| role.id == RoleId::new(role_id)) else {
            return Ok(false);
        };

        // The @everyone role carries base permissions and shares the guild id.
        let everyone = RoleId::new(guild_id);

        let mut permissions = Permissions::empty();
        let mut top_position = None;

        for role in &roles {
            let held = role.id == everyone || bot_roles.contains(&role.id.get());

            if held {
                permissions |= role.permissions;

                if role.id != everyone {
                    top_position = top_position.max(Some(role.position));
                }
            }
        }

        let may_manage = permissions.contains(Permissions::MANAGE_ROLES)
            || permissions.contains(Permissions::ADMINISTRATOR);

        Ok(may_manage && top_position > Some(target.position))
    }

    async fn add_role(
        &self,
        guild_id: u64,
        member_id: u64,
        role_id: u64,
        reason: &str,
    ) -> Result<(), ChatError> {
        self.http
            .add_member_role(
                GuildId::new(guild_id),
                UserId::new(member_id),
                RoleId::new(role_id),
                Some(reason),
            )
            .await?;

        Ok(())
    }

    async fn remove_role(
        &self,
        guild_id: u64,
        member_id: u64,
        role_id: u64,
        reason: &str,
    ) -> Result<(), ChatError> {
        self.http
            .remove_member_role(
                GuildId::new(guild_id),
                UserId::new(member_id),
                RoleId::new(role_id),
                Some(reason),
            )
            .await?;

        Ok(())
    }
}
