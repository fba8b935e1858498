use std::future::Future;

use anyhow::{Context as _, Result};
use serenity::model::channel::{Channel, ChannelType, GuildChannel, PermissionOverwrite, PermissionOverwriteType};
use serenity::model::id::{ChannelId, GuildId, RoleId};
use serenity::model::permissions::Permissions;
use serenity::prelude::*;

/// The `@everyone` role shares its id with the guild
pub fn everyone_role(guild_id: GuildId) -> RoleId {
    RoleId(guild_id.0)
}

/// Permissions `@everyone` ends up with in a channel
///
/// Applies the role's base permissions, then the channel's `@everyone`
/// overwrite (deny first, then allow). Administrator bypasses overwrites.
pub fn everyone_permissions(
    guild_id: GuildId,
    base: Permissions,
    overwrites: &[PermissionOverwrite],
) -> Permissions {
    if base.contains(Permissions::ADMINISTRATOR) {
        return Permissions::all();
    }

    let everyone = everyone_role(guild_id);
    overwrites
        .iter()
        .filter(|overwrite| overwrite.kind == PermissionOverwriteType::Role(everyone))
        .fold(base, |permissions, overwrite| {
            (permissions & !overwrite.deny) | overwrite.allow
        })
}

/// Whether `@everyone` can see a channel
pub fn everyone_can_view(
    guild_id: GuildId,
    base: Permissions,
    overwrites: &[PermissionOverwrite],
) -> bool {
    everyone_permissions(guild_id, base, overwrites).contains(Permissions::VIEW_CHANNEL)
}

fn is_thread(kind: ChannelType) -> bool {
    matches!(
        kind,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
    )
}

/// Fetches a guild channel, resolving threads to their parent
async fn fetch_permission_channel(ctx: &Context, channel_id: ChannelId) -> Result<Option<GuildChannel>> {
    let channel = channel_id
        .to_channel(ctx)
        .await
        .with_context(|| format!("failed to fetch channel {}", channel_id))?;
    let Channel::Guild(channel) = channel else {
        return Ok(None);
    };
    if !is_thread(channel.kind) {
        return Ok(Some(channel));
    }
    let Some(parent_id) = channel.parent_id else {
        return Ok(None);
    };
    let parent = parent_id
        .to_channel(ctx)
        .await
        .with_context(|| format!("failed to fetch parent channel {}", parent_id))?;
    Ok(parent.guild())
}

/// Base permissions of `@everyone`, from the cache when the guild is cached
async fn everyone_base(ctx: &Context, guild_id: GuildId) -> Result<Permissions> {
    let everyone = everyone_role(guild_id);
    if let Some(base) = ctx
        .cache
        .guild_field(guild_id, |guild| guild.roles.get(&everyone).map(|role| role.permissions))
    {
        return Ok(base.unwrap_or_else(Permissions::empty));
    }
    let roles = guild_id
        .roles(&ctx.http)
        .await
        .with_context(|| format!("failed to fetch roles of guild {}", guild_id))?;
    Ok(roles
        .get(&everyone)
        .map(|role| role.permissions)
        .unwrap_or_else(Permissions::empty))
}

/// Fetches whether `@everyone` can view a guild channel
pub async fn everyone_can_view_channel(
    ctx: &Context,
    guild_id: GuildId,
    channel_id: ChannelId,
) -> Result<bool> {
    let Some(channel) = fetch_permission_channel(ctx, channel_id).await? else {
        return Ok(false);
    };
    let base = everyone_base(ctx, guild_id).await?;
    Ok(everyone_can_view(guild_id, base, &channel.permission_overwrites))
}

/// Runs `handler` only once `visible` resolves to `true`
///
/// Returns `None` without polling the handler when the channel is hidden.
pub async fn when_public<V, H, T>(visible: V, handler: H) -> Result<Option<T>>
where
    V: Future<Output = Result<bool>>,
    H: Future<Output = Result<T>>,
{
    if !visible.await? {
        return Ok(None);
    }
    handler.await.map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serenity::model::id::UserId;
    use std::sync::atomic::{AtomicBool, Ordering};

    const GUILD: GuildId = GuildId(10);

    fn role_overwrite(role: RoleId, allow: Permissions, deny: Permissions) -> PermissionOverwrite {
        PermissionOverwrite {
            allow,
            deny,
            kind: PermissionOverwriteType::Role(role),
        }
    }

    #[test]
    fn public_channel_is_viewable() {
        let base = Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES;
        assert!(everyone_can_view(GUILD, base, &[]));
    }

    #[test]
    fn everyone_deny_hides_channel() {
        let base = Permissions::VIEW_CHANNEL;
        let overwrites = [role_overwrite(
            everyone_role(GUILD),
            Permissions::empty(),
            Permissions::VIEW_CHANNEL,
        )];
        assert!(!everyone_can_view(GUILD, base, &overwrites));
    }

    #[test]
    fn everyone_allow_reveals_channel() {
        let overwrites = [role_overwrite(
            everyone_role(GUILD),
            Permissions::VIEW_CHANNEL,
            Permissions::empty(),
        )];
        assert!(everyone_can_view(GUILD, Permissions::empty(), &overwrites));
    }

    #[test]
    fn other_overwrites_are_ignored() {
        let base = Permissions::VIEW_CHANNEL;
        let overwrites = [
            role_overwrite(RoleId(99), Permissions::empty(), Permissions::VIEW_CHANNEL),
            PermissionOverwrite {
                allow: Permissions::empty(),
                deny: Permissions::VIEW_CHANNEL,
                kind: PermissionOverwriteType::Member(UserId(5)),
            },
        ];
        assert!(everyone_can_view(GUILD, base, &overwrites));
    }

    #[test]
    fn administrator_bypasses_overwrites() {
        let overwrites = [role_overwrite(
            everyone_role(GUILD),
            Permissions::empty(),
            Permissions::VIEW_CHANNEL,
        )];
        assert!(everyone_can_view(GUILD, Permissions::ADMINISTRATOR, &overwrites));
    }

    #[tokio::test]
    async fn hidden_channel_skips_the_handler() {
        let ran = AtomicBool::new(false);
        let result = when_public(async { Ok(false) }, async {
            ran.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(result, None);
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn public_channel_runs_the_handler() {
        let result = when_public(async { Ok(true) }, async { Ok(7) }).await.unwrap();
        assert_eq!(result, Some(7));
    }

    #[tokio::test]
    async fn visibility_errors_skip_the_handler() {
        let ran = AtomicBool::new(false);
        let result = when_public(async { Err(anyhow::anyhow!("no access")) }, async {
            ran.store(true, Ordering::SeqCst);
            Ok(())
        })
        .await;
        assert!(result.is_err());
        assert!(!ran.load(Ordering::SeqCst));
    }
}
