//! Global rank administration.
//!
//! A user holds at most one rank; granting a new one replaces the old.
//! The bot owner is configured, not ranked, and cannot be changed here.

use std::collections::BTreeMap;

use crate::middleware::registry::{CommandCtx, HandlerResult};
use crate::permissions::Rank;
use crate::plugins::{extract_target, reply};
use crate::utils::{html_escape, mention_html};

pub async fn addsudo_cmd(ctx: CommandCtx) -> HandlerResult {
    grant(ctx, Rank::Sudo).await
}

pub async fn addsupport_cmd(ctx: CommandCtx) -> HandlerResult {
    grant(ctx, Rank::Support).await
}

pub async fn addwhitelist_cmd(ctx: CommandCtx) -> HandlerResult {
    grant(ctx, Rank::Whitelist).await
}

pub async fn addpro_cmd(ctx: CommandCtx) -> HandlerResult {
    grant(ctx, Rank::Pro).await
}

async fn grant(ctx: CommandCtx, rank: Rank) -> HandlerResult {
    let (target, target_name) = match extract_target(&ctx) {
        Some(t) => t,
        None => {
            reply(&ctx, "Reply to a user or give me a user id.").await?;
            return Ok(None);
        }
    };

    if target.0 == ctx.state.owner_id {
        reply(&ctx, "The owner doesn't need a rank.").await?;
        return Ok(None);
    }
    if target == ctx.state.bot_id {
        reply(&ctx, "This does not work that way.").await?;
        return Ok(None);
    }

    let previous = ctx.state.gate.ranks().rank_of(target.0).await?;
    if previous == Some(rank) {
        reply(
            &ctx,
            format!("This user already holds the {} rank.", rank),
        )
        .await?;
        return Ok(None);
    }

    ctx.state.gate.ranks().set_rank(target.0, Some(rank)).await?;

    let note = match previous {
        Some(old) => format!("Moved from {} to {}.", old, rank),
        None => format!("Promoted to {}!", rank),
    };
    reply(
        &ctx,
        format!("{} {}", html_escape(&target_name), note),
    )
    .await?;

    let admin = ctx
        .msg
        .from
        .as_ref()
        .map(|u| mention_html(u.id.0, &u.first_name))
        .unwrap_or_else(|| "Anonymous".to_string());
    Ok(Some(format!(
        "#{}\n<b>Admin:</b> {}\n<b>User:</b> {}",
        rank.as_str().to_uppercase(),
        admin,
        mention_html(target.0, &target_name)
    )))
}

/// Handle /rmrank - clear a user's rank.
pub async fn rmrank_cmd(ctx: CommandCtx) -> HandlerResult {
    let (target, target_name) = match extract_target(&ctx) {
        Some(t) => t,
        None => {
            reply(&ctx, "Reply to a user or give me a user id.").await?;
            return Ok(None);
        }
    };

    let previous = ctx.state.gate.ranks().rank_of(target.0).await?;
    let previous = match previous {
        Some(rank) => rank,
        None => {
            reply(&ctx, "This user holds no rank.").await?;
            return Ok(None);
        }
    };

    ctx.state.gate.ranks().set_rank(target.0, None).await?;
    reply(
        &ctx,
        format!(
            "{} no longer holds the {} rank.",
            html_escape(&target_name),
            previous
        ),
    )
    .await?;

    let admin = ctx
        .msg
        .from
        .as_ref()
        .map(|u| mention_html(u.id.0, &u.first_name))
        .unwrap_or_else(|| "Anonymous".to_string());
    Ok(Some(format!(
        "#UNRANKED\n<b>Admin:</b> {}\n<b>User:</b> {} (was {})",
        admin,
        mention_html(target.0, &target_name),
        previous
    )))
}

/// Handle /ranks - list every ranked user, grouped by rank.
pub async fn ranks_cmd(ctx: CommandCtx) -> HandlerResult {
    let rows = ctx.state.gate.ranks().all().await?;
    if rows.is_empty() {
        reply(&ctx, "Nobody holds a rank yet.").await?;
        return Ok(None);
    }

    let mut grouped: BTreeMap<&'static str, Vec<u64>> = BTreeMap::new();
    for (user_id, rank) in rows {
        grouped.entry(rank.as_str()).or_default().push(user_id);
    }

    let mut text = String::new();
    for (rank, users) in grouped {
        text.push_str(&format!("<b>{}</b>:\n", rank));
        for user_id in users {
            text.push_str(&format!(" - <code>{}</code>\n", user_id));
        }
    }
    reply(&ctx, text).await?;

    Ok(None)
}
