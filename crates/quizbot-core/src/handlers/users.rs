use std::sync::Arc;

use crate::{
    dispatch::{Ack, CommandContext},
    formatting::escape_html,
    handlers::HandlerDeps,
    menus,
    pending::{OperationKind, PendingOperation},
    Result,
};

pub async fn main_menu(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    deps.screens
        .main_menu(ctx.press.chat_id, Some(ctx.press.message.message_id))
        .await?;
    Ok(Ack::Silent)
}

pub async fn user_settings(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    deps.screens
        .user_settings(ctx.press.chat_id, Some(ctx.press.message.message_id), None)
        .await?;
    Ok(Ack::Silent)
}

pub async fn admin_list(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let admins = deps.screens.repo().admins().await?;
    let mut text = String::from("<b>Admins</b>");
    if admins.is_empty() {
        text.push_str("\n<i>Nobody has been granted the role yet.</i>");
    }
    for admin in &admins {
        let name = match &admin.username {
            Some(u) => format!("@{}", escape_html(u)),
            None => format!("id {}", admin.id.0),
        };
        text.push_str(&format!("\n• {name}"));
    }
    deps.screens
        .renderer()
        .show_menu(
            ctx.press.chat_id,
            Some(ctx.press.message.message_id),
            &menus::user_settings(),
            &text,
        )
        .await?;
    Ok(Ack::Silent)
}

pub async fn admin_grant(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    deps.open_prompt(
        &ctx,
        "Send the username of the user who should become an admin.",
        Some(&menus::cancel(None)),
        |prompt, origin| PendingOperation::new(OperationKind::GrantRole, prompt, origin),
    )
    .await
}

pub async fn admin_revoke(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    deps.open_prompt(
        &ctx,
        "Send the username of the admin to demote.",
        Some(&menus::cancel(None)),
        |prompt, origin| PendingOperation::new(OperationKind::RevokeRole, prompt, origin),
    )
    .await
}
