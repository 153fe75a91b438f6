use std::sync::Arc;

use crate::{
    dispatch::{Ack, CommandContext},
    errors::Error,
    handlers::HandlerDeps,
    Result,
};

const CAPTION: &str = "User rating";

pub async fn rating_download(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let channel = ctx.token.channel_id()?;
    let artifact = deps.exports.export_channel(channel).await?;
    deps.messenger()
        .send_document(ctx.press.chat_id, &artifact.file_name, artifact.bytes, CAPTION)
        .await?;
    Ok(Ack::Silent)
}

/// Zeroes the channel's points, then sends the export from a background task.
pub async fn rating_reset(deps: Arc<HandlerDeps>, ctx: CommandContext) -> Result<Ack> {
    let channel = ctx.token.channel_id()?;
    deps.screens.repo().reset_results(channel).await?;
    tracing::info!(channel = channel.0, by = ctx.press.user_id.0, "rating reset");

    let exports = deps.exports.clone();
    let messenger = deps.messenger().clone();
    let chat = ctx.press.chat_id;
    deps.tasks.spawn_bounded("rating_export", deps.export_timeout, async move {
        let artifact = exports.export_channel(channel).await?;
        messenger
            .send_document(chat, &artifact.file_name, artifact.bytes, CAPTION)
            .await?;
        Ok::<(), Error>(())
    });

    Ok(Ack::notice("Rating reset."))
}
