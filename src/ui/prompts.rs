//! Confirmation prompts

use super::UiContext;
use crate::error::{RepodexError, RepodexResult};

/// Ask before a destructive action. Without a terminal the default wins.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> RepodexResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    let message = message.to_string();
    tokio::task::spawn_blocking(move || cliclack::confirm(&message).initial_value(default).interact())
        .await
        .map_err(|e| RepodexError::TaskJoin(e.to_string()))?
        .map_err(|e| RepodexError::User(format!("Prompt failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_without_terminal() {
        let ctx = UiContext::non_interactive();
        assert!(!confirm(&ctx, "Clear?", false).await.unwrap());
        assert!(confirm(&ctx.with_auto_yes(true), "Clear?", false).await.unwrap());
    }
}
