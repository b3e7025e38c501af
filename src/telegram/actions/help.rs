use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};

use crate::app::App;
use crate::telegram::handlers::HandleStatus;
use crate::telegram::keyboards::StartKeyboard;
use crate::user::UserState;

pub async fn handle(
    app: &'static App,
    state: &UserState,
    chat_id: ChatId,
) -> anyhow::Result<HandleStatus> {
    app.bot()
        .send_message(chat_id, t!("help.body", locale = state.locale()))
        .reply_markup(StartKeyboard::markup(state.locale()))
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(HandleStatus::Handled)
}

pub async fn handle_unknown_command(
    app: &'static App,
    state: &UserState,
    chat_id: ChatId,
) -> anyhow::Result<()> {
    let text = format!(
        "{}\n\n{}",
        t!("help.unknown-command", locale = state.locale()),
        t!("help.body", locale = state.locale()),
    );

    app.bot()
        .send_message(chat_id, text)
        .reply_markup(StartKeyboard::markup(state.locale()))
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(())
}

/// Shown when no handler wanted the message at all.
pub async fn send_fallback(
    app: &'static App,
    state: &UserState,
    chat_id: ChatId,
) -> anyhow::Result<()> {
    let text = format!(
        "{}\n\n{}",
        t!("help.fallback", locale = state.locale()),
        t!("help.body", locale = state.locale()),
    );

    app.bot()
        .send_message(chat_id, text)
        .reply_markup(StartKeyboard::markup(state.locale()))
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(())
}
