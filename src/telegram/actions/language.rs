use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};

use crate::app::App;
use crate::entity::prelude::*;
use crate::services::UserService;
use crate::telegram::handlers::HandleStatus;
use crate::telegram::keyboards::{LanguageKeyboard, StartKeyboard};
use crate::user::UserState;

pub async fn handle_prompt(
    app: &'static App,
    state: &UserState,
    chat_id: ChatId,
) -> anyhow::Result<HandleStatus> {
    app.bot()
        .send_message(chat_id, t!("language.choose", locale = state.locale()))
        .reply_markup(LanguageKeyboard::markup())
        .await?;

    Ok(HandleStatus::Handled)
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle(
    app: &'static App,
    state: &UserState,
    m: &Message,
    locale: UserLocale,
) -> anyhow::Result<HandleStatus> {
    UserService::set_locale(app.db(), state.user_id(), locale.clone()).await?;

    let locale = locale.as_ref();

    app.bot()
        .send_message(m.chat.id, t!("language.changed", locale = locale))
        .reply_markup(StartKeyboard::markup(locale))
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(HandleStatus::Handled)
}
