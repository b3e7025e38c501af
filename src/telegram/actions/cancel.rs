use teloxide::prelude::*;
use teloxide::types::ChatId;

use crate::app::App;
use crate::telegram::forms;
use crate::telegram::handlers::HandleStatus;
use crate::telegram::keyboards::StartKeyboard;
use crate::user::UserState;

#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle(
    app: &'static App,
    state: &UserState,
    chat_id: ChatId,
) -> anyhow::Result<HandleStatus> {
    let dialogue = forms::dialogue(app, chat_id);

    let active = dialogue
        .get()
        .await?
        .map(|form| !form.is_idle())
        .unwrap_or(false);

    let text = if active {
        dialogue.exit().await?;

        t!("form.cancelled", locale = state.locale())
    } else {
        t!("form.nothing-to-cancel", locale = state.locale())
    };

    app.bot()
        .send_message(chat_id, text)
        .reply_markup(StartKeyboard::markup(state.locale()))
        .await?;

    Ok(HandleStatus::Handled)
}
