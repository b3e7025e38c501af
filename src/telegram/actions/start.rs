use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::app::App;
use crate::scheduler;
use crate::services::{NotificationService, UserService};
use crate::telegram::handlers::HandleStatus;
use crate::telegram::keyboards::{LanguageKeyboard, StartKeyboard};
use crate::user::UserState;

#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle(
    app: &'static App,
    state: &UserState,
    m: &Message,
    payload: &str,
) -> anyhow::Result<HandleStatus> {
    if !payload.is_empty() {
        UserService::set_source(app.db(), state.user_id(), payload).await?;
    }

    if state.newly_created() {
        NotificationService::notify_user_joined(app, state.user(), m.from.as_ref()).await;

        app.bot()
            .send_message(m.chat.id, t!("language.choose", locale = state.locale()))
            .reply_markup(LanguageKeyboard::markup())
            .await?;

        return Ok(HandleStatus::Handled);
    }

    let reactivated = UserService::set_active(app.db(), state.user_id(), true).await?;

    if reactivated {
        tracing::info!(user_id = state.user_id(), "User was reactivated");

        if let Err(err) = scheduler::jobs::rebuild(app).await {
            tracing::error!(err = ?err, "Rebuild after reactivation failed");
        }
    }

    let text = if reactivated {
        t!("start.reactivated", locale = state.locale())
    } else {
        t!("start.welcome-back", locale = state.locale())
    };

    app.bot()
        .send_message(m.chat.id, text)
        .reply_markup(StartKeyboard::markup(state.locale()))
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(HandleStatus::Handled)
}
