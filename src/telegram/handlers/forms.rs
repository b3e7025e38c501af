use teloxide::prelude::*;

use super::HandleStatus;
use crate::app::App;
use crate::telegram::actions;
use crate::telegram::forms::{self, FormState};
use crate::user::UserState;

/// Feeds message text into whatever form the chat has open. Runs after the
/// command handlers, so `/cancel` can always break out of a flow.
#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle(
    app: &'static App,
    state: &UserState,
    m: &Message,
) -> anyhow::Result<HandleStatus> {
    let dialogue = forms::dialogue(app, m.chat.id);

    let Some(form) = dialogue.get().await? else {
        return Ok(HandleStatus::Skipped);
    };

    if form.is_idle() {
        return Ok(HandleStatus::Skipped);
    }

    let Some(text) = m.text() else {
        app.bot()
            .send_message(m.chat.id, t!("form.text-only", locale = state.locale()))
            .await?;

        return Ok(HandleStatus::Handled);
    };

    match form {
        FormState::Idle => Ok(HandleStatus::Skipped),

        FormState::DebtPerson
        | FormState::DebtAmount { .. }
        | FormState::DebtCurrency { .. }
        | FormState::DebtDirection { .. }
        | FormState::DebtDue { .. }
        | FormState::DebtComment { .. } => {
            actions::debt_form::handle_step(app, state, m.chat.id, &dialogue, form, text).await
        },

        FormState::DebtEditComment { debt_id } => {
            actions::debt_form::handle_edit_comment(app, state, m.chat.id, &dialogue, debt_id, text)
                .await
        },

        FormState::ReminderText | FormState::ReminderDue { .. } | FormState::ReminderRepeat { .. } => {
            actions::reminders::handle_step(app, state, m.chat.id, &dialogue, form, text).await
        },

        FormState::AiPreview { .. } => {
            app.bot()
                .send_message(
                    m.chat.id,
                    t!("ai.preview-pending", locale = state.locale()),
                )
                .await?;

            Ok(HandleStatus::Handled)
        },
    }
}
