use anyhow::Context as _;
use teloxide::prelude::*;

use crate::app::App;
use crate::telegram::actions;
use crate::telegram::actions::settings::TimeSetting;
use crate::telegram::inline_buttons::InlineButtons;
use crate::user::UserState;

#[tracing::instrument(
    skip_all,
    fields(
        user_id = state.user_id(),
    )
)]
pub async fn handle(app: &'static App, state: &UserState, q: CallbackQuery) -> anyhow::Result<()> {
    let data = q.data.as_ref().context("Callback needs data")?;

    let button: Result<InlineButtons, _> = data.parse();

    let button = match button {
        Ok(button) => button,
        Err(err) => {
            app.bot()
                .answer_callback_query(q.id.clone())
                .text("Button is broken. Try another one")
                .await?;

            tracing::error!(err = ?err, data, "Error parsing user inline button");

            return Ok(());
        },
    };

    match button {
        InlineButtons::DebtsPage(page) => {
            actions::debts::handle_page_inline(app, state, q, page).await?;
        },
        InlineButtons::DebtDetails(debt_id) => {
            actions::debts::handle_details_inline(app, state, q, debt_id).await?;
        },
        InlineButtons::DebtClose(debt_id) => {
            actions::debts::handle_close_inline(app, state, q, debt_id).await?;
        },
        InlineButtons::DebtDelete(debt_id) => {
            actions::debts::handle_delete_inline(app, state, q, debt_id).await?;
        },
        InlineButtons::DebtExtend(debt_id, days) => {
            actions::debts::handle_extend_inline(app, state, q, debt_id, days).await?;
        },
        InlineButtons::DebtEditComment(debt_id) => {
            actions::debt_form::handle_edit_comment_inline(app, state, q, debt_id).await?;
        },
        InlineButtons::ReminderAdd => {
            actions::reminders::handle_add_inline(app, state, q).await?;
        },
        InlineButtons::ReminderDelete(reminder_id) => {
            actions::reminders::handle_delete_inline(app, state, q, reminder_id).await?;
        },
        InlineButtons::AiConfirm => {
            actions::ai_capture::handle_confirm_inline(app, state, q).await?;
        },
        InlineButtons::AiDiscard => {
            actions::ai_capture::handle_discard_inline(app, state, q).await?;
        },
        InlineButtons::SettingsMenu => {
            actions::settings::handle_menu_inline(app, state, q).await?;
        },
        InlineButtons::DebtTimeMenu => {
            actions::settings::handle_time_menu_inline(app, state, q, TimeSetting::DebtReport)
                .await?;
        },
        InlineButtons::RateTimeMenu => {
            actions::settings::handle_time_menu_inline(app, state, q, TimeSetting::RateAlert)
                .await?;
        },
        InlineButtons::SetDebtTime(time) => {
            actions::settings::handle_set_time_inline(app, state, q, TimeSetting::DebtReport, time)
                .await?;
        },
        InlineButtons::SetRateTime(time) => {
            actions::settings::handle_set_time_inline(app, state, q, TimeSetting::RateAlert, time)
                .await?;
        },
    }

    Ok(())
}
