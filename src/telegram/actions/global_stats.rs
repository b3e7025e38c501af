use indoc::formatdoc;
use itertools::Itertools as _;
use teloxide::prelude::*;
use teloxide::types::{ParseMode, ReplyParameters};

use crate::app::App;
use crate::services::{DebtService, ReminderService, ScheduledMessageService, UserService};
use crate::telegram::handlers::HandleStatus;
use crate::user::UserState;

#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle(
    app: &'static App,
    state: &UserState,
    m: &Message,
) -> anyhow::Result<HandleStatus> {
    let users_total = UserService::count(app.db(), None).await?;
    let users_active = UserService::count(app.db(), Some(true)).await?;

    let debts_open = DebtService::count_open(app.db(), None).await?;
    let debts_total = DebtService::count_all(app.db()).await?;

    let reminders = ReminderService::count(app.db()).await?;
    let pending_broadcasts = ScheduledMessageService::count_pending(app.db()).await?;

    let jobs = app.scheduler().count().await;

    let locales = UserService::count_locales(app.db())
        .await?
        .iter()
        .map(|row| {
            format!(
                "• {language}: <code>{count}</code>",
                language = row.locale.language(),
                count = row.count,
            )
        })
        .join("\n");

    let text = formatdoc!(
        "
            📊 <b>Global stats</b>

            👥 Users <code>{users_active}</code> active of <code>{users_total}</code>
            💸 Debts <code>{debts_open}</code> open of <code>{debts_total}</code>
            ⏰ Reminders <code>{reminders}</code>
            📨 Pending broadcasts <code>{pending_broadcasts}</code>
            🗓 Scheduled jobs <code>{jobs}</code>

            <b>Locales</b>

            {locales}
        "
    );

    app.bot()
        .send_message(m.chat.id, text)
        .reply_parameters(ReplyParameters::new(m.id))
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(HandleStatus::Handled)
}
