use anyhow::Context as _;
use chrono::NaiveDate;
use teloxide::prelude::*;

use crate::app::App;
use crate::services::{ScheduledMessageService, UserService};
use crate::telegram::handlers::HandleStatus;
use crate::user::UserState;
use crate::utils;

/// `/schedule_broadcast <date> <time> <text>` stores one row per active
/// user, the minutely sweep picks them up once the moment passes.
#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle(
    app: &'static App,
    state: &UserState,
    m: &Message,
    date: &str,
    time: &str,
    text: &str,
) -> anyhow::Result<HandleStatus> {
    let Ok(date) = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d") else {
        app.bot()
            .send_message(m.chat.id, "Date must look like 2025-03-16")
            .await?;

        return Ok(HandleStatus::Handled);
    };

    let Ok((hour, minute)) = utils::parse_time_of_day(time) else {
        app.bot()
            .send_message(m.chat.id, "Time must look like 18:30")
            .await?;

        return Ok(HandleStatus::Handled);
    };

    let send_at = date
        .and_hms_opt(hour, minute, 0)
        .context("Validated time did not convert")?;

    if send_at <= app.now_local() {
        app.bot()
            .send_message(m.chat.id, "That moment has already passed")
            .await?;

        return Ok(HandleStatus::Handled);
    }

    let photo = m
        .reply_to_message()
        .and_then(|reply| reply.photo())
        .and_then(|photos| photos.last())
        .map(|photo| photo.file.id.clone());

    if text.trim().is_empty() && photo.is_none() {
        app.bot()
            .send_message(m.chat.id, "Broadcast needs a text or a photo reply")
            .await?;

        return Ok(HandleStatus::Handled);
    }

    let users = UserService::get_active(app.db()).await?;

    if users.is_empty() {
        app.bot()
            .send_message(m.chat.id, "No active users to schedule for")
            .await?;

        return Ok(HandleStatus::Handled);
    }

    let user_ids: Vec<i64> = users.iter().map(|user| user.id).collect();

    let created = ScheduledMessageService::create_for_users(
        app.db(),
        &user_ids,
        text.trim(),
        photo.as_deref(),
        send_at,
    )
    .await?;

    app.bot()
        .send_message(
            m.chat.id,
            format!(
                "Scheduled for {created} users at {at}",
                at = utils::format_datetime(send_at),
            ),
        )
        .await?;

    Ok(HandleStatus::Handled)
}
