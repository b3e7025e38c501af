use teloxide::payloads::EditMessageTextSetters as _;
use teloxide::prelude::*;
use teloxide::sugar::bot::BotMessagesExt as _;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, ParseMode};

use crate::app::App;
use crate::entity::prelude::*;
use crate::scheduler::jobs;
use crate::services::UserService;
use crate::telegram::handlers::HandleStatus;
use crate::telegram::inline_buttons::InlineButtons;
use crate::telegram::utils as telegram_utils;
use crate::user::UserState;

/// Which of the two per-user notification clocks a menu operates on.
#[derive(Clone, Copy, Debug)]
pub enum TimeSetting {
    DebtReport,
    RateAlert,
}

const PRESET_TIMES: [&str; 5] = ["08:00", "09:00", "12:00", "18:00", "21:00"];

fn time_or_off(time: Option<&str>, locale: &str) -> String {
    match time {
        Some(time) => time.to_owned(),
        None => t!("settings.off", locale = locale).into_owned(),
    }
}

fn render_overview(user: &UserModel, locale: &str) -> String {
    t!(
        "settings.overview",
        locale = locale,
        debt_time = time_or_off(user.debt_notify_time.as_deref(), locale),
        rate_time = time_or_off(user.rate_alert_time.as_deref(), locale),
    )
    .into_owned()
}

fn overview_markup(locale: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineButtons::DebtTimeMenu.into_inline_keyboard_button(locale)],
        vec![InlineButtons::RateTimeMenu.into_inline_keyboard_button(locale)],
    ])
}

fn set_button(setting: TimeSetting, time: Option<String>, locale: &str) -> InlineKeyboardButton {
    let button = match setting {
        TimeSetting::DebtReport => InlineButtons::SetDebtTime(time),
        TimeSetting::RateAlert => InlineButtons::SetRateTime(time),
    };

    button.into_inline_keyboard_button(locale)
}

fn time_menu_markup(setting: TimeSetting, locale: &str) -> InlineKeyboardMarkup {
    let presets: Vec<InlineKeyboardButton> = PRESET_TIMES
        .iter()
        .map(|time| set_button(setting, Some((*time).to_owned()), locale))
        .collect();

    let mut rows: Vec<Vec<InlineKeyboardButton>> =
        presets.chunks(3).map(|chunk| chunk.to_vec()).collect();

    rows.push(vec![set_button(setting, None, locale)]);
    rows.push(vec![
        InlineButtons::SettingsMenu.into_inline_keyboard_button(locale),
    ]);

    InlineKeyboardMarkup::new(rows)
}

fn menu_title(setting: TimeSetting, locale: &str) -> String {
    match setting {
        TimeSetting::DebtReport => t!("settings.debt-time-menu", locale = locale),
        TimeSetting::RateAlert => t!("settings.rate-time-menu", locale = locale),
    }
    .into_owned()
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle_overview(
    app: &'static App,
    state: &UserState,
    chat_id: ChatId,
) -> anyhow::Result<HandleStatus> {
    app.bot()
        .send_message(chat_id, render_overview(state.user(), state.locale()))
        .parse_mode(ParseMode::Html)
        .reply_markup(overview_markup(state.locale()))
        .await?;

    Ok(HandleStatus::Handled)
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle_menu_inline(
    app: &'static App,
    state: &UserState,
    q: CallbackQuery,
) -> anyhow::Result<()> {
    let Some(message) = telegram_utils::require_callback_message(app, &q).await? else {
        return Ok(());
    };

    app.bot()
        .edit_text(&message, render_overview(state.user(), state.locale()))
        .parse_mode(ParseMode::Html)
        .reply_markup(overview_markup(state.locale()))
        .await?;

    app.bot().answer_callback_query(q.id).await?;

    Ok(())
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id(), setting = ?setting))]
pub async fn handle_time_menu_inline(
    app: &'static App,
    state: &UserState,
    q: CallbackQuery,
    setting: TimeSetting,
) -> anyhow::Result<()> {
    let Some(message) = telegram_utils::require_callback_message(app, &q).await? else {
        return Ok(());
    };

    app.bot()
        .edit_text(&message, menu_title(setting, state.locale()))
        .parse_mode(ParseMode::Html)
        .reply_markup(time_menu_markup(setting, state.locale()))
        .await?;

    app.bot().answer_callback_query(q.id).await?;

    Ok(())
}

/// Saves the chosen time and rebuilds the whole schedule. The rebuild
/// failing does not undo the save, jobs catch up on the next rebuild.
#[tracing::instrument(skip_all, fields(user_id = %state.user_id(), setting = ?setting, time = ?time))]
pub async fn handle_set_time_inline(
    app: &'static App,
    state: &UserState,
    q: CallbackQuery,
    setting: TimeSetting,
    time: Option<String>,
) -> anyhow::Result<()> {
    let Some(message) = telegram_utils::require_callback_message(app, &q).await? else {
        return Ok(());
    };

    let user = state.user().clone();

    let user = match setting {
        TimeSetting::DebtReport => UserService::set_debt_notify_time(app.db(), user, time).await?,
        TimeSetting::RateAlert => UserService::set_rate_alert_time(app.db(), user, time).await?,
    };

    if let Err(err) = jobs::rebuild(app).await {
        tracing::error!(err = ?err, "Schedule rebuild after settings change failed");
    }

    app.bot()
        .answer_callback_query(q.id)
        .text(t!("settings.saved", locale = state.locale()))
        .await?;

    app.bot()
        .edit_text(&message, render_overview(&user, state.locale()))
        .parse_mode(ParseMode::Html)
        .reply_markup(overview_markup(state.locale()))
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payloads(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|button| match &button.kind {
                teloxide::types::InlineKeyboardButtonKind::CallbackData(data) => {
                    Some(data.clone())
                },
                _ => None,
            })
            .collect()
    }

    #[test]
    fn debt_menu_offers_presets_disable_and_back() {
        let markup = time_menu_markup(TimeSetting::DebtReport, "en");
        let payloads = payloads(&markup);

        assert_eq!(payloads.len(), PRESET_TIMES.len() + 2);
        assert!(payloads.iter().all(|data| {
            data.contains("SetDebtTime") || data.contains("SettingsMenu")
        }));
    }

    #[test]
    fn rate_menu_targets_rate_setting() {
        let markup = time_menu_markup(TimeSetting::RateAlert, "en");

        assert!(payloads(&markup)
            .iter()
            .any(|data| data.contains("SetRateTime")));
        assert!(!payloads(&markup)
            .iter()
            .any(|data| data.contains("SetDebtTime")));
    }

    #[test]
    fn off_label_replaces_missing_time() {
        assert_eq!(time_or_off(Some("09:00"), "en"), "09:00");
        assert_ne!(time_or_off(None, "en"), "");
    }
}
