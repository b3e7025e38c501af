use chrono::NaiveDateTime;
use teloxide::payloads::EditMessageTextSetters as _;
use teloxide::prelude::*;
use teloxide::sugar::bot::BotMessagesExt as _;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, Message, ParseMode};
use teloxide::utils::html;

use crate::app::App;
use crate::entity::prelude::*;
use crate::services::ReminderService;
use crate::telegram::forms::{self, FormDialogue, FormState};
use crate::telegram::handlers::HandleStatus;
use crate::telegram::inline_buttons::InlineButtons;
use crate::telegram::keyboards::{self, StartKeyboard};
use crate::telegram::utils as telegram_utils;
use crate::user::UserState;
use crate::utils;

fn repeat_label(repeat: &ReminderRepeat, locale: &str) -> String {
    match repeat {
        ReminderRepeat::None => t!("reminder-form.repeat-once", locale = locale),
        ReminderRepeat::Daily => t!("reminder-form.repeat-daily", locale = locale),
        ReminderRepeat::Monthly => t!("reminder-form.repeat-monthly", locale = locale),
    }
    .into_owned()
}

fn parse_repeat(text: &str, locale: &str) -> Option<ReminderRepeat> {
    let candidates = [
        ReminderRepeat::None,
        ReminderRepeat::Daily,
        ReminderRepeat::Monthly,
    ];

    if let Some(repeat) = candidates
        .iter()
        .find(|repeat| text == repeat_label(repeat, locale))
    {
        return Some(repeat.clone());
    }

    match text.trim().to_ascii_lowercase().as_str() {
        "once" => Some(ReminderRepeat::None),
        "daily" => Some(ReminderRepeat::Daily),
        "monthly" => Some(ReminderRepeat::Monthly),
        _ => None,
    }
}

fn parse_reminder_due(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();

    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%d.%m.%Y %H:%M"))
        .ok()
}

struct RemindersView {
    text: String,
    markup: InlineKeyboardMarkup,
}

fn render_list(reminders: &[ReminderModel], locale: &str) -> RemindersView {
    if reminders.is_empty() {
        return RemindersView {
            text: t!("reminders.empty", locale = locale).into_owned(),
            markup: InlineKeyboardMarkup::new(vec![vec![
                InlineButtons::ReminderAdd.into_inline_keyboard_button(locale),
            ]]),
        };
    }

    let mut lines = vec![t!("reminders.title", locale = locale, count = reminders.len()).into_owned()];

    for (i, reminder) in reminders.iter().enumerate() {
        lines.push(
            t!(
                "reminders.line",
                locale = locale,
                n = i + 1,
                text = html::escape(&reminder.text),
                due = utils::format_datetime(reminder.due),
                repeat = repeat_label(&reminder.repeat, locale),
            )
            .into_owned(),
        );
    }

    let delete_buttons: Vec<InlineKeyboardButton> = reminders
        .iter()
        .enumerate()
        .map(|(i, reminder)| {
            InlineKeyboardButton::new(
                format!("🗑 {}", i + 1),
                InlineButtons::ReminderDelete(reminder.id).into(),
            )
        })
        .collect();

    let mut rows: Vec<Vec<InlineKeyboardButton>> = delete_buttons
        .chunks(5)
        .map(|chunk| chunk.to_vec())
        .collect();

    rows.push(vec![
        InlineButtons::ReminderAdd.into_inline_keyboard_button(locale),
    ]);

    RemindersView {
        text: lines.join("\n"),
        markup: InlineKeyboardMarkup::new(rows),
    }
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle_list(
    app: &'static App,
    state: &UserState,
    chat_id: ChatId,
) -> anyhow::Result<HandleStatus> {
    let reminders = ReminderService::list(app.db(), state.user_id()).await?;

    let view = render_list(&reminders, state.locale());

    app.bot()
        .send_message(chat_id, view.text)
        .parse_mode(ParseMode::Html)
        .reply_markup(view.markup)
        .await?;

    Ok(HandleStatus::Handled)
}

async fn edit_to_list(
    app: &'static App,
    state: &UserState,
    message: &Message,
) -> anyhow::Result<()> {
    let reminders = ReminderService::list(app.db(), state.user_id()).await?;

    let view = render_list(&reminders, state.locale());

    app.bot()
        .edit_text(message, view.text)
        .parse_mode(ParseMode::Html)
        .reply_markup(view.markup)
        .await?;

    Ok(())
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle_add_inline(
    app: &'static App,
    state: &UserState,
    q: CallbackQuery,
) -> anyhow::Result<()> {
    let Some(message) = telegram_utils::require_callback_message(app, &q).await? else {
        return Ok(());
    };

    forms::dialogue(app, message.chat.id)
        .update(FormState::ReminderText)
        .await?;

    app.bot()
        .send_message(
            message.chat.id,
            t!("reminder-form.text", locale = state.locale()),
        )
        .await?;

    app.bot().answer_callback_query(q.id).await?;

    Ok(())
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id(), reminder_id))]
pub async fn handle_delete_inline(
    app: &'static App,
    state: &UserState,
    q: CallbackQuery,
    reminder_id: i64,
) -> anyhow::Result<()> {
    let Some(message) = telegram_utils::require_callback_message(app, &q).await? else {
        return Ok(());
    };

    let deleted = ReminderService::delete(app.db(), reminder_id, state.user_id()).await?;

    let toast = if deleted {
        t!("reminders.deleted-toast", locale = state.locale())
    } else {
        t!("reminders.not-found", locale = state.locale())
    };

    app.bot().answer_callback_query(q.id).text(toast).await?;

    if deleted {
        edit_to_list(app, state, &message).await?;
    }

    Ok(())
}

/// Advances the add-reminder flow. The due step refuses timestamps that
/// are already in the past, a reminder that can never fire is a bug in
/// waiting.
#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle_step(
    app: &'static App,
    state: &UserState,
    chat_id: ChatId,
    dialogue: &FormDialogue,
    form: FormState,
    text: &str,
) -> anyhow::Result<HandleStatus> {
    let locale = state.locale();

    match form {
        FormState::ReminderText => {
            let text = text.trim();

            if text.is_empty() {
                app.bot()
                    .send_message(chat_id, t!("reminder-form.text-empty", locale = locale))
                    .await?;

                return Ok(HandleStatus::Handled);
            }

            dialogue
                .update(FormState::ReminderDue {
                    text: text.to_owned(),
                })
                .await?;

            app.bot()
                .send_message(chat_id, t!("reminder-form.due", locale = locale))
                .await?;
        },
        FormState::ReminderDue { text: reminder_text } => {
            let Some(due) = parse_reminder_due(text) else {
                app.bot()
                    .send_message(chat_id, t!("reminder-form.due-invalid", locale = locale))
                    .await?;

                return Ok(HandleStatus::Handled);
            };

            if due <= app.now_local() {
                app.bot()
                    .send_message(chat_id, t!("reminder-form.due-past", locale = locale))
                    .await?;

                return Ok(HandleStatus::Handled);
            }

            dialogue
                .update(FormState::ReminderRepeat {
                    text: reminder_text,
                    due,
                })
                .await?;

            app.bot()
                .send_message(chat_id, t!("reminder-form.repeat", locale = locale))
                .reply_markup(keyboards::form::repeats(locale))
                .await?;
        },
        FormState::ReminderRepeat { text: reminder_text, due } => {
            let Some(repeat) = parse_repeat(text, locale) else {
                app.bot()
                    .send_message(chat_id, t!("reminder-form.repeat-invalid", locale = locale))
                    .reply_markup(keyboards::form::repeats(locale))
                    .await?;

                return Ok(HandleStatus::Handled);
            };

            let reminder = ReminderService::create(
                app.db(),
                state.user_id(),
                reminder_text,
                due,
                repeat,
            )
            .await?;

            dialogue.exit().await?;

            app.bot()
                .send_message(
                    chat_id,
                    t!(
                        "reminder-form.created",
                        locale = locale,
                        due = utils::format_datetime(reminder.due),
                        repeat = repeat_label(&reminder.repeat, locale),
                    ),
                )
                .reply_markup(StartKeyboard::markup(locale))
                .await?;
        },
        _ => return Ok(HandleStatus::Skipped),
    }

    Ok(HandleStatus::Handled)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn due_accepts_both_date_orders() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 16)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();

        assert_eq!(parse_reminder_due("2025-03-16 09:30"), Some(expected));
        assert_eq!(parse_reminder_due("16.03.2025 09:30"), Some(expected));
    }

    #[test]
    fn due_requires_a_time() {
        for input in ["2025-03-16", "09:30", "next tuesday", ""] {
            assert_eq!(
                parse_reminder_due(input),
                None,
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn repeat_parses_labels_in_every_locale() {
        for locale in rust_i18n::available_locales!() {
            for repeat in [
                ReminderRepeat::None,
                ReminderRepeat::Daily,
                ReminderRepeat::Monthly,
            ] {
                let label = repeat_label(&repeat, locale);

                assert_eq!(
                    parse_repeat(&label, locale),
                    Some(repeat.clone()),
                    "label {label:?} should map back in locale {locale}"
                );
            }
        }
    }

    #[test]
    fn repeat_accepts_keywords() {
        assert_eq!(parse_repeat("ONCE", "en"), Some(ReminderRepeat::None));
        assert_eq!(parse_repeat("daily", "en"), Some(ReminderRepeat::Daily));
        assert_eq!(parse_repeat("weekly", "en"), None);
    }
}
