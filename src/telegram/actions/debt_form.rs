use chrono::{Days, NaiveDate};
use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};

use crate::app::App;
use crate::entity::prelude::*;
use crate::errors::BotError;
use crate::services::{DebtChanges, DebtDraft, DebtService};
use crate::telegram::forms::{self, FormDialogue, FormState};
use crate::telegram::handlers::HandleStatus;
use crate::telegram::keyboards::{self, StartKeyboard};
use crate::telegram::utils as telegram_utils;
use crate::user::UserState;
use crate::utils;

/// Optional steps accept this to fall back to the default.
const SKIP: &str = "-";

const DEFAULT_DUE_DAYS: u64 = 7;

fn parse_amount(text: &str) -> Option<i64> {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let amount: i64 = cleaned.parse().ok()?;

    (amount > 0).then_some(amount)
}

fn parse_due(text: &str) -> Option<NaiveDate> {
    let text = text.trim();

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(text, "%d.%m.%Y"))
        .ok()
}

fn parse_direction(text: &str, locale: &str) -> Option<DebtDirection> {
    if text == t!("debt-form.direction-owe", locale = locale) {
        return Some(DebtDirection::Owe);
    }

    if text == t!("debt-form.direction-owed", locale = locale) {
        return Some(DebtDirection::Owed);
    }

    DebtDirection::from_keyword(text)
}

fn default_due(app: &App) -> NaiveDate {
    app.today()
        .checked_add_days(Days::new(DEFAULT_DUE_DAYS))
        .unwrap_or_else(|| app.today())
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn start(
    app: &'static App,
    state: &UserState,
    chat_id: ChatId,
) -> anyhow::Result<HandleStatus> {
    forms::dialogue(app, chat_id)
        .update(FormState::DebtPerson)
        .await?;

    app.bot()
        .send_message(chat_id, t!("debt-form.person", locale = state.locale()))
        .await?;

    Ok(HandleStatus::Handled)
}

/// Advances the add-debt flow one message at a time. Bad input keeps the
/// dialogue on the same step and repeats the prompt.
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
        FormState::DebtPerson => {
            let person = text.trim();

            if person.is_empty() {
                app.bot()
                    .send_message(chat_id, t!("debt-form.person-empty", locale = locale))
                    .await?;

                return Ok(HandleStatus::Handled);
            }

            dialogue
                .update(FormState::DebtAmount {
                    person: person.to_owned(),
                })
                .await?;

            app.bot()
                .send_message(chat_id, t!("debt-form.amount", locale = locale))
                .await?;
        },
        FormState::DebtAmount { person } => {
            let Some(amount) = parse_amount(text) else {
                app.bot()
                    .send_message(chat_id, t!("debt-form.amount-invalid", locale = locale))
                    .await?;

                return Ok(HandleStatus::Handled);
            };

            dialogue
                .update(FormState::DebtCurrency { person, amount })
                .await?;

            app.bot()
                .send_message(chat_id, t!("debt-form.currency", locale = locale))
                .reply_markup(keyboards::form::currencies())
                .await?;
        },
        FormState::DebtCurrency { person, amount } => {
            let currency = if text.trim() == SKIP {
                Currency::default()
            } else {
                match Currency::from_code(text) {
                    Some(currency) => currency,
                    None => {
                        app.bot()
                            .send_message(
                                chat_id,
                                t!("debt-form.currency-invalid", locale = locale),
                            )
                            .reply_markup(keyboards::form::currencies())
                            .await?;

                        return Ok(HandleStatus::Handled);
                    },
                }
            };

            dialogue
                .update(FormState::DebtDirection {
                    person,
                    amount,
                    currency,
                })
                .await?;

            app.bot()
                .send_message(chat_id, t!("debt-form.direction", locale = locale))
                .reply_markup(keyboards::form::directions(locale))
                .await?;
        },
        FormState::DebtDirection {
            person,
            amount,
            currency,
        } => {
            let Some(direction) = parse_direction(text, locale) else {
                app.bot()
                    .send_message(chat_id, t!("debt-form.direction-invalid", locale = locale))
                    .reply_markup(keyboards::form::directions(locale))
                    .await?;

                return Ok(HandleStatus::Handled);
            };

            dialogue
                .update(FormState::DebtDue {
                    person,
                    amount,
                    currency,
                    direction,
                })
                .await?;

            app.bot()
                .send_message(
                    chat_id,
                    t!(
                        "debt-form.due",
                        locale = locale,
                        default = utils::format_date(default_due(app)),
                    ),
                )
                .await?;
        },
        FormState::DebtDue {
            person,
            amount,
            currency,
            direction,
        } => {
            let due = if text.trim() == SKIP {
                default_due(app)
            } else {
                match parse_due(text) {
                    Some(due) => due,
                    None => {
                        app.bot()
                            .send_message(chat_id, t!("debt-form.due-invalid", locale = locale))
                            .await?;

                        return Ok(HandleStatus::Handled);
                    },
                }
            };

            let draft = DebtDraft {
                person,
                amount,
                currency,
                direction,
                date: app.today(),
                due,
                comment: None,
            };

            dialogue.update(FormState::DebtComment { draft }).await?;

            app.bot()
                .send_message(chat_id, t!("debt-form.comment", locale = locale))
                .await?;
        },
        FormState::DebtComment { draft } => {
            let comment = if text.trim() == SKIP {
                None
            } else {
                Some(text.trim().to_owned())
            };

            let debt = DebtService::create(
                app.db(),
                state.user_id(),
                DebtDraft { comment, ..draft },
            )
            .await?;

            dialogue.exit().await?;

            app.bot()
                .send_message(
                    chat_id,
                    t!(
                        "debt-form.created",
                        locale = locale,
                        person = teloxide::utils::html::escape(&debt.person),
                        amount = utils::format_amount(debt.amount),
                        currency = debt.currency.code(),
                        due = utils::format_date(debt.due),
                    ),
                )
                .parse_mode(ParseMode::Html)
                .reply_markup(StartKeyboard::markup(locale))
                .await?;
        },
        _ => return Ok(HandleStatus::Skipped),
    }

    Ok(HandleStatus::Handled)
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id(), debt_id))]
pub async fn handle_edit_comment(
    app: &'static App,
    state: &UserState,
    chat_id: ChatId,
    dialogue: &FormDialogue,
    debt_id: i64,
    text: &str,
) -> anyhow::Result<HandleStatus> {
    let comment = if text.trim() == SKIP {
        None
    } else {
        Some(text.trim().to_owned())
    };

    let changes = DebtChanges {
        comment: Some(comment),
        ..Default::default()
    };

    match DebtService::update(app.db(), debt_id, state.user_id(), changes).await {
        Ok(_) => {
            dialogue.exit().await?;

            app.bot()
                .send_message(chat_id, t!("debt-form.comment-saved", locale = state.locale()))
                .reply_markup(StartKeyboard::markup(state.locale()))
                .await?;
        },
        Err(BotError::NotFound { .. }) => {
            dialogue.exit().await?;

            app.bot()
                .send_message(chat_id, t!("debts.not-found", locale = state.locale()))
                .reply_markup(StartKeyboard::markup(state.locale()))
                .await?;
        },
        Err(err) => return Err(err.into()),
    }

    Ok(HandleStatus::Handled)
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id(), debt_id))]
pub async fn handle_edit_comment_inline(
    app: &'static App,
    state: &UserState,
    q: CallbackQuery,
    debt_id: i64,
) -> anyhow::Result<()> {
    let Some(message) = telegram_utils::require_callback_message(app, &q).await? else {
        return Ok(());
    };

    forms::dialogue(app, message.chat.id)
        .update(FormState::DebtEditComment { debt_id })
        .await?;

    app.bot()
        .send_message(
            message.chat.id,
            t!("debt-form.comment-edit", locale = state.locale()),
        )
        .await?;

    app.bot().answer_callback_query(q.id).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_ignore_digit_grouping() {
        assert_eq!(parse_amount("1500000"), Some(1_500_000));
        assert_eq!(parse_amount(" 1 500 000 "), Some(1_500_000));
    }

    #[test]
    fn amounts_must_be_positive_integers() {
        for input in ["0", "-5", "12.50", "soon", ""] {
            assert_eq!(parse_amount(input), None, "{input:?} should be rejected");
        }
    }

    #[test]
    fn due_dates_accept_both_orders() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 16).unwrap();

        assert_eq!(parse_due("2025-03-16"), Some(expected));
        assert_eq!(parse_due("16.03.2025"), Some(expected));
        assert_eq!(parse_due("tomorrow"), None);
    }

    #[test]
    fn direction_accepts_labels_and_keywords() {
        let owe_label = t!("debt-form.direction-owe", locale = "en");

        assert_eq!(parse_direction(&owe_label, "en"), Some(DebtDirection::Owe));
        assert_eq!(parse_direction("owed", "en"), Some(DebtDirection::Owed));
        assert_eq!(parse_direction("sideways", "en"), None);
    }
}
