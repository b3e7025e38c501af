use teloxide::prelude::*;
use teloxide::sugar::bot::BotMessagesExt as _;
use teloxide::types::{InlineKeyboardMarkup, ParseMode};
use teloxide::utils::html;

use crate::app::App;
use crate::services::{DebtDraft, DebtParserService, DebtService, ParseOutcome};
use crate::telegram::forms::{self, FormState};
use crate::telegram::handlers::HandleStatus;
use crate::telegram::inline_buttons::InlineButtons;
use crate::telegram::utils as telegram_utils;
use crate::user::UserState;
use crate::utils;

fn render_preview(draft: &DebtDraft, locale: &str) -> String {
    let direction = if draft.direction.is_owe() {
        t!("debts.details-owe", locale = locale)
    } else {
        t!("debts.details-owed", locale = locale)
    };

    let comment = match &draft.comment {
        Some(comment) => html::escape(comment),
        None => t!("debts.no-comment", locale = locale).into_owned(),
    };

    t!(
        "ai.preview",
        locale = locale,
        person = html::escape(&draft.person),
        amount = utils::format_amount(draft.amount),
        currency = draft.currency.code(),
        direction = direction,
        due = utils::format_date(draft.due),
        comment = comment,
    )
    .into_owned()
}

fn preview_markup(locale: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineButtons::AiConfirm.into_inline_keyboard_button(locale),
        InlineButtons::AiDiscard.into_inline_keyboard_button(locale),
    ]])
}

/// Free text that is not a command or keyboard press. The model proposes
/// a draft, nothing is written until the user confirms it.
#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle(
    app: &'static App,
    state: &UserState,
    m: &Message,
    text: &str,
) -> anyhow::Result<HandleStatus> {
    let Some(ai) = app.ai() else {
        return Ok(HandleStatus::Skipped);
    };

    let locale = state.locale();

    let placeholder = app
        .bot()
        .send_message(m.chat.id, t!("ai.parsing", locale = locale))
        .await?;

    match DebtParserService::parse(ai, text, app.today()).await {
        Ok(ParseOutcome::Draft(draft)) => {
            forms::dialogue(app, m.chat.id)
                .update(FormState::AiPreview {
                    draft: draft.clone(),
                })
                .await?;

            app.bot()
                .edit_text(&placeholder, render_preview(&draft, locale))
                .parse_mode(ParseMode::Html)
                .reply_markup(preview_markup(locale))
                .await?;
        },
        Ok(ParseOutcome::Unparsable) => {
            app.bot()
                .edit_text(&placeholder, t!("ai.unparsable", locale = locale))
                .await?;
        },
        Err(err) => {
            tracing::error!(err = ?err, "Debt parser request failed");

            app.bot()
                .edit_text(&placeholder, t!("ai.failed", locale = locale))
                .await?;
        },
    }

    Ok(HandleStatus::Handled)
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle_confirm_inline(
    app: &'static App,
    state: &UserState,
    q: CallbackQuery,
) -> anyhow::Result<()> {
    let Some(message) = telegram_utils::require_callback_message(app, &q).await? else {
        return Ok(());
    };

    let dialogue = forms::dialogue(app, message.chat.id);

    let FormState::AiPreview { draft } = dialogue.get().await?.unwrap_or_default() else {
        app.bot()
            .answer_callback_query(q.id.clone())
            .text(t!("ai.stale", locale = state.locale()))
            .await?;

        return Ok(());
    };

    let debt = DebtService::create(app.db(), state.user_id(), draft).await?;

    dialogue.exit().await?;

    app.bot()
        .edit_text(
            &message,
            t!(
                "ai.saved",
                locale = state.locale(),
                person = html::escape(&debt.person),
                amount = utils::format_amount(debt.amount),
                currency = debt.currency.code(),
                due = utils::format_date(debt.due),
            ),
        )
        .parse_mode(ParseMode::Html)
        .await?;

    app.bot().answer_callback_query(q.id).await?;

    Ok(())
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle_discard_inline(
    app: &'static App,
    state: &UserState,
    q: CallbackQuery,
) -> anyhow::Result<()> {
    let Some(message) = telegram_utils::require_callback_message(app, &q).await? else {
        return Ok(());
    };

    let dialogue = forms::dialogue(app, message.chat.id);

    if matches!(
        dialogue.get().await?.unwrap_or_default(),
        FormState::AiPreview { .. }
    ) {
        dialogue.exit().await?;
    }

    app.bot()
        .edit_text(&message, t!("ai.discarded", locale = state.locale()))
        .await?;

    app.bot().answer_callback_query(q.id).await?;

    Ok(())
}
