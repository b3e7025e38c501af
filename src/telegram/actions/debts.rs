use chrono::{Days, NaiveDate};
use teloxide::payloads::EditMessageTextSetters as _;
use teloxide::prelude::*;
use teloxide::sugar::bot::BotMessagesExt as _;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, Message, ParseMode};
use teloxide::utils::html;

use crate::app::App;
use crate::entity::prelude::*;
use crate::errors::BotError;
use crate::services::DebtService;
use crate::telegram::handlers::HandleStatus;
use crate::telegram::inline_buttons::InlineButtons;
use crate::telegram::keyboards::StartKeyboard;
use crate::telegram::utils as telegram_utils;
use crate::user::UserState;
use crate::utils;

const PAGE_SIZE: usize = 5;

struct DebtsPage {
    text: String,
    markup: InlineKeyboardMarkup,
}

fn render_line(n: usize, debt: &DebtModel, locale: &str, today: NaiveDate) -> String {
    let key = if debt.direction.is_owe() {
        "debts.line-owe"
    } else {
        "debts.line-owed"
    };

    let line = t!(
        key,
        locale = locale,
        n = n,
        person = html::escape(&debt.person),
        amount = utils::format_amount(debt.amount),
        currency = debt.currency.code(),
        due = utils::format_date(debt.due),
    );

    if debt.is_overdue(today) {
        format!("❗️ {line}")
    } else {
        line.into_owned()
    }
}

/// One page of the open debt list. A stale page number, from a button
/// pressed after rows went away, is clamped to the last page.
fn render_page(debts: &[DebtModel], page: u64, locale: &str, today: NaiveDate) -> DebtsPage {
    let pages = debts.len().div_ceil(PAGE_SIZE).max(1);
    let page = (page as usize).min(pages - 1);

    let start = page * PAGE_SIZE;
    let slice = &debts[start..(start + PAGE_SIZE).min(debts.len())];

    let mut lines = vec![t!(
        "debts.title",
        locale = locale,
        page = page + 1,
        pages = pages,
        count = debts.len(),
    )
    .into_owned()];

    for (i, debt) in slice.iter().enumerate() {
        lines.push(render_line(start + i + 1, debt, locale, today));
    }

    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    let detail_buttons: Vec<InlineKeyboardButton> = slice
        .iter()
        .enumerate()
        .map(|(i, debt)| {
            InlineKeyboardButton::new(
                (start + i + 1).to_string(),
                InlineButtons::DebtDetails(debt.id).into(),
            )
        })
        .collect();

    for chunk in detail_buttons.chunks(PAGE_SIZE) {
        rows.push(chunk.to_vec());
    }

    let mut nav = Vec::new();

    if page > 0 {
        nav.push(InlineKeyboardButton::new(
            "⬅️",
            InlineButtons::DebtsPage(page as u64 - 1).into(),
        ));
    }

    if page + 1 < pages {
        nav.push(InlineKeyboardButton::new(
            "➡️",
            InlineButtons::DebtsPage(page as u64 + 1).into(),
        ));
    }

    if !nav.is_empty() {
        rows.push(nav);
    }

    DebtsPage {
        text: lines.join("\n"),
        markup: InlineKeyboardMarkup::new(rows),
    }
}

fn render_details(debt: &DebtModel, locale: &str, today: NaiveDate) -> String {
    let direction = if debt.direction.is_owe() {
        t!("debts.details-owe", locale = locale)
    } else {
        t!("debts.details-owed", locale = locale)
    };

    let status = if debt.closed {
        t!("debts.status-closed", locale = locale)
    } else if debt.is_overdue(today) {
        t!("debts.status-overdue", locale = locale)
    } else {
        t!("debts.status-open", locale = locale)
    };

    let comment = match &debt.comment {
        Some(comment) => html::escape(comment),
        None => t!("debts.no-comment", locale = locale).into_owned(),
    };

    t!(
        "debts.details",
        locale = locale,
        person = html::escape(&debt.person),
        amount = utils::format_amount(debt.amount),
        currency = debt.currency.code(),
        direction = direction,
        date = utils::format_date(debt.date),
        due = utils::format_date(debt.due),
        status = status,
        comment = comment,
    )
    .into_owned()
}

fn details_markup(debt_id: i64, locale: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineButtons::DebtClose(debt_id).into_inline_keyboard_button(locale)],
        vec![
            InlineButtons::DebtExtend(debt_id, 1).into_inline_keyboard_button(locale),
            InlineButtons::DebtExtend(debt_id, 7).into_inline_keyboard_button(locale),
            InlineButtons::DebtExtend(debt_id, 30).into_inline_keyboard_button(locale),
        ],
        vec![InlineButtons::DebtEditComment(debt_id).into_inline_keyboard_button(locale)],
        vec![InlineButtons::DebtDelete(debt_id).into_inline_keyboard_button(locale)],
        vec![InlineKeyboardButton::new(
            t!("inline-buttons.back", locale = locale).into_owned(),
            InlineButtons::DebtsPage(0).into(),
        )],
    ])
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle_list(
    app: &'static App,
    state: &UserState,
    chat_id: ChatId,
) -> anyhow::Result<HandleStatus> {
    let debts = DebtService::get_open(app.db(), state.user_id()).await?;

    if debts.is_empty() {
        app.bot()
            .send_message(chat_id, t!("debts.empty", locale = state.locale()))
            .reply_markup(StartKeyboard::markup(state.locale()))
            .await?;

        return Ok(HandleStatus::Handled);
    }

    let page = render_page(&debts, 0, state.locale(), app.today());

    app.bot()
        .send_message(chat_id, page.text)
        .parse_mode(ParseMode::Html)
        .reply_markup(page.markup)
        .await?;

    Ok(HandleStatus::Handled)
}

async fn edit_to_list(
    app: &'static App,
    state: &UserState,
    message: &Message,
    page: u64,
) -> anyhow::Result<()> {
    let debts = DebtService::get_open(app.db(), state.user_id()).await?;

    if debts.is_empty() {
        app.bot()
            .edit_text(message, t!("debts.empty", locale = state.locale()))
            .await?;

        return Ok(());
    }

    let page = render_page(&debts, page, state.locale(), app.today());

    app.bot()
        .edit_text(message, page.text)
        .parse_mode(ParseMode::Html)
        .reply_markup(page.markup)
        .await?;

    Ok(())
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id(), page))]
pub async fn handle_page_inline(
    app: &'static App,
    state: &UserState,
    q: CallbackQuery,
    page: u64,
) -> anyhow::Result<()> {
    let Some(message) = telegram_utils::require_callback_message(app, &q).await? else {
        return Ok(());
    };

    edit_to_list(app, state, &message, page).await?;

    app.bot().answer_callback_query(q.id).await?;

    Ok(())
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id(), debt_id))]
pub async fn handle_details_inline(
    app: &'static App,
    state: &UserState,
    q: CallbackQuery,
    debt_id: i64,
) -> anyhow::Result<()> {
    let Some(message) = telegram_utils::require_callback_message(app, &q).await? else {
        return Ok(());
    };

    let debt = match DebtService::get_by_id(app.db(), debt_id, state.user_id()).await {
        Ok(debt) => debt,
        Err(BotError::NotFound { .. }) => {
            app.bot()
                .answer_callback_query(q.id.clone())
                .text(t!("debts.not-found", locale = state.locale()))
                .await?;

            return Ok(());
        },
        Err(err) => return Err(err.into()),
    };

    app.bot()
        .edit_text(&message, render_details(&debt, state.locale(), app.today()))
        .parse_mode(ParseMode::Html)
        .reply_markup(details_markup(debt.id, state.locale()))
        .await?;

    app.bot().answer_callback_query(q.id).await?;

    Ok(())
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id(), debt_id))]
pub async fn handle_close_inline(
    app: &'static App,
    state: &UserState,
    q: CallbackQuery,
    debt_id: i64,
) -> anyhow::Result<()> {
    let Some(message) = telegram_utils::require_callback_message(app, &q).await? else {
        return Ok(());
    };

    match DebtService::close(app.db(), debt_id, state.user_id()).await {
        Ok(_) => {},
        Err(BotError::NotFound { .. }) => {
            app.bot()
                .answer_callback_query(q.id.clone())
                .text(t!("debts.not-found", locale = state.locale()))
                .await?;

            return Ok(());
        },
        Err(err) => return Err(err.into()),
    };

    app.bot()
        .answer_callback_query(q.id)
        .text(t!("debts.closed-toast", locale = state.locale()))
        .await?;

    edit_to_list(app, state, &message, 0).await?;

    Ok(())
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id(), debt_id))]
pub async fn handle_delete_inline(
    app: &'static App,
    state: &UserState,
    q: CallbackQuery,
    debt_id: i64,
) -> anyhow::Result<()> {
    let Some(message) = telegram_utils::require_callback_message(app, &q).await? else {
        return Ok(());
    };

    let deleted = DebtService::soft_delete(app.db(), debt_id, state.user_id()).await?;

    let toast = if deleted {
        t!("debts.deleted-toast", locale = state.locale())
    } else {
        t!("debts.not-found", locale = state.locale())
    };

    app.bot().answer_callback_query(q.id).text(toast).await?;

    if deleted {
        edit_to_list(app, state, &message, 0).await?;
    }

    Ok(())
}

#[tracing::instrument(skip_all, fields(user_id = %state.user_id(), debt_id, days))]
pub async fn handle_extend_inline(
    app: &'static App,
    state: &UserState,
    q: CallbackQuery,
    debt_id: i64,
    days: i64,
) -> anyhow::Result<()> {
    let Some(message) = telegram_utils::require_callback_message(app, &q).await? else {
        return Ok(());
    };

    let debt = match DebtService::get_by_id(app.db(), debt_id, state.user_id()).await {
        Ok(debt) => debt,
        Err(BotError::NotFound { .. }) => {
            app.bot()
                .answer_callback_query(q.id.clone())
                .text(t!("debts.not-found", locale = state.locale()))
                .await?;

            return Ok(());
        },
        Err(err) => return Err(err.into()),
    };

    let new_due = debt
        .due
        .checked_add_days(Days::new(days.unsigned_abs()))
        .unwrap_or(debt.due);

    let debt = DebtService::extend(app.db(), debt_id, state.user_id(), new_due).await?;

    app.bot()
        .answer_callback_query(q.id)
        .text(t!(
            "debts.extended-toast",
            locale = state.locale(),
            due = utils::format_date(new_due),
        ))
        .await?;

    app.bot()
        .edit_text(&message, render_details(&debt, state.locale(), app.today()))
        .parse_mode(ParseMode::Html)
        .reply_markup(details_markup(debt.id, state.locale()))
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn debt(id: i64, person: &str, due: NaiveDate) -> DebtModel {
        let now = due.and_hms_opt(0, 0, 0).unwrap();

        DebtModel {
            id,
            user_id: 1,
            person: person.to_owned(),
            amount: 100_000,
            currency: Currency::Uzs,
            direction: DebtDirection::Owe,
            date: due,
            due,
            comment: None,
            closed: false,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn line_numbers(text: &str) -> Vec<usize> {
        text.lines()
            .filter_map(|line| {
                line.trim_start_matches("❗️ ")
                    .split('.')
                    .next()
                    .and_then(|n| n.parse().ok())
            })
            .collect()
    }

    #[test]
    fn first_page_numbers_from_one() {
        let debts: Vec<_> = (1..=7).map(|i| debt(i, "Person", day(20))).collect();

        let page = render_page(&debts, 0, "en", day(10));

        assert_eq!(line_numbers(&page.text), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn second_page_continues_numbering() {
        let debts: Vec<_> = (1..=7).map(|i| debt(i, "Person", day(20))).collect();

        let page = render_page(&debts, 1, "en", day(10));

        assert_eq!(line_numbers(&page.text), vec![6, 7]);
    }

    #[test]
    fn stale_page_is_clamped() {
        let debts: Vec<_> = (1..=3).map(|i| debt(i, "Person", day(20))).collect();

        let page = render_page(&debts, 9, "en", day(10));

        assert_eq!(line_numbers(&page.text), vec![1, 2, 3]);
    }

    #[test]
    fn overdue_rows_are_marked() {
        let debts = vec![debt(1, "Late", day(5)), debt(2, "Fine", day(25))];

        let page = render_page(&debts, 0, "en", day(10));

        let marked: Vec<_> = page
            .text
            .lines()
            .filter(|line| line.starts_with("❗️"))
            .collect();

        assert_eq!(marked.len(), 1);
        assert!(marked[0].contains("Late"));
    }

    #[test]
    fn names_are_html_escaped() {
        let debts = vec![debt(1, "<b>Sly</b>", day(20))];

        let page = render_page(&debts, 0, "en", day(10));

        assert!(page.text.contains("&lt;b&gt;Sly&lt;/b&gt;"));
    }

    #[test]
    fn nav_buttons_match_position() {
        let debts: Vec<_> = (1..=12).map(|i| debt(i, "Person", day(20))).collect();

        let first = render_page(&debts, 0, "en", day(10));
        let last_row = first.markup.inline_keyboard.last().unwrap();
        assert_eq!(last_row.len(), 1, "first page only points forward");

        let middle = render_page(&debts, 1, "en", day(10));
        let last_row = middle.markup.inline_keyboard.last().unwrap();
        assert_eq!(last_row.len(), 2, "middle page points both ways");
    }
}
