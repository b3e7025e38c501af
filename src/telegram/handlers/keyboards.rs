use anyhow::Context;
use teloxide::prelude::*;

use super::HandleStatus;
use crate::app::App;
use crate::telegram::actions;
use crate::telegram::keyboards::{LanguageKeyboard, StartKeyboard};
use crate::user::UserState;

pub async fn handle(
    app: &'static App,
    state: &UserState,
    m: &Message,
) -> anyhow::Result<HandleStatus> {
    let text = m.text().context("No text available")?;

    if let Some(button) = LanguageKeyboard::parse(text) {
        return actions::language::handle(app, state, m, button.into_locale()).await;
    }

    let Some(button) = StartKeyboard::from_str(text, state.locale()) else {
        return Ok(HandleStatus::Skipped);
    };

    match button {
        StartKeyboard::Debts => actions::debts::handle_list(app, state, m.chat.id).await,
        StartKeyboard::AddDebt => actions::debt_form::start(app, state, m.chat.id).await,
        StartKeyboard::Reminders => actions::reminders::handle_list(app, state, m.chat.id).await,
        StartKeyboard::Rates => actions::rates::handle(app, state, m.chat.id).await,
        StartKeyboard::Settings => actions::settings::handle_overview(app, state, m.chat.id).await,
    }
}
