use anyhow::Context;
use teloxide::prelude::*;
use teloxide::utils::command::{BotCommands, ParseError};

use super::HandleStatus;
use crate::app::App;
use crate::telegram::actions;
use crate::telegram::commands::UserCommand;
use crate::user::UserState;

pub async fn handle(
    app: &'static App,
    state: &UserState,
    m: &Message,
) -> anyhow::Result<HandleStatus> {
    let text = m.text().context("No text available")?;

    if !text.starts_with('/') {
        return Ok(HandleStatus::Skipped);
    }

    let command = match UserCommand::parse(text, "QarzBot") {
        Err(ParseError::UnknownCommand(_)) => {
            actions::help::handle_unknown_command(app, state, m.chat.id).await?;

            return Ok(HandleStatus::Handled);
        },
        Err(ParseError::IncorrectFormat(_)) => return Ok(HandleStatus::Skipped),
        Err(var) => return Err(var.into()),
        Ok(command) => command,
    };

    match command {
        UserCommand::Start { payload } => {
            return actions::start::handle(app, state, m, &payload).await;
        },
        UserCommand::Help => {
            return actions::help::handle(app, state, m.chat.id).await;
        },
        UserCommand::Debts => {
            return actions::debts::handle_list(app, state, m.chat.id).await;
        },
        UserCommand::Add => {
            return actions::debt_form::start(app, state, m.chat.id).await;
        },
        UserCommand::Reminders => {
            return actions::reminders::handle_list(app, state, m.chat.id).await;
        },
        UserCommand::Rates => {
            return actions::rates::handle(app, state, m.chat.id).await;
        },
        UserCommand::Export => {
            return actions::export::handle(app, state, m.chat.id).await;
        },
        UserCommand::Settings => {
            return actions::settings::handle_overview(app, state, m.chat.id).await;
        },
        UserCommand::Language => {
            return actions::language::handle_prompt(app, state, m.chat.id).await;
        },
        UserCommand::Cancel => {
            return actions::cancel::handle(app, state, m.chat.id).await;
        },
    }
}
