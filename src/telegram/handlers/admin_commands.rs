use anyhow::Context;
use teloxide::prelude::*;
use teloxide::utils::command::{BotCommands, ParseError};

use super::HandleStatus;
use crate::app::App;
use crate::telegram::actions;
use crate::telegram::commands::AdminCommand;
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

    let command = match AdminCommand::parse(text, "QarzBot") {
        Err(ParseError::UnknownCommand(_)) => return Ok(HandleStatus::Skipped),
        Err(ParseError::IncorrectFormat(_)) => return Ok(HandleStatus::Skipped),
        Err(ParseError::TooFewArguments { message, .. }) => {
            app.bot().send_message(m.chat.id, message).await?;

            return Ok(HandleStatus::Handled);
        },
        Err(var) => return Err(var.into()),
        Ok(command) => command,
    };

    match command {
        AdminCommand::Admin => {
            app.bot()
                .send_message(
                    m.chat.id,
                    AdminCommand::descriptions()
                        .global_description("Admin commands available to you")
                        .to_string(),
                )
                .await?;
        },
        AdminCommand::GlobalStats => {
            return actions::global_stats::handle(app, state, m).await;
        },
        AdminCommand::Broadcast { text } => {
            return actions::broadcast::handle(app, state, m, &text).await;
        },
        AdminCommand::ScheduleBroadcast { date, time, text } => {
            return actions::schedule_broadcast::handle(app, state, m, &date, &time, &text).await;
        },
        AdminCommand::Rebuild => {
            return actions::rebuild::handle(app, state, m).await;
        },
    }

    Ok(HandleStatus::Handled)
}
