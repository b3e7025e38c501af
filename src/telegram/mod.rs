use handlers::HandleStatus;
use teloxide::prelude::*;

pub mod actions;
pub mod commands;
pub mod errors;
pub mod forms;
pub mod handlers;
pub mod inline_buttons;
pub mod keyboards;
pub mod utils;

pub const MESSAGE_MAX_LEN: usize = 4096;

macro_rules! return_if_handled {
    ($handle:expr) => {
        if matches!($handle, HandleStatus::Handled) {
            return Ok(HandleStatus::Handled);
        }
    };
}

pub(crate) use return_if_handled;

use crate::app::App;
use crate::user::UserState;

/// Runs the message through the handler chain. Commands go before forms
/// so `/cancel` still works with a flow open, forms go before keyboards
/// so typed answers are not mistaken for menu presses.
#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle_message(
    app: &'static App,
    state: &UserState,
    m: Message,
) -> anyhow::Result<HandleStatus> {
    if app.is_admin(state.user_id()) {
        return_if_handled!(handlers::admin_commands::handle(app, state, &m).await?);
    }

    return_if_handled!(handlers::commands::handle(app, state, &m).await?);
    return_if_handled!(handlers::forms::handle(app, state, &m).await?);
    return_if_handled!(handlers::keyboards::handle(app, state, &m).await?);
    return_if_handled!(handlers::raw_message::handle(app, state, &m).await?);

    actions::help::send_fallback(app, state, m.chat.id).await?;

    Ok(HandleStatus::Skipped)
}
