use teloxide::payloads::AnswerCallbackQuerySetters as _;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, MaybeInaccessibleMessage, Message};

use crate::app::App;

pub trait CallbackQueryExt {
    fn get_message(&self) -> Option<Message>;
}

impl CallbackQueryExt for CallbackQuery {
    fn get_message(&self) -> Option<Message> {
        let Some(MaybeInaccessibleMessage::Regular(message)) = self.message.clone() else {
            return None;
        };

        Some(*message)
    }
}

/// Inline buttons outlive the message they are attached to. When the
/// message is gone there is nothing to edit, only the spinner to stop.
pub(crate) async fn require_callback_message(
    app: &App,
    q: &CallbackQuery,
) -> anyhow::Result<Option<Message>> {
    match q.get_message() {
        Some(message) => Ok(Some(message)),
        None => {
            app.bot()
                .answer_callback_query(q.id.clone())
                .text("Inaccessible Message")
                .await?;

            Ok(None)
        },
    }
}
