use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile};

use crate::app::App;
use crate::services::ExportService;
use crate::telegram::handlers::HandleStatus;
use crate::telegram::keyboards::StartKeyboard;
use crate::user::UserState;

#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle(
    app: &'static App,
    state: &UserState,
    chat_id: ChatId,
) -> anyhow::Result<HandleStatus> {
    let file = ExportService::export_debts(app.db(), state.user(), app.now_local()).await?;

    let Some(file) = file else {
        app.bot()
            .send_message(chat_id, t!("export.empty", locale = state.locale()))
            .reply_markup(StartKeyboard::markup(state.locale()))
            .await?;

        return Ok(HandleStatus::Handled);
    };

    app.bot()
        .send_document(
            chat_id,
            InputFile::memory(file.bytes).file_name(file.filename),
        )
        .await?;

    Ok(HandleStatus::Handled)
}
