use teloxide::types::Message;

use super::HandleStatus;
use crate::app::App;
use crate::telegram::actions;
use crate::user::UserState;

/// Free text that survived every other handler. When AI parsing is
/// configured it becomes a debt candidate, otherwise the message falls
/// through to the help fallback.
#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle(
    app: &'static App,
    state: &UserState,
    m: &Message,
) -> anyhow::Result<HandleStatus> {
    let Some(text) = m.text() else {
        return Ok(HandleStatus::Skipped);
    };

    if text.starts_with('/') {
        return Ok(HandleStatus::Skipped);
    }

    actions::ai_capture::handle(app, state, m, text).await
}
