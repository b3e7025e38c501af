use teloxide::prelude::*;

use crate::app::App;
use crate::scheduler::jobs;
use crate::telegram::handlers::HandleStatus;
use crate::user::UserState;

#[tracing::instrument(skip_all, fields(user_id = %state.user_id()))]
pub async fn handle(
    app: &'static App,
    state: &UserState,
    m: &Message,
) -> anyhow::Result<HandleStatus> {
    match jobs::rebuild(app).await {
        Ok(()) => {
            let count = app.scheduler().count().await;

            app.bot()
                .send_message(m.chat.id, format!("Schedule rebuilt, {count} jobs registered"))
                .await?;
        },
        Err(err) => {
            tracing::error!(err = ?err, "Manual rebuild failed");

            app.bot()
                .send_message(m.chat.id, format!("Rebuild failed: {err}"))
                .await?;
        },
    }

    Ok(HandleStatus::Handled)
}
