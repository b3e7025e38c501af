use teloxide::prelude::*;
use teloxide::types::{ChatId, ParseMode};

use crate::app::App;
use crate::entity::prelude::*;

pub struct NotificationService;

impl NotificationService {
    async fn notify_admins(app: &'static App, message: &str) {
        for admin_id in app.admin_ids() {
            if let Err(err) = app
                .bot()
                .send_message(ChatId(*admin_id), message)
                .parse_mode(ParseMode::Html)
                .await
            {
                tracing::warn!(
                    admin_id,
                    error = ?err,
                    "Failed to send admin notification"
                );
            }
        }
    }

    pub async fn notify_user_joined(
        app: &'static App,
        user: &UserModel,
        tg_user: Option<&teloxide::types::User>,
    ) {
        let name = tg_user
            .map(|tg_user| {
                format!(
                    "{} {} {}",
                    tg_user.first_name,
                    tg_user.last_name.as_deref().unwrap_or_default(),
                    tg_user
                        .username
                        .as_deref()
                        .map(|username| format!("(@{username})"))
                        .unwrap_or_default()
                )
                .trim()
                .to_string()
            })
            .unwrap_or_else(|| "unknown".into());

        let message = format!(
            "🆕 <b>New user joined</b>\n\nName: {}\nID: <code>{}</code>",
            name, user.id
        );

        Self::notify_admins(app, &message).await;
    }

    pub async fn notify_rebuild_failed(app: &'static App, err: &anyhow::Error) {
        let message = format!("🚨 <b>Scheduler rebuild failed</b>\n\n<code>{err:?}</code>");

        Self::notify_admins(app, &message).await;
    }
}
