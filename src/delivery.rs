use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardMarkup, InputFile, ParseMode};
use teloxide::ApiError;

use crate::app::App;
use crate::scheduler;
use crate::services::UserService;

/// How often a rate limited send is retried before giving up. Telegram tells
/// us how long to wait, so a couple of patient attempts is enough.
const MAX_SEND_ATTEMPTS: u32 = 3;

const BROADCAST_PAUSE: Duration = Duration::from_millis(50);
const BROADCAST_PROGRESS_EVERY: u32 = 25;

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("user {0} has blocked the bot")]
    Blocked(i64),

    #[error("chat {0} was not found")]
    ChatNotFound(i64),

    #[error("rate limited, gave up after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error(transparent)]
    Api(teloxide::RequestError),
}

impl SendError {
    /// Permanent failures mean this user can never be reached again until
    /// they come back on their own.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Blocked(_) | Self::ChatNotFound(_))
    }
}

fn classify_permanent(user_id: i64, err: &teloxide::RequestError) -> Option<SendError> {
    match err {
        teloxide::RequestError::Api(ApiError::BotBlocked | ApiError::UserDeactivated) => {
            Some(SendError::Blocked(user_id))
        },
        teloxide::RequestError::Api(ApiError::ChatNotFound) => {
            Some(SendError::ChatNotFound(user_id))
        },
        _ => None,
    }
}

pub struct OutgoingMessage {
    text: String,
    photo: Option<String>,
    markup: Option<InlineKeyboardMarkup>,
}

impl OutgoingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            photo: None,
            markup: None,
        }
    }

    /// Attaches a photo by its Telegram file id. The text becomes a caption.
    pub fn with_photo(mut self, photo: impl Into<String>) -> Self {
        self.photo = Some(photo.into());

        self
    }

    pub fn with_markup(mut self, markup: InlineKeyboardMarkup) -> Self {
        self.markup = Some(markup);

        self
    }
}

async fn send_once(
    app: &'static App,
    chat_id: ChatId,
    message: &OutgoingMessage,
) -> Result<(), teloxide::RequestError> {
    match &message.photo {
        Some(photo) => {
            let mut req = app
                .bot()
                .send_photo(chat_id, InputFile::file_id(photo.clone()))
                .caption(message.text.clone())
                .parse_mode(ParseMode::Html);

            if let Some(markup) = &message.markup {
                req = req.reply_markup(markup.clone());
            }

            req.await?;
        },
        None => {
            let mut req = app
                .bot()
                .send_message(chat_id, message.text.clone())
                .parse_mode(ParseMode::Html);

            if let Some(markup) = &message.markup {
                req = req.reply_markup(markup.clone());
            }

            req.await?;
        },
    }

    Ok(())
}

/// Sends one message to one user, classifying what Telegram answers. A user
/// who blocked the bot or deleted the chat is deactivated on the spot and
/// their personal jobs are dropped from the scheduler.
#[tracing::instrument(skip_all, fields(user_id))]
pub async fn send_to_user(
    app: &'static App,
    user_id: i64,
    message: &OutgoingMessage,
) -> Result<(), SendError> {
    let chat_id = ChatId(user_id);
    let mut attempt = 1;

    loop {
        let err = match send_once(app, chat_id, message).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        if let Some(send_err) = classify_permanent(user_id, &err) {
            tracing::info!(user_id, err = %send_err, "User is unreachable, deactivating");

            deactivate_unreachable(app, user_id).await;

            return Err(send_err);
        }

        if let teloxide::RequestError::RetryAfter(seconds) = &err {
            if attempt >= MAX_SEND_ATTEMPTS {
                return Err(SendError::RateLimited {
                    attempts: attempt,
                });
            }

            tracing::debug!(user_id, attempt, delay = seconds.seconds(), "Rate limited, waiting");

            tokio::time::sleep(seconds.duration()).await;
            attempt += 1;

            continue;
        }

        return Err(SendError::Api(err));
    }
}

pub(crate) async fn deactivate_unreachable(app: &'static App, user_id: i64) {
    match UserService::set_active(app.db(), user_id, false).await {
        Ok(true) => {
            app.scheduler()
                .remove(&scheduler::jobs::debt_job_id(user_id))
                .await;
            app.scheduler()
                .remove(&scheduler::jobs::rate_job_id(user_id))
                .await;
        },
        Ok(false) => {},
        Err(err) => {
            tracing::error!(user_id, err = ?err, "Failed to deactivate unreachable user");
        },
    }
}

#[derive(Debug, Default)]
pub struct BroadcastReport {
    pub sent: u32,
    pub failed: u32,
    pub failed_user_ids: Vec<i64>,
}

/// Sends one message to every active user. Failures never abort the run,
/// they are counted and reported. `progress_chat` (usually the requesting
/// admin) receives a short note every few dozen sends.
#[tracing::instrument(skip_all)]
pub async fn broadcast(
    app: &'static App,
    message: &OutgoingMessage,
    progress_chat: Option<ChatId>,
) -> anyhow::Result<BroadcastReport> {
    let users = UserService::get_active(app.db()).await?;
    let total = users.len();

    let mut report = BroadcastReport::default();

    for (index, user) in users.iter().enumerate() {
        match send_to_user(app, user.id, message).await {
            Ok(()) => report.sent += 1,
            Err(err) => {
                tracing::warn!(user_id = user.id, err = %err, "Broadcast send failed");

                report.failed += 1;
                report.failed_user_ids.push(user.id);
            },
        }

        let processed = index as u32 + 1;

        if processed % BROADCAST_PROGRESS_EVERY == 0 {
            if let Some(chat_id) = progress_chat {
                app.bot()
                    .send_message(chat_id, format!("Broadcast progress: {processed}/{total}"))
                    .await
                    .ok();
            }
        }

        tokio::time::sleep(BROADCAST_PAUSE).await;
    }

    tracing::info!(
        sent = report.sent,
        failed = report.failed,
        "Broadcast finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_is_permanent() {
        let err = teloxide::RequestError::Api(ApiError::BotBlocked);

        let classified = classify_permanent(7, &err).expect("should classify");

        assert!(matches!(classified, SendError::Blocked(7)));
        assert!(classified.is_permanent());
    }

    #[test]
    fn deactivated_account_counts_as_blocked() {
        let err = teloxide::RequestError::Api(ApiError::UserDeactivated);

        let classified = classify_permanent(7, &err).expect("should classify");

        assert!(matches!(classified, SendError::Blocked(7)));
    }

    #[test]
    fn missing_chat_is_permanent() {
        let err = teloxide::RequestError::Api(ApiError::ChatNotFound);

        let classified = classify_permanent(9, &err).expect("should classify");

        assert!(matches!(classified, SendError::ChatNotFound(9)));
        assert!(classified.is_permanent());
    }

    #[test]
    fn other_api_errors_pass_through() {
        let err = teloxide::RequestError::Api(ApiError::MessageNotModified);

        assert!(classify_permanent(7, &err).is_none());
    }

    #[test]
    fn rate_limit_is_transient() {
        let err = SendError::RateLimited { attempts: 3 };

        assert!(!err.is_permanent());
    }
}
