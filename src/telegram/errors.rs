use std::borrow::Cow;

use teloxide::ApiError;
use teloxide::payloads::SendMessageSetters as _;
use teloxide::prelude::Requester as _;
use teloxide::types::{ChatId, ParseMode};

use crate::app::App;
use crate::delivery;
use crate::errors::{BotError, ValidationError};

#[derive(Default)]
pub struct ErrorHandlingResult {
    pub handled: bool,
    pub user_notified: bool,
}

impl ErrorHandlingResult {
    #[must_use]
    pub fn unhandled() -> Self {
        Self {
            handled: false,
            user_notified: false,
        }
    }

    #[must_use]
    pub fn handled() -> Self {
        Self {
            handled: true,
            user_notified: false,
        }
    }

    #[must_use]
    pub fn handled_notified() -> Self {
        Self {
            handled: true,
            user_notified: true,
        }
    }
}

fn validation_message<'a>(err: &ValidationError, locale: &str) -> Cow<'a, str> {
    match err {
        ValidationError::NonPositiveAmount(_) => t!("error.amount-positive", locale = locale),
        ValidationError::EmptyPerson => t!("error.empty-person", locale = locale),
        ValidationError::UnknownCurrency(_) => t!("error.bad-currency", locale = locale),
        ValidationError::UnknownDirection(_) => t!("error.bad-direction", locale = locale),
        ValidationError::MalformedDate(_) => t!("error.bad-date", locale = locale),
        ValidationError::MalformedTimeOfDay(_) => t!("error.bad-time", locale = locale),
    }
}

/// Maps domain errors to a localized explanation. Database errors stay
/// unhandled so the generic apology path picks them up.
#[tracing::instrument(skip_all, fields(%user_id))]
pub async fn handle_domain_error(
    err: &mut anyhow::Error,
    app: &App,
    user_id: i64,
    locale: &str,
) -> anyhow::Result<ErrorHandlingResult> {
    let Some(err) = err.downcast_ref::<BotError>() else {
        return Ok(ErrorHandlingResult::unhandled());
    };

    let text = match err {
        BotError::Validation(validation) => validation_message(validation, locale),
        BotError::NotFound { .. } => t!("error.not-found", locale = locale),
        BotError::Db(_) => return Ok(ErrorHandlingResult::unhandled()),
    };

    app.bot()
        .send_message(ChatId(user_id), text)
        .parse_mode(ParseMode::Html)
        .await?;

    Ok(ErrorHandlingResult::handled_notified())
}

/// A user who blocked the bot mid-interaction gets deactivated right here.
/// Notifying them is pointless, the result suppresses the apology message.
#[tracing::instrument(skip_all, fields(%user_id))]
pub async fn handle_blocked_bot(
    err: &mut anyhow::Error,
    app: &'static App,
    user_id: i64,
) -> anyhow::Result<ErrorHandlingResult> {
    let Some(err) = err.downcast_mut::<teloxide::RequestError>() else {
        return Ok(ErrorHandlingResult::unhandled());
    };

    if matches!(
        err,
        teloxide::RequestError::Api(
            ApiError::BotBlocked | ApiError::UserDeactivated | ApiError::ChatNotFound
        )
    ) {
        delivery::deactivate_unreachable(app, user_id).await;

        return Ok(ErrorHandlingResult::handled_notified());
    }

    Ok(ErrorHandlingResult::unhandled())
}

#[tracing::instrument(skip_all, fields(%user_id))]
async fn handle_inner(
    err: &mut anyhow::Error,
    app: &'static App,
    user_id: i64,
    locale: &str,
) -> anyhow::Result<ErrorHandlingResult> {
    let res = handle_domain_error(err, app, user_id, locale).await?;
    if res.handled {
        return Ok(res);
    }

    let res = handle_blocked_bot(err, app, user_id).await?;
    if res.handled {
        return Ok(res);
    }

    tracing::error!(err = ?err, "Unhandled Error");

    Ok(ErrorHandlingResult::unhandled())
}

#[tracing::instrument(skip_all, fields(%user_id))]
pub async fn handle(
    err: &mut anyhow::Error,
    app: &'static App,
    user_id: i64,
    locale: &str,
) -> ErrorHandlingResult {
    let res = handle_inner(err, app, user_id, locale).await;

    match res {
        Ok(res) => res,
        Err(err) => {
            tracing::error!(err = ?err, "Handler failed with error");
            ErrorHandlingResult::unhandled()
        },
    }
}
