use chrono::NaiveDateTime;
use sea_orm::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ConnectionTrait, QueryOrder, Set, UpdateMany};

use crate::entity::prelude::*;
use crate::errors::BotResult;
use crate::utils::Clock;

pub struct ScheduledMessageService;

impl ScheduledMessageService {
    #[tracing::instrument(skip_all, fields(user_id))]
    pub async fn create(
        db: &impl ConnectionTrait,
        user_id: i64,
        text: String,
        photo: Option<String>,
        send_at: NaiveDateTime,
    ) -> BotResult<ScheduledMessageModel> {
        let message = ScheduledMessageActiveModel {
            user_id: Set(user_id),
            text: Set(text),
            photo: Set(photo),
            send_at: Set(send_at),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(message)
    }

    /// Fans one message out into a row per recipient. A single insert, so a
    /// failure schedules the broadcast for nobody rather than for some.
    #[tracing::instrument(skip_all, fields(recipients = user_ids.len()))]
    pub async fn create_for_users(
        db: &impl ConnectionTrait,
        user_ids: &[i64],
        text: &str,
        photo: Option<&str>,
        send_at: NaiveDateTime,
    ) -> BotResult<u64> {
        if user_ids.is_empty() {
            return Ok(0);
        }

        let now = Clock::now();
        let rows = user_ids.iter().map(|user_id| ScheduledMessageActiveModel {
            user_id: Set(*user_id),
            text: Set(text.to_owned()),
            photo: Set(photo.map(ToOwned::to_owned)),
            send_at: Set(send_at),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        });

        ScheduledMessageEntity::insert_many(rows).exec(db).await?;

        Ok(user_ids.len() as u64)
    }

    /// Unsent rows whose time has come, oldest first.
    #[tracing::instrument(skip_all)]
    pub async fn pending(
        db: &impl ConnectionTrait,
        now: NaiveDateTime,
    ) -> BotResult<Vec<ScheduledMessageModel>> {
        let messages = ScheduledMessageEntity::find()
            .filter(ScheduledMessageColumn::Active.eq(true))
            .filter(ScheduledMessageColumn::Sent.eq(false))
            .filter(ScheduledMessageColumn::SendAt.lte(now))
            .order_by_asc(ScheduledMessageColumn::SendAt)
            .order_by_asc(ScheduledMessageColumn::Id)
            .all(db)
            .await?;

        Ok(messages)
    }

    #[tracing::instrument(skip_all, fields(message_id))]
    pub async fn mark_sent(db: &impl ConnectionTrait, message_id: i64) -> BotResult<()> {
        let query: UpdateMany<_> = ScheduledMessageEntity::update_many();

        query
            .col_expr(ScheduledMessageColumn::Sent, Expr::value(true))
            .col_expr(ScheduledMessageColumn::UpdatedAt, Expr::value(Clock::now()))
            .filter(ScheduledMessageColumn::Id.eq(message_id))
            .exec(db)
            .await?;

        Ok(())
    }

    /// Soft-drops every unsent row of a recipient that can no longer be
    /// reached.
    #[tracing::instrument(skip_all, fields(user_id))]
    pub async fn deactivate_for_user(db: &impl ConnectionTrait, user_id: i64) -> BotResult<u64> {
        let query: UpdateMany<_> = ScheduledMessageEntity::update_many();

        let result = query
            .col_expr(ScheduledMessageColumn::Active, Expr::value(false))
            .col_expr(ScheduledMessageColumn::UpdatedAt, Expr::value(Clock::now()))
            .filter(ScheduledMessageColumn::UserId.eq(user_id))
            .filter(ScheduledMessageColumn::Sent.eq(false))
            .filter(ScheduledMessageColumn::Active.eq(true))
            .exec(db)
            .await?;

        Ok(result.rows_affected)
    }

    #[tracing::instrument(skip_all)]
    pub async fn count_pending(db: &impl ConnectionTrait) -> BotResult<u64> {
        let count = ScheduledMessageEntity::find()
            .filter(ScheduledMessageColumn::Active.eq(true))
            .filter(ScheduledMessageColumn::Sent.eq(false))
            .count(db)
            .await?;

        Ok(count)
    }
}
