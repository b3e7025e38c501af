use chrono::NaiveDateTime;
use sea_orm::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ConnectionTrait, QueryOrder, Set, UpdateMany};

use crate::entity::prelude::*;
use crate::errors::BotResult;
use crate::utils::Clock;

pub struct ReminderService;

impl ReminderService {
    fn query(user_id: Option<i64>) -> Select<ReminderEntity> {
        let mut query: Select<_> = ReminderEntity::find().filter(ReminderColumn::Active.eq(true));

        if let Some(user_id) = user_id {
            query = query.filter(ReminderColumn::UserId.eq(user_id));
        }

        query
    }

    #[tracing::instrument(skip_all, fields(user_id))]
    pub async fn create(
        db: &impl ConnectionTrait,
        user_id: i64,
        text: String,
        due: NaiveDateTime,
        repeat: ReminderRepeat,
    ) -> BotResult<ReminderModel> {
        let reminder = ReminderActiveModel {
            user_id: Set(user_id),
            text: Set(text),
            due: Set(due),
            repeat: Set(repeat),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(reminder)
    }

    #[tracing::instrument(skip_all, fields(user_id))]
    pub async fn list(db: &impl ConnectionTrait, user_id: i64) -> BotResult<Vec<ReminderModel>> {
        let reminders = Self::query(Some(user_id))
            .order_by_asc(ReminderColumn::Due)
            .all(db)
            .await?;

        Ok(reminders)
    }

    /// Hard delete scoped to the owner. Returns whether a row went away.
    #[tracing::instrument(skip_all, fields(user_id, reminder_id))]
    pub async fn delete(
        db: &impl ConnectionTrait,
        reminder_id: i64,
        user_id: i64,
    ) -> BotResult<bool> {
        let res = ReminderEntity::delete_many()
            .filter(ReminderColumn::Id.eq(reminder_id))
            .filter(ReminderColumn::UserId.eq(user_id))
            .exec(db)
            .await?;

        Ok(res.rows_affected > 0)
    }

    /// One-off reminders that have come due. `now` is expected to be
    /// truncated to whole minutes by the caller.
    #[tracing::instrument(skip_all)]
    pub async fn due_one_off(
        db: &impl ConnectionTrait,
        now: NaiveDateTime,
    ) -> BotResult<Vec<ReminderModel>> {
        let reminders = Self::query(None)
            .filter(ReminderColumn::Repeat.eq(ReminderRepeat::None))
            .filter(ReminderColumn::Due.lte(now))
            .order_by_asc(ReminderColumn::Due)
            .all(db)
            .await?;

        Ok(reminders)
    }

    /// Daily and monthly reminders that have come due.
    #[tracing::instrument(skip_all)]
    pub async fn due_repeating(
        db: &impl ConnectionTrait,
        now: NaiveDateTime,
    ) -> BotResult<Vec<ReminderModel>> {
        let reminders = Self::query(None)
            .filter(ReminderColumn::Repeat.ne(ReminderRepeat::None))
            .filter(ReminderColumn::Due.lte(now))
            .order_by_asc(ReminderColumn::Due)
            .all(db)
            .await?;

        Ok(reminders)
    }

    #[tracing::instrument(skip_all, fields(reminder_id))]
    pub async fn deactivate(db: &impl ConnectionTrait, reminder_id: i64) -> BotResult<()> {
        let query: UpdateMany<_> = ReminderEntity::update_many();

        query
            .col_expr(ReminderColumn::Active, Expr::value(false))
            .col_expr(ReminderColumn::UpdatedAt, Expr::value(Clock::now()))
            .filter(ReminderColumn::Id.eq(reminder_id))
            .exec(db)
            .await?;

        Ok(())
    }

    /// Moves a repeating reminder to its next slot after it fired.
    #[tracing::instrument(skip_all, fields(reminder_id))]
    pub async fn reschedule(
        db: &impl ConnectionTrait,
        reminder_id: i64,
        due: NaiveDateTime,
    ) -> BotResult<()> {
        let query: UpdateMany<_> = ReminderEntity::update_many();

        query
            .col_expr(ReminderColumn::Due, Expr::value(due))
            .col_expr(ReminderColumn::UpdatedAt, Expr::value(Clock::now()))
            .filter(ReminderColumn::Id.eq(reminder_id))
            .exec(db)
            .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all)]
    pub async fn count(db: &impl ConnectionTrait) -> BotResult<u64> {
        let count = Self::query(None).count(db).await?;

        Ok(count)
    }
}
