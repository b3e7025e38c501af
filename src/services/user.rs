use sea_orm::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ConnectionTrait, FromQueryResult, IntoActiveModel, QueryOrder, QuerySelect, Set, UpdateMany};

use crate::entity::prelude::*;
use crate::errors::BotResult;
use crate::utils::{self, Clock};

#[derive(FromQueryResult)]
pub struct LocaleCount {
    pub locale: UserLocale,
    pub count: i64,
}

pub struct UserService;

impl UserService {
    pub fn query(id: Option<i64>, active: Option<bool>) -> Select<UserEntity> {
        let mut query: Select<_> = UserEntity::find();

        if let Some(id) = id {
            query = query.filter(UserColumn::Id.eq(id));
        };

        if let Some(active) = active {
            query = query.filter(UserColumn::Active.eq(active));
        };

        query
    }

    /// Looks the user up and registers them on first contact. The second
    /// value tells whether the row was just created.
    pub async fn get_or_create(db: &impl ConnectionTrait, id: i64) -> BotResult<(UserModel, bool)> {
        let user = Self::query(Some(id), None).one(db).await?;

        if let Some(user) = user {
            return Ok((user, false));
        }

        let user = UserActiveModel {
            id: Set(id),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok((user, true))
    }

    pub async fn get_active(db: &impl ConnectionTrait) -> BotResult<Vec<UserModel>> {
        let users = Self::query(None, Some(true))
            .order_by_asc(UserColumn::Id)
            .all(db)
            .await?;

        Ok(users)
    }

    pub async fn set_locale(
        db: &impl ConnectionTrait,
        id: i64,
        locale: UserLocale,
    ) -> BotResult<()> {
        let query: UpdateMany<_> = UserEntity::update_many();

        query
            .col_expr(UserColumn::Locale, Expr::value(locale.as_ref()))
            .col_expr(UserColumn::UpdatedAt, Expr::value(Clock::now()))
            .filter(UserColumn::Id.eq(id))
            .exec(db)
            .await?;

        Ok(())
    }

    /// Flips the activity flag. Returns whether the stored value changed,
    /// re-flipping an already inactive user is a no-op.
    pub async fn set_active(db: &impl ConnectionTrait, id: i64, active: bool) -> BotResult<bool> {
        let query: UpdateMany<_> = UserEntity::update_many();

        let res = query
            .col_expr(UserColumn::Active, Expr::value(active))
            .col_expr(UserColumn::UpdatedAt, Expr::value(Clock::now()))
            .filter(UserColumn::Id.eq(id))
            .filter(UserColumn::Active.ne(active))
            .exec(db)
            .await?;

        Ok(res.rows_affected > 0)
    }

    /// Records the acquisition tag carried by the first /start deep link.
    /// Later starts never overwrite it.
    pub async fn set_source(db: &impl ConnectionTrait, id: i64, source: &str) -> BotResult<()> {
        let query: UpdateMany<_> = UserEntity::update_many();

        query
            .col_expr(UserColumn::Source, Expr::value(source))
            .col_expr(UserColumn::UpdatedAt, Expr::value(Clock::now()))
            .filter(UserColumn::Id.eq(id))
            .filter(UserColumn::Source.is_null())
            .exec(db)
            .await?;

        Ok(())
    }

    pub async fn set_debt_notify_time(
        db: &impl ConnectionTrait,
        user: UserModel,
        time: Option<String>,
    ) -> BotResult<UserModel> {
        if let Some(time) = &time {
            utils::parse_time_of_day(time)?;
        }

        let mut user = user.into_active_model();
        user.debt_notify_time = Set(time);

        Ok(user.update(db).await?)
    }

    pub async fn set_rate_alert_time(
        db: &impl ConnectionTrait,
        user: UserModel,
        time: Option<String>,
    ) -> BotResult<UserModel> {
        if let Some(time) = &time {
            utils::parse_time_of_day(time)?;
        }

        let mut user = user.into_active_model();
        user.rate_alert_time = Set(time);

        Ok(user.update(db).await?)
    }

    pub async fn count(db: &impl ConnectionTrait, active: Option<bool>) -> BotResult<u64> {
        let count = Self::query(None, active).count(db).await?;

        Ok(count)
    }

    pub async fn count_locales(db: &impl ConnectionTrait) -> BotResult<Vec<LocaleCount>> {
        let counts = Self::query(None, None)
            .select_only()
            .column(UserColumn::Locale)
            .column_as(UserColumn::Id.count(), "count")
            .group_by(UserColumn::Locale)
            .into_model::<LocaleCount>()
            .all(db)
            .await?;

        Ok(counts)
    }
}
