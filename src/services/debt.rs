use chrono::NaiveDate;
use sea_orm::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ConnectionTrait, IntoActiveModel, QueryOrder, Set, UpdateMany};

use crate::entity::prelude::*;
use crate::errors::{BotError, BotResult, ValidationError};
use crate::utils::Clock;

pub struct DebtQueryBuilder(Select<DebtEntity>);

impl DebtQueryBuilder {
    fn new() -> Self {
        Self(DebtEntity::find().filter(DebtColumn::Active.eq(true)))
    }

    pub fn user_id(mut self, user_id: Option<i64>) -> Self {
        if let Some(user_id) = user_id {
            self.0 = self.0.filter(DebtColumn::UserId.eq(user_id));
        }

        self
    }

    pub fn open(mut self) -> Self {
        self.0 = self.0.filter(DebtColumn::Closed.eq(false));

        self
    }

    pub fn due_on_or_before(mut self, date: NaiveDate) -> Self {
        self.0 = self.0.filter(DebtColumn::Due.lte(date));

        self
    }

    pub fn due_in(mut self, dates: &[NaiveDate]) -> Self {
        self.0 = self.0.filter(DebtColumn::Due.is_in(dates.iter().copied()));

        self
    }

    pub fn build(self) -> Select<DebtEntity> {
        self.0
    }
}

/// Fields a new debt is created from. Creation date and due date are plain
/// calendar dates, backdating is allowed.
#[derive(Clone, Debug)]
pub struct DebtDraft {
    pub person: String,
    pub amount: i64,
    pub currency: Currency,
    pub direction: DebtDirection,
    pub date: NaiveDate,
    pub due: NaiveDate,
    pub comment: Option<String>,
}

/// Partial update. `None` leaves the field untouched.
#[derive(Default)]
pub struct DebtChanges {
    pub person: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<Currency>,
    pub due: Option<NaiveDate>,
    pub comment: Option<Option<String>>,
}

pub struct DebtService;

impl DebtService {
    fn builder() -> DebtQueryBuilder {
        DebtQueryBuilder::new()
    }

    #[tracing::instrument(skip_all, fields(user_id))]
    pub async fn create(
        db: &impl ConnectionTrait,
        user_id: i64,
        draft: DebtDraft,
    ) -> BotResult<DebtModel> {
        if draft.amount <= 0 {
            return Err(ValidationError::NonPositiveAmount(draft.amount).into());
        }

        let debt = DebtActiveModel {
            user_id: Set(user_id),
            person: Set(draft.person),
            amount: Set(draft.amount),
            currency: Set(draft.currency),
            direction: Set(draft.direction),
            date: Set(draft.date),
            due: Set(draft.due),
            comment: Set(draft.comment),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(debt)
    }

    /// Open debts of one user, insertion order.
    #[tracing::instrument(skip_all, fields(user_id))]
    pub async fn get_open(db: &impl ConnectionTrait, user_id: i64) -> BotResult<Vec<DebtModel>> {
        let debts = Self::builder()
            .user_id(Some(user_id))
            .open()
            .build()
            .order_by_asc(DebtColumn::Id)
            .all(db)
            .await?;

        Ok(debts)
    }

    /// All live rows of one user, settled ones included. Used by the export.
    #[tracing::instrument(skip_all, fields(user_id))]
    pub async fn get_all(db: &impl ConnectionTrait, user_id: i64) -> BotResult<Vec<DebtModel>> {
        let debts = Self::builder()
            .user_id(Some(user_id))
            .build()
            .order_by_asc(DebtColumn::Id)
            .all(db)
            .await?;

        Ok(debts)
    }

    /// Fetches one debt and checks it belongs to the caller. A foreign or
    /// soft-deleted debt is indistinguishable from a missing one.
    #[tracing::instrument(skip_all, fields(user_id, debt_id))]
    pub async fn get_by_id(
        db: &impl ConnectionTrait,
        debt_id: i64,
        user_id: i64,
    ) -> BotResult<DebtModel> {
        let debt = Self::builder()
            .user_id(Some(user_id))
            .build()
            .filter(DebtColumn::Id.eq(debt_id))
            .one(db)
            .await?;

        debt.ok_or(BotError::not_found("debt", debt_id))
    }

    #[tracing::instrument(skip_all, fields(user_id, debt_id))]
    pub async fn update(
        db: &impl ConnectionTrait,
        debt_id: i64,
        user_id: i64,
        changes: DebtChanges,
    ) -> BotResult<DebtModel> {
        if let Some(amount) = changes.amount {
            if amount <= 0 {
                return Err(ValidationError::NonPositiveAmount(amount).into());
            }
        }

        let debt = Self::get_by_id(db, debt_id, user_id).await?;
        let mut debt = debt.into_active_model();

        if let Some(person) = changes.person {
            debt.person = Set(person);
        }
        if let Some(amount) = changes.amount {
            debt.amount = Set(amount);
        }
        if let Some(currency) = changes.currency {
            debt.currency = Set(currency);
        }
        if let Some(due) = changes.due {
            debt.due = Set(due);
        }
        if let Some(comment) = changes.comment {
            debt.comment = Set(comment);
        }

        Ok(debt.update(db).await?)
    }

    #[tracing::instrument(skip_all, fields(user_id, debt_id))]
    pub async fn close(
        db: &impl ConnectionTrait,
        debt_id: i64,
        user_id: i64,
    ) -> BotResult<DebtModel> {
        let debt = Self::get_by_id(db, debt_id, user_id).await?;
        let mut debt = debt.into_active_model();

        debt.closed = Set(true);

        Ok(debt.update(db).await?)
    }

    /// Hides the debt from every listing and report while keeping the row.
    /// Returns whether anything was hidden, repeated deletes are no-ops.
    #[tracing::instrument(skip_all, fields(user_id, debt_id))]
    pub async fn soft_delete(
        db: &impl ConnectionTrait,
        debt_id: i64,
        user_id: i64,
    ) -> BotResult<bool> {
        let query: UpdateMany<_> = DebtEntity::update_many();

        let res = query
            .col_expr(DebtColumn::Active, Expr::value(false))
            .col_expr(DebtColumn::UpdatedAt, Expr::value(Clock::now()))
            .filter(DebtColumn::Id.eq(debt_id))
            .filter(DebtColumn::UserId.eq(user_id))
            .filter(DebtColumn::Active.eq(true))
            .exec(db)
            .await?;

        Ok(res.rows_affected > 0)
    }

    #[tracing::instrument(skip_all, fields(user_id, debt_id))]
    pub async fn extend(
        db: &impl ConnectionTrait,
        debt_id: i64,
        user_id: i64,
        new_due: NaiveDate,
    ) -> BotResult<DebtModel> {
        let debt = Self::get_by_id(db, debt_id, user_id).await?;
        let mut debt = debt.into_active_model();

        debt.due = Set(new_due);

        Ok(debt.update(db).await?)
    }

    /// Open debts that are due, for the daily per-user report. Without a
    /// user id the whole table is scanned, ordered by owner then due date
    /// so one user's rows arrive together.
    #[tracing::instrument(skip_all, fields(user_id))]
    pub async fn due_on_or_before(
        db: &impl ConnectionTrait,
        user_id: Option<i64>,
        date: NaiveDate,
    ) -> BotResult<Vec<DebtModel>> {
        let debts = Self::builder()
            .user_id(user_id)
            .open()
            .due_on_or_before(date)
            .build()
            .order_by_asc(DebtColumn::UserId)
            .order_by_asc(DebtColumn::Due)
            .all(db)
            .await?;

        Ok(debts)
    }

    /// Open debts whose due date falls on one of the given days.
    #[tracing::instrument(skip_all)]
    pub async fn due_on(
        db: &impl ConnectionTrait,
        dates: &[NaiveDate],
    ) -> BotResult<Vec<DebtModel>> {
        let debts = Self::builder()
            .open()
            .due_in(dates)
            .build()
            .order_by_asc(DebtColumn::UserId)
            .order_by_asc(DebtColumn::Due)
            .all(db)
            .await?;

        Ok(debts)
    }

    #[tracing::instrument(skip_all)]
    pub async fn count_open(db: &impl ConnectionTrait, user_id: Option<i64>) -> BotResult<u64> {
        let count = Self::builder()
            .user_id(user_id)
            .open()
            .build()
            .count(db)
            .await?;

        Ok(count)
    }

    #[tracing::instrument(skip_all)]
    pub async fn count_all(db: &impl ConnectionTrait) -> BotResult<u64> {
        let count = Self::builder().build().count(db).await?;

        Ok(count)
    }
}
