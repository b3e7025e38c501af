use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use sea_orm::entity::prelude::*;
use sea_orm::prelude::async_trait::async_trait;
use sea_orm::Set;

use crate::utils::Clock;

#[derive(Copy, Clone, Default, Debug, DeriveEntity)]
pub struct Entity;

impl EntityName for Entity {
    fn table_name(&self) -> &str {
        "reminder"
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveModel, DeriveActiveModel)]
pub struct Model {
    pub id: i64,
    pub user_id: i64,
    pub text: String,
    pub due: chrono::NaiveDateTime,
    pub repeat: Repeat,
    pub active: bool,
    pub system: bool,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        self.updated_at = Set(Clock::now());
        if insert {
            self.created_at = Set(Clock::now());
        }

        Ok(self)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveColumn)]
pub enum Column {
    Id,
    UserId,
    Text,
    Due,
    Repeat,
    Active,
    System,
    CreatedAt,
    UpdatedAt,
}

#[derive(Copy, Clone, Debug, EnumIter, DerivePrimaryKey)]
pub enum PrimaryKey {
    Id,
}

impl PrimaryKeyTrait for PrimaryKey {
    type ValueType = i64;

    fn auto_increment() -> bool {
        true
    }
}

impl ColumnTrait for Column {
    type EntityName = Entity;

    fn def(&self) -> ColumnDef {
        match self {
            Self::Id => ColumnType::BigInteger.def(),
            Self::UserId => ColumnType::BigInteger.def(),
            Self::Text => ColumnType::Text.def(),
            Self::Due => ColumnType::DateTime.def(),
            Self::Repeat => Repeat::db_type(),
            Self::Active => ColumnType::Boolean.def(),
            Self::System => ColumnType::Boolean.def(),
            Self::CreatedAt => ColumnType::DateTime.def(),
            Self::UpdatedAt => ColumnType::DateTime.def(),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

#[derive(Debug, Clone, EnumIter, DeriveActiveEnum, PartialEq, Eq, Default)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Repeat {
    #[sea_orm(string_value = "none")]
    #[default]
    None,
    #[sea_orm(string_value = "daily")]
    Daily,
    #[sea_orm(string_value = "monthly")]
    Monthly,
}

impl Repeat {
    pub fn is_repeating(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Single step of the cadence. Monthly steps land on the same day of the
    /// next month, clamped to its last day when the month is shorter.
    pub fn next_occurrence(&self, due: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Self::None => None,
            Self::Daily => due.checked_add_days(chrono::Days::new(1)),
            Self::Monthly => {
                let date = add_one_month(due.date());

                Some(date.and_time(due.time()))
            },
        }
    }

    /// Steps the cadence forward until the result lies strictly in the
    /// future. A reminder that slept through several periods fires once and
    /// lands on the next upcoming slot instead of replaying every miss.
    pub fn advance_past(&self, due: NaiveDateTime, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut next = self.next_occurrence(due)?;

        while next <= now {
            next = self.next_occurrence(next)?;
        }

        Some(next)
    }
}

fn add_one_month(date: NaiveDate) -> NaiveDate {
    let first = date
        .with_day(1)
        .expect("first day always exists")
        .checked_add_months(Months::new(1))
        .expect("date stays far from the calendar bounds");

    let last_day = days_in_month(first.year(), first.month());

    first
        .with_day(date.day().min(last_day))
        .expect("day is clamped to the month length")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid first of month");

    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .expect("valid last of month")
        .day()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(date: &str, time: &str) -> NaiveDateTime {
        format!("{date}T{time}").parse().unwrap()
    }

    #[test]
    fn daily_steps_one_day() {
        let next = Repeat::Daily.next_occurrence(dt("2024-03-10", "09:00:00"));

        assert_eq!(next, Some(dt("2024-03-11", "09:00:00")));
    }

    #[test]
    fn monthly_clamps_to_month_end() {
        let next = Repeat::Monthly.next_occurrence(dt("2024-01-31", "10:00:00"));

        assert_eq!(next, Some(dt("2024-02-29", "10:00:00")));
    }

    #[test]
    fn monthly_keeps_day_when_it_fits() {
        let next = Repeat::Monthly.next_occurrence(dt("2024-04-15", "10:00:00"));

        assert_eq!(next, Some(dt("2024-05-15", "10:00:00")));
    }

    #[test]
    fn monthly_from_clamped_day_does_not_recover() {
        // Once clamped to Feb 29 the cadence continues from day 29.
        let next = Repeat::Monthly.next_occurrence(dt("2024-02-29", "10:00:00"));

        assert_eq!(next, Some(dt("2024-03-29", "10:00:00")));
    }

    #[test]
    fn one_off_has_no_next() {
        assert_eq!(Repeat::None.next_occurrence(dt("2024-03-10", "09:00:00")), None);
    }

    #[test]
    fn advance_skips_missed_periods() {
        let next = Repeat::Daily.advance_past(dt("2024-03-01", "09:00:00"), dt("2024-03-10", "12:00:00"));

        assert_eq!(next, Some(dt("2024-03-11", "09:00:00")));
    }

    #[test]
    fn advance_lands_strictly_after_now() {
        // now is exactly on a slot, the next one is returned.
        let next = Repeat::Daily.advance_past(dt("2024-03-01", "09:00:00"), dt("2024-03-02", "09:00:00"));

        assert_eq!(next, Some(dt("2024-03-03", "09:00:00")));
    }

    #[test]
    fn december_rolls_into_january() {
        let next = Repeat::Monthly.next_occurrence(dt("2024-12-31", "08:00:00"));

        assert_eq!(next, Some(dt("2025-01-31", "08:00:00")));
    }
}
