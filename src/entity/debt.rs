use std::fmt::{Display, Formatter};
use std::str::FromStr;

use sea_orm::entity::prelude::*;
use sea_orm::prelude::async_trait::async_trait;
use sea_orm::{Iterable as _, Set};

use crate::utils::Clock;

#[derive(Copy, Clone, Default, Debug, DeriveEntity)]
pub struct Entity;

impl EntityName for Entity {
    fn table_name(&self) -> &str {
        "debt"
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveModel, DeriveActiveModel)]
pub struct Model {
    pub id: i64,
    pub user_id: i64,
    pub person: String,
    pub amount: i64,
    pub currency: Currency,
    pub direction: Direction,
    pub date: chrono::NaiveDate,
    pub due: chrono::NaiveDate,
    pub comment: Option<String>,
    pub closed: bool,
    pub active: bool,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
}

impl Model {
    pub fn is_overdue(&self, today: chrono::NaiveDate) -> bool {
        !self.closed && self.due < today
    }
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
    Person,
    Amount,
    Currency,
    Direction,
    Date,
    Due,
    Comment,
    Closed,
    Active,
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
            Self::Person => ColumnType::Text.def(),
            Self::Amount => ColumnType::BigInteger.def(),
            Self::Currency => Currency::db_type(),
            Self::Direction => Direction::db_type(),
            Self::Date => ColumnType::Date.def(),
            Self::Due => ColumnType::Date.def(),
            Self::Comment => ColumnType::Text.def().null(),
            Self::Closed => ColumnType::Boolean.def(),
            Self::Active => ColumnType::Boolean.def(),
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
pub enum Currency {
    #[sea_orm(string_value = "UZS")]
    #[default]
    Uzs,
    #[sea_orm(string_value = "USD")]
    Usd,
    #[sea_orm(string_value = "EUR")]
    Eur,
    #[sea_orm(string_value = "RUB")]
    Rub,
}

impl Currency {
    pub fn code(&self) -> &str {
        match self {
            Self::Uzs => "UZS",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Rub => "RUB",
        }
    }

    /// Lenient lookup for user supplied codes, "usd" and " UZS " both work.
    pub fn from_code(code: &str) -> Option<Self> {
        Self::iter().find(|currency| currency.code().eq_ignore_ascii_case(code.trim()))
    }
}

impl AsRef<str> for Currency {
    fn as_ref(&self) -> &str {
        self.code()
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = sea_orm::DbErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl TryFrom<&str> for Currency {
    type Error = sea_orm::DbErr;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from_value(&value.to_owned())
    }
}

#[derive(Debug, Clone, EnumIter, DeriveActiveEnum, PartialEq, Eq)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Direction {
    /// The debt the user has to pay back.
    #[sea_orm(string_value = "owe")]
    Owe,
    /// The debt somebody owes the user.
    #[sea_orm(string_value = "owed")]
    Owed,
}

impl Direction {
    pub fn is_owe(&self) -> bool {
        matches!(self, Self::Owe)
    }

    pub fn from_keyword(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "owe" => Some(Self::Owe),
            "owed" => Some(Self::Owed),
            _ => None,
        }
    }
}

impl AsRef<str> for Direction {
    fn as_ref(&self) -> &str {
        match self {
            Self::Owe => "owe",
            Self::Owed => "owed",
        }
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl FromStr for Direction {
    type Err = sea_orm::DbErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl TryFrom<&str> for Direction {
    type Error = sea_orm::DbErr;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from_value(&value.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_code_roundtrip() {
        for currency in Currency::iter() {
            assert_eq!(Currency::from_code(currency.code()), Some(currency));
        }
    }

    #[test]
    fn currency_lenient_lookup() {
        assert_eq!(Currency::from_code(" usd "), Some(Currency::Usd));
        assert_eq!(Currency::from_code("eur"), Some(Currency::Eur));
        assert_eq!(Currency::from_code("soums"), None);
    }

    #[test]
    fn direction_keywords() {
        assert_eq!(Direction::from_keyword("owe"), Some(Direction::Owe));
        assert_eq!(Direction::from_keyword("OWED"), Some(Direction::Owed));
        assert_eq!(Direction::from_keyword("lent"), None);
    }
}
