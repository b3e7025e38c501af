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
        "user"
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveModel, DeriveActiveModel)]
pub struct Model {
    pub id: i64,
    pub locale: Locale,
    pub debt_notify_time: Option<String>,
    pub rate_alert_time: Option<String>,
    pub active: bool,
    pub source: Option<String>,
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
    Locale,
    DebtNotifyTime,
    RateAlertTime,
    Active,
    Source,
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
        false
    }
}

impl ColumnTrait for Column {
    type EntityName = Entity;

    fn def(&self) -> ColumnDef {
        match self {
            Self::Id => ColumnType::BigInteger.def(),
            Self::Locale => Locale::db_type(),
            Self::DebtNotifyTime => ColumnType::Text.def().null(),
            Self::RateAlertTime => ColumnType::Text.def().null(),
            Self::Active => ColumnType::Boolean.def(),
            Self::Source => ColumnType::Text.def().null(),
            Self::CreatedAt => ColumnType::DateTime.def(),
            Self::UpdatedAt => ColumnType::DateTime.def(),
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::debt::Entity")]
    Debt,
    #[sea_orm(has_many = "super::reminder::Entity")]
    Reminder,
    #[sea_orm(has_many = "super::scheduled_message::Entity")]
    ScheduledMessage,
}

impl Related<super::debt::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Debt.def()
    }
}

impl Related<super::reminder::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reminder.def()
    }
}

impl Related<super::scheduled_message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ScheduledMessage.def()
    }
}

#[derive(Debug, Clone, EnumIter, DeriveActiveEnum, PartialEq, Eq, Default)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Locale {
    #[sea_orm(string_value = "uz")]
    #[default]
    Uzbek,
    #[sea_orm(string_value = "ru")]
    Russian,
    #[sea_orm(string_value = "en")]
    English,
}

impl Locale {
    pub fn language(&self) -> &str {
        match self {
            Self::Uzbek => "Uzbek",
            Self::Russian => "Russian",
            Self::English => "English",
        }
    }

    pub fn locale_codes() -> Vec<String> {
        Self::iter().map(|locale| locale.to_string()).collect()
    }
}

impl AsRef<str> for Locale {
    fn as_ref(&self) -> &str {
        match self {
            Self::Uzbek => "uz",
            Self::Russian => "ru",
            Self::English => "en",
        }
    }
}

impl Display for Locale {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

impl FromStr for Locale {
    type Err = sea_orm::DbErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s)
    }
}

impl TryFrom<&str> for Locale {
    type Error = sea_orm::DbErr;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from_value(&value.to_owned())
    }
}
