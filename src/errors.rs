pub type BotResult<T, E = BotError> = Result<T, E>;

/// Domain errors surfaced by the storage and lifecycle services. Handlers
/// match on these to decide what the user sees, everything else is wrapped
/// into `anyhow` at the boundary.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error(transparent)]
    Db(#[from] sea_orm::DbErr),
}

impl BotError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(i64),

    #[error("person name is empty")]
    EmptyPerson,

    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    #[error("unknown debt direction: {0}")]
    UnknownDirection(String),

    #[error("date is not in YYYY-MM-DD format: {0}")]
    MalformedDate(String),

    #[error("time of day is not in HH:MM format: {0}")]
    MalformedTimeOfDay(String),
}
