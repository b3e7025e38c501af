pub mod debt;
pub mod prelude;
pub mod reminder;
pub mod scheduled_message;
pub mod user;
