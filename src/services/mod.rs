pub mod debt;
pub mod debt_parser;
pub mod export;
pub mod notification;
pub mod rates;
pub mod reminder;
pub mod scheduled_message;
pub mod user;

pub use debt::{DebtChanges, DebtDraft, DebtService};
pub use debt_parser::{DebtParserService, ParseOutcome};
pub use export::{ExportFile, ExportService};
pub use notification::NotificationService;
pub use rates::{RateService, RateSnapshot};
pub use reminder::ReminderService;
pub use scheduled_message::ScheduledMessageService;
pub use user::{LocaleCount, UserService};
