pub mod ai_capture;
pub mod broadcast;
pub mod cancel;
pub mod debt_form;
pub mod debts;
pub mod export;
pub mod global_stats;
pub mod help;
pub mod language;
pub mod rates;
pub mod rebuild;
pub mod reminders;
pub mod schedule_broadcast;
pub mod settings;
pub mod start;
