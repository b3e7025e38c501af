use std::fmt::Formatter;

use teloxide::types::BotCommand;
use teloxide::utils::command::{BotCommands, ParseError};

/// Deep link payloads arrive as "/start some_tag", plain starts have no
/// arguments at all. The stock "split" parser would reject one of the two.
fn parse_start_payload(input: String) -> Result<(String,), ParseError> {
    Ok((input.trim().to_owned(),))
}

/// Takes the whole argument tail as one string, spaces included.
fn parse_text_tail(input: String) -> Result<(String,), ParseError> {
    Ok((input.trim().to_owned(),))
}

/// "<YYYY-MM-DD> <HH:MM> <text>". The text part may be empty when the
/// message itself carries the payload as a photo reply.
fn parse_schedule_args(input: String) -> Result<(String, String, String), ParseError> {
    let mut parts = input.trim().splitn(3, ' ');

    let date = parts.next().unwrap_or_default().to_owned();
    let time = parts.next().unwrap_or_default().to_owned();

    if date.is_empty() || time.is_empty() {
        return Err(ParseError::TooFewArguments {
            expected: 2,
            found: usize::from(!date.is_empty()),
            message: "Expected <YYYY-MM-DD> <HH:MM> <text>".to_owned(),
        });
    }

    let text = parts.next().unwrap_or_default().trim().to_owned();

    Ok((date, time, text))
}

#[derive(BotCommands, PartialEq, Eq, Debug)]
#[command(rename_rule = "snake_case", parse_with = "split")]
pub enum UserCommand {
    #[command(hide, parse_with = parse_start_payload)]
    Start { payload: String },

    #[command(description = "Show available commands")]
    Help,

    #[command(description = "List your open debts")]
    Debts,

    #[command(description = "Record a new debt")]
    Add,

    #[command(description = "Your reminders")]
    Reminders,

    #[command(description = "Current exchange rates")]
    Rates,

    #[command(description = "Download your debts as a file")]
    Export,

    #[command(description = "Notification settings")]
    Settings,

    #[command(description = "Change language")]
    Language,

    #[command(description = "Abort the current form")]
    Cancel,
}

impl UserCommand {
    /// Command menu for one locale, pushed to Telegram via `set_my_commands`
    /// at startup. `/start` stays out of the menu on purpose.
    pub fn localized_bot_commands(locale: &str) -> Vec<BotCommand> {
        vec![
            BotCommand::new(
                UserCommandDisplay::Debts.to_string(),
                t!("commands.debts", locale = locale),
            ),
            BotCommand::new(
                UserCommandDisplay::Add.to_string(),
                t!("commands.add", locale = locale),
            ),
            BotCommand::new(
                UserCommandDisplay::Reminders.to_string(),
                t!("commands.reminders", locale = locale),
            ),
            BotCommand::new(
                UserCommandDisplay::Rates.to_string(),
                t!("commands.rates", locale = locale),
            ),
            BotCommand::new(
                UserCommandDisplay::Settings.to_string(),
                t!("commands.settings", locale = locale),
            ),
            BotCommand::new(
                UserCommandDisplay::Export.to_string(),
                t!("commands.export", locale = locale),
            ),
            BotCommand::new(
                UserCommandDisplay::Language.to_string(),
                t!("commands.language", locale = locale),
            ),
            BotCommand::new(
                UserCommandDisplay::Help.to_string(),
                t!("commands.help", locale = locale),
            ),
            BotCommand::new(
                UserCommandDisplay::Cancel.to_string(),
                t!("commands.cancel", locale = locale),
            ),
        ]
    }
}

pub enum UserCommandDisplay {
    Start,
    Help,
    Debts,
    Add,
    Reminders,
    Rates,
    Export,
    Settings,
    Language,
    Cancel,
}

impl std::fmt::Display for UserCommandDisplay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let string = match self {
            UserCommandDisplay::Start => "start",
            UserCommandDisplay::Help => "help",
            UserCommandDisplay::Debts => "debts",
            UserCommandDisplay::Add => "add",
            UserCommandDisplay::Reminders => "reminders",
            UserCommandDisplay::Rates => "rates",
            UserCommandDisplay::Export => "export",
            UserCommandDisplay::Settings => "settings",
            UserCommandDisplay::Language => "language",
            UserCommandDisplay::Cancel => "cancel",
        };

        f.write_str(string)
    }
}

#[derive(BotCommands, PartialEq, Eq, Debug)]
#[command(rename_rule = "snake_case", parse_with = "split")]
pub enum AdminCommand {
    #[command(description = "Show this help")]
    Admin,

    #[command(description = "Show global statistics")]
    GlobalStats,

    #[command(description = "Broadcast a message to all users", parse_with = parse_text_tail)]
    Broadcast { text: String },

    #[command(
        description = "Schedule a broadcast: <YYYY-MM-DD> <HH:MM> <text>",
        parse_with = parse_schedule_args
    )]
    ScheduleBroadcast {
        date: String,
        time: String,
        text: String,
    },

    #[command(description = "Rebuild all scheduled jobs from the database")]
    Rebuild,
}

pub enum AdminCommandDisplay {
    Admin,
    GlobalStats,
    Broadcast,
    ScheduleBroadcast,
    Rebuild,
}

impl std::fmt::Display for AdminCommandDisplay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let string = match self {
            AdminCommandDisplay::Admin => "admin",
            AdminCommandDisplay::GlobalStats => "global_stats",
            AdminCommandDisplay::Broadcast => "broadcast",
            AdminCommandDisplay::ScheduleBroadcast => "schedule_broadcast",
            AdminCommandDisplay::Rebuild => "rebuild",
        };

        f.write_str(string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_user_commands() {
        let user_command = UserCommand::Help;

        match user_command {
            UserCommand::Start { .. } => UserCommandDisplay::Start,
            UserCommand::Help => UserCommandDisplay::Help,
            UserCommand::Debts => UserCommandDisplay::Debts,
            UserCommand::Add => UserCommandDisplay::Add,
            UserCommand::Reminders => UserCommandDisplay::Reminders,
            UserCommand::Rates => UserCommandDisplay::Rates,
            UserCommand::Export => UserCommandDisplay::Export,
            UserCommand::Settings => UserCommandDisplay::Settings,
            UserCommand::Language => UserCommandDisplay::Language,
            UserCommand::Cancel => UserCommandDisplay::Cancel,
        };
    }

    #[test]
    fn check_admin_commands() {
        let admin_command = AdminCommand::Admin;

        match admin_command {
            AdminCommand::Admin => AdminCommandDisplay::Admin,
            AdminCommand::GlobalStats => AdminCommandDisplay::GlobalStats,
            AdminCommand::Broadcast { .. } => AdminCommandDisplay::Broadcast,
            AdminCommand::ScheduleBroadcast { .. } => AdminCommandDisplay::ScheduleBroadcast,
            AdminCommand::Rebuild => AdminCommandDisplay::Rebuild,
        };
    }

    #[test]
    fn start_parses_with_and_without_payload() {
        let bare = UserCommand::parse("/start", "QarzBot").unwrap();
        assert_eq!(
            bare,
            UserCommand::Start {
                payload: String::new()
            }
        );

        let tagged = UserCommand::parse("/start ads_march", "QarzBot").unwrap();
        assert_eq!(
            tagged,
            UserCommand::Start {
                payload: "ads_march".to_owned()
            }
        );
    }

    #[test]
    fn broadcast_keeps_spaces_in_text() {
        let command = AdminCommand::parse("/broadcast hello dear users", "QarzBot").unwrap();

        assert_eq!(
            command,
            AdminCommand::Broadcast {
                text: "hello dear users".to_owned()
            }
        );
    }

    #[test]
    fn schedule_broadcast_splits_date_time_and_text() {
        let command =
            AdminCommand::parse("/schedule_broadcast 2025-04-01 09:00 happy spring", "QarzBot")
                .unwrap();

        assert_eq!(
            command,
            AdminCommand::ScheduleBroadcast {
                date: "2025-04-01".to_owned(),
                time: "09:00".to_owned(),
                text: "happy spring".to_owned(),
            }
        );
    }

    #[test]
    fn schedule_broadcast_requires_date_and_time() {
        assert!(AdminCommand::parse("/schedule_broadcast 2025-04-01", "QarzBot").is_err());
    }
}
