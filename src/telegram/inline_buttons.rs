use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use teloxide::types::{InlineKeyboardButton, InlineKeyboardButtonKind};

/// Callback payloads, serialized as JSON into the button data. Telegram
/// caps callback data at 64 bytes, variant names are kept short enough
/// for that.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub enum InlineButtons {
    DebtsPage(u64),
    DebtDetails(i64),
    DebtClose(i64),
    DebtDelete(i64),
    DebtExtend(i64, i64),
    DebtEditComment(i64),
    ReminderAdd,
    ReminderDelete(i64),
    AiConfirm,
    AiDiscard,
    SettingsMenu,
    DebtTimeMenu,
    RateTimeMenu,
    SetDebtTime(Option<String>),
    SetRateTime(Option<String>),
}

impl InlineButtons {
    #[must_use]
    pub fn label(&self, locale: &str) -> Cow<'_, str> {
        match self {
            InlineButtons::DebtsPage(_) => Cow::Borrowed("📄"),
            InlineButtons::DebtDetails(_) => Cow::Borrowed("ℹ️"),
            InlineButtons::DebtClose(_) => t!("inline-buttons.close-debt", locale = locale),
            InlineButtons::DebtDelete(_) => t!("inline-buttons.delete-debt", locale = locale),
            InlineButtons::DebtExtend(_, days) => Cow::Owned(format!("+{days}")),
            InlineButtons::DebtEditComment(_) => {
                t!("inline-buttons.edit-comment", locale = locale)
            },
            InlineButtons::ReminderAdd => t!("inline-buttons.add-reminder", locale = locale),
            InlineButtons::ReminderDelete(_) => Cow::Borrowed("🗑"),
            InlineButtons::AiConfirm => t!("inline-buttons.ai-confirm", locale = locale),
            InlineButtons::AiDiscard => t!("inline-buttons.ai-discard", locale = locale),
            InlineButtons::SettingsMenu => t!("inline-buttons.back", locale = locale),
            InlineButtons::DebtTimeMenu => t!("inline-buttons.debt-time", locale = locale),
            InlineButtons::RateTimeMenu => t!("inline-buttons.rate-time", locale = locale),
            InlineButtons::SetDebtTime(time) | InlineButtons::SetRateTime(time) => match time {
                Some(time) => Cow::Owned(time.clone()),
                None => t!("inline-buttons.disable", locale = locale),
            },
        }
    }
}

impl InlineButtons {
    #[must_use]
    pub fn into_inline_keyboard_button(self, locale: &str) -> InlineKeyboardButton {
        let label = self.label(locale).into_owned();

        InlineKeyboardButton::new(label, self.into())
    }
}

#[allow(clippy::from_over_into)]
impl Into<InlineKeyboardButtonKind> for InlineButtons {
    fn into(self) -> InlineKeyboardButtonKind {
        InlineKeyboardButtonKind::CallbackData(self.to_string())
    }
}

impl FromStr for InlineButtons {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

impl Display for InlineButtons {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(
            serde_json::to_string(self)
                .map_err(|_| std::fmt::Error)?
                .as_ref(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_data_roundtrip() {
        let buttons = [
            InlineButtons::DebtsPage(3),
            InlineButtons::DebtExtend(987_654_321, 30),
            InlineButtons::SetDebtTime(Some("09:00".into())),
            InlineButtons::SetRateTime(None),
            InlineButtons::AiConfirm,
        ];

        for button in buttons {
            let data = button.to_string();
            let parsed: InlineButtons = data.parse().expect("should parse back");

            assert_eq!(parsed, button);
        }
    }

    #[test]
    fn callback_data_fits_telegram_limit() {
        let longest = [
            InlineButtons::DebtExtend(i64::MAX, 30),
            InlineButtons::SetDebtTime(Some("23:59".into())),
            InlineButtons::SetRateTime(Some("23:59".into())),
            InlineButtons::DebtEditComment(i64::MAX),
        ];

        for button in longest {
            assert!(
                button.to_string().len() <= 64,
                "{button:?} serializes to {} bytes",
                button.to_string().len()
            );
        }
    }

    #[test]
    fn garbage_data_fails_to_parse() {
        assert!("not json".parse::<InlineButtons>().is_err());
        assert!(r#"{"Unknown":1}"#.parse::<InlineButtons>().is_err());
    }
}
