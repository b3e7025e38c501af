use std::borrow::Cow;
use std::str::FromStr;

use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter, EnumString};
use teloxide::types::{KeyboardButton, KeyboardMarkup, ReplyMarkup};

use crate::entity::prelude::*;

/// Permanent reply keyboard shown after registration. Labels follow the
/// user's locale, so matching incoming text needs the locale too.
#[derive(Clone, Copy, PartialEq, Eq, Debug, EnumIter)]
pub enum StartKeyboard {
    Debts,
    AddDebt,
    Reminders,
    Rates,
    Settings,
}

impl StartKeyboard {
    #[must_use]
    pub fn label(&self, locale: &str) -> Cow<'_, str> {
        match self {
            StartKeyboard::Debts => t!("keyboard.debts", locale = locale),
            StartKeyboard::AddDebt => t!("keyboard.add-debt", locale = locale),
            StartKeyboard::Reminders => t!("keyboard.reminders", locale = locale),
            StartKeyboard::Rates => t!("keyboard.rates", locale = locale),
            StartKeyboard::Settings => t!("keyboard.settings", locale = locale),
        }
    }

    fn button(self, locale: &str) -> KeyboardButton {
        KeyboardButton::new(self.label(locale).into_owned())
    }

    #[must_use]
    pub fn markup(locale: &str) -> ReplyMarkup {
        ReplyMarkup::Keyboard(
            KeyboardMarkup::new(vec![
                vec![Self::Debts.button(locale), Self::AddDebt.button(locale)],
                vec![Self::Reminders.button(locale), Self::Rates.button(locale)],
                vec![Self::Settings.button(locale)],
            ])
            .resize_keyboard(),
        )
    }

    #[must_use]
    pub fn from_str(text: &str, locale: &str) -> Option<Self> {
        Self::iter().find(|button| button.label(locale) == text)
    }
}

/// Language picker. Labels name each language in itself, so they stay
/// fixed instead of following the current locale.
#[derive(Clone, Copy, EnumString, AsRefStr)]
pub enum LanguageKeyboard {
    #[strum(serialize = "🇺🇿 O'zbekcha")]
    Uzbek,
    #[strum(serialize = "🇷🇺 Русский")]
    Russian,
    #[strum(serialize = "🇬🇧 English")]
    English,
}

impl LanguageKeyboard {
    #[must_use]
    pub fn markup() -> ReplyMarkup {
        ReplyMarkup::Keyboard(
            KeyboardMarkup::new(vec![vec![
                KeyboardButton::new(Self::Uzbek.as_ref()),
                KeyboardButton::new(Self::Russian.as_ref()),
                KeyboardButton::new(Self::English.as_ref()),
            ]])
            .resize_keyboard()
            .one_time_keyboard(),
        )
    }

    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Self::from_str(text).ok()
    }

    #[must_use]
    pub fn into_locale(self) -> UserLocale {
        match self {
            Self::Uzbek => UserLocale::Uzbek,
            Self::Russian => UserLocale::Russian,
            Self::English => UserLocale::English,
        }
    }
}

/// One-shot keyboards for the multi-step forms.
pub mod form {
    use sea_orm::Iterable as _;

    use super::*;

    pub fn currencies() -> ReplyMarkup {
        let buttons: Vec<KeyboardButton> = Currency::iter()
            .map(|currency| KeyboardButton::new(currency.code()))
            .collect();

        ReplyMarkup::Keyboard(
            KeyboardMarkup::new(vec![buttons])
                .resize_keyboard()
                .one_time_keyboard(),
        )
    }

    pub fn directions(locale: &str) -> ReplyMarkup {
        ReplyMarkup::Keyboard(
            KeyboardMarkup::new(vec![vec![
                KeyboardButton::new(t!("debt-form.direction-owe", locale = locale).into_owned()),
                KeyboardButton::new(t!("debt-form.direction-owed", locale = locale).into_owned()),
            ]])
            .resize_keyboard()
            .one_time_keyboard(),
        )
    }

    pub fn repeats(locale: &str) -> ReplyMarkup {
        ReplyMarkup::Keyboard(
            KeyboardMarkup::new(vec![vec![
                KeyboardButton::new(t!("reminder-form.repeat-once", locale = locale).into_owned()),
                KeyboardButton::new(t!("reminder-form.repeat-daily", locale = locale).into_owned()),
                KeyboardButton::new(
                    t!("reminder-form.repeat-monthly", locale = locale).into_owned(),
                ),
            ]])
            .resize_keyboard()
            .one_time_keyboard(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_keyboard_roundtrip_per_locale() {
        for locale in rust_i18n::available_locales!() {
            for button in StartKeyboard::iter() {
                let label = button.label(locale).into_owned();

                assert_eq!(
                    StartKeyboard::from_str(&label, locale),
                    Some(button),
                    "label {label:?} should map back in locale {locale}"
                );
            }
        }
    }

    #[test]
    fn start_keyboard_rejects_plain_text() {
        assert_eq!(StartKeyboard::from_str("hello", "en"), None);
    }

    #[test]
    fn language_keyboard_parses_fixed_labels() {
        assert!(matches!(
            LanguageKeyboard::parse("🇷🇺 Русский"),
            Some(LanguageKeyboard::Russian)
        ));
        assert!(LanguageKeyboard::parse("Russian").is_none());
    }
}
