use chrono::NaiveDateTime;
use teloxide::dispatching::dialogue::{Dialogue, InMemStorage};
use teloxide::types::ChatId;

use crate::app::App;
use crate::entity::prelude::*;
use crate::services::DebtDraft;

/// Where a chat currently is inside a multi-step flow. `Idle` and an
/// absent dialogue mean the same thing: free text goes to other handlers.
#[derive(Clone, Debug, Default)]
pub enum FormState {
    #[default]
    Idle,

    DebtPerson,
    DebtAmount {
        person: String,
    },
    DebtCurrency {
        person: String,
        amount: i64,
    },
    DebtDirection {
        person: String,
        amount: i64,
        currency: Currency,
    },
    DebtDue {
        person: String,
        amount: i64,
        currency: Currency,
        direction: DebtDirection,
    },
    DebtComment {
        draft: DebtDraft,
    },

    DebtEditComment {
        debt_id: i64,
    },

    ReminderText,
    ReminderDue {
        text: String,
    },
    ReminderRepeat {
        text: String,
        due: NaiveDateTime,
    },

    /// Parsed AI candidate waiting for the inline confirm or discard.
    AiPreview {
        draft: DebtDraft,
    },
}

impl FormState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

pub type FormDialogue = Dialogue<FormState, InMemStorage<FormState>>;

pub fn dialogue(app: &'static App, chat_id: ChatId) -> FormDialogue {
    FormDialogue::new(app.form_storage(), chat_id)
}
