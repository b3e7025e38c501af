use teloxide::types::ChatId;

use crate::entity::prelude::UserModel;

pub struct UserState {
    user: UserModel,
    newly_created: bool,
}

impl UserState {
    pub fn new(user: UserModel, newly_created: bool) -> Self {
        Self {
            user,
            newly_created,
        }
    }

    pub fn user(&self) -> &UserModel {
        &self.user
    }

    /// True on the very first contact, the welcome flow keys off this.
    pub fn newly_created(&self) -> bool {
        self.newly_created
    }

    pub fn locale(&self) -> &str {
        self.user().locale.as_ref()
    }

    pub fn language(&self) -> &str {
        self.user().locale.language()
    }

    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    /// Private chats share their id with the user.
    pub fn chat_id(&self) -> ChatId {
        ChatId(self.user.id)
    }

    pub fn is_active(&self) -> bool {
        self.user.active
    }
}
