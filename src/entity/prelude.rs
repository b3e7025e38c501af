pub use super::debt::{
    ActiveModel as DebtActiveModel,
    Column as DebtColumn,
    Currency,
    Direction as DebtDirection,
    Entity as DebtEntity,
    Model as DebtModel,
};

pub use super::reminder::{
    ActiveModel as ReminderActiveModel,
    Column as ReminderColumn,
    Entity as ReminderEntity,
    Model as ReminderModel,
    Repeat as ReminderRepeat,
};

pub use super::scheduled_message::{
    ActiveModel as ScheduledMessageActiveModel,
    Column as ScheduledMessageColumn,
    Entity as ScheduledMessageEntity,
    Model as ScheduledMessageModel,
};

pub use super::user::{
    ActiveModel as UserActiveModel,
    Column as UserColumn,
    Entity as UserEntity,
    Locale as UserLocale,
    Model as UserModel,
};
