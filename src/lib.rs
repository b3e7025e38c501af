#![allow(clippy::explicit_auto_deref)]
#![warn(clippy::unwrap_used)]

#[macro_use]
extern crate rust_i18n;
#[macro_use]
extern crate serde;

i18n!("locales", fallback = "en");

pub mod app;
pub mod delivery;
pub mod entity;
pub mod errors;
pub mod logger;
pub mod scheduler;
pub mod services;
pub mod telegram;
pub mod user;
pub mod utils;
pub mod workers;
