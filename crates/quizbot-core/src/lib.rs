//! Core domain + interaction routing for the quiz bot.
//!
//! This crate is framework-agnostic. Telegram lives behind `MessagingPort`
//! and storage behind `QuizRepository`, both implemented in other crates or
//! in `store::memory`.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod errors;
pub mod export;
pub mod formatting;
pub mod handlers;
pub mod logging;
pub mod menus;
pub mod messaging;
pub mod pending;
pub mod render;
pub mod resolution;
pub mod router;
pub mod screens;
pub mod security;
pub mod store;
pub mod tasks;
pub mod token;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
