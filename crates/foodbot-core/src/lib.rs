//! Core domain + application logic for the food picture bot.
//!
//! This crate is intentionally framework-agnostic. Telegram, Reddit and pm2 live behind
//! ports (traits) implemented in adapter crates or small adapter modules.

pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod ports;
pub mod posts;
pub mod registry;
pub mod scheduler;
pub mod security;
pub mod selector;
pub mod store;
pub mod subreddits;
pub mod supervisor;

pub use errors::{Error, Result};
