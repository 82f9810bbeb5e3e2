//! tg-relay core library: configuration, allow-list filtering, payload formatting,
//! and webhook delivery, shared by the CLI and the Telegram session adapter.

pub mod allowlist;
pub mod config;
pub mod discover;
pub mod event;
pub mod filter;
pub mod payload;
pub mod relay;
pub mod webhook;
